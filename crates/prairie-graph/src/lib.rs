//! Pan-genome graph model and lineage-based connectivity for Prairie.
//!
//! This crate provides the node/edge model, the [`GraphStore`] contract every
//! backend implements, and the store-agnostic algorithms that run on top of
//! it: lineage encoding, connectivity resolution, and path reconstruction.
//!
//! # Features
//!
//! - `store-redb` (default): the embedded transactional backend
//!
//! # Key Abstractions
//!
//! - [`GraphStore`]: async persistence and query contract
//! - [`LineageEncoder`]: stamps edges with `(lineage, ordinal)` so that
//!   reachability reduces to an interval check
//! - [`MemoryStore`] / `EmbeddedStore`: the two local backends

pub mod assembly;
pub mod connectivity;
#[cfg(feature = "store-redb")]
pub mod embedded;
pub mod lineage;
pub mod memory;
pub mod path;
pub mod persistence;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
mod conformance;

pub use assembly::{Hit, HitReport, concat_values};
#[cfg(feature = "store-redb")]
pub use embedded::EmbeddedStore;
pub use lineage::{
    IngestStats, LineageEncoder, SampleEncoder, couple_edge_type, encode_contigs, ingest,
    uncouple_edge_type,
};
pub use memory::MemoryStore;
pub use persistence::{GraphSnapshot, load_snapshot, save_snapshot};
pub use stats::{GraphStats, compute_stats, quick_summary};
pub use store::{Backend, ChainRequest, Connectivity, GraphStore, LineagePath};
pub use types::{DEFAULT_EDGE_TYPE, DEFAULT_NODE_TYPE, Edge, Labels, Node, Origin};
