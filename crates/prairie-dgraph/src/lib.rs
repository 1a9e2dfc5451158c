//! Dgraph backend for Prairie.
//!
//! Provides [`DgraphStore`], a [`prairie_graph::GraphStore`] that talks to a
//! Dgraph worker over HTTP, together with the plumbing around it:
//!
//! - [`MutationRetrier`]: bounded exponential retry of transport failures
//! - [`DgraphInstance`]: start/teardown of a local coordinator and worker
//! - [`PortAllocator`]: unique port offsets for concurrent instances
//! - [`RdfStager`] / [`BulkLoader`]: offline loading through `dgraph bulk`

pub mod bulk;
pub mod client;
pub mod dql;
pub mod lifecycle;
pub mod ports;
pub mod rdf;
pub mod retry;
pub mod store;

pub use bulk::{BulkLoader, RdfStager, bulk_load};
pub use client::{DgraphClient, MutationOutcome, Transport, Txn};
pub use lifecycle::{DgraphInstance, InstanceConfig, ServerProcess};
pub use ports::{BasePorts, PortAllocator, Ports, UI_PORT};
pub use retry::{MutationRetrier, RetryOutcome};
pub use store::{DgraphConfig, DgraphStore};
