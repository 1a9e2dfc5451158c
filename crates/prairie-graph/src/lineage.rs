//! Lineage encoding.
//!
//! Every edge produced while walking a contig is stamped with the contig's
//! lineage name (`edge_type`) and a per-lineage ordinal (`edge_value`). With
//! ordinals assigned 0, 1, 2, ... in walk order, "does a walk from `A` reach
//! `B` within one lineage" becomes the interval check
//! `src.edge_value <= tgt.edge_value`.
//!
//! Lineage names couple a sample with a contig: `"<sample>::<contig>"`.

use std::collections::HashMap;

use log::{debug, warn};
use prairie_core::Result;
use serde::{Deserialize, Serialize};

use crate::store::GraphStore;
use crate::types::{Edge, Node};

/// Separator placed between sample and contig in a lineage name.
pub const LINEAGE_SEPARATOR: &str = "::";

/// Build a lineage name from a sample and a contig.
pub fn couple_edge_type(sample: &str, contig: &str) -> String {
    format!("{sample}{LINEAGE_SEPARATOR}{contig}")
}

/// Split a lineage name back into `(sample, contig)`.
///
/// Splits on the first separator, so contig names may themselves contain
/// it. Returns `None` for names that were not built by [`couple_edge_type`].
pub fn uncouple_edge_type(edge_type: &str) -> Option<(&str, &str)> {
    edge_type.split_once(LINEAGE_SEPARATOR)
}

/// Contig name from a FASTA header: leading `>` stripped, first token kept.
pub fn contig_name(header: &str) -> &str {
    let trimmed = header.trim().trim_start_matches('>');
    trimmed.split_whitespace().next().unwrap_or(trimmed)
}

// ============================================================================
// LineageEncoder
// ============================================================================

/// Stamps consecutive edges of one lineage with ordinals 0, 1, 2, ...
#[derive(Clone, Debug)]
pub struct LineageEncoder {
    edge_type: String,
    next: u64,
}

impl LineageEncoder {
    /// Start a lineage at ordinal 0.
    pub fn new(edge_type: impl Into<String>) -> Self {
        Self::resume(edge_type, 0)
    }

    /// Continue a lineage from a given ordinal.
    pub fn resume(edge_type: impl Into<String>, next: u64) -> Self {
        Self {
            edge_type: edge_type.into(),
            next,
        }
    }

    /// The lineage this encoder stamps.
    pub fn edge_type(&self) -> &str {
        &self.edge_type
    }

    /// Number of edges emitted so far, which is also the next ordinal.
    pub fn next_ordinal(&self) -> u64 {
        self.next
    }

    /// Emit the next edge of the lineage.
    pub fn edge(&mut self, src: impl Into<String>, tgt: impl Into<String>) -> Edge {
        let edge = Edge::new(src, tgt).with_origin(self.edge_type.clone(), self.next);
        self.next += 1;
        edge
    }
}

// ============================================================================
// SampleEncoder
// ============================================================================

/// Turns a stream of `(contig header, k-mer)` pairs from one sample into
/// lineage-stamped edges.
///
/// Consecutive k-mers of the same contig are joined by an edge. The first
/// k-mer of each contig opens a lineage and yields no edge. A contig header
/// that returns after another contig opens a fresh lineage `<contig>#<n>`
/// whose ordinals restart at 0, since no edge joins the two runs.
#[derive(Debug)]
pub struct SampleEncoder {
    sample: String,
    contig: Option<String>,
    current: Option<LineageEncoder>,
    prev: Option<String>,
    runs: HashMap<String, usize>,
}

impl SampleEncoder {
    /// Create an encoder for `sample`.
    pub fn new(sample: impl Into<String>) -> Self {
        Self {
            sample: sample.into(),
            contig: None,
            current: None,
            prev: None,
            runs: HashMap::new(),
        }
    }

    /// Feed one pair; returns the edge it closes, if any.
    pub fn push(&mut self, header: &str, kmer: impl Into<String>) -> Option<Edge> {
        let kmer = kmer.into();
        let contig = contig_name(header);

        if self.contig.as_deref() != Some(contig) {
            self.open_run(contig.to_string());
            self.prev = Some(kmer);
            return None;
        }

        let prev = self.prev.replace(kmer.clone())?;
        self.current.as_mut().map(|enc| enc.edge(prev, kmer))
    }

    /// Number of distinct contigs opened so far.
    pub fn contigs(&self) -> usize {
        self.runs.len()
    }

    fn open_run(&mut self, contig: String) {
        let run = self.runs.entry(contig.clone()).or_insert(0);
        *run += 1;
        let run = *run;

        let lineage = if run == 1 {
            contig.clone()
        } else {
            let renamed = format!("{contig}#{run}");
            warn!(
                "contig {contig} of sample {} reappeared; encoding it as {renamed}",
                self.sample
            );
            renamed
        };

        self.current = Some(LineageEncoder::new(couple_edge_type(&self.sample, &lineage)));
        self.contig = Some(contig);
    }
}

/// Encode every pair of a sample into edges, in walk order.
pub fn encode_contigs<I, H, K>(sample: &str, pairs: I) -> Vec<Edge>
where
    I: IntoIterator<Item = (H, K)>,
    H: AsRef<str>,
    K: Into<String>,
{
    let mut encoder = SampleEncoder::new(sample);
    pairs
        .into_iter()
        .filter_map(|(header, kmer)| encoder.push(header.as_ref(), kmer))
        .collect()
}

// ============================================================================
// Ingestion
// ============================================================================

/// Counters reported by [`ingest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Distinct contigs seen.
    pub contigs: usize,
    /// K-mers consumed.
    pub kmers: usize,
    /// Edges upserted.
    pub edges: usize,
}

/// Write one sample into a store.
///
/// Edges of a lineage are upserted in strictly increasing ordinal order.
/// The opening k-mer of each contig is upserted as a node so that
/// single-k-mer contigs are still present.
pub async fn ingest<I, H, K>(
    store: &dyn GraphStore,
    sample: &str,
    pairs: I,
) -> Result<IngestStats>
where
    I: IntoIterator<Item = (H, K)>,
    H: AsRef<str>,
    K: Into<String>,
{
    let mut encoder = SampleEncoder::new(sample);
    let mut stats = IngestStats::default();

    for (header, kmer) in pairs {
        let kmer = kmer.into();
        stats.kmers += 1;
        match encoder.push(header.as_ref(), kmer.clone()) {
            Some(edge) => {
                store.upsert_edge(edge, false).await?;
                stats.edges += 1;
            }
            None => {
                store.upsert_node(Node::new(kmer), false).await?;
            }
        }
    }

    stats.contigs = encoder.contigs();
    debug!(
        "ingested sample {sample}: {} contigs, {} k-mers, {} edges",
        stats.contigs, stats.kmers, stats.edges
    );
    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================
