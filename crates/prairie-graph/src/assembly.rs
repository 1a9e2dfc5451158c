//! Sequence reassembly and hit grouping.
//!
//! Adjacent k-mers along a walk overlap by `k - 1` characters. Concatenating
//! a walk with that overlap trimmed recovers the underlying sequence; the
//! resulting hits are then grouped by sample and contig for reporting.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lineage::uncouple_edge_type;
use crate::store::LineagePath;
use crate::types::Node;

/// Concatenate node values, dropping the first `overlap` characters of every
/// node after the first.
///
/// Values shorter than `overlap` contribute nothing.
pub fn concat_values(nodes: &[Node], overlap: usize) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        if i == 0 {
            out.push_str(&node.value);
        } else {
            out.push_str(node.value.get(overlap..).unwrap_or_default());
        }
    }
    out
}

/// A reassembled sequence and where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Reassembled sequence.
    pub sequence: String,
    /// Lineage the walk followed.
    pub edge_type: String,
    /// Sample half of the lineage.
    pub sample: String,
    /// Contig half of the lineage.
    pub contig: String,
}

impl Hit {
    /// Reassemble a walk into a hit.
    pub fn from_path(path: &LineagePath, overlap: usize) -> Self {
        let (sample, contig) =
            uncouple_edge_type(&path.edge_type).unwrap_or((path.edge_type.as_str(), ""));
        Self {
            sequence: concat_values(&path.nodes, overlap),
            edge_type: path.edge_type.clone(),
            sample: sample.to_string(),
            contig: contig.to_string(),
        }
    }
}

/// Hits grouped as sample, then contig, then distinct sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitReport {
    /// `sample -> contig -> sequences`.
    pub samples: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl HitReport {
    /// Group a set of hits.
    pub fn from_hits<'a>(hits: impl IntoIterator<Item = &'a Hit>) -> Self {
        let mut samples: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for hit in hits {
            samples
                .entry(hit.sample.clone())
                .or_default()
                .entry(hit.contig.clone())
                .or_default()
                .insert(hit.sequence.clone());
        }
        Self { samples }
    }

    /// Reassemble and group a set of walks.
    pub fn from_paths(paths: &[LineagePath], overlap: usize) -> Self {
        let hits: Vec<Hit> = paths.iter().map(|p| Hit::from_path(p, overlap)).collect();
        Self::from_hits(&hits)
    }

    /// Whether any hit was recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Display for HitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (sample, contigs) in &self.samples {
            writeln!(f, "Sample {sample} has:")?;
            for (contig, sequences) in contigs {
                writeln!(f, "Contig {contig} with variant(s):")?;
                for sequence in sequences {
                    writeln!(f, "{sequence}")?;
                }
            }
        }
        Ok(())
    }
}
