//! Reachability over lineage-stamped edges.
//!
//! `A` reaches `B` when some outgoing edge of `A` and some incoming edge of
//! `B` belong to the same lineage and the first does not come after the
//! second. Only [`GraphStore::find_edges`] and
//! [`GraphStore::find_edges_reverse`] are consulted.

use log::{debug, warn};
use prairie_core::Result;

use crate::store::{Connectivity, GraphStore};
use crate::types::Edge;

/// Whether `src_edge` can open a lineage walk that ends with `tgt_edge`.
pub fn lineage_match(src_edge: &Edge, tgt_edge: &Edge) -> bool {
    src_edge.edge_type == tgt_edge.edge_type && src_edge.edge_value <= tgt_edge.edge_value
}

/// All `(src_edge, tgt_edge)` pairs that satisfy [`lineage_match`].
///
/// Pairs come out in the order of `find_edges(a)`, then `find_edges_reverse(b)`.
pub async fn matching_pairs<S>(store: &S, a: &str, b: &str) -> Result<Vec<(Edge, Edge)>>
where
    S: GraphStore + ?Sized,
{
    let edges_a = store.find_edges(a).await?;
    if edges_a.is_empty() {
        debug!("{a} has no outgoing edges");
        return Ok(Vec::new());
    }

    let edges_b = store.find_edges_reverse(b).await?;
    if edges_b.is_empty() {
        debug!("{b} has no incoming edges");
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    for src_edge in &edges_a {
        for tgt_edge in &edges_b {
            if lineage_match(src_edge, tgt_edge) {
                pairs.push((src_edge.clone(), tgt_edge.clone()));
            }
        }
    }
    Ok(pairs)
}

/// Decide whether `a` reaches `b` along a single lineage.
pub async fn resolve<S>(store: &S, a: &str, b: &str) -> Result<Connectivity>
where
    S: GraphStore + ?Sized,
{
    let pairs = matching_pairs(store, a, b).await?;

    let mut starting_edges: Vec<Edge> = Vec::new();
    for (src_edge, _) in pairs {
        if !starting_edges.iter().any(|e| e.same_identity(&src_edge)) {
            starting_edges.push(src_edge);
        }
    }

    if starting_edges.is_empty() {
        warn!("no lineage connects {a} to {b}");
    } else {
        debug!(
            "{a} reaches {b} through {} starting edge(s)",
            starting_edges.len()
        );
    }

    Ok(Connectivity { starting_edges })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lineage_match_inclusive() {
        let e = Edge::new("A", "B").with_origin("t", 3);
        assert!(lineage_match(&e, &e));
    }

    #[test]
    fn test_lineage_match_rejects_backwards() {
        let src = Edge::new("A", "B").with_origin("t", 4);
        let tgt = Edge::new("C", "D").with_origin("t", 3);
        assert!(!lineage_match(&src, &tgt));
    }

    #[test]
    fn test_lineage_match_rejects_other_lineage() {
        let src = Edge::new("A", "B").with_origin("t1", 0);
        let tgt = Edge::new("B", "C").with_origin("t2", 1);
        assert!(!lineage_match(&src, &tgt));
    }
}
