//! Path reconstruction.
//!
//! For each lineage-consistent pair `(src_edge, tgt_edge)` the walk from `A`
//! to `B` is recovered with a bounded chain request covering ordinals
//! `src_edge.edge_value..=tgt_edge.edge_value`. Because connectivity already
//! asserted the pair, failing to find the walk means the graph is
//! inconsistent, and the whole graph is dumped to help diagnose it.

use log::{debug, error};
use prairie_core::{Error, Result};

use crate::connectivity::matching_pairs;
use crate::store::{ChainRequest, GraphStore, LineagePath};
use crate::types::Edge;

/// Chain request covering the walk from `src_edge` through `tgt_edge`.
pub fn chain_request(src_edge: &Edge, tgt_edge: &Edge) -> ChainRequest {
    ChainRequest {
        edge_type: src_edge.edge_type.clone(),
        first: src_edge.edge_value,
        last: tgt_edge.edge_value,
    }
}

/// Rebuild one walk per matching pair between `a` and `b`.
///
/// Repeated lineages and cycles yield one walk per pair; nothing is
/// deduplicated.
pub async fn reconstruct<S>(store: &S, a: &str, b: &str) -> Result<Vec<LineagePath>>
where
    S: GraphStore + ?Sized,
{
    let pairs = matching_pairs(store, a, b).await?;
    let mut paths = Vec::with_capacity(pairs.len());

    for (src_edge, tgt_edge) in &pairs {
        let request = chain_request(src_edge, tgt_edge);
        let chains = store.chain(a, &request).await?;

        let found = chains
            .into_iter()
            .find(|nodes| nodes.last().is_some_and(|n| n.value == b));

        let Some(nodes) = found else {
            return Err(consistency_failure(store, a, b, &request).await);
        };

        debug!(
            "walk {a} -> {b} along {} covers {} nodes",
            request.edge_type,
            nodes.len()
        );
        paths.push(LineagePath {
            nodes,
            edge_type: src_edge.edge_type.clone(),
            labels: src_edge.labels.clone(),
        });
    }

    Ok(paths)
}

async fn consistency_failure<S>(store: &S, a: &str, b: &str, request: &ChainRequest) -> Error
where
    S: GraphStore + ?Sized,
{
    let message = format!(
        "no walk from {a} to {b} along {} ordinals {}..={}",
        request.edge_type, request.first, request.last
    );
    error!("{message}");

    let nodes: Vec<String> = match store.nodes().await {
        Ok(nodes) => nodes.iter().map(ToString::to_string).collect(),
        Err(e) => vec![format!("<failed to list nodes: {e}>")],
    };
    let edges: Vec<String> = match store.edges().await {
        Ok(edges) => edges.iter().map(ToString::to_string).collect(),
        Err(e) => vec![format!("<failed to list edges: {e}>")],
    };
    for node in &nodes {
        error!("node {node}");
    }
    for edge in &edges {
        error!("edge {edge}");
    }

    Error::graph_consistency(message, nodes, edges)
}
