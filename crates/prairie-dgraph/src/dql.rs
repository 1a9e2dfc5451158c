//! DQL queries and decoders for the edge-node layout written by [`crate::rdf`].
//!
//! Builders return a [`Query`] (text plus GraphQL variables). Decoders take
//! the `data` object of a `/query` response and are pure, so they are tested
//! against canned JSON.

use std::collections::BTreeMap;
use std::fmt::Write;

use prairie_core::{Error, Result};
use prairie_graph::{ChainRequest, Edge, Labels, Node};
use serde_json::Value;

use crate::rdf::{
    EDGE_PREDICATE, LABELS_PREDICATE, LINEAGE_PREDICATE, ORDINAL_PREDICATE, TARGET_PREDICATE,
};

/// A query and its variables. Variable values are sent as strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// DQL text.
    pub text: String,
    /// `$name -> value`.
    pub variables: BTreeMap<String, String>,
}

impl Query {
    fn new(text: String) -> Self {
        Self {
            text,
            variables: BTreeMap::new(),
        }
    }

    fn var(mut self, name: &str, value: impl ToString) -> Self {
        self.variables.insert(format!("${name}"), value.to_string());
        self
    }
}

const EDGE_FIELDS: &str = "uid lineage ordinal labels";

// ============================================================================
// Builders
// ============================================================================

/// Look up a node by type and value.
pub fn node_by_value(node_type: &str) -> Query {
    Query::new(format!(
        "query q($v: string) {{ q(func: eq({node_type}, $v), first: 1) {{ uid value: {node_type} {LABELS_PREDICATE} }} }}"
    ))
}

/// Look up an edge node by its full identity.
pub fn edge_by_identity(node_type: &str, edge: &Edge) -> Query {
    Query::new(format!(
        "query q($s: string, $t: string, $l: string, $o: int) {{ \
           q(func: eq({node_type}, $s)) {{ \
             {EDGE_PREDICATE} @filter(eq({LINEAGE_PREDICATE}, $l) AND eq({ORDINAL_PREDICATE}, $o)) {{ \
               {EDGE_FIELDS} {TARGET_PREDICATE} @filter(eq({node_type}, $t)) {{ uid }} \
             }} \
           }} \
         }}"
    ))
    .var("s", &edge.src)
    .var("t", &edge.tgt)
    .var("l", &edge.edge_type)
    .var("o", edge.edge_value)
}

/// Outgoing edge nodes of a node.
pub fn outgoing(node_type: &str) -> Query {
    Query::new(format!(
        "query q($v: string) {{ \
           q(func: eq({node_type}, $v)) {{ \
             value: {node_type} \
             {EDGE_PREDICATE} {{ {EDGE_FIELDS} {TARGET_PREDICATE} {{ value: {node_type} }} }} \
           }} \
         }}"
    ))
}

/// Incoming edge nodes of a node.
pub fn incoming(node_type: &str) -> Query {
    Query::new(format!(
        "query q($v: string) {{ \
           q(func: eq({node_type}, $v)) {{ \
             value: {node_type} \
             ~{TARGET_PREDICATE} {{ {EDGE_FIELDS} ~{EDGE_PREDICATE} {{ value: {node_type} }} }} \
           }} \
         }}"
    ))
}

/// Every node of a type.
pub fn all_nodes(node_type: &str) -> Query {
    Query::new(format!(
        "{{ q(func: has({node_type})) {{ uid value: {node_type} {LABELS_PREDICATE} }} }}"
    ))
}

/// Every edge node, with its endpoints.
pub fn all_edges(node_type: &str) -> Query {
    Query::new(format!(
        "{{ q(func: has({LINEAGE_PREDICATE})) {{ \
             {EDGE_FIELDS} \
             {TARGET_PREDICATE} {{ value: {node_type} }} \
             ~{EDGE_PREDICATE} {{ value: {node_type} }} \
           }} }}"
    ))
}

/// Count subjects carrying `predicate`.
pub fn count(predicate: &str) -> Query {
    Query::new(format!("{{ q(func: has({predicate})) {{ total: count(uid) }} }}"))
}

/// Bounded chain walk: one nested block per ordinal.
pub fn chain(node_type: &str, request: &ChainRequest) -> Query {
    let mut text = format!(
        "query q($v: string, $l: string) {{ q(func: eq({node_type}, $v)) {{ uid value: {node_type} {LABELS_PREDICATE} "
    );
    for ordinal in request.first..=request.last {
        let _ = write!(
            text,
            "{EDGE_PREDICATE} @filter(eq({LINEAGE_PREDICATE}, $l) AND eq({ORDINAL_PREDICATE}, {ordinal})) {{ \
             {TARGET_PREDICATE} {{ uid value: {node_type} {LABELS_PREDICATE} "
        );
    }
    for _ in request.first..=request.last {
        text.push_str("} } ");
    }
    text.push_str("} }");
    Query::new(text).var("l", &request.edge_type)
}

/// Attach the `$v` variable used by single-node queries.
pub fn with_value(query: Query, value: &str) -> Query {
    query.var("v", value)
}

// ============================================================================
// Decoders
// ============================================================================

/// Elements of a predicate that may come back as one object or a list.
fn many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

fn root(data: &Value) -> Vec<&Value> {
    many(data.get("q"))
}

fn str_field(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_data(format!("response lacks string field '{field}'")))
}

fn labels_field(value: &Value) -> Result<Labels> {
    match value.get(LABELS_PREDICATE).and_then(Value::as_str) {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| Error::invalid_data(format!("malformed labels '{json}': {e}"))),
        None => Ok(Labels::new()),
    }
}

fn decode_node(value: &Value, node_type: &str) -> Result<Node> {
    Ok(Node {
        value: str_field(value, "value")?,
        node_type: node_type.to_string(),
        db_id: Some(str_field(value, "uid")?),
        labels: labels_field(value)?,
    })
}

fn decode_edge(value: &Value, src: String, tgt: String) -> Result<Edge> {
    let edge_value = value
        .get(ORDINAL_PREDICATE)
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::invalid_data("edge node lacks an ordinal"))?;
    Ok(Edge {
        src,
        tgt,
        edge_type: str_field(value, LINEAGE_PREDICATE)?,
        edge_value,
        labels: labels_field(value)?,
        db_id: Some(str_field(value, "uid")?),
    })
}

fn endpoint(value: &Value, predicate: &str) -> Result<String> {
    many(value.get(predicate))
        .first()
        .map(|v| str_field(v, "value"))
        .transpose()?
        .ok_or_else(|| Error::invalid_data(format!("edge node lacks '{predicate}'")))
}

/// First `uid` under `q`, if any.
pub fn decode_uid(data: &Value) -> Option<String> {
    root(data)
        .first()
        .and_then(|v| v.get("uid"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Node found by [`node_by_value`].
pub fn decode_node_lookup(data: &Value, node_type: &str) -> Result<Option<Node>> {
    root(data)
        .first()
        .map(|v| decode_node(v, node_type))
        .transpose()
}

/// Stored edge found by [`edge_by_identity`] for the requested `edge`.
///
/// Labels and uid come from the store, not from the request.
pub fn decode_edge_lookup(data: &Value, edge: &Edge) -> Result<Option<Edge>> {
    root(data)
        .into_iter()
        .flat_map(|src| many(src.get(EDGE_PREDICATE)))
        .find(|found| !many(found.get(TARGET_PREDICATE)).is_empty())
        .map(|found| decode_edge(found, edge.src.clone(), edge.tgt.clone()))
        .transpose()
}

/// Edges found by [`outgoing`].
pub fn decode_outgoing(data: &Value) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    for src in root(data) {
        let src_value = str_field(src, "value")?;
        for edge in many(src.get(EDGE_PREDICATE)) {
            let tgt = endpoint(edge, TARGET_PREDICATE)?;
            edges.push(decode_edge(edge, src_value.clone(), tgt)?);
        }
    }
    Ok(edges)
}

/// Edges found by [`incoming`].
pub fn decode_incoming(data: &Value) -> Result<Vec<Edge>> {
    let reverse_tgt = format!("~{TARGET_PREDICATE}");
    let reverse_edge = format!("~{EDGE_PREDICATE}");
    let mut edges = Vec::new();
    for tgt in root(data) {
        let tgt_value = str_field(tgt, "value")?;
        for edge in many(tgt.get(&reverse_tgt)) {
            let src = endpoint(edge, &reverse_edge)?;
            edges.push(decode_edge(edge, src, tgt_value.clone())?);
        }
    }
    Ok(edges)
}

/// Nodes found by [`all_nodes`].
pub fn decode_nodes(data: &Value, node_type: &str) -> Result<Vec<Node>> {
    root(data)
        .into_iter()
        .map(|v| decode_node(v, node_type))
        .collect()
}

/// Edges found by [`all_edges`].
pub fn decode_edges(data: &Value) -> Result<Vec<Edge>> {
    let reverse_edge = format!("~{EDGE_PREDICATE}");
    root(data)
        .into_iter()
        .map(|edge| {
            let src = endpoint(edge, &reverse_edge)?;
            let tgt = endpoint(edge, TARGET_PREDICATE)?;
            decode_edge(edge, src, tgt)
        })
        .collect()
}

/// Total found by [`count`].
pub fn decode_count(data: &Value) -> Result<usize> {
    let total = root(data)
        .first()
        .and_then(|v| v.get("total"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    usize::try_from(total).map_err(|e| Error::invalid_data(format!("count overflow: {e}")))
}

/// Every complete walk found by [`chain`].
pub fn decode_chain(
    data: &Value,
    node_type: &str,
    request: &ChainRequest,
) -> Result<Vec<Vec<Node>>> {
    let hops = usize::try_from(request.hops())
        .map_err(|e| Error::invalid_data(format!("chain too long: {e}")))?;
    let mut chains = Vec::new();
    for start in root(data) {
        let mut prefix = vec![decode_node(start, node_type)?];
        walk(start, node_type, hops, &mut prefix, &mut chains)?;
    }
    Ok(chains)
}

fn walk(
    at: &Value,
    node_type: &str,
    remaining: usize,
    prefix: &mut Vec<Node>,
    chains: &mut Vec<Vec<Node>>,
) -> Result<()> {
    if remaining == 0 {
        chains.push(prefix.clone());
        return Ok(());
    }
    for edge in many(at.get(EDGE_PREDICATE)) {
        for next in many(edge.get(TARGET_PREDICATE)) {
            prefix.push(decode_node(next, node_type)?);
            walk(next, node_type, remaining - 1, prefix, chains)?;
            prefix.pop();
        }
    }
    Ok(())
}
