//! RDF triple encoding for Dgraph mutations and bulk files.
//!
//! Nodes are `<subject> <node_type> "value" .`; edges are reified as edge
//! nodes so that repeated `(src, tgt)` pairs stay distinct:
//!
//! ```text
//! <src>  <e>       <edge> (type="s::c", value=3) .
//! <edge> <tgt>     <tgt> .
//! <edge> <lineage> "s::c" .
//! <edge> <ordinal> "3"^^<xs:int> .
//! ```

use std::fmt;

use prairie_core::{Error, Result};
use prairie_graph::{Edge, Labels, Node};

/// Predicate linking a source node to an edge node.
pub const EDGE_PREDICATE: &str = "e";
/// Predicate linking an edge node to its target node.
pub const TARGET_PREDICATE: &str = "tgt";
/// Lineage of an edge node.
pub const LINEAGE_PREDICATE: &str = "lineage";
/// Ordinal of an edge node.
pub const ORDINAL_PREDICATE: &str = "ordinal";
/// JSON-encoded labels of a node or edge node.
pub const LABELS_PREDICATE: &str = "labels";

/// Escape a string for use inside an RDF literal.
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Build a blank-node label safe for any input.
///
/// ASCII alphanumerics pass through; every other byte becomes `_xx`.
pub fn blank_label(prefix: &str, raw: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + raw.len() + 1);
    out.push_str(prefix);
    out.push('_');
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

/// Whether `name` can be used as a predicate without escaping.
pub fn is_valid_predicate(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Reject predicate names that would need escaping.
pub fn check_predicate(name: &str) -> Result<()> {
    if is_valid_predicate(name) {
        Ok(())
    } else {
        Err(Error::invalid_data(format!("invalid node type '{name}'")))
    }
}

// ============================================================================
// Subject
// ============================================================================

/// Subject or object of a triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subject {
    /// Existing node, by uid.
    Uid(String),
    /// Node created by this mutation, by blank label.
    Blank(String),
}

impl Subject {
    /// Blank subject for a node value of a given type.
    pub fn node(node_type: &str, value: &str) -> Self {
        Self::Blank(blank_label(node_type, value))
    }

    /// Blank subject for an edge node.
    pub fn edge(edge: &Edge) -> Self {
        Self::Blank(blank_label(
            "edge",
            &format!(
                "{}\u{1f}{}\u{1f}{}\u{1f}{}",
                edge.src, edge.tgt, edge.edge_type, edge.edge_value
            ),
        ))
    }

    /// The blank label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Blank(label) => Some(label),
            Self::Uid(_) => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uid(uid) => write!(f, "<{uid}>"),
            Self::Blank(label) => write!(f, "_:{label}"),
        }
    }
}

// ============================================================================
// RdfBlock
// ============================================================================

/// An ordered list of triples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RdfBlock {
    lines: Vec<String>,
}

impl RdfBlock {
    /// Empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triples declaring a node.
    pub fn node(&mut self, subject: &Subject, node: &Node) -> Result<&mut Self> {
        check_predicate(&node.node_type)?;
        self.lines.push(format!(
            "{subject} <{}> \"{}\" .",
            node.node_type,
            escape_literal(&node.value)
        ));
        self.labels(subject, &node.labels)
    }

    /// Triples declaring an edge node between two existing subjects.
    pub fn edge(
        &mut self,
        src: &Subject,
        edge_node: &Subject,
        tgt: &Subject,
        edge: &Edge,
    ) -> Result<&mut Self> {
        let lineage = escape_literal(&edge.edge_type);
        self.lines.push(format!(
            "{src} <{EDGE_PREDICATE}> {edge_node} (type=\"{lineage}\", value={}) .",
            edge.edge_value
        ));
        self.lines
            .push(format!("{edge_node} <{TARGET_PREDICATE}> {tgt} ."));
        self.lines
            .push(format!("{edge_node} <{LINEAGE_PREDICATE}> \"{lineage}\" ."));
        self.lines.push(format!(
            "{edge_node} <{ORDINAL_PREDICATE}> \"{}\"^^<xs:int> .",
            edge.edge_value
        ));
        self.labels(edge_node, &edge.labels)
    }

    fn labels(&mut self, subject: &Subject, labels: &Labels) -> Result<&mut Self> {
        if !labels.is_empty() {
            let json = serde_json::to_string(labels)
                .map_err(|e| Error::serialization(format!("labels: {e}")))?;
            self.lines.push(format!(
                "{subject} <{LABELS_PREDICATE}> \"{}\" .",
                escape_literal(&json)
            ));
        }
        Ok(self)
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the block holds no triples.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Triples, one per line.
    pub fn nquads(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Body of an `application/rdf` mutation.
    pub fn set_body(nquads: &str) -> String {
        format!("{{ set {{\n{nquads}}} }}")
    }

    /// Move the triples out, leaving the block empty.
    pub fn take(&mut self) -> String {
        let out = self.nquads();
        self.lines.clear();
        out
    }
}
