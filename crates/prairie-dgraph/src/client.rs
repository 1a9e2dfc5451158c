//! HTTP client for a Dgraph worker (`alpha`).
//!
//! Mutations go through the [`Transport`] trait so that the retry loop can
//! be exercised against an in-process fake.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use prairie_core::{Error, Result};
use serde_json::{Value, json};

use crate::dql::Query;
use crate::rdf::RdfBlock;

// ============================================================================
// Transactions
// ============================================================================

/// Client-side view of one Dgraph transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Txn {
    /// Start timestamp, assigned by the first mutation.
    pub start_ts: Option<u64>,
    /// Conflict keys reported by the server.
    pub keys: Vec<String>,
    /// Predicates touched.
    pub preds: Vec<String>,
    /// Set once committed or discarded.
    pub finished: bool,
}

impl Txn {
    /// A transaction that has not talked to the server yet.
    pub fn new() -> Self {
        Self::default()
    }
}

/// What a mutation created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Blank label -> assigned uid.
    pub uids: HashMap<String, String>,
}

impl MutationOutcome {
    /// Uid assigned to a blank label.
    pub fn uid(&self, label: &str) -> Option<&str> {
        self.uids.get(label).map(String::as_str)
    }
}

/// Mutation half of the Dgraph protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Apply triples inside `txn` without committing.
    async fn mutate(&self, txn: &mut Txn, nquads: &str) -> Result<MutationOutcome>;

    /// Commit `txn`.
    async fn commit(&self, txn: &mut Txn) -> Result<()>;

    /// Abort `txn`; a no-op once it has finished.
    async fn discard(&self, txn: &mut Txn) -> Result<()>;
}

// ============================================================================
// DgraphClient
// ============================================================================

/// Connection to one worker's HTTP endpoint.
#[derive(Clone, Debug)]
pub struct DgraphClient {
    http: reqwest::Client,
    base: String,
}

fn request_error(context: &str, e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        Error::transport(format!("{context}: {e}"))
    } else {
        Error::backend(format!("{context}: {e}"))
    }
}

/// Pull the `errors` array out of a response body, if present.
fn response_errors(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .collect();
    Some(messages.join("; "))
}

impl DgraphClient {
    /// Client for `http://{host}:{port}`.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base: format!("http://{host}:{port}"),
        })
    }

    /// Base URL of the worker.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn send(&self, context: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| request_error(context, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| request_error(context, e))?;

        if status.is_server_error() {
            return Err(Error::transport(format!("{context}: HTTP {status}: {text}")));
        }
        if !status.is_success() {
            return Err(Error::backend(format!("{context}: HTTP {status}: {text}")));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            Error::invalid_data(format!("{context}: unparseable response '{text}': {e}"))
        })?;
        if let Some(message) = response_errors(&body) {
            return Err(Error::backend(format!("{context}: {message}")));
        }
        Ok(body)
    }

    /// Liveness probe.
    pub async fn health(&self) -> Result<()> {
        self.send("health", self.http.get(format!("{}/health", self.base)))
            .await
            .map(|_| ())
    }

    /// Run a read-only query; returns the `data` object.
    pub async fn query(&self, query: &Query) -> Result<Value> {
        trace!("query: {}", query.text);
        let body = json!({
            "query": query.text,
            "variables": query.variables,
        });
        let response = self
            .send(
                "query",
                self.http
                    .post(format!("{}/query", self.base))
                    .header("Content-Type", "application/json")
                    .json(&body),
            )
            .await?;
        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Apply a schema.
    pub async fn alter(&self, schema: &str) -> Result<()> {
        debug!("applying schema to {}", self.base);
        self.send(
            "alter",
            self.http
                .post(format!("{}/alter", self.base))
                .body(schema.to_string()),
        )
        .await
        .map(|_| ())
    }

    /// Drop every node, edge, and the schema.
    pub async fn drop_all(&self) -> Result<()> {
        debug!("dropping all data on {}", self.base);
        self.send(
            "drop_all",
            self.http
                .post(format!("{}/alter", self.base))
                .json(&json!({ "drop_all": true })),
        )
        .await
        .map(|_| ())
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Fold a `/mutate` response into the transaction and extract assigned uids.
pub fn absorb_mutation(txn: &mut Txn, body: &Value) -> Result<MutationOutcome> {
    let ext = body.pointer("/extensions/txn");
    if let Some(start_ts) = ext.and_then(|t| t.get("start_ts")).and_then(Value::as_u64) {
        txn.start_ts = Some(start_ts);
    }
    txn.keys.extend(string_list(ext.and_then(|t| t.get("keys"))));
    txn.preds.extend(string_list(ext.and_then(|t| t.get("preds"))));

    if txn.start_ts.is_none() {
        return Err(Error::invalid_data("mutation response lacks a start timestamp"));
    }

    let uids = body
        .pointer("/data/uids")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|uid| (k.clone(), uid.to_string())))
                .collect()
        })
        .unwrap_or_default();
    Ok(MutationOutcome { uids })
}

#[async_trait]
impl Transport for DgraphClient {
    async fn mutate(&self, txn: &mut Txn, nquads: &str) -> Result<MutationOutcome> {
        let url = match txn.start_ts {
            Some(ts) => format!("{}/mutate?startTs={ts}", self.base),
            None => format!("{}/mutate", self.base),
        };
        trace!("mutate: {nquads}");
        let body = self
            .send(
                "mutate",
                self.http
                    .post(url)
                    .header("Content-Type", "application/rdf")
                    .body(RdfBlock::set_body(nquads)),
            )
            .await?;
        absorb_mutation(txn, &body)
    }

    async fn commit(&self, txn: &mut Txn) -> Result<()> {
        let Some(ts) = txn.start_ts else {
            txn.finished = true;
            return Ok(());
        };
        if txn.finished {
            return Ok(());
        }
        self.send(
            "commit",
            self.http
                .post(format!("{}/commit?startTs={ts}", self.base))
                .json(&json!({ "keys": txn.keys, "preds": txn.preds })),
        )
        .await?;
        txn.finished = true;
        Ok(())
    }

    async fn discard(&self, txn: &mut Txn) -> Result<()> {
        if txn.finished {
            return Ok(());
        }
        txn.finished = true;
        let Some(ts) = txn.start_ts else {
            return Ok(());
        };
        self.send(
            "discard",
            self.http
                .post(format!("{}/commit?startTs={ts}&abort=true", self.base))
                .json(&json!({})),
        )
        .await
        .map(|_| ())
    }
}
