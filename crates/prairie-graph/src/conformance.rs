//! Behavior every [`GraphStore`] must share.
//!
//! Each backend's tests call [`run_all`] with a fresh store. Every check
//! starts by clearing the store, so one instance serves the whole run.

use prairie_core::Error;

use crate::store::GraphStore;
use crate::types::{Edge, Node};

pub(crate) async fn run_all(store: &dyn GraphStore) {
    upsert_node_is_idempotent(store).await;
    upsert_edge_is_idempotent(store).await;
    lookups_do_not_mutate(store).await;
    single_edge_is_connected(store).await;
    unordered_lineage_is_not_connected(store).await;
    missing_nodes_are_not_connected(store).await;
    straight_path(store).await;
    two_lineages_two_paths(store).await;
    shortcut_and_long_path(store).await;
    cycle_yields_distinct_paths(store).await;
    labels_travel_with_path(store).await;
    broken_chain_is_consistency_error(store).await;
    clear_wipes_everything(store).await;
}

async fn add(store: &dyn GraphStore, src: &str, tgt: &str, edge_type: &str, value: u64) {
    store
        .upsert_edge(Edge::new(src, tgt).with_origin(edge_type, value), false)
        .await
        .unwrap();
}

async fn upsert_node_is_idempotent(store: &dyn GraphStore) {
    store.clear().await.unwrap();

    let first = store.upsert_node(Node::new("ABC"), true).await.unwrap().unwrap();
    assert_eq!(store.node_count().await.unwrap(), 1);
    assert!(first.db_id.is_some());

    let second = store.upsert_node(Node::new("ABC"), true).await.unwrap().unwrap();
    assert_eq!(store.node_count().await.unwrap(), 1);
    assert_eq!(first.db_id, second.db_id);

    assert!(store.upsert_node(Node::new("BCD"), false).await.unwrap().is_none());
    assert_eq!(store.node_count().await.unwrap(), 2);
}

async fn upsert_edge_is_idempotent(store: &dyn GraphStore) {
    store.clear().await.unwrap();

    let edge = Edge::new("ABC", "BCD").with_origin("t", 0);
    let first = store.upsert_edge(edge.clone(), true).await.unwrap().unwrap();
    let second = store.upsert_edge(edge.clone(), true).await.unwrap().unwrap();

    assert!(first.same_identity(&edge));
    assert_eq!(first.db_id, second.db_id);
    assert_eq!(store.edge_count().await.unwrap(), 1);
    assert_eq!(store.node_count().await.unwrap(), 2);

    add(store, "ABC", "BCD", "t", 1).await;
    assert_eq!(store.edge_count().await.unwrap(), 2);
    assert_eq!(store.node_count().await.unwrap(), 2);
}

async fn lookups_do_not_mutate(store: &dyn GraphStore) {
    store.clear().await.unwrap();

    let (found, id) = store.exists_node(&Node::new("ABC")).await.unwrap();
    assert!(!found);
    assert!(id.is_none());

    let edge = Edge::new("ABC", "BCD").with_origin("t", 0);
    assert_eq!(store.exists_edge(&edge).await.unwrap(), (false, None));
    assert!(store.find_edges("ABC").await.unwrap().is_empty());
    assert!(store.find_edges_reverse("BCD").await.unwrap().is_empty());
    assert!(store.get_node("ABC").await.unwrap().is_none());
    assert_eq!(store.node_count().await.unwrap(), 0);

    store.upsert_edge(edge.clone(), false).await.unwrap();
    let (found, id) = store.exists_edge(&edge).await.unwrap();
    assert!(found);
    assert!(id.is_some());
    let (found, _) = store.exists_node(&Node::new("BCD")).await.unwrap();
    assert!(found);
    let (found, _) = store
        .exists_node(&Node::new("BCD").with_type("other"))
        .await
        .unwrap();
    assert!(!found);
}

async fn single_edge_is_connected(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "ABC", "BCD", "t", 0).await;

    let result = store.connected("ABC", "BCD").await.unwrap();
    assert!(result.connected());
    assert_eq!(result.starting_edges.len(), 1);
    assert!(
        result.starting_edges[0].same_identity(&Edge::new("ABC", "BCD").with_origin("t", 0))
    );
}

async fn unordered_lineage_is_not_connected(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "B", "C", "t", 0).await;
    add(store, "A", "B", "t", 1).await;
    add(store, "X", "C", "other", 5).await;

    let result = store.connected("A", "C").await.unwrap();
    assert!(!result.connected());
    assert!(result.starting_edges.is_empty());
    assert!(store.path("A", "C").await.unwrap().is_empty());
}

async fn missing_nodes_are_not_connected(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "A", "B", "t", 0).await;

    assert!(!store.connected("NOPE", "B").await.unwrap().connected());
    assert!(!store.connected("A", "NOPE").await.unwrap().connected());
}

async fn straight_path(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "A", "B", "t", 0).await;
    add(store, "B", "C", "t", 1).await;

    let paths = store.path("A", "C").await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].values(), vec!["A", "B", "C"]);
    assert_eq!(paths[0].edge_type, "t");
    assert!(paths[0].nodes.iter().all(|n| n.db_id.is_some()));
}

async fn two_lineages_two_paths(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "ABC", "BCD", "path1", 0).await;
    add(store, "BCD", "CDE", "path1", 1).await;
    add(store, "ABC", "XYZ", "path2", 0).await;
    add(store, "XYZ", "CDE", "path2", 1).await;

    let result = store.connected("ABC", "CDE").await.unwrap();
    assert_eq!(result.starting_edges.len(), 2);

    let mut paths = store.path("ABC", "CDE").await.unwrap();
    paths.sort_by(|a, b| a.edge_type.cmp(&b.edge_type));
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].edge_type, "path1");
    assert_eq!(paths[0].values(), vec!["ABC", "BCD", "CDE"]);
    assert_eq!(paths[1].edge_type, "path2");
    assert_eq!(paths[1].values(), vec!["ABC", "XYZ", "CDE"]);
}

async fn shortcut_and_long_path(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "ABC", "BCD", "path1", 0).await;
    add(store, "BCD", "CDE", "path1", 1).await;
    add(store, "ABC", "CDE", "path2", 0).await;

    let paths = store.path("ABC", "CDE").await.unwrap();
    let mut lengths: Vec<usize> = paths.iter().map(|p| p.len()).collect();
    lengths.sort_unstable();
    assert_eq!(lengths, vec![2, 3]);
}

async fn cycle_yields_distinct_paths(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "A", "B", "t", 0).await;
    add(store, "B", "C", "t", 1).await;
    add(store, "C", "B", "t", 2).await;
    add(store, "B", "C", "t", 3).await;

    assert_eq!(store.edge_count().await.unwrap(), 4);
    assert_eq!(store.node_count().await.unwrap(), 3);

    let mut paths: Vec<Vec<String>> = store
        .path("A", "C")
        .await
        .unwrap()
        .iter()
        .map(|p| p.values().into_iter().map(String::from).collect())
        .collect();
    paths.sort_by_key(Vec::len);
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], vec!["A", "B", "C"]);
    assert_eq!(paths[1], vec!["A", "B", "C", "B", "C"]);
}

async fn labels_travel_with_path(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    let first = Edge::new("A", "B")
        .with_origin("s::c", 0)
        .with_label("sample", "s");
    store.upsert_edge(first, false).await.unwrap();
    add(store, "B", "C", "s::c", 1).await;

    let paths = store.path("A", "C").await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].labels.get("sample").map(String::as_str), Some("s"));
}

async fn broken_chain_is_consistency_error(store: &dyn GraphStore) {
    store.clear().await.unwrap();
    add(store, "A", "B", "t", 0).await;
    add(store, "X", "C", "t", 1).await;

    assert!(store.connected("A", "C").await.unwrap().connected());
    match store.path("A", "C").await {
        Err(Error::GraphConsistency { nodes, edges, .. }) => {
            assert_eq!(nodes.len(), 4);
            assert_eq!(edges.len(), 2);
        }
        other => panic!("expected consistency error, got {other:?}"),
    }
}

async fn clear_wipes_everything(store: &dyn GraphStore) {
    add(store, "A", "B", "t", 0).await;
    store.clear().await.unwrap();

    assert_eq!(store.node_count().await.unwrap(), 0);
    assert_eq!(store.edge_count().await.unwrap(), 0);
    assert!(store.find_edges("A").await.unwrap().is_empty());

    add(store, "A", "B", "t", 0).await;
    assert_eq!(store.edge_count().await.unwrap(), 1);
}
