use kg_text2sql::graph::{GraphSnapshot, RelationshipGraph};
use kg_text2sql::metadata::SchemaSeed;
use std::fs;
use tempfile::TempDir;

const SAMPLE_SCHEMA: &str = include_str!("../metadata/schema.json");

fn sample_graph() -> RelationshipGraph {
    SchemaSeed::from_json(SAMPLE_SCHEMA).unwrap().into_graph().unwrap()
}

type EdgeKey = (String, String, Vec<String>, Vec<String>, String);

fn edge_set(graph: &RelationshipGraph) -> Vec<EdgeKey> {
    let mut edges: Vec<EdgeKey> = graph
        .edges()
        .iter()
        .map(|e| {
            (
                e.from_table.clone(),
                e.to_table.clone(),
                e.source_columns.clone(),
                e.target_columns.clone(),
                e.context.clone(),
            )
        })
        .collect();
    edges.sort();
    edges
}

#[test]
fn test_snapshot_round_trip_through_file() {
    let graph = sample_graph();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("knowledge_graph_latest.json");

    fs::write(&path, graph.snapshot().to_json_pretty().unwrap()).unwrap();
    let restored = GraphSnapshot::from_json(&fs::read_to_string(&path).unwrap())
        .unwrap()
        .to_builder()
        .unwrap()
        .build();

    assert_eq!(edge_set(&restored), edge_set(&graph));
    assert_eq!(restored.tables(), graph.tables());
    assert_eq!(restored.columns("Trade").len(), graph.columns("Trade").len());
}

#[test]
fn test_snapshot_is_deterministic() {
    let first = sample_graph().snapshot().to_json_pretty().unwrap();
    let second = sample_graph().snapshot().to_json_pretty().unwrap();
    assert_eq!(first, second);

    let snapshot = sample_graph().snapshot();
    let tables: Vec<&str> = snapshot.nodes.iter().map(|n| n.table_name.as_str()).collect();
    assert_eq!(tables, vec!["Counterparty", "Trade", "Concentration"]);
    assert_eq!(snapshot.edges.len(), 4);
    assert_eq!(snapshot.edges[1].context, "For country level data");
}

#[test]
fn test_sample_graph_stats() {
    let stats = sample_graph().stats();
    assert_eq!(stats.total_tables, 3);
    assert_eq!(stats.total_relationships, 4);
    assert!(stats.is_connected);
    assert!((stats.average_connections - 8.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_snapshot_with_mismatched_columns_is_rejected() {
    let json = r#"{
        "nodes": [],
        "edges": [{
            "from": "A", "to": "B",
            "source_columns": ["x", "y"], "target_columns": ["x"],
            "join_type": "INNER", "context": "default", "description": ""
        }]
    }"#;
    let snapshot = GraphSnapshot::from_json(json).unwrap();
    assert!(snapshot.to_builder().is_err());
}
