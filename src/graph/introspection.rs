//! Read-only views of the relationship graph: statistics, a serializable
//! snapshot, and a plain-text report.

use super::shortest_path::reachable_count;
use super::{GraphBuilder, JoinEdge, JoinKind, RelationshipGraph};
use crate::error::Result;
use crate::metadata::Column;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_tables: usize,
    pub total_relationships: usize,
    pub tables: Vec<String>,
    /// Mean number of edge endpoints per table.
    pub average_connections: f64,
    /// Weak connectivity: every table reachable ignoring edge direction.
    pub is_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub table_name: String,
    pub columns: Vec<String>,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub from: String,
    pub to: String,
    pub source_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub join_type: JoinKind,
    pub context: String,
    pub description: String,
}

impl From<&JoinEdge> for EdgeSnapshot {
    fn from(edge: &JoinEdge) -> Self {
        Self {
            from: edge.from_table.clone(),
            to: edge.to_table.clone(),
            source_columns: edge.source_columns.clone(),
            target_columns: edge.target_columns.clone(),
            join_type: edge.join_kind,
            context: edge.context.clone(),
            description: edge.description.clone(),
        }
    }
}

impl From<EdgeSnapshot> for JoinEdge {
    fn from(edge: EdgeSnapshot) -> Self {
        Self {
            from_table: edge.from,
            to_table: edge.to,
            source_columns: edge.source_columns,
            target_columns: edge.target_columns,
            join_kind: edge.join_type,
            context: edge.context,
            description: edge.description,
        }
    }
}

/// Export form of the graph. Nodes and edges follow construction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &RelationshipGraph) -> Self {
        let nodes = graph
            .tables()
            .iter()
            .map(|table| {
                let columns: Vec<String> = graph.columns(table).iter().map(|c| c.name.clone()).collect();
                NodeSnapshot {
                    table_name: table.clone(),
                    column_count: columns.len(),
                    columns,
                }
            })
            .collect();
        let edges = graph.edges().iter().map(EdgeSnapshot::from).collect();
        Self { nodes, edges }
    }

    /// Rebuilds a graph builder from the snapshot. The snapshot only carries
    /// column names, so descriptions and examples come back empty. Nodes
    /// without columns come back as bare nodes, outside the catalog.
    pub fn to_builder(&self) -> Result<GraphBuilder> {
        let mut builder = GraphBuilder::new();
        for node in &self.nodes {
            if node.columns.is_empty() {
                builder.add_node(&node.table_name);
                continue;
            }
            let columns = node.columns.iter().map(|name| Column::new(name.as_str(), "")).collect();
            builder.add_table(node.table_name.as_str(), columns);
        }
        for edge in &self.edges {
            builder.add_edge(JoinEdge::from(edge.clone()))?;
        }
        Ok(builder)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

impl RelationshipGraph {
    pub fn stats(&self) -> GraphStats {
        let total_tables = self.table_count();
        let total_degree: usize = self.tables().iter().map(|t| self.degree(t)).sum();
        let average_connections = if total_tables > 0 {
            total_degree as f64 / total_tables as f64
        } else {
            0.0
        };
        let is_connected = total_tables > 0 && reachable_count(self.adjacency(), 0) == total_tables;

        GraphStats {
            total_tables,
            total_relationships: self.edge_count(),
            tables: self.tables().to_vec(),
            average_connections,
            is_connected,
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from_graph(self)
    }

    /// Human-readable statistics and relationship listing.
    pub fn render_stats_report(&self) -> String {
        let stats = self.stats();
        let mut out = String::new();

        let _ = writeln!(out, "Knowledge Graph Statistics");
        let _ = writeln!(out, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out);
        let _ = writeln!(out, "Total Tables: {}", stats.total_tables);
        let _ = writeln!(out, "Total Relationships: {}", stats.total_relationships);
        let _ = writeln!(out, "Average Connections per Table: {:.2}", stats.average_connections);
        let _ = writeln!(out, "Is Connected: {}", if stats.is_connected { "Yes" } else { "No" });
        let _ = writeln!(out);
        let _ = writeln!(out, "Tables:");
        for table in &stats.tables {
            let _ = writeln!(out, "  - {}", table);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Detailed Relationships:");
        for edge in self.edges() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{} → {}", edge.from_table, edge.to_table);
            let _ = writeln!(
                out,
                "  Join: {} = {}",
                edge.source_columns.join(", "),
                edge.target_columns.join(", ")
            );
            let _ = writeln!(out, "  Type: {} | Context: {}", edge.join_kind, edge.context);
            let _ = writeln!(out, "  Description: {}", edge.description);
        }
        out
    }
}
