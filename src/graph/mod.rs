//! Relationship graph over tables.
//!
//! A directed multigraph: every node is a table name, every edge a join
//! definition. Several edges may connect the same two tables because
//! different analyses (country, sector, rating) join on different keys.
//!
//! The graph is assembled through [`GraphBuilder`] and then frozen into a
//! [`RelationshipGraph`], which is read-only and can be shared across
//! concurrent requests behind an `Arc` without locking.

pub mod edge;
pub mod introspection;
pub mod shortest_path;

pub use edge::{parse_join_key, JoinEdge, JoinKind, DEFAULT_CONTEXT};
pub use introspection::{EdgeSnapshot, GraphSnapshot, GraphStats, NodeSnapshot};

use crate::error::{Result, Text2SqlError};
use crate::metadata::{Column, SchemaCatalog};
use std::collections::HashMap;
use tracing::{debug, info};

/// Unordered table pair used to index edges regardless of direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TablePair(String, String);

impl TablePair {
    fn new(a: &str, b: &str) -> Self {
        if a <= b {
            TablePair(a.to_string(), b.to_string())
        } else {
            TablePair(b.to_string(), a.to_string())
        }
    }
}

/// Mutable construction stage of the relationship graph.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    catalog: SchemaCatalog,
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    edges: Vec<JoinEdge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.node_index.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(name.to_string());
        self.node_index.insert(name.to_string(), idx);
        idx
    }

    /// Registers a table node with its columns.
    pub fn add_table(&mut self, name: impl Into<String>, columns: Vec<Column>) -> &mut Self {
        let name = name.into();
        self.ensure_node(&name);
        self.catalog.add_table(name, columns);
        self
    }

    /// Registers a bare node that has no catalog entry.
    pub fn add_node(&mut self, name: &str) -> &mut Self {
        self.ensure_node(name);
        self
    }

    /// Adds the directed edge `table1 -> table2`.
    ///
    /// `join_key_1` and `join_key_2` are `+`-joined column lists that pair up
    /// positionally. Missing context falls back to `"default"`, missing
    /// description to `"Join {table1} with {table2}"`. Tables not registered
    /// through [`add_table`](Self::add_table) become bare nodes.
    #[allow(clippy::too_many_arguments)]
    pub fn add_relationship(
        &mut self,
        table1: &str,
        table2: &str,
        join_key_1: &str,
        join_key_2: &str,
        join_kind: JoinKind,
        context: Option<&str>,
        description: Option<&str>,
    ) -> Result<&mut Self> {
        let malformed = |reason: String| Text2SqlError::MalformedJoinKey {
            table1: table1.to_string(),
            table2: table2.to_string(),
            join_key_1: join_key_1.to_string(),
            join_key_2: join_key_2.to_string(),
            reason,
        };

        let source_columns = parse_join_key(join_key_1).map_err(&malformed)?;
        let target_columns = parse_join_key(join_key_2).map_err(&malformed)?;
        if source_columns.len() != target_columns.len() {
            return Err(malformed(format!(
                "{} source column(s) but {} target column(s)",
                source_columns.len(),
                target_columns.len()
            )));
        }

        let context = match context.map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => DEFAULT_CONTEXT.to_string(),
        };
        let description = match description {
            Some(d) if !d.trim().is_empty() => d.to_string(),
            _ => format!("Join {} with {}", table1, table2),
        };

        self.ensure_node(table1);
        self.ensure_node(table2);
        debug!(
            "Adding join {} -> {} on {:?} = {:?} (context: {})",
            table1, table2, source_columns, target_columns, context
        );
        self.edges.push(JoinEdge {
            from_table: table1.to_string(),
            to_table: table2.to_string(),
            source_columns,
            target_columns,
            join_kind,
            context,
            description,
        });
        Ok(self)
    }

    /// Adds an already-parsed edge, e.g. from a re-imported snapshot.
    pub fn add_edge(&mut self, edge: JoinEdge) -> Result<&mut Self> {
        if edge.source_columns.is_empty() || edge.source_columns.len() != edge.target_columns.len() {
            return Err(Text2SqlError::MalformedJoinKey {
                table1: edge.from_table.clone(),
                table2: edge.to_table.clone(),
                join_key_1: edge.source_columns.join("+"),
                join_key_2: edge.target_columns.join("+"),
                reason: format!(
                    "{} source column(s) but {} target column(s)",
                    edge.source_columns.len(),
                    edge.target_columns.len()
                ),
            });
        }
        self.ensure_node(&edge.from_table);
        self.ensure_node(&edge.to_table);
        self.edges.push(edge);
        Ok(self)
    }

    /// Freezes the graph.
    pub fn build(self) -> RelationshipGraph {
        let mut pair_index: HashMap<TablePair, Vec<usize>> = HashMap::new();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];

        for (edge_idx, edge) in self.edges.iter().enumerate() {
            pair_index
                .entry(TablePair::new(&edge.from_table, &edge.to_table))
                .or_default()
                .push(edge_idx);

            let from = self.node_index[&edge.from_table];
            let to = self.node_index[&edge.to_table];
            if from != to {
                adjacency[from].push(to);
                adjacency[to].push(from);
            }
        }

        // Neighbours in name order make breadth-first search deterministic.
        for neighbours in adjacency.iter_mut() {
            neighbours.sort_by(|a, b| self.nodes[*a].cmp(&self.nodes[*b]));
            neighbours.dedup();
        }

        info!(
            "Relationship graph built: {} tables, {} relationships",
            self.nodes.len(),
            self.edges.len()
        );

        RelationshipGraph {
            catalog: self.catalog,
            nodes: self.nodes,
            node_index: self.node_index,
            edges: self.edges,
            pair_index,
            adjacency,
        }
    }
}

/// Frozen relationship graph.
#[derive(Debug)]
pub struct RelationshipGraph {
    catalog: SchemaCatalog,
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    edges: Vec<JoinEdge>,
    pair_index: HashMap<TablePair, Vec<usize>>,
    /// Undirected neighbour lists, sorted by table name.
    adjacency: Vec<Vec<usize>>,
}

impl RelationshipGraph {
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Table names in first-registration order.
    pub fn tables(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.node_index.contains_key(name)
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    pub fn table_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn columns(&self, table: &str) -> &[Column] {
        self.catalog.columns(table)
    }

    /// Every edge recorded between `a` and `b` in either direction.
    ///
    /// Edges declared `a -> b` come first, then `b -> a`, each group in
    /// insertion order. Edges keep their declared direction.
    pub fn edges_between(&self, a: &str, b: &str) -> Vec<&JoinEdge> {
        let Some(indices) = self.pair_index.get(&TablePair::new(a, b)) else {
            return Vec::new();
        };
        let (forward, backward): (Vec<&JoinEdge>, Vec<&JoinEdge>) = indices
            .iter()
            .map(|&idx| &self.edges[idx])
            .partition(|edge| edge.from_table == a);
        forward.into_iter().chain(backward).collect()
    }

    /// Shortest undirected path from `a` to `b` as a table sequence, or `None`
    /// when either table is unknown or the two are disconnected.
    ///
    /// Among several shortest paths the lexicographically smallest table
    /// sequence wins (neighbours are visited in name order).
    pub fn shortest_connecting_path(&self, a: &str, b: &str) -> Option<Vec<String>> {
        let start = *self.node_index.get(a)?;
        let goal = *self.node_index.get(b)?;
        shortest_path::bfs_path(&self.adjacency, start, goal)
            .map(|path| path.into_iter().map(|idx| self.nodes[idx].clone()).collect())
    }

    /// Number of edge endpoints touching `table` (self-loops count twice).
    pub fn degree(&self, table: &str) -> usize {
        self.edges
            .iter()
            .map(|e| (e.from_table == table) as usize + (e.to_table == table) as usize)
            .sum()
    }

    pub(crate) fn adjacency(&self) -> &[Vec<usize>] {
        &self.adjacency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> RelationshipGraph {
        let mut b = GraphBuilder::new();
        b.add_table("Counterparty", vec![Column::new("Entity", "Legal entity")]);
        b.add_table("Trade", vec![]);
        b.add_relationship("Counterparty", "Trade", "Entity+Counterparty ID", "Entity+Reporting Counterparty ID", JoinKind::Inner, None, None)
            .unwrap();
        b.add_relationship("Trade", "Counterparty", "Entity", "Entity", JoinKind::Left, Some("For entity level data"), Some("reverse"))
            .unwrap();
        b.add_relationship("Trade", "Booking", "Book", "Book", JoinKind::Inner, Some("  "), None)
            .unwrap();
        b.build()
    }

    #[test]
    fn test_edges_between_is_symmetric_and_keeps_direction() {
        let g = graph();
        let forward = g.edges_between("Counterparty", "Trade");
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].from_table, "Counterparty");
        assert_eq!(forward[1].from_table, "Trade");

        let backward = g.edges_between("Trade", "Counterparty");
        assert_eq!(backward.len(), 2);
        assert_eq!(backward[0].from_table, "Trade");
        assert_eq!(backward[0].join_kind, JoinKind::Left);
    }

    #[test]
    fn test_relationship_registers_bare_nodes() {
        let g = graph();
        assert!(g.contains_table("Booking"));
        assert!(g.columns("Booking").is_empty());
        assert_eq!(g.tables(), &["Counterparty", "Trade", "Booking"]);
        assert_eq!(g.edges_between("Trade", "Booking")[0].context, DEFAULT_CONTEXT);
    }

    #[test]
    fn test_mismatched_join_key_is_rejected() {
        let mut b = GraphBuilder::new();
        let err = b
            .add_relationship("A", "B", "x+y", "x", JoinKind::Inner, None, None)
            .unwrap_err();
        match err {
            Text2SqlError::MalformedJoinKey { table1, table2, reason, .. } => {
                assert_eq!(table1, "A");
                assert_eq!(table2, "B");
                assert!(reason.contains("2 source"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(b.build().edge_count(), 0);
    }

    #[test]
    fn test_shortest_path_through_intermediate() {
        let g = graph();
        assert_eq!(
            g.shortest_connecting_path("Counterparty", "Booking"),
            Some(vec!["Counterparty".to_string(), "Trade".to_string(), "Booking".to_string()])
        );
        assert_eq!(g.shortest_connecting_path("Booking", "Nowhere"), None);
        assert_eq!(g.shortest_connecting_path("Trade", "Trade"), Some(vec!["Trade".to_string()]));
    }

    #[test]
    fn test_degree_counts_every_edge_endpoint() {
        let g = graph();
        assert_eq!(g.degree("Trade"), 3);
        assert_eq!(g.degree("Counterparty"), 2);
        assert_eq!(g.degree("Unknown"), 0);
    }
}
