//! Join Resolver
//!
//! Turns the tables an LLM names into a complete join plan:
//! 1. pull in the intermediate tables needed to connect them,
//! 2. pick, per table pair, the join definitions that fit the requested
//!    context,
//! 3. render each chosen join as an explicit `a.x = b.y AND ...` condition.
//!
//! Nothing here can fail. Unknown tables pass through untouched and
//! disconnected pairs simply produce no join.

use crate::graph::{JoinEdge, JoinKind, RelationshipGraph};
use crate::metadata::TableSchemas;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// One join chosen for the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedJoin {
    pub from_table: String,
    pub to_table: String,
    pub join_condition: String,
    #[serde(rename = "join_type")]
    pub join_kind: JoinKind,
    /// Context label of the edge itself, not the requested context.
    pub context: String,
    pub description: String,
    /// `(source, target)` column pairs behind `join_condition`, in declared
    /// order.
    #[serde(skip)]
    pub column_pairs: Vec<(String, String)>,
}

impl ResolvedJoin {
    fn from_edge(edge: &JoinEdge) -> Self {
        Self {
            from_table: edge.from_table.clone(),
            to_table: edge.to_table.clone(),
            join_condition: edge.render_condition(),
            join_kind: edge.join_kind,
            context: edge.context.clone(),
            description: edge.description.clone(),
            column_pairs: edge
                .column_pairs()
                .map(|(src, tgt)| (src.to_string(), tgt.to_string()))
                .collect(),
        }
    }

    /// Number of column equalities in the condition.
    pub fn condition_parts(&self) -> usize {
        self.column_pairs.len()
    }

    pub fn is_composite(&self) -> bool {
        self.condition_parts() > 1
    }
}

/// A table pair that has join definitions, none of which survived context
/// filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsatisfiedPair {
    pub table1: String,
    pub table2: String,
    pub requested_context: String,
    pub available_contexts: Vec<String>,
}

/// Everything the SQL generation step needs for one query.
#[derive(Debug, Clone, Serialize)]
pub struct JoinPlan {
    pub requested_tables: Vec<String>,
    pub all_tables_needed: Vec<String>,
    pub joins: Vec<ResolvedJoin>,
    pub schemas: TableSchemas,
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unsatisfied_pairs: Vec<UnsatisfiedPair>,
}

/// Join resolver over a frozen relationship graph.
#[derive(Debug, Clone)]
pub struct JoinResolver {
    graph: Arc<RelationshipGraph>,
}

impl JoinResolver {
    pub fn new(graph: Arc<RelationshipGraph>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    /// Requested tables plus every table on one shortest path between each
    /// requested pair.
    ///
    /// Requested tables come first in request order (duplicates dropped),
    /// followed by intermediate tables in discovery order. When several
    /// shortest paths exist, the one chosen is whatever
    /// [`RelationshipGraph::shortest_connecting_path`] returns (the
    /// lexicographically smallest table sequence); a different but equally
    /// short route would be just as valid.
    pub fn tables_needed_for(&self, requested: &[String]) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut tables: Vec<String> = Vec::new();
        for table in requested {
            if seen.insert(table.as_str()) {
                tables.push(table.clone());
            }
        }

        let mut intermediates: Vec<String> = Vec::new();
        for (a, b) in tables.iter().tuple_combinations() {
            match self.graph.shortest_connecting_path(a, b) {
                Some(path) => {
                    for table in path {
                        if !seen.contains(table.as_str()) && !intermediates.contains(&table) {
                            debug!("Adding intermediate table {} to connect {} and {}", table, a, b);
                            intermediates.push(table);
                        }
                    }
                }
                None => debug!("No path between {} and {}", a, b),
            }
        }

        tables.extend(intermediates);
        tables
    }

    /// Join records for every table pair, filtered by `context`.
    ///
    /// Without a context every edge between a pair is returned. With one, an
    /// edge is kept when its label contains the context (case-insensitive);
    /// an edge labelled `"default"` is kept only when no edge of that same
    /// pair matches. Each pair is judged on its own.
    pub fn resolve_joins(&self, tables: &[String], context: Option<&str>) -> Vec<ResolvedJoin> {
        self.resolve(tables, context).0
    }

    fn resolve(&self, tables: &[String], context: Option<&str>) -> (Vec<ResolvedJoin>, Vec<UnsatisfiedPair>) {
        let context = context.map(str::trim).filter(|c| !c.is_empty());
        let context_lower = context.map(str::to_lowercase);

        let mut joins = Vec::new();
        let mut unsatisfied = Vec::new();

        for (a, b) in tables.iter().tuple_combinations() {
            let edges = self.graph.edges_between(a, b);
            if edges.is_empty() {
                continue;
            }

            let selected: Vec<&JoinEdge> = match context_lower.as_deref() {
                None => edges.clone(),
                Some(ctx) => select_for_context(&edges, ctx),
            };

            if selected.is_empty() {
                let requested_context = context.unwrap_or_default().to_string();
                warn!(
                    "Context '{}' matched none of the {} join(s) between {} and {}; no join emitted",
                    requested_context,
                    edges.len(),
                    a,
                    b
                );
                unsatisfied.push(UnsatisfiedPair {
                    table1: a.clone(),
                    table2: b.clone(),
                    requested_context,
                    available_contexts: edges.iter().map(|e| e.context.clone()).unique().collect(),
                });
                continue;
            }

            joins.extend(selected.into_iter().map(ResolvedJoin::from_edge));
        }

        (joins, unsatisfied)
    }

    /// Full join plan for the requested tables.
    pub fn plan(&self, requested: &[String], context: Option<&str>) -> JoinPlan {
        let all_tables_needed = self.tables_needed_for(requested);
        let (joins, unsatisfied_pairs) = self.resolve(&all_tables_needed, context);
        let schemas = self.graph.catalog().schemas_for(&all_tables_needed);

        debug!(
            "Join plan: {} table(s) needed, {} join(s)",
            all_tables_needed.len(),
            joins.len()
        );

        JoinPlan {
            requested_tables: requested.to_vec(),
            all_tables_needed,
            joins,
            schemas,
            context: context.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
            unsatisfied_pairs,
        }
    }
}

/// Context-matching edges of one pair, or its default edges when nothing
/// matches.
fn select_for_context<'a>(edges: &[&'a JoinEdge], context_lower: &str) -> Vec<&'a JoinEdge> {
    let has_match = edges.iter().any(|e| e.matches_context(context_lower));
    edges
        .iter()
        .copied()
        .filter(|e| {
            if e.matches_context(context_lower) {
                true
            } else {
                e.is_default() && !has_match
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn resolver(build: impl FnOnce(&mut GraphBuilder)) -> JoinResolver {
        let mut builder = GraphBuilder::new();
        build(&mut builder);
        JoinResolver::new(Arc::new(builder.build()))
    }

    #[test]
    fn test_tables_needed_dedupes_and_keeps_order() {
        let r = resolver(|b| {
            b.add_relationship("A", "M", "id", "a_id", JoinKind::Inner, None, None).unwrap();
            b.add_relationship("M", "B", "b_id", "id", JoinKind::Inner, None, None).unwrap();
        });
        assert_eq!(r.tables_needed_for(&tables(&["B", "A", "B"])), tables(&["B", "A", "M"]));
    }

    #[test]
    fn test_tables_needed_passes_unknown_tables_through() {
        let r = resolver(|b| {
            b.add_relationship("A", "B", "id", "id", JoinKind::Inner, None, None).unwrap();
        });
        assert_eq!(r.tables_needed_for(&tables(&["A", "Ghost"])), tables(&["A", "Ghost"]));
    }

    #[test]
    fn test_tie_break_picks_smallest_intermediate() {
        let r = resolver(|b| {
            b.add_relationship("A", "Y", "k", "k", JoinKind::Inner, None, None).unwrap();
            b.add_relationship("Y", "B", "k", "k", JoinKind::Inner, None, None).unwrap();
            b.add_relationship("A", "X", "k", "k", JoinKind::Inner, None, None).unwrap();
            b.add_relationship("X", "B", "k", "k", JoinKind::Inner, None, None).unwrap();
        });
        assert_eq!(r.tables_needed_for(&tables(&["A", "B"])), tables(&["A", "B", "X"]));
    }

    #[test]
    fn test_whitespace_context_means_no_context() {
        let r = resolver(|b| {
            b.add_relationship("A", "B", "x", "x", JoinKind::Inner, Some("For sector level data"), None).unwrap();
            b.add_relationship("A", "B", "y", "y", JoinKind::Inner, None, None).unwrap();
        });
        assert_eq!(r.resolve_joins(&tables(&["A", "B"]), Some("  ")).len(), 2);

        let plan = r.plan(&tables(&["A", "B"]), Some("  "));
        assert_eq!(plan.context, None);
        assert_eq!(r.plan(&tables(&["A", "B"]), Some(" Sector ")).context.as_deref(), Some("Sector"));
    }

    #[test]
    fn test_unsatisfied_context_is_reported() {
        let r = resolver(|b| {
            b.add_relationship("A", "B", "x", "x", JoinKind::Inner, Some("For sector level data"), None).unwrap();
        });
        let plan = r.plan(&tables(&["A", "B"]), Some("Country"));
        assert!(plan.joins.is_empty());
        assert_eq!(plan.unsatisfied_pairs.len(), 1);
        assert_eq!(plan.unsatisfied_pairs[0].available_contexts, vec!["For sector level data".to_string()]);
    }

    #[test]
    fn test_condition_parts() {
        let r = resolver(|b| {
            b.add_relationship("A", "B", "x+y+z", "x+y+z", JoinKind::Left, None, None).unwrap();
        });
        let joins = r.resolve_joins(&tables(&["A", "B"]), None);
        assert_eq!(joins[0].condition_parts(), 3);
        assert!(joins[0].is_composite());
        assert_eq!(joins[0].join_kind, JoinKind::Left);
    }

    #[test]
    fn test_and_inside_column_name_is_one_part() {
        let r = resolver(|b| {
            b.add_relationship("Ledger", "Pnl", "Profit AND Loss", "Profit AND Loss", JoinKind::Inner, None, None)
                .unwrap();
        });
        let joins = r.resolve_joins(&tables(&["Ledger", "Pnl"]), None);
        assert_eq!(joins[0].join_condition, "Ledger.Profit AND Loss = Pnl.Profit AND Loss");
        assert_eq!(joins[0].condition_parts(), 1);
        assert!(!joins[0].is_composite());
    }
}
