//! Join edges: one directed join definition between two tables.

use crate::error::{Result, Text2SqlError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Context label for edges that apply when nothing more specific does.
pub const DEFAULT_CONTEXT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
        }
    }
}

impl Default for JoinKind {
    fn default() -> Self {
        JoinKind::Inner
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinKind {
    type Err = Text2SqlError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        let normalized = normalized
            .trim_end_matches(" JOIN")
            .trim_end_matches(" OUTER")
            .trim();
        match normalized {
            "INNER" => Ok(JoinKind::Inner),
            "LEFT" => Ok(JoinKind::Left),
            "RIGHT" => Ok(JoinKind::Right),
            "FULL" => Ok(JoinKind::Full),
            _ => Err(Text2SqlError::Metadata(format!("Unknown join type: '{}'", s))),
        }
    }
}

/// Directed join definition `from_table -> to_table`.
///
/// `source_columns[i]` pairs with `target_columns[i]`; both lists always have
/// the same, non-zero length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub from_table: String,
    pub to_table: String,
    pub source_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub join_kind: JoinKind,
    pub context: String,
    pub description: String,
}

impl JoinEdge {
    pub fn is_default(&self) -> bool {
        self.context == DEFAULT_CONTEXT
    }

    /// Case-insensitive substring match; `context_lower` must already be
    /// lowercased.
    pub fn matches_context(&self, context_lower: &str) -> bool {
        self.context.to_lowercase().contains(context_lower)
    }

    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.source_columns
            .iter()
            .zip(self.target_columns.iter())
            .map(|(s, t)| (s.as_str(), t.as_str()))
    }

    pub fn is_composite(&self) -> bool {
        self.source_columns.len() > 1
    }

    /// `"{from}.{src} = {to}.{tgt}"` per column pair, joined by `" AND "`.
    pub fn render_condition(&self) -> String {
        self.column_pairs()
            .map(|(src, tgt)| format!("{}.{} = {}.{}", self.from_table, src, self.to_table, tgt))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Splits a `+`-joined key into trimmed column names.
pub fn parse_join_key(key: &str) -> std::result::Result<Vec<String>, String> {
    if key.trim().is_empty() {
        return Err("join key is empty".to_string());
    }
    let columns: Vec<String> = key.split('+').map(|c| c.trim().to_string()).collect();
    if columns.iter().any(|c| c.is_empty()) {
        return Err(format!("join key '{}' has an empty column segment", key));
    }
    Ok(columns)
}
