//! Schema catalog and seed metadata.
//!
//! The catalog holds, per table, the ordered column descriptors shown to the
//! LLM. Seed metadata is the already-structured form of the workbook the
//! business maintains: a table → columns mapping plus the join definitions.

use crate::error::{Result, Text2SqlError};
use crate::graph::{GraphBuilder, JoinKind, RelationshipGraph};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Example values are free-form in the source workbook, numbers included.
    #[serde(default, deserialize_with = "example_value")]
    pub example: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            example: None,
        }
    }
}

fn example_value<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

/// Ordered table → columns catalog.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableSchema>,
    index: HashMap<String, usize>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. Re-registering a name replaces its columns in place.
    pub fn add_table(&mut self, name: impl Into<String>, columns: Vec<Column>) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&idx) => self.tables[idx].columns = columns,
            None => {
                self.index.insert(name.clone(), self.tables.len());
                self.tables.push(TableSchema { name, columns });
            }
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.index.get(name).map(|&idx| &self.tables[idx])
    }

    /// Columns of `name`, empty for tables the catalog has never seen.
    pub fn columns(&self, name: &str) -> &[Column] {
        self.table(name).map(|t| t.columns.as_slice()).unwrap_or(&[])
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Schema subset for the given tables, in the order given.
    pub fn schemas_for(&self, tables: &[String]) -> TableSchemas {
        TableSchemas(
            tables
                .iter()
                .map(|t| (t.clone(), self.columns(t).to_vec()))
                .collect(),
        )
    }
}

/// Table → columns listing that serializes as a JSON object while keeping
/// table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchemas(pub Vec<(String, Vec<Column>)>);

impl TableSchemas {
    pub fn get(&self, table: &str) -> Option<&[Column]> {
        self.0
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, cols)| cols.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TableSchemas {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, columns) in &self.0 {
            map.serialize_entry(name, columns)?;
        }
        map.end()
    }
}

/// One join definition as it appears in the seed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSeed {
    pub table1: String,
    pub table2: String,
    /// `+`-joined column list in `table1`, e.g. `"Entity+Counterparty ID"`.
    pub join_key_1: String,
    pub join_key_2: String,
    #[serde(default)]
    pub join_type: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Seed metadata: tables (in file order) and relationships.
#[derive(Debug, Clone, Default)]
pub struct SchemaSeed {
    pub tables: Vec<TableSchema>,
    pub relationships: Vec<RelationshipSeed>,
}

#[derive(Deserialize)]
struct RawSeed {
    tables: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    relationships: Vec<RelationshipSeed>,
}

impl SchemaSeed {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Text2SqlError::Metadata(format!("Failed to read {}: {}", path.display(), e)))?;
        let seed = Self::from_json(&content)
            .map_err(|e| Text2SqlError::Metadata(format!("Failed to parse {}: {}", path.display(), e)))?;
        info!(
            "Loaded schema seed from {}: {} tables, {} relationships",
            path.display(),
            seed.tables.len(),
            seed.relationships.len()
        );
        Ok(seed)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawSeed = serde_json::from_str(content)?;
        let mut tables = Vec::with_capacity(raw.tables.len());
        for (name, value) in raw.tables {
            let columns: Vec<Column> = serde_json::from_value(value).map_err(|e| {
                Text2SqlError::Metadata(format!("Invalid column list for table '{}': {}", name, e))
            })?;
            tables.push(TableSchema { name, columns });
        }
        Ok(Self {
            tables,
            relationships: raw.relationships,
        })
    }

    /// Builds and freezes the relationship graph. Tables are registered
    /// first, in file order, then every relationship; the first malformed
    /// join key aborts the build.
    pub fn into_graph(self) -> Result<RelationshipGraph> {
        let mut builder = GraphBuilder::new();
        for table in self.tables {
            builder.add_table(table.name, table.columns);
        }
        for rel in self.relationships {
            let join_kind = match rel.join_type.as_deref() {
                Some(raw) if !raw.trim().is_empty() => raw.parse::<JoinKind>()?,
                _ => JoinKind::Inner,
            };
            builder.add_relationship(
                &rel.table1,
                &rel.table2,
                &rel.join_key_1,
                &rel.join_key_2,
                join_kind,
                rel.context.as_deref(),
                rel.description.as_deref(),
            )?;
        }
        Ok(builder.build())
    }
}
