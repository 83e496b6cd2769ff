//! Natural-language to SQL over a multi-table schema.
//!
//! The schema's join definitions live in a [`graph::RelationshipGraph`];
//! [`compiler::JoinResolver`] completes and resolves joins for the tables an
//! LLM picks, and [`pipeline::QueryPlanPipeline`] drives the LLM round trips.

pub mod compiler;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod metadata;
pub mod pipeline;

pub use compiler::{JoinPlan, JoinResolver, ResolvedJoin};
pub use error::{Result, Text2SqlError};
pub use graph::{GraphBuilder, JoinEdge, JoinKind, RelationshipGraph};
pub use llm::{LlmClient, LlmProvider};
pub use metadata::{Column, SchemaCatalog, SchemaSeed};
pub use pipeline::{PipelineOptions, PipelineResult, QueryPlanPipeline, TableIdentification};
