//! Text-to-SQL pipeline
//!
//! Three sequential stages per question:
//! 1. **IdentifyTables** - the LLM picks tables and an optional join context,
//! 2. **ResolveJoins** - the join resolver completes the table set and picks
//!    join conditions (deterministic, no LLM),
//! 3. **GenerateSQL** - the LLM writes SQL from the resolved plan.
//!
//! A failure in any stage aborts the request; nothing is retried here.

pub mod prompts;
pub mod response;

use crate::compiler::{JoinPlan, JoinResolver};
use crate::error::{Result, Text2SqlError};
use crate::graph::RelationshipGraph;
use crate::llm::LlmProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Stage 1 output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIdentification {
    pub tables: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Bound on each of the two LLM calls.
    pub llm_timeout: Duration,
    /// Columns shown per table in the identification prompt.
    pub preview_columns: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(60),
            preview_columns: 15,
        }
    }
}

/// Everything one run produced, stage by stage.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub query_id: String,
    pub user_query: String,
    pub table_info: TableIdentification,
    pub join_info: JoinPlan,
    pub sql_query: String,
}

pub struct QueryPlanPipeline {
    resolver: JoinResolver,
    llm: Arc<dyn LlmProvider>,
    options: PipelineOptions,
}

impl QueryPlanPipeline {
    pub fn new(graph: Arc<RelationshipGraph>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            resolver: JoinResolver::new(graph),
            llm,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    async fn call_llm(&self, stage: &str, prompt: &str, system_instruction: &str) -> Result<String> {
        match tokio::time::timeout(self.options.llm_timeout, self.llm.call(prompt, Some(system_instruction))).await {
            Ok(result) => result,
            Err(_) => Err(Text2SqlError::LlmCall(format!(
                "{} call timed out after {}s",
                stage,
                self.options.llm_timeout.as_secs_f64()
            ))),
        }
    }

    /// Stage 1: ask the LLM which tables (and which join context) the
    /// question needs.
    pub async fn identify_tables(&self, user_query: &str) -> Result<TableIdentification> {
        let prompt =
            prompts::table_identification_prompt(self.resolver.graph(), user_query, self.options.preview_columns);
        let raw = self
            .call_llm("Table identification", &prompt, prompts::TABLE_IDENTIFICATION_SYSTEM)
            .await?;
        let identification: TableIdentification = response::parse_json_response(&raw)?;
        info!(
            "Identified tables {:?} (context: {:?})",
            identification.tables, identification.context
        );
        Ok(identification)
    }

    /// Stage 2: complete the table set and resolve join conditions.
    pub fn resolve_joins(&self, identification: &TableIdentification) -> JoinPlan {
        let plan = self
            .resolver
            .plan(&identification.tables, identification.context.as_deref());
        info!(
            "Resolved {} join(s) across {} table(s)",
            plan.joins.len(),
            plan.all_tables_needed.len()
        );
        plan
    }

    /// Stage 3: have the LLM write SQL for the plan. The text comes back
    /// verbatim apart from code-fence stripping.
    pub async fn generate_sql(&self, user_query: &str, plan: &JoinPlan) -> Result<String> {
        let prompt = prompts::sql_generation_prompt(user_query, plan);
        let raw = self
            .call_llm("SQL generation", &prompt, prompts::SQL_GENERATION_SYSTEM)
            .await?;
        Ok(response::strip_code_fences(&raw))
    }

    /// Runs all three stages.
    pub async fn process(&self, user_query: &str) -> Result<PipelineResult> {
        let query_id = Uuid::new_v4().to_string();
        let span = info_span!("text2sql", query_id = %query_id);

        async move {
            info!("Processing query: {}", user_query);
            let table_info = self.identify_tables(user_query).await?;
            let join_info = self.resolve_joins(&table_info);
            let sql_query = self.generate_sql(user_query, &join_info).await?;
            info!("SQL generated ({} chars)", sql_query.len());

            Ok::<_, Text2SqlError>(PipelineResult {
                query_id,
                user_query: user_query.to_string(),
                table_info,
                join_info,
                sql_query,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identification_defaults() {
        let parsed: TableIdentification = serde_json::from_str(r#"{"tables": ["Trade"]}"#).unwrap();
        assert_eq!(parsed.context, None);
        assert_eq!(parsed.reasoning, "");

        let parsed: TableIdentification =
            serde_json::from_str(r#"{"tables": [], "context": null, "reasoning": "x"}"#).unwrap();
        assert_eq!(parsed.context, None);
    }

    #[test]
    fn test_identification_requires_tables() {
        let err = response::parse_json_response::<TableIdentification>(r#"{"context": "Country"}"#).unwrap_err();
        assert!(matches!(err, Text2SqlError::ResponseParse { .. }));
    }
}
