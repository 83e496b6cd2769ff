//! Prompts for the two LLM stages.

use crate::compiler::JoinPlan;
use crate::graph::RelationshipGraph;
use itertools::Itertools;
use std::fmt::Write as _;

pub const TABLE_IDENTIFICATION_SYSTEM: &str = "You are a database expert. Analyze queries and identify required tables. \
Return only valid JSON without any markdown formatting or additional text.";

pub const SQL_GENERATION_SYSTEM: &str = "You are a SQL expert. Generate accurate, well-formatted SQL queries based on \
provided schema and join information. CRITICAL: You MUST use ALL parts of every join condition provided - never omit \
any condition. Return only the SQL query without any markdown formatting or explanations.";

/// Stage 1: table and context identification.
///
/// Lists every table with at most `preview_columns` columns, the join
/// contexts the graph knows about, and the expected JSON shape.
pub fn table_identification_prompt(graph: &RelationshipGraph, user_query: &str, preview_columns: usize) -> String {
    let mut prompt = String::from("Available tables and their descriptions:\n\n");
    for table in graph.catalog().tables() {
        let _ = writeln!(prompt, "Table: {}", table.name);
        let _ = writeln!(prompt, "Key columns:");
        for col in table.columns.iter().take(preview_columns) {
            let _ = writeln!(prompt, "  - {}: {}", col.name, col.description);
        }
        prompt.push('\n');
    }

    let contexts: Vec<&str> = graph
        .edges()
        .iter()
        .filter(|e| !e.is_default())
        .map(|e| e.context.as_str())
        .unique()
        .collect();

    let _ = write!(
        prompt,
        r#"User Query: "{}"

Based on the query, identify which tables are needed. Follow these guidelines:
1. Include every table whose columns the query filters on, groups by, or returns.
2. If the query combines attributes of several tables, list all of them; connecting tables are added automatically.
3. If the query only concerns attributes of a single table, list only that table.
"#,
        user_query
    );

    if contexts.is_empty() {
        prompt.push_str("\nNo join contexts are defined, so set context to null.\n");
    } else {
        prompt.push_str("\nAlso identify if there's a specific context mentioned. Known join contexts:\n");
        for context in &contexts {
            let _ = writeln!(prompt, "- {}", context);
        }
        prompt.push_str(
            "If the query matches one of them (e.g. it says \"by country\" and a context mentions country level data), \
set context to the single distinguishing keyword (e.g. \"Country\"). Otherwise, set context to null.\n",
        );
    }

    prompt.push_str(
        r#"
IMPORTANT: Use the EXACT table names as shown above, not descriptive names.

Return ONLY a JSON object with this exact structure (no additional text, no markdown formatting):
{
    "tables": ["TableA", "TableB"],
    "context": "Country",
    "reasoning": "brief explanation"
}

The table names in the "tables" array must match exactly the table names shown in the schema above."#,
    );
    prompt
}

/// Stage 3: SQL generation from a resolved join plan.
pub fn sql_generation_prompt(user_query: &str, plan: &JoinPlan) -> String {
    let mut prompt = format!(
        "Generate a SQL query for the following request.\n\nUSER QUERY: \"{}\"\n\nTABLES TO USE: {}\n\nJOIN RELATIONSHIPS:\n",
        user_query,
        plan.all_tables_needed.join(", ")
    );

    for join in &plan.joins {
        let _ = write!(
            prompt,
            "\n{} {} {}\nON {}",
            join.from_table,
            join.join_kind.as_sql(),
            join.to_table,
            join.join_condition
        );
        if join.is_composite() {
            let _ = write!(
                prompt,
                "\n*** THIS IS A COMPOSITE JOIN - YOU MUST USE ALL CONDITIONS: {} ***",
                join.join_condition
            );
        }
        if !join.description.is_empty() {
            let _ = write!(prompt, "\n({})", join.description);
        }
        prompt.push('\n');
    }

    prompt.push_str("\n\nTABLE SCHEMAS (with all columns and descriptions):\n");
    for table in &plan.all_tables_needed {
        let _ = writeln!(prompt, "\n{}:", table);
        for col in plan.schemas.get(table).unwrap_or(&[]) {
            let _ = writeln!(prompt, "  - {}: {}", col.name, col.description);
        }
    }

    prompt.push_str(
        r#"
INSTRUCTIONS FOR SQL GENERATION:
1. JOIN CONDITIONS - ABSOLUTELY CRITICAL:
   - Copy the EXACT join condition from above into your ON clause
   - If you see " AND " in the join condition, that means MULTIPLE conditions - use ALL of them
   - DO NOT simplify or omit any part of the join condition
   - DO NOT use only one part of a multi-part join condition
2. SELECT relevant columns based on the user query
3. Include appropriate WHERE clauses if needed
4. Use table aliases for readability
5. Quote column names that contain spaces
6. Format properly with indentation
"#,
    );

    if let Some(example) = composite_join_example(plan) {
        prompt.push('\n');
        prompt.push_str(&example);
    }

    prompt.push_str(
        r#"
Return ONLY the SQL query without any explanations, markdown formatting, or code blocks."#,
    );
    prompt
}

/// Worked ON clause for the plan's first composite join, followed by the
/// single-equality versions that drop the other columns.
fn composite_join_example(plan: &JoinPlan) -> Option<String> {
    let join = plan.joins.iter().find(|j| j.is_composite())?;
    let from_alias = table_alias(&join.from_table, None);
    let to_alias = table_alias(&join.to_table, Some(&from_alias));
    let equality = |(src, tgt): &(String, String)| {
        format!("{}.{} = {}.{}", from_alias, quote_ident(src), to_alias, quote_ident(tgt))
    };

    let mut example = format!(
        "EXAMPLE OF CORRECT JOIN USAGE:\nIf the join condition provided is:\n\"{}\"\n\nYour ON clause MUST be:\nON {}\n\n",
        join.join_condition,
        join.column_pairs.iter().map(&equality).join(" AND ")
    );
    for (i, pair) in join.column_pairs.iter().enumerate() {
        let missing = join
            .column_pairs
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, (src, _))| src.as_str())
            .join(", ");
        let _ = writeln!(example, "NOT just: ON {}  (WRONG - missing {})", equality(pair), missing);
    }
    Some(example)
}

/// Lowercase initial of the table, suffixed with `2` when it collides.
fn table_alias(table: &str, taken: Option<&str>) -> String {
    let alias = table
        .chars()
        .next()
        .map(|c| c.to_lowercase().to_string())
        .unwrap_or_else(|| "t".to_string());
    if taken == Some(alias.as_str()) {
        format!("{}2", alias)
    } else {
        alias
    }
}

fn quote_ident(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("\"{}\"", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::JoinResolver;
    use crate::graph::{GraphBuilder, JoinKind};
    use crate::metadata::Column;
    use std::sync::Arc;

    fn graph() -> Arc<RelationshipGraph> {
        let mut b = GraphBuilder::new();
        let wide: Vec<Column> = (0..20).map(|i| Column::new(format!("col{i}"), format!("column {i}"))).collect();
        b.add_table("Counterparty", wide);
        b.add_table("Concentration", vec![Column::new("Concentration Value", "Bucket value")]);
        b.add_relationship(
            "Counterparty",
            "Concentration",
            "Entity+Counterparty Country",
            "Entity+Concentration Value",
            JoinKind::Inner,
            Some("For country level data"),
            None,
        )
        .unwrap();
        Arc::new(b.build())
    }

    #[test]
    fn test_identification_prompt_bounds_column_preview() {
        let prompt = table_identification_prompt(&graph(), "concentration by country", 15);
        assert!(prompt.contains("Table: Counterparty"));
        assert!(prompt.contains("  - col14: column 14"));
        assert!(!prompt.contains("col15"));
        assert!(prompt.contains("- For country level data"));
        assert!(prompt.contains("User Query: \"concentration by country\""));
    }

    #[test]
    fn test_sql_prompt_flags_composite_joins() {
        let graph = graph();
        let plan = JoinResolver::new(graph).plan(
            &["Counterparty".to_string(), "Concentration".to_string()],
            Some("country"),
        );
        let prompt = sql_generation_prompt("concentration by country", &plan);
        assert!(prompt.contains("Counterparty INNER JOIN Concentration"));
        assert!(prompt.contains(
            "*** THIS IS A COMPOSITE JOIN - YOU MUST USE ALL CONDITIONS: Counterparty.Entity = Concentration.Entity AND Counterparty.Counterparty Country = Concentration.Concentration Value ***"
        ));
        assert!(prompt.contains("(Join Counterparty with Concentration)"));
        assert!(prompt.contains("  - Concentration Value: Bucket value"));

        assert!(prompt.contains("EXAMPLE OF CORRECT JOIN USAGE:"));
        assert!(prompt.contains(
            "ON c.Entity = c2.Entity AND c.\"Counterparty Country\" = c2.\"Concentration Value\"\n"
        ));
        assert!(prompt.contains("NOT just: ON c.Entity = c2.Entity  (WRONG - missing Counterparty Country)"));
        assert!(prompt.contains(
            "NOT just: ON c.\"Counterparty Country\" = c2.\"Concentration Value\"  (WRONG - missing Entity)"
        ));
    }

    #[test]
    fn test_sql_prompt_renders_outer_join_keyword() {
        let mut b = GraphBuilder::new();
        b.add_relationship("Trade", "Booking", "Book", "Book", JoinKind::Full, None, None)
            .unwrap();
        let plan = JoinResolver::new(Arc::new(b.build())).plan(&["Trade".to_string(), "Booking".to_string()], None);
        let prompt = sql_generation_prompt("trades by book", &plan);
        assert!(prompt.contains("Trade FULL OUTER JOIN Booking\nON Trade.Book = Booking.Book"));
        assert!(!prompt.contains("COMPOSITE JOIN"));
        assert!(!prompt.contains("EXAMPLE OF CORRECT JOIN USAGE"));
    }

    #[test]
    fn test_and_inside_column_name_is_not_flagged_composite() {
        let mut b = GraphBuilder::new();
        b.add_relationship("Ledger", "Pnl", "Profit AND Loss", "Profit AND Loss", JoinKind::Inner, None, None)
            .unwrap();
        let plan = JoinResolver::new(Arc::new(b.build())).plan(&["Ledger".to_string(), "Pnl".to_string()], None);
        let prompt = sql_generation_prompt("pnl by ledger", &plan);
        assert!(prompt.contains("ON Ledger.Profit AND Loss = Pnl.Profit AND Loss"));
        assert!(!prompt.contains("THIS IS A COMPOSITE JOIN"));
        assert!(!prompt.contains("EXAMPLE OF CORRECT JOIN USAGE"));
    }
}
