use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::legal_prompts::SCHEMA_DESCRIPTION;
use crate::llm::models::{FieldKind, FieldSpec, OutputSchema, StructuredRequest};
use crate::llm::LlmManager;
use crate::query::error::QueryError;
use crate::sql::{normalize_identifiers, validate_query, Verdict};

#[derive(Debug, Deserialize)]
struct GeneratedQuery {
    query: String,
}

/// Turns a question into a normalized, validated SELECT.
pub struct QueryGenerator {
    llm: Arc<LlmManager>,
}

impl QueryGenerator {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }

    pub fn system_prompt() -> String {
        format!(
            r#"You are a PostgreSQL expert. Your job is to help the user write a SQL query to retrieve the data they need.
The table schema is as follows:

{}

Rules:
- Only generate SELECT queries. Never modify data or schema.
- The columns "createdAt" and "systemMessage" are case sensitive and must always be wrapped in double quotes.
- "category" groups prompts by legal area (for example Contracts, Drafting, Research).
- When counting or aggregating, alias the result with a short lowercase name (for example count, total, average_length).
- For prompt length use LENGTH(prompt).
- For time periods use DATE_TRUNC on "createdAt" and return the period as a column.
- Order results in a way that makes the answer easy to read.
- Every query must return data suitable for a table or chart: at least one label column and, where it makes sense, one numeric column.
- Do not add comments or explanations; return only the query."#,
            SCHEMA_DESCRIPTION
        )
    }

    fn request(question: &str) -> StructuredRequest {
        StructuredRequest {
            system: Self::system_prompt(),
            prompt: format!("Generate the query necessary to retrieve the data the user wants: {}", question),
            schema: OutputSchema::new(
                "query",
                vec![FieldSpec::new("query", FieldKind::String).described("A single PostgreSQL SELECT statement")],
            ),
        }
    }

    pub async fn generate(&self, question: &str) -> Result<String, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::generation("empty question"));
        }

        let generated: GeneratedQuery = self
            .llm
            .generate_object(&Self::request(question))
            .await
            .map_err(|e| {
                warn!("Query generation failed: {}", e);
                QueryError::generation(e)
            })?;

        let raw = strip_fences(&generated.query);
        if raw.is_empty() {
            warn!("Model returned an empty query");
            return Err(QueryError::generation("model returned no query"));
        }

        let sql = normalize_identifiers(&raw);
        if let Verdict::Invalid(reason) = validate_query(&sql) {
            warn!("Generated query rejected: {} ({})", reason, sql);
            return Err(QueryError::generation(reason));
        }

        info!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

fn strip_fences(sql: &str) -> String {
    let trimmed = sql.trim();
    let inner = match trimmed.strip_prefix("```") {
        Some(rest) if rest.get(..3).is_some_and(|tag| tag.eq_ignore_ascii_case("sql")) => &rest[3..],
        Some(rest) => rest,
        None => trimmed,
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.replace('`', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedGenerator;
    use serde_json::json;

    fn generator_with(script: &ScriptedGenerator) -> QueryGenerator {
        QueryGenerator::new(script.manager())
    }

    #[tokio::test]
    async fn returns_normalized_query() {
        let script = ScriptedGenerator::new().respond(
            "query",
            json!({ "query": "SELECT name, createdat FROM legalprompt ORDER BY createdAt DESC" }),
        );
        let sql = generator_with(&script).generate("latest prompts").await.unwrap();
        assert_eq!(
            sql,
            r#"SELECT name, "createdAt" FROM legalprompt ORDER BY "createdAt" DESC"#
        );
        assert!(script.prompts()[0].contains("latest prompts"));
    }

    #[tokio::test]
    async fn strips_markdown_fences() {
        let script = ScriptedGenerator::new()
            .respond("query", json!({ "query": "```sql\nSELECT 1\n```" }));
        assert_eq!(generator_with(&script).generate("one").await.unwrap(), "SELECT 1");
    }

    #[tokio::test]
    async fn fence_language_tag_is_case_insensitive() {
        let script = ScriptedGenerator::new()
            .respond("query", json!({ "query": "```SQL\nSELECT name FROM legalprompt\n```" }));
        assert_eq!(
            generator_with(&script).generate("names").await.unwrap(),
            "SELECT name FROM legalprompt"
        );
    }

    #[tokio::test]
    async fn rejected_queries_become_generation_failures() {
        let script = ScriptedGenerator::new()
            .respond("query", json!({ "query": "DELETE FROM legalprompt" }));
        let err = generator_with(&script).generate("remove everything").await.unwrap_err();
        assert!(matches!(err, QueryError::GenerationFailure { .. }));
        assert_eq!(err.to_string(), "Failed to generate query");
    }

    #[tokio::test]
    async fn upstream_errors_become_generation_failures() {
        let script = ScriptedGenerator::new().fail("query", "rate limited");
        let err = generator_with(&script).generate("anything").await.unwrap_err();
        assert!(matches!(err, QueryError::GenerationFailure { .. }));
    }

    #[tokio::test]
    async fn empty_output_is_a_failure() {
        let script = ScriptedGenerator::new().respond("query", json!({ "query": "   " }));
        let err = generator_with(&script).generate("anything").await.unwrap_err();
        assert!(matches!(err, QueryError::GenerationFailure { .. }));
    }

    #[tokio::test]
    async fn blank_question_never_reaches_the_model() {
        let script = ScriptedGenerator::new();
        assert!(generator_with(&script).generate("  ").await.is_err());
        assert_eq!(script.calls(), 0);
    }

    #[test]
    fn system_prompt_embeds_schema() {
        let prompt = QueryGenerator::system_prompt();
        assert!(prompt.contains("legalprompt ("));
        assert!(prompt.contains(r#""systemMessage" TEXT"#));
    }
}
