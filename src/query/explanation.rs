use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::llm::models::{FieldKind, FieldSpec, OutputSchema, StructuredRequest};
use crate::llm::LlmManager;
use crate::query::error::QueryError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryExplanation {
    pub section: String,
    pub explanation: String,
}

#[derive(Debug, Deserialize)]
struct RawExplanation {
    section: String,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplanationList {
    explanations: Vec<RawExplanation>,
}

pub struct ExplanationGenerator {
    llm: Arc<LlmManager>,
}

impl ExplanationGenerator {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }

    fn request(question: &str, sql: &str) -> StructuredRequest {
        StructuredRequest {
            system: r#"You are a SQL expert. Your job is to explain to the user the SQL query you wrote to retrieve the data they asked for.
Break the query down into unique sections (for example SELECT, FROM, WHERE, GROUP BY, ORDER BY, LIMIT) and give an explanation of each section.
Each section must be copied verbatim from the query, sections must not overlap, and they must appear in the same order as in the query.
If a section needs no explanation, include it with an empty explanation."#
                .to_string(),
            prompt: format!(
                "Explain the SQL query you generated to retrieve the data the user wanted. Assume the user is not an expert in SQL.\n\
                 User question: {}\n\nGenerated SQL query:\n{}",
                question, sql
            ),
            schema: OutputSchema::new(
                "query_explanation",
                vec![FieldSpec::new(
                    "explanations",
                    FieldKind::ObjectList(vec![
                        FieldSpec::new("section", FieldKind::String),
                        FieldSpec::new("explanation", FieldKind::String),
                    ]),
                )],
            ),
        }
    }

    pub async fn explain(&self, question: &str, sql: &str) -> Result<Vec<QueryExplanation>, QueryError> {
        let list: ExplanationList = self
            .llm
            .generate_object(&Self::request(question, sql))
            .await
            .map_err(|e| {
                warn!("Explanation failed: {}", e);
                QueryError::ExplanationFailure { cause: e.to_string() }
            })?;

        let explanations = list
            .explanations
            .into_iter()
            .map(|raw| QueryExplanation {
                section: raw.section,
                explanation: raw.explanation.unwrap_or_default(),
            })
            .collect();

        Ok(order_by_position(explanations, sql))
    }
}

/// Stable sort by where each section first appears in `sql`; sections that
/// cannot be found keep their relative order at the end.
fn order_by_position(mut explanations: Vec<QueryExplanation>, sql: &str) -> Vec<QueryExplanation> {
    let haystack = sql.to_lowercase();
    explanations.sort_by_key(|e| {
        let needle = e.section.trim().to_lowercase();
        if needle.is_empty() {
            usize::MAX
        } else {
            haystack.find(&needle).unwrap_or(usize::MAX)
        }
    });
    explanations
}
