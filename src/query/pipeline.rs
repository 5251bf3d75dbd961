use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::ChartSettings;
use crate::db::{QueryStore, Row};
use crate::llm::LlmManager;
use crate::query::chart::{ChartConfig, ChartConfigGenerator};
use crate::query::error::QueryError;
use crate::query::executor::{QueryExecutor, QueryResult};
use crate::query::explanation::{ExplanationGenerator, QueryExplanation};
use crate::query::generator::QueryGenerator;
use crate::sql::normalize_identifiers;

/// Everything produced for one question. A chart failure is carried as a
/// message next to the rows instead of failing the answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub sql: String,
    pub result: QueryResult,
    pub chart: Option<ChartConfig>,
    pub chart_error: Option<String>,
    pub execution_time_ms: u64,
}

/// Wires the generators and executor together around injected clients.
pub struct QueryPipeline {
    generator: QueryGenerator,
    executor: QueryExecutor,
    charts: ChartConfigGenerator,
    explainer: ExplanationGenerator,
}

impl QueryPipeline {
    pub fn new(
        llm: Arc<LlmManager>,
        store: Arc<dyn QueryStore>,
        query_timeout: Duration,
        chart: &ChartSettings,
    ) -> Self {
        Self {
            generator: QueryGenerator::new(Arc::clone(&llm)),
            executor: QueryExecutor::new(store, query_timeout),
            charts: ChartConfigGenerator::new(Arc::clone(&llm), chart.palette.clone(), chart.sample_rows),
            explainer: ExplanationGenerator::new(llm),
        }
    }

    pub async fn generate_sql(&self, question: &str) -> Result<String, QueryError> {
        self.generator.generate(question).await
    }

    /// Runs caller-supplied SQL through the same normalization and checks as
    /// generated SQL.
    pub async fn run_sql(&self, sql: &str) -> Result<(String, QueryResult, u64), QueryError> {
        let sql = normalize_identifiers(sql.trim());
        let start = Instant::now();
        let result = self.executor.execute(&sql).await?;
        Ok((sql, result, start.elapsed().as_millis() as u64))
    }

    pub async fn chart(&self, rows: &[Row], question: &str) -> Result<ChartConfig, QueryError> {
        self.charts.generate(rows, question).await
    }

    pub async fn explain(&self, question: &str, sql: &str) -> Result<Vec<QueryExplanation>, QueryError> {
        self.explainer.explain(question, sql).await
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, QueryError> {
        let sql = self.generator.generate(question).await?;

        let start = Instant::now();
        let result = self.executor.execute(&sql).await?;
        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!("Answered {:?} with {} rows in {}ms", question, result.rows.len(), execution_time_ms);

        let (chart, chart_error) = match self.charts.generate(&result.rows, question).await {
            Ok(chart) => (Some(chart), None),
            Err(e) => {
                warn!("Chart unavailable: {}", e);
                (None, Some(e.to_string()))
            }
        };

        Ok(Answer {
            sql,
            result,
            chart,
            chart_error,
            execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::DuckDbStore;
    use crate::llm::testing::ScriptedGenerator;
    use serde_json::{json, Value};

    fn pipeline(script: &ScriptedGenerator) -> QueryPipeline {
        let store = Arc::new(DuckDbStore::in_memory().unwrap());
        QueryPipeline::new(
            script.manager(),
            store,
            Duration::from_secs(30),
            &AppConfig::default().chart,
        )
    }

    #[tokio::test]
    async fn counts_prompts_by_category_end_to_end() {
        let script = ScriptedGenerator::new()
            .respond(
                "query",
                json!({ "query": "SELECT category, COUNT(*) AS count FROM legalprompt GROUP BY category ORDER BY category" }),
            )
            .respond(
                "chart_config",
                json!({ "type": "bar", "xKey": "category", "yKeys": ["count"], "legend": true }),
            );

        let answer = pipeline(&script)
            .answer("Show the count of legal prompts by category")
            .await
            .unwrap();

        assert!(answer.sql.to_lowercase().contains("group by category"));
        assert_eq!(answer.result.columns, ["category", "count"]);
        assert_eq!(answer.result.rows.len(), 3);
        assert!(answer.result.rows.iter().all(|row| row["count"] == Value::from(1)));

        let chart = answer.chart.expect("chart");
        assert_eq!(chart.x_key, "category");
        assert_eq!(chart.y_keys, ["count"]);
        assert!(!chart.legend);
        assert!(answer.chart_error.is_none());
    }

    #[tokio::test]
    async fn chart_failure_keeps_rows() {
        let script = ScriptedGenerator::new()
            .respond("query", json!({ "query": "SELECT name FROM legalprompt ORDER BY id" }))
            .fail("chart_config", "model overloaded");

        let answer = pipeline(&script).answer("list prompt names").await.unwrap();
        assert_eq!(answer.result.rows.len(), 3);
        assert!(answer.chart.is_none());
        assert!(answer.chart_error.is_some());
    }

    #[tokio::test]
    async fn empty_results_report_no_data_for_chart() {
        let script = ScriptedGenerator::new()
            .respond("query", json!({ "query": "SELECT name FROM legalprompt WHERE category = 'Tax'" }));

        let answer = pipeline(&script).answer("tax prompts").await.unwrap();
        assert!(answer.result.rows.is_empty());
        assert_eq!(answer.chart_error.as_deref(), Some("No data available to chart"));
        // Query generation only; the chart step short-circuits.
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn run_sql_normalizes_before_executing() {
        let script = ScriptedGenerator::new();
        let (sql, result, _) = pipeline(&script)
            .run_sql("SELECT name, systemmessage FROM legalprompt WHERE systemMessage IS NOT NULL")
            .await
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT name, "systemMessage" FROM legalprompt WHERE "systemMessage" IS NOT NULL"#
        );
        assert_eq!(result.rows.len(), 2);
    }
}
