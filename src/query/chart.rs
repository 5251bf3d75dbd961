use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DEFAULT_PALETTE;
use crate::db::Row;
use crate::llm::models::{FieldKind, FieldSpec, OutputSchema, StructuredRequest};
use crate::llm::LlmManager;
use crate::query::error::QueryError;

pub const CHART_TYPES: [&str; 4] = ["bar", "line", "area", "pie"];

/// How the UI should draw a result set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub chart_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub x_key: String,
    pub y_keys: Vec<String>,
    pub colors: BTreeMap<String, String>,
    pub legend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_lines: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub takeaway: Option<String>,
}

/// What the model is asked to fill in. Colours and legend are decided here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartSuggestion {
    #[serde(rename = "type")]
    chart_type: String,
    #[serde(default)]
    title: Option<String>,
    x_key: String,
    #[serde(default)]
    y_keys: Vec<String>,
    #[serde(default)]
    legend: Option<bool>,
    #[serde(default)]
    multiple_lines: Option<bool>,
    #[serde(default)]
    measurement_column: Option<String>,
    #[serde(default)]
    takeaway: Option<String>,
}

pub struct ChartConfigGenerator {
    llm: Arc<LlmManager>,
    palette: Vec<String>,
    sample_rows: usize,
}

impl ChartConfigGenerator {
    /// An empty `palette` falls back to the built-in colours.
    pub fn new(llm: Arc<LlmManager>, palette: Vec<String>, sample_rows: usize) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
        } else {
            palette
        };
        Self {
            llm,
            palette,
            sample_rows: sample_rows.max(1),
        }
    }

    fn output_schema() -> OutputSchema {
        let optional = |kind| FieldKind::Optional(Box::new(kind));
        OutputSchema::new(
            "chart_config",
            vec![
                FieldSpec::new("type", FieldKind::String).described("One of: bar, line, area, pie"),
                FieldSpec::new("title", optional(FieldKind::String)),
                FieldSpec::new("xKey", FieldKind::String).described("Column used for the category axis"),
                FieldSpec::new("yKeys", FieldKind::StringList).described("Numeric columns to plot, in order"),
                FieldSpec::new("legend", optional(FieldKind::Boolean)),
                FieldSpec::new("multipleLines", optional(FieldKind::Boolean)),
                FieldSpec::new("measurementColumn", optional(FieldKind::String)),
                FieldSpec::new("takeaway", optional(FieldKind::String)).described("One-sentence insight"),
            ],
        )
    }

    fn request(&self, rows: &[Row], question: &str) -> Result<StructuredRequest, QueryError> {
        let sample = &rows[..rows.len().min(self.sample_rows)];
        let sample_json = serde_json::to_string_pretty(sample)
            .map_err(|e| QueryError::InvalidChartConfig(e.to_string()))?;

        Ok(StructuredRequest {
            system: "You are a data visualization expert. Pick the chart that best answers the user's question \
                     using only the columns present in the data. xKey must be a column name; yKeys must be \
                     numeric column names. Use a line or area chart for time series, a pie chart only for a \
                     single series of parts of a whole, and a bar chart otherwise."
                .to_string(),
            prompt: format!(
                "Given the following data, generate the chart config that best visualises it and answers the question.\n\
                 Question: {}\n\nData (first {} of {} rows):\n{}",
                question,
                sample.len(),
                rows.len(),
                sample_json
            ),
            schema: Self::output_schema(),
        })
    }

    pub async fn generate(&self, rows: &[Row], question: &str) -> Result<ChartConfig, QueryError> {
        if rows.is_empty() {
            return Err(QueryError::NoData);
        }

        let suggestion: ChartSuggestion = self
            .llm
            .generate_object(&self.request(rows, question)?)
            .await
            .map_err(|e| {
                warn!("Chart generation failed: {}", e);
                QueryError::InvalidChartConfig(e.to_string())
            })?;

        let config = self.finish(suggestion)?;
        info!("Chart config: {} over {} with {:?}", config.chart_type, config.x_key, config.y_keys);
        Ok(config)
    }

    fn finish(&self, suggestion: ChartSuggestion) -> Result<ChartConfig, QueryError> {
        if suggestion.y_keys.is_empty() {
            return Err(QueryError::InvalidChartConfig("no series keys returned".to_string()));
        }
        if suggestion.x_key.trim().is_empty() {
            return Err(QueryError::InvalidChartConfig("no axis key returned".to_string()));
        }

        let chart_type = suggestion.chart_type.trim().to_lowercase();
        let chart_type = if CHART_TYPES.contains(&chart_type.as_str()) {
            chart_type
        } else {
            warn!("Unknown chart type {:?}, falling back to bar", suggestion.chart_type);
            "bar".to_string()
        };

        let colors = self.assign_colors(&suggestion.y_keys);

        if suggestion.legend.is_some_and(|legend| legend != (suggestion.y_keys.len() > 1)) {
            info!("Overriding suggested legend setting");
        }

        Ok(ChartConfig {
            chart_type,
            title: suggestion.title,
            x_key: suggestion.x_key,
            legend: suggestion.y_keys.len() > 1,
            y_keys: suggestion.y_keys,
            colors,
            multiple_lines: suggestion.multiple_lines,
            measurement_column: suggestion.measurement_column,
            takeaway: suggestion.takeaway,
        })
    }

    fn assign_colors(&self, keys: &[String]) -> BTreeMap<String, String> {
        keys.iter()
            .enumerate()
            .map(|(index, key)| (key.clone(), self.palette[index % self.palette.len()].clone()))
            .collect()
    }
}
