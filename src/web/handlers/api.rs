use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::db::legal_prompts::{LegalPrompt, NewLegalPrompt, SCHEMA_DESCRIPTION, TABLE_NAME};
use crate::db::Row;
use crate::query::chart::ChartConfig;
use crate::query::executor::QueryResult;
use crate::query::explanation::QueryExplanation;
use crate::query::QueryError;
use crate::sql::normalizer::QUOTED_IDENTIFIERS;
use crate::web::state::AppState;

type ApiError = (StatusCode, String);

// Request types

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartRequest {
    pub question: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResponse {
    fn new(sql: String, result: QueryResult, execution_time_ms: u64) -> Self {
        Self {
            sql,
            row_count: result.rows.len(),
            columns: result.columns,
            rows: result.rows,
            execution_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    #[serde(flatten)]
    pub query: QueryResponse,
    pub chart: Option<ChartConfig>,
    pub chart_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub explanations: Vec<QueryExplanation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaResponse {
    pub table: &'static str,
    pub ddl: &'static str,
    pub quoted_columns: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: String,
    pub prompt_count: Option<i64>,
}

pub fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::GenerationFailure { .. } => StatusCode::BAD_GATEWAY,
        QueryError::ValidationFailure(_) => StatusCode::BAD_REQUEST,
        QueryError::QueryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        QueryError::DatabaseError { .. } => StatusCode::BAD_REQUEST,
        QueryError::NoData => StatusCode::UNPROCESSABLE_ENTITY,
        QueryError::InvalidChartConfig(_) => StatusCode::BAD_GATEWAY,
        QueryError::ExplanationFailure { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn reject(err: QueryError) -> ApiError {
    error!("Request failed ({}): {}", err.kind(), err);
    (status_for(&err), err.to_string())
}

// Natural language question: generate, execute and (best-effort) chart
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    debug!("Question: {}", payload.question);

    let answer = state.pipeline.answer(&payload.question).await.map_err(reject)?;

    Ok(Json(AskResponse {
        query: QueryResponse::new(answer.sql, answer.result, answer.execution_time_ms),
        chart: answer.chart,
        chart_error: answer.chart_error,
    }))
}

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let sql = state.pipeline.generate_sql(&payload.question).await.map_err(reject)?;
    Ok(Json(GenerateResponse { sql }))
}

// Direct query execution
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    info!("Executing SQL query: {}", payload.sql);

    let (sql, result, elapsed) = state.pipeline.run_sql(&payload.sql).await.map_err(reject)?;
    Ok(Json(QueryResponse::new(sql, result, elapsed)))
}

pub async fn explain_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let explanations = state
        .pipeline
        .explain(&payload.question, &payload.sql)
        .await
        .map_err(reject)?;
    Ok(Json(ExplainResponse { explanations }))
}

pub async fn chart_config(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChartRequest>,
) -> Result<Json<ChartConfig>, ApiError> {
    let chart = state
        .pipeline
        .chart(&payload.rows, &payload.question)
        .await
        .map_err(reject)?;
    Ok(Json(chart))
}

// Data export
pub async fn export_data(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (content_type, extension) = match format.as_str() {
        "csv" => ("text/csv; charset=utf-8", "csv"),
        "json" => ("application/json", "json"),
        _ => return Err((StatusCode::BAD_REQUEST, "Unsupported export format".to_string())),
    };

    let (_, result, _) = state.pipeline.run_sql(&payload.sql).await.map_err(reject)?;

    let body = match extension {
        "csv" => rows_to_csv(&result).map_err(|e| {
            error!("Failed to write CSV export: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export data".to_string())
        })?,
        _ => serde_json::to_vec_pretty(&result.rows).map_err(|e| {
            error!("Failed to write JSON export: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export data".to_string())
        })?,
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"query-results.{}\"", extension))
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    if let Ok(count) = HeaderValue::from_str(&result.rows.len().to_string()) {
        headers.insert("X-Total-Count", count);
    }

    Ok((headers, body))
}

fn rows_to_csv(result: &QueryResult) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if !result.columns.is_empty() {
        writer.write_record(&result.columns)?;
    }

    for row in &result.rows {
        let record: Vec<String> = result
            .columns
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

pub async fn list_suggestions(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.config.suggestions.clone())
}

// Schema
pub async fn get_schema() -> Json<SchemaResponse> {
    Json(SchemaResponse {
        table: TABLE_NAME,
        ddl: SCHEMA_DESCRIPTION,
        quoted_columns: QUOTED_IDENTIFIERS.to_vec(),
    })
}

// Legal prompts
pub async fn list_prompts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<LegalPrompt>>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0);

    let prompts = state.store.list_prompts(limit, offset).await.map_err(|e| {
        error!("Failed to list prompts: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.code.user_message().to_string())
    })?;
    Ok(Json(prompts))
}

pub async fn create_prompt(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewLegalPrompt>,
) -> Result<(StatusCode, Json<LegalPrompt>), ApiError> {
    payload
        .validate()
        .map_err(|reason| (StatusCode::BAD_REQUEST, reason))?;

    let prompt = state.store.insert_prompt(payload).await.map_err(|e| {
        error!("Failed to insert prompt: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.code.user_message().to_string())
    })?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    let prompt_count = match state
        .pipeline
        .run_sql("SELECT COUNT(*) AS n FROM legalprompt")
        .await
    {
        Ok((_, result, _)) => result
            .rows
            .first()
            .and_then(|row| row.get("n"))
            .and_then(Value::as_i64),
        Err(e) => {
            error!("Failed to count prompts: {}", e);
            None
        }
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.llm_backend.clone(),
        prompt_count,
    })
}
