use thiserror::Error;

use crate::db::sql_state::SqlState;

/// Failures a single request can end in. Each carries the short message that
/// is shown to the user.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("Failed to generate query")]
    GenerationFailure { cause: String },

    #[error("{0}")]
    ValidationFailure(String),

    #[error("Query timed out after {0} seconds")]
    QueryTimeout(u64),

    #[error("{message}")]
    DatabaseError { code: SqlState, message: String },

    #[error("No data available to chart")]
    NoData,

    #[error("Invalid chart configuration: {0}")]
    InvalidChartConfig(String),

    #[error("Failed to explain query")]
    ExplanationFailure { cause: String },
}

impl QueryError {
    pub fn generation(cause: impl ToString) -> Self {
        QueryError::GenerationFailure {
            cause: cause.to_string(),
        }
    }

    pub fn database(code: SqlState) -> Self {
        QueryError::DatabaseError {
            code,
            message: code.user_message().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::GenerationFailure { .. } => "generation_failure",
            QueryError::ValidationFailure(_) => "validation_failure",
            QueryError::QueryTimeout(_) => "query_timeout",
            QueryError::DatabaseError { .. } => "database_error",
            QueryError::NoData => "no_data",
            QueryError::InvalidChartConfig(_) => "invalid_chart_config",
            QueryError::ExplanationFailure { .. } => "explanation_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failure_hides_cause() {
        let err = QueryError::generation("LLM connection error: refused");
        assert_eq!(err.to_string(), "Failed to generate query");
        assert_eq!(err.kind(), "generation_failure");
    }

    #[test]
    fn database_error_uses_mapped_message() {
        let err = QueryError::database(SqlState::UndefinedColumn);
        assert_eq!(err.to_string(), "The query references a column that does not exist");
    }
}
