use serde::Serialize;
use std::fmt;

/// Postgres-compatible SQLSTATE classes the service knows how to explain.
///
/// DuckDB reports failures as `"<Kind> Error: ..."` text rather than a code,
/// so [`SqlState::classify_duckdb`] translates once at the store boundary and
/// everything above works with the structured code only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlState {
    SyntaxError,
    UndefinedTable,
    UndefinedColumn,
    UndefinedFunction,
    GroupingError,
    DatatypeMismatch,
    IntegrityConstraintViolation,
    NotNullViolation,
    UniqueViolation,
    QueryCanceled,
    OutOfMemory,
    InvalidTextRepresentation,
    NumericValueOutOfRange,
    DatetimeFieldOverflow,
    DivisionByZero,
    Other,
}

impl SqlState {
    pub fn code(&self) -> &'static str {
        match self {
            SqlState::SyntaxError => "42601",
            SqlState::UndefinedTable => "42P01",
            SqlState::UndefinedColumn => "42703",
            SqlState::UndefinedFunction => "42883",
            SqlState::GroupingError => "42803",
            SqlState::DatatypeMismatch => "42804",
            SqlState::IntegrityConstraintViolation => "23000",
            SqlState::NotNullViolation => "23502",
            SqlState::UniqueViolation => "23505",
            SqlState::QueryCanceled => "57014",
            SqlState::OutOfMemory => "53200",
            SqlState::InvalidTextRepresentation => "22P02",
            SqlState::NumericValueOutOfRange => "22003",
            SqlState::DatetimeFieldOverflow => "22008",
            SqlState::DivisionByZero => "22012",
            SqlState::Other => "XX000",
        }
    }

    /// The message shown to the user for this code.
    pub fn user_message(&self) -> &'static str {
        match self {
            SqlState::SyntaxError => "The generated query has a syntax error",
            SqlState::UndefinedTable => "The requested table does not exist",
            SqlState::UndefinedColumn => "The query references a column that does not exist",
            SqlState::UndefinedFunction => "The query uses a function that does not exist",
            SqlState::GroupingError => "Every selected column must be grouped or aggregated",
            SqlState::DatatypeMismatch => "The query compares or combines incompatible types",
            SqlState::IntegrityConstraintViolation => "The query violates a table constraint",
            SqlState::NotNullViolation => "A required value was missing",
            SqlState::UniqueViolation => "A duplicate value violates a unique constraint",
            SqlState::QueryCanceled => "The query was cancelled because it took too long",
            SqlState::OutOfMemory => "The database ran out of memory running the query",
            SqlState::InvalidTextRepresentation => "A value could not be converted to the expected type",
            SqlState::NumericValueOutOfRange => "A numeric value is out of range",
            SqlState::DatetimeFieldOverflow => "A date or time value is out of range",
            SqlState::DivisionByZero => "The query divides by zero",
            SqlState::Other => "An unexpected database error occurred",
        }
    }

    pub fn classify_duckdb(message: &str) -> Self {
        let lowered = message.to_lowercase();

        if lowered.starts_with("parser error") {
            return SqlState::SyntaxError;
        }
        if lowered.starts_with("catalog error") {
            if lowered.contains("table with name") || lowered.contains("view with name") {
                return SqlState::UndefinedTable;
            }
            if lowered.contains("function with name") {
                return SqlState::UndefinedFunction;
            }
            return SqlState::Other;
        }
        if lowered.starts_with("binder error") {
            if lowered.contains("referenced column")
                || (lowered.contains("column") && lowered.contains("not found")) {
                return SqlState::UndefinedColumn;
            }
            if lowered.contains("group by") {
                return SqlState::GroupingError;
            }
            if lowered.contains("no function matches") {
                return SqlState::UndefinedFunction;
            }
            if lowered.contains("cannot compare") || lowered.contains("explicit cast") {
                return SqlState::DatatypeMismatch;
            }
            return SqlState::Other;
        }
        if lowered.starts_with("constraint error") {
            if lowered.contains("not null") {
                return SqlState::NotNullViolation;
            }
            if lowered.contains("duplicate key") {
                return SqlState::UniqueViolation;
            }
            return SqlState::IntegrityConstraintViolation;
        }
        if lowered.starts_with("conversion error") {
            if lowered.contains("date") || lowered.contains("timestamp") {
                return SqlState::DatetimeFieldOverflow;
            }
            return SqlState::InvalidTextRepresentation;
        }
        if lowered.starts_with("out of range error") {
            if lowered.contains("division by zero") {
                return SqlState::DivisionByZero;
            }
            return SqlState::NumericValueOutOfRange;
        }
        if lowered.starts_with("out of memory error") {
            return SqlState::OutOfMemory;
        }
        if lowered.starts_with("interrupt error") || lowered.contains("interrupted") {
            return SqlState::QueryCanceled;
        }

        SqlState::Other
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
