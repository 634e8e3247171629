//! Error types for database and model operations.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type for all ORM-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-related errors (open, close, bad URL target)
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// Statement preparation or execution errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    /// Value conversion errors
    #[error("Type error: {0}")]
    Type(#[from] TypeError),
    /// Transaction state errors
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    /// DDL generation errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    /// Configuration errors (engine URLs, identities, bind parameters)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    #[source]
    pub source: Option<BoxedSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Database path cannot be passed to the backend
    InvalidPath,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    /// Backend-specific extended result code, when the backend reports one.
    pub code: Option<i32>,
    pub message: String,
    #[source]
    pub source: Option<BoxedSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Primary key or unique constraint violation
    UniqueViolation,
    /// Any other constraint violation (NOT NULL, CHECK, foreign key)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied or read-only database
    Permission,
    /// Value too large
    DataTruncation,
    /// Database is busy or locked
    Busy,
    /// Interrupted
    Cancelled,
    /// Bind parameter mismatch
    Binding,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// BEGIN while a transaction is open
    AlreadyActive,
    /// COMMIT or ROLLBACK without an open transaction
    NotActive,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SchemaError {
    pub table: Option<String>,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
    #[source]
    pub source: Option<BoxedSource>,
}

impl Error {
    /// Build a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Is this a primary key / unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::Query(q) if q.kind == QueryErrorKind::UniqueViolation)
    }

    /// Is this any kind of constraint violation (including unique)?
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Query(q)
                if matches!(q.kind, QueryErrorKind::UniqueViolation | QueryErrorKind::Constraint)
        )
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Get the query error kind, if this is a query error.
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            Error::Query(q) => Some(q.kind),
            _ => None,
        }
    }
}

impl QueryError {
    /// Create a query error without backend code or source.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sql: None,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the SQL text that failed.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach a backend result code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl std::error::Error for TypeError {}

/// Result type alias for ORM-level operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_helpers() {
        let err = Error::Query(
            QueryError::new(QueryErrorKind::UniqueViolation, "UNIQUE constraint failed: hero.id")
                .with_sql("INSERT INTO hero (id) VALUES (?1)")
                .with_code(1555),
        );

        assert!(err.is_unique_violation());
        assert!(err.is_constraint_violation());
        assert_eq!(err.sql(), Some("INSERT INTO hero (id) VALUES (?1)"));
        assert_eq!(
            err.to_string(),
            "Query error: UNIQUE constraint failed: hero.id"
        );
    }

    #[test]
    fn plain_constraint_is_not_unique() {
        let err = Error::Query(QueryError::new(
            QueryErrorKind::Constraint,
            "NOT NULL constraint failed: hero.name",
        ));
        assert!(!err.is_unique_violation());
        assert!(err.is_constraint_violation());
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
    }

    #[test]
    fn type_error_display_names_column() {
        let err = Error::Type(TypeError {
            expected: "i64",
            actual: "TEXT".to_string(),
            column: Some("id".to_string()),
        });
        assert_eq!(
            err.to_string(),
            "Type error: expected i64 for column 'id', found TEXT"
        );
    }

    #[test]
    fn config_error_has_no_sql() {
        let err = Error::config("unsupported engine URL");
        assert!(err.sql().is_none());
        assert_eq!(err.to_string(), "Configuration error: unsupported engine URL");
    }
}
