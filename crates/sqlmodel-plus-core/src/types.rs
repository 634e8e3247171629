//! SQL type definitions and mapping.

/// SQL column types a model field can map to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    Boolean,

    // String types
    VarChar(u32),
    Text,

    Blob,

    /// JSON document, stored as text by SQLite.
    Json,

    /// Column type spelled out verbatim.
    Custom(&'static str),
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Custom(name) => (*name).to_string(),
        }
    }

    /// Check if this type stores whole numbers.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::VarChar(_) | SqlType::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_names() {
        assert_eq!(SqlType::BigInt.sql_name(), "BIGINT");
        assert_eq!(SqlType::VarChar(64).sql_name(), "VARCHAR(64)");
        assert_eq!(SqlType::Custom("NUMERIC(10, 2)").sql_name(), "NUMERIC(10, 2)");
    }

    #[test]
    fn test_classification() {
        assert!(SqlType::Integer.is_integer());
        assert!(!SqlType::Real.is_integer());
        assert!(SqlType::VarChar(10).is_text());
        assert!(!SqlType::Blob.is_text());
    }
}
