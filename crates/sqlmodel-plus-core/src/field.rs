//! Field and column definitions.

use crate::types::SqlType;

/// Metadata about a model field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// SQL type for this field
    pub sql_type: SqlType,
    /// Explicit SQL type string; takes precedence over `sql_type` in DDL.
    pub sql_type_override: Option<&'static str>,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this field auto-increments
    pub auto_increment: bool,
    /// Whether this field has a unique constraint
    pub unique: bool,
    /// Default value expression (SQL)
    pub default: Option<&'static str>,
    /// Foreign key reference (table.column)
    pub foreign_key: Option<&'static str>,
    /// Index name if indexed
    pub index: Option<&'static str>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column_name,
            sql_type,
            sql_type_override: None,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            foreign_key: None,
            index: None,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set SQL type override from optional.
    pub const fn sql_type_override_opt(mut self, type_str: Option<&'static str>) -> Self {
        self.sql_type_override = type_str;
        self
    }

    /// The column type to emit in DDL.
    pub fn effective_sql_type(&self) -> String {
        self.sql_type_override
            .map_or_else(|| self.sql_type.sql_name(), str::to_string)
    }

    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    pub const fn default_opt(mut self, expr: Option<&'static str>) -> Self {
        self.default = expr;
        self
    }

    pub const fn foreign_key_opt(mut self, reference: Option<&'static str>) -> Self {
        self.foreign_key = reference;
        self
    }

    pub const fn index_opt(mut self, name: Option<&'static str>) -> Self {
        self.index = name;
        self
    }

    /// Whether a NULL value for this column may be left out of an INSERT
    /// so the database fills it in.
    pub const fn is_server_generated(&self) -> bool {
        self.auto_increment || self.default.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        const ID: FieldInfo = FieldInfo::new("id", "id", SqlType::BigInt)
            .primary_key(true)
            .auto_increment(true)
            .nullable(true);
        assert!(ID.primary_key);
        assert!(ID.is_server_generated());
        assert_eq!(ID.effective_sql_type(), "BIGINT");
    }

    #[test]
    fn test_override_and_default() {
        let field = FieldInfo::new("price", "price_cents", SqlType::Integer)
            .sql_type_override_opt(Some("NUMERIC(10, 2)"))
            .default_opt(Some("0"));
        assert_eq!(field.column_name, "price_cents");
        assert_eq!(field.effective_sql_type(), "NUMERIC(10, 2)");
        assert!(field.is_server_generated());
        assert!(!FieldInfo::new("name", "name", SqlType::Text).is_server_generated());
    }
}
