//! Literal SQL statements with `:name` bind parameters.

use crate::statement::Executable;
use regex::Regex;
use sqlmodel_plus_core::{Dialect, Error, Params, QueryError, QueryErrorKind, Result, Row};
use std::sync::LazyLock;

// `:name` not preceded by another colon, a word character or a backslash.
static BIND_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^:\w\\]):([A-Za-z_]\w*)").expect("should compile"));

/// A literal SQL statement, passed to the engine as written.
///
/// Named placeholders (`:id`) are discovered up front so a missing value is
/// reported before the statement reaches the database. Rows decode as plain
/// [`Row`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct TextClause {
    sql: String,
    bind_names: Vec<String>,
    bound: Params,
}

/// Build a [`TextClause`].
pub fn text(sql: impl Into<String>) -> TextClause {
    TextClause::new(sql)
}

impl TextClause {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let mut bind_names: Vec<String> = Vec::new();
        for caps in BIND_PARAM.captures_iter(&sql) {
            let Some(name) = caps.get(1) else { continue };
            // `:a::text` is a cast, not a bind
            if sql[name.end()..].starts_with(':') {
                continue;
            }
            if !bind_names.iter().any(|n| n == name.as_str()) {
                bind_names.push(name.as_str().to_string());
            }
        }
        Self {
            sql,
            bind_names,
            bound: Params::new(),
        }
    }

    /// Attach default values for bind parameters.
    ///
    /// Values supplied at execution time take precedence.
    pub fn bindparams(mut self, params: impl Into<Params>) -> Self {
        self.bound.extend(params.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Names of the `:name` parameters in order of first appearance.
    pub fn bind_names(&self) -> &[String] {
        &self.bind_names
    }
}

impl Executable for TextClause {
    type Output = Row;

    fn compile(&self, _dialect: Dialect, params: &Params) -> Result<(String, Params)> {
        let mut merged = self.bound.clone();
        merged.extend(params.clone());

        if merged.positional().is_empty() {
            if let Some(missing) = self.bind_names.iter().find(|n| merged.get(n).is_none()) {
                return Err(Error::Query(
                    QueryError::new(
                        QueryErrorKind::Binding,
                        format!("A value is required for bind parameter '{}'", missing),
                    )
                    .with_sql(&self.sql),
                ));
            }
        }

        Ok((self.sql.clone(), merged))
    }

    fn decode(row: &Row) -> Result<Row> {
        Ok(row.clone())
    }
}

impl From<&str> for TextClause {
    fn from(sql: &str) -> Self {
        TextClause::new(sql)
    }
}

impl From<String> for TextClause {
    fn from(sql: String) -> Self {
        TextClause::new(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmodel_plus_core::params;

    #[test]
    fn test_discovers_bind_names() {
        let clause = text("SELECT id FROM hero WHERE id = :id AND (name = :name OR :id IS NULL)");
        assert_eq!(clause.bind_names(), ["id", "name"]);
    }

    #[test]
    fn test_ignores_casts_and_escapes() {
        let clause = text("SELECT '1'::integer, x FROM t WHERE y = :y AND z = \\:literal");
        assert_eq!(clause.bind_names(), ["y"]);
    }

    #[test]
    fn test_missing_bind_is_an_error() {
        let clause = text("SELECT id FROM hero WHERE id = :id");
        let err = clause.compile(Dialect::Sqlite, &Params::new()).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Binding));
        assert!(err.to_string().contains("'id'"));

        let (sql, params) = clause
            .compile(Dialect::Sqlite, &params! { "id" => 1_i64 })
            .unwrap();
        assert_eq!(sql, "SELECT id FROM hero WHERE id = :id");
        assert_eq!(params.named().len(), 1);
    }

    #[test]
    fn test_bindparams_defaults_are_overridden() {
        let clause = text("SELECT :a, :b").bindparams(params! { "a" => 1_i64, "b" => 2_i64 });
        let (_, params) = clause
            .compile(Dialect::Sqlite, &params! { "b" => 3_i64 })
            .unwrap();
        assert_eq!(params.get("a"), Some(&sqlmodel_plus_core::Value::BigInt(1)));
        assert_eq!(params.get("b"), Some(&sqlmodel_plus_core::Value::BigInt(3)));
    }

    #[test]
    fn test_positional_statements_skip_name_check() {
        let clause = text("SELECT ?1");
        assert!(clause.bind_names().is_empty());
        let params = Params::from(vec![sqlmodel_plus_core::Value::Int(1)]);
        assert!(clause.compile(Dialect::Sqlite, &params).is_ok());
    }
}
