//! SELECT query builder.

use crate::clause::{Limit, Offset, OrderBy, Where};
use crate::expr::Expr;
use sqlmodel_plus_core::{Dialect, Model, Value};
use std::fmt;
use std::marker::PhantomData;

/// A SELECT query builder.
///
/// Provides a fluent API for building SELECT queries against the table of
/// model `M`. Rows produced by the query decode as `M`.
pub struct Select<M: Model> {
    /// Columns to select (empty = all)
    columns: Vec<String>,
    /// WHERE clause conditions
    where_clause: Option<Where>,
    /// ORDER BY clauses
    order_by: Vec<OrderBy>,
    /// LIMIT clause
    limit: Option<Limit>,
    /// OFFSET clause
    offset: Option<Offset>,
    /// DISTINCT flag
    distinct: bool,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Select<M> {
    /// Create a new SELECT query for the model's table.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            _marker: PhantomData,
        }
    }

    /// Select specific columns.
    ///
    /// Rows must still carry every column `M` needs to decode.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|&s| s.to_string()).collect();
        self
    }

    /// Add a WHERE condition, ANDed with existing ones.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add an OR WHERE condition.
    pub fn or_filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.or(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(Offset(n));
        self
    }

    /// Make this a SELECT DISTINCT query.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Build the SQL query and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<_> = self
                .columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect();
            sql.push_str(&cols.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(M::TABLE_NAME));

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.build(dialect, &mut params));
        }

        if !self.order_by.is_empty() {
            let order: Vec<_> = self.order_by.iter().map(|o| o.to_sql(dialect)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(Limit(n)) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        if let Some(Offset(n)) = self.offset {
            // SQLite rejects OFFSET without LIMIT
            if self.limit.is_none() {
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {n}"));
        }

        (sql, params)
    }
}

impl<M: Model> Default for Select<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for Select<M> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            where_clause: self.where_clause.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
            _marker: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Select<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("table", &M::TABLE_NAME)
            .field("columns", &self.columns)
            .field("where_clause", &self.where_clause)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("distinct", &self.distinct)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmodel_plus_core::{Error, FieldInfo, Result, Row};

    struct Hero;

    impl Model for Hero {
        const TABLE_NAME: &'static str = "hero";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn fields() -> &'static [FieldInfo] {
            &[]
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Err(Error::Custom("not used in tests".to_string()))
        }

        fn primary_key_value(&self) -> Vec<Value> {
            Vec::new()
        }

        fn is_new(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_select_all_columns() {
        let (sql, params) = Select::<Hero>::new().build(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"hero\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_specific_columns_distinct() {
        let (sql, _) = Select::<Hero>::new()
            .columns(&["id", "name"])
            .distinct()
            .build(Dialect::Sqlite);
        assert_eq!(sql, "SELECT DISTINCT \"id\", \"name\" FROM \"hero\"");
    }

    #[test]
    fn test_select_in_list_ordered() {
        let (sql, params) = Select::<Hero>::new()
            .filter(Expr::col("id").in_list(vec![1_i64, 2_i64]))
            .order_by(OrderBy::asc("id"))
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT * FROM \"hero\" WHERE \"id\" IN (?1, ?2) ORDER BY \"id\" ASC"
        );
        assert_eq!(params, vec![Value::BigInt(1), Value::BigInt(2)]);
    }

    #[test]
    fn test_select_with_or_filter() {
        let (sql, params) = Select::<Hero>::new()
            .filter(Expr::col("age").gt(18))
            .or_filter(Expr::col("name").eq("Rusty-Man"))
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT * FROM \"hero\" WHERE \"age\" > ?1 OR \"name\" = ?2"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_select_limit_offset() {
        let (sql, _) = Select::<Hero>::new().limit(10).offset(5).build(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"hero\" LIMIT 10 OFFSET 5");

        let (sql, _) = Select::<Hero>::new().offset(5).build(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"hero\" LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_select_clone_is_independent() {
        let base = Select::<Hero>::new().filter(Expr::col("id").eq(1));
        let limited = base.clone().limit(1);
        assert!(!base.build(Dialect::Sqlite).0.contains("LIMIT"));
        assert!(limited.build(Dialect::Sqlite).0.ends_with("LIMIT 1"));
        assert!(format!("{base:?}").contains("hero"));
    }
}
