//! SQL clause types (WHERE, ORDER BY, LIMIT, OFFSET)

use crate::expr::Expr;
use sqlmodel_plus_core::{Dialect, Value};

/// WHERE clause.
#[derive(Debug, Clone)]
pub struct Where {
    expr: Expr,
}

impl Where {
    /// Create a new WHERE clause with the given expression.
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add an OR condition.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    /// Build the WHERE clause, numbering placeholders after `params`.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        self.expr.build(dialect, params, 0)
    }
}

/// ORDER BY clause.
#[derive(Debug, Clone)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    /// Generate SQL for this ORDER BY clause.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let direction = match self.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        format!("{} {}", dialect.quote_identifier(&self.column), direction)
    }
}

/// LIMIT clause.
#[derive(Debug, Clone, Copy)]
pub struct Limit(pub u64);

/// OFFSET clause.
#[derive(Debug, Clone, Copy)]
pub struct Offset(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_sql() {
        assert_eq!(OrderBy::asc("id").to_sql(Dialect::Sqlite), "\"id\" ASC");
        assert_eq!(OrderBy::desc("name").to_sql(Dialect::Sqlite), "\"name\" DESC");
    }

    #[test]
    fn test_where_chains_conditions() {
        let clause = Where::new(Expr::col("a").eq(1)).and(Expr::col("b").eq(2));
        let mut params = Vec::new();
        let sql = clause.build(Dialect::Sqlite, &mut params);
        assert_eq!(sql, "\"a\" = ?1 AND \"b\" = ?2");
        assert_eq!(params.len(), 2);
    }
}
