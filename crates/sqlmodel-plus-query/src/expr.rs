//! SQL expressions for query building.
//!
//! Expressions render to SQL with positional placeholders; literal values are
//! collected into the parameter list in placeholder order.

use sqlmodel_plus_core::{Dialect, Value};

/// A SQL expression that can be used in WHERE clauses.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Column reference with optional table qualifier
    Column {
        /// Optional table name or alias
        table: Option<String>,
        /// Column name
        name: String,
    },

    /// Literal value, always bound as a parameter
    Literal(Value),

    /// Binary operation (e.g., a = b, a AND b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// NOT expr
    Not(Box<Expr>),

    /// IN expression
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// BETWEEN expression
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE / NOT LIKE pattern
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },

    /// Raw SQL fragment (escape hatch)
    Raw(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Get the precedence of this operator (higher = binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
        }
    }
}

impl Expr {
    /// Create a column reference expression.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Create a qualified column reference (table.column).
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Create a literal value expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create a raw SQL expression.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// LIKE pattern
    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// NOT LIKE pattern
    pub fn not_like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// IN list of values. An empty list matches nothing.
    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        if values.is_empty() {
            return Expr::raw("1 = 0");
        }
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// NOT IN list of values. An empty list matches everything.
    pub fn not_in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        if values.is_empty() {
            return Expr::raw("1 = 1");
        }
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// BETWEEN low AND high
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
        }
    }

    /// Render this expression, appending literal values to `params`.
    ///
    /// Placeholders are numbered from `offset + 1` onward.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        match self {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    format!(
                        "{}.{}",
                        dialect.quote_identifier(t),
                        dialect.quote_identifier(name)
                    )
                } else {
                    dialect.quote_identifier(name)
                }
            }

            Expr::Literal(value) => {
                params.push(value.clone());
                dialect.placeholder(offset + params.len())
            }

            Expr::Binary { left, op, right } => {
                let left_sql = left.build_operand(*op, dialect, params, offset);
                let right_sql = right.build_operand(*op, dialect, params, offset);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::Not(expr) => {
                let expr_sql = expr.build(dialect, params, offset);
                if matches!(**expr, Expr::Binary { .. }) {
                    format!("NOT ({expr_sql})")
                } else {
                    format!("NOT {expr_sql}")
                }
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                let expr_sql = expr.build(dialect, params, offset);
                let value_sqls: Vec<_> = values
                    .iter()
                    .map(|v| v.build(dialect, params, offset))
                    .collect();
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::Between { expr, low, high } => {
                let expr_sql = expr.build(dialect, params, offset);
                let low_sql = low.build(dialect, params, offset);
                let high_sql = high.build(dialect, params, offset);
                format!("{expr_sql} BETWEEN {low_sql} AND {high_sql}")
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build(dialect, params, offset);
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let expr_sql = expr.build(dialect, params, offset);
                params.push(Value::Text(pattern.clone()));
                let param = dialect.placeholder(offset + params.len());
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}LIKE {param}")
            }

            Expr::Raw(sql) => sql.clone(),
        }
    }

    // Operands that bind looser than their parent need parentheses.
    fn build_operand(
        &self,
        parent: BinaryOp,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let sql = self.build(dialect, params, offset);
        match self {
            Expr::Binary { op, .. } if op.precedence() < parent.precedence() => {
                format!("({sql})")
            }
            _ => sql,
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = expr.build(Dialect::Sqlite, &mut params, 0);
        (sql, params)
    }

    #[test]
    fn test_comparison_binds_literal() {
        let (sql, params) = render(&Expr::col("age").gt(30));
        assert_eq!(sql, "\"age\" > ?1");
        assert_eq!(params, vec![Value::Int(30)]);
    }

    #[test]
    fn test_in_list_numbers_placeholders() {
        let (sql, params) = render(&Expr::col("id").in_list(vec![1_i64, 2]));
        assert_eq!(sql, "\"id\" IN (?1, ?2)");
        assert_eq!(params.len(), 2);

        let (sql, params) = render(&Expr::col("id").in_list(Vec::<i64>::new()));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_or_inside_and_is_parenthesized() {
        let expr = Expr::col("a")
            .eq(1)
            .or(Expr::col("b").eq(2))
            .and(Expr::col("c").is_not_null());
        let (sql, _) = render(&expr);
        assert_eq!(sql, "(\"a\" = ?1 OR \"b\" = ?2) AND \"c\" IS NOT NULL");
    }

    #[test]
    fn test_offset_and_qualified_columns() {
        let mut params = vec![Value::Int(0)];
        let sql = Expr::qualified("hero", "name")
            .like("Dead%")
            .build(Dialect::Sqlite, &mut params, 0);
        assert_eq!(sql, "\"hero\".\"name\" LIKE ?2");

        let (sql, _) = render(&Expr::col("x").eq(1).not());
        assert_eq!(sql, "NOT (\"x\" = ?1)");
    }

    #[test]
    fn test_between_continues_placeholder_numbering() {
        let mut params = Vec::new();
        let sql = Expr::col("age")
            .between(18, 65)
            .build(Dialect::Sqlite, &mut params, 1);
        assert_eq!(sql, "\"age\" BETWEEN ?2 AND ?3");
        assert_eq!(params.len(), 2);
    }
}
