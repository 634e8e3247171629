//! Executable statements.
//!
//! An [`Executable`] renders itself to SQL plus bind parameters for a
//! dialect and knows how to decode each result row. Sessions execute any
//! `Executable`; [`IntoStatement`] lets callers pass a raw string, a
//! [`TextClause`] or a [`Select`] wherever a statement is expected.

use crate::select::Select;
use crate::text::TextClause;
use sqlmodel_plus_core::{Dialect, FromRow, Model, Params, Result, Row};
use std::fmt;
use std::marker::PhantomData;

/// A statement that can be executed against an engine.
pub trait Executable {
    /// What each result row decodes into.
    type Output;

    /// Render the statement, merging in caller supplied parameters.
    fn compile(&self, dialect: Dialect, params: &Params) -> Result<(String, Params)>;

    /// Decode one result row.
    fn decode(row: &Row) -> Result<Self::Output>;
}

impl<M: Model> Executable for Select<M> {
    type Output = M;

    fn compile(&self, dialect: Dialect, params: &Params) -> Result<(String, Params)> {
        let (sql, values) = self.build(dialect);
        let mut bound = Params::from(values);
        bound.extend(params.clone());
        Ok((sql, bound))
    }

    fn decode(row: &Row) -> Result<M> {
        M::from_row(row)
    }
}

/// `SELECT COUNT(*)` over another statement.
#[derive(Debug, Clone)]
pub struct Count<S> {
    inner: S,
}

impl<S: Executable> Count<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: Executable> Executable for Count<S> {
    type Output = i64;

    fn compile(&self, dialect: Dialect, params: &Params) -> Result<(String, Params)> {
        let (inner_sql, bound) = self.inner.compile(dialect, params)?;
        let inner_sql = inner_sql.trim().trim_end_matches(';');
        Ok((
            format!("SELECT COUNT(*) FROM ({inner_sql}) AS counted"),
            bound,
        ))
    }

    fn decode(row: &Row) -> Result<i64> {
        row.get_as(0)
    }
}

/// Another statement with its rows decoded as `T` instead.
pub struct Mapped<S, T> {
    inner: S,
    _marker: PhantomData<fn() -> T>,
}

impl<S: Executable, T: FromRow> Mapped<S, T> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<S: Clone, T> Clone for Mapped<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S: fmt::Debug, T> fmt::Debug for Mapped<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapped")
            .field("inner", &self.inner)
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}

impl<S: Executable, T: FromRow> Executable for Mapped<S, T> {
    type Output = T;

    fn compile(&self, dialect: Dialect, params: &Params) -> Result<(String, Params)> {
        self.inner.compile(dialect, params)
    }

    fn decode(row: &Row) -> Result<T> {
        T::from_row(row)
    }
}

/// Conversion into an [`Executable`] statement.
pub trait IntoStatement {
    type Statement: Executable;

    fn into_statement(self) -> Self::Statement;
}

impl IntoStatement for &str {
    type Statement = TextClause;

    fn into_statement(self) -> TextClause {
        TextClause::new(self)
    }
}

impl IntoStatement for String {
    type Statement = TextClause;

    fn into_statement(self) -> TextClause {
        TextClause::new(self)
    }
}

impl IntoStatement for &String {
    type Statement = TextClause;

    fn into_statement(self) -> TextClause {
        TextClause::new(self.as_str())
    }
}

impl IntoStatement for TextClause {
    type Statement = TextClause;

    fn into_statement(self) -> TextClause {
        self
    }
}

impl<M: Model> IntoStatement for Select<M> {
    type Statement = Select<M>;

    fn into_statement(self) -> Select<M> {
        self
    }
}

impl<S: Executable> IntoStatement for Count<S> {
    type Statement = Count<S>;

    fn into_statement(self) -> Count<S> {
        self
    }
}

impl<S: Executable, T: FromRow> IntoStatement for Mapped<S, T> {
    type Statement = Mapped<S, T>;

    fn into_statement(self) -> Mapped<S, T> {
        self
    }
}
