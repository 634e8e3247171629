//! Deferred queries bound to a record type's scope.

use crate::error::Result;
use crate::record::Record;
use crate::registry::EngineRegistry;
use sqlmodel_plus_core::{FromRow, Params};
use sqlmodel_plus_query::{Count, Executable, Mapped};
use std::fmt;
use std::marker::PhantomData;

/// A statement and its parameters, executed on the scope of `M` when an
/// accessor is called.
///
/// Results are never cached: every accessor opens a fresh session and runs
/// the statement again. Structured queries yield `M`; raw SQL yields
/// [`Row`](sqlmodel_plus_core::Row)s, or tuples through [`Query::all_as`].
///
/// ```ignore
/// let first = Hero::query(&registry, "SELECT id FROM hero WHERE id = :id")
///     .params(params! { "id" => 1 })
///     .first_as::<(i64,)>()?;
/// ```
pub struct Query<'r, M: Record, S> {
    registry: &'r EngineRegistry,
    statement: S,
    params: Params,
    _marker: PhantomData<fn() -> M>,
}

impl<'r, M: Record, S> Query<'r, M, S> {
    pub(crate) fn new(registry: &'r EngineRegistry, statement: S) -> Self {
        Self {
            registry,
            statement,
            params: Params::new(),
            _marker: PhantomData,
        }
    }

    /// Bind parameters: a map of names to values for `:name` placeholders,
    /// or a `Vec<Value>` for positional ones.
    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.params.extend(params.into());
        self
    }

    pub fn statement(&self) -> &S {
        &self.statement
    }
}

impl<M: Record, S: Executable + Clone> Query<'_, M, S> {
    /// Every row.
    pub fn all(&self) -> Result<Vec<S::Output>> {
        self.run(&self.statement)
    }

    /// The first row, or `None` when there are none.
    pub fn first(&self) -> Result<Option<S::Output>> {
        M::with_session(self.registry, |session| {
            Ok(session.exec_first(&self.statement, &self.params)?)
        })
    }

    /// Number of rows the statement yields, computed by the database.
    pub fn count(&self) -> Result<i64> {
        let counted = self.run(&Count::new(self.statement.clone()))?;
        Ok(counted.into_iter().next().unwrap_or(0))
    }

    /// Every row decoded as `T`, usually a tuple.
    pub fn all_as<T: FromRow>(&self) -> Result<Vec<T>> {
        self.run(&Mapped::<S, T>::new(self.statement.clone()))
    }

    /// The first row decoded as `T`.
    pub fn first_as<T: FromRow>(&self) -> Result<Option<T>> {
        let mapped = Mapped::<S, T>::new(self.statement.clone());
        M::with_session(self.registry, |session| {
            Ok(session.exec_first(&mapped, &self.params)?)
        })
    }

    fn run<E: Executable>(&self, statement: &E) -> Result<Vec<E::Output>> {
        M::with_session(self.registry, |session| {
            Ok(session.exec(statement, &self.params)?)
        })
    }
}

impl<M: Record, S: Clone> Clone for Query<'_, M, S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            statement: self.statement.clone(),
            params: self.params.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: Record, S: fmt::Debug> fmt::Debug for Query<'_, M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &M::TABLE_NAME)
            .field("scope", &M::scope())
            .field("statement", &self.statement)
            .field("params", &self.params)
            .finish()
    }
}
