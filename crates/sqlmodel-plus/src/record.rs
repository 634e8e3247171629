//! ActiveRecord-style verbs for model types.

use crate::error::Result;
use crate::query::Query;
use crate::registry::{DEFAULT_SCOPE, EngineRegistry};
use crate::session::SessionScope;
use sqlmodel_plus_core::{Engine, Identity, Model};
use sqlmodel_plus_query::{IntoStatement, Select};
use sqlmodel_plus_schema::{CreateOptions, MetaData, create_table};
use sqlmodel_plus_session::{ObjectKey, Session};

/// Persistence verbs for a [`Model`] bound to an engine scope.
///
/// Usually derived together with `Model`:
///
/// ```ignore
/// #[derive(Model, Record, Debug, Clone)]
/// struct Hero {
///     id: Option<i64>,
///     name: String,
/// }
///
/// let registry = EngineRegistry::new();
/// Hero::set_engine(&registry, create_engine("sqlite://")?)?;
/// Hero::create_tables(&registry, &CreateOptions::default())?;
///
/// let hero = Hero { id: None, name: "Deadpond".into() }.create(&registry)?;
/// let found = Hero::find_by_id(&registry, hero.id.unwrap())?;
/// ```
///
/// Every verb opens one session on the scope's engine, performs one ORM
/// operation, commits and releases the session. A scope without an engine
/// fails with [`Error::EngineNotSet`](crate::Error::EngineNotSet).
pub trait Record: Model + Clone {
    /// Engine scope this type persists through.
    const SCOPE: &'static str = DEFAULT_SCOPE;

    /// The resolved scope name.
    fn scope() -> &'static str {
        Self::SCOPE
    }

    /// Bind `engine` to this type's scope.
    fn set_engine(registry: &EngineRegistry, engine: Engine) -> Result<()> {
        registry.set_engine(Self::scope(), engine)
    }

    /// Open a session on this type's engine.
    fn session(registry: &EngineRegistry) -> Result<SessionScope> {
        let engine = registry.engine(Self::scope())?;
        Ok(SessionScope::new(Self::scope(), &engine))
    }

    /// Run `f` in a session: commit if it succeeds, roll back if it fails.
    ///
    /// The session is released before this returns either way.
    fn with_session<T, F>(registry: &EngineRegistry, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut scope = Self::session(registry)?;
        match f(&mut *scope) {
            Ok(value) => {
                scope.finish()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = scope.rollback() {
                    tracing::warn!(error = %rollback, "rollback after failed session");
                }
                Err(e)
            }
        }
    }

    /// Create this type's table on its scope's engine if it is missing.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn create_tables(registry: &EngineRegistry, options: &CreateOptions) -> Result<()> {
        let engine = registry.engine(Self::scope())?;
        create_table::<Self>(&engine, options)?;
        Ok(())
    }

    /// Create every table in `metadata` on this type's scope's engine.
    fn create_all(
        registry: &EngineRegistry,
        metadata: &MetaData,
        options: &CreateOptions,
    ) -> Result<()> {
        let engine = registry.engine(Self::scope())?;
        metadata.create_all(&engine, options)?;
        Ok(())
    }

    /// Look up a row by primary key.
    ///
    /// Accepts a scalar, a tuple or `Vec<Value>` for composite keys, or a
    /// map from key column to value. A missing row is `Ok(None)`.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn find_by_id(
        registry: &EngineRegistry,
        identity: impl Into<Identity>,
    ) -> Result<Option<Self>> {
        let identity = identity.into();
        Self::with_session(registry, |session| Ok(session.get::<Self>(identity)?))
    }

    /// Build a deferred query from a [`Select`], a [`TextClause`] or raw SQL.
    ///
    /// Nothing runs until an accessor such as [`Query::all`] is called.
    ///
    /// [`TextClause`]: sqlmodel_plus_query::TextClause
    fn query<S: IntoStatement>(
        registry: &EngineRegistry,
        statement: S,
    ) -> Query<'_, Self, S::Statement> {
        Query::new(registry, statement.into_statement())
    }

    /// `SELECT * FROM` this type's table.
    fn select() -> Select<Self> {
        Select::new()
    }

    /// Insert this instance and return it as stored, with generated keys
    /// and server defaults filled in.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn create(&self, registry: &EngineRegistry) -> Result<Self> {
        Self::with_session(registry, |session| {
            let key = session.add(self);
            stored(session, self, &key)
        })
    }

    /// Write this instance over the row with its primary key, inserting
    /// when no such row exists. Returns the instance as stored.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn update(&self, registry: &EngineRegistry) -> Result<Self> {
        Self::with_session(registry, |session| merged(session, self))
    }

    /// Update the row if this instance has a key that exists, otherwise
    /// insert it.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn save(&self, registry: &EngineRegistry) -> Result<Self> {
        Self::with_session(registry, |session| merged(session, self))
    }

    /// Try [`Record::create`]; on a unique or primary key violation fall
    /// back to [`Record::update`]. Any other error is returned as is.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn insert_or_update(&self, registry: &EngineRegistry) -> Result<Self> {
        match self.create(registry) {
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(error = %e, "row exists, updating instead");
                self.update(registry)
            }
            other => other,
        }
    }

    /// Delete the row with this instance's primary key and return the
    /// instance as it was. A missing row is not an error.
    #[tracing::instrument(level = "debug", skip_all, fields(table = Self::TABLE_NAME))]
    fn delete(&self, registry: &EngineRegistry) -> Result<Self> {
        Self::with_session(registry, |session| {
            session.delete(self)?;
            session.commit()?;
            Ok(())
        })?;
        Ok(self.clone())
    }
}

fn merged<M: Record>(session: &mut Session, obj: &M) -> Result<M> {
    if obj.is_new() {
        let key = session.add(obj);
        return stored(session, obj, &key);
    }
    session.merge(obj.clone())?;
    stored(session, obj, &ObjectKey::from_model(obj))
}

/// Commit, then re-read the row written for `key`.
fn stored<M: Record>(session: &mut Session, obj: &M, key: &ObjectKey) -> Result<M> {
    session.commit()?;
    let written = session.object::<M>(key).unwrap_or_else(|| obj.clone());
    if !written.has_primary_key() {
        return Ok(written);
    }
    Ok(session.refresh(&written)?.unwrap_or(written))
}
