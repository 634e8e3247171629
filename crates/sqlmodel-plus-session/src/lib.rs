//! Session and unit of work for SQLModel Plus.
//!
//! `sqlmodel-plus-session` is the **unit-of-work layer**. A [`Session`]
//! tracks the objects it has loaded or been handed, records inserts, updates
//! and deletes, and writes them in one transaction when flushed.
//!
//! - **Identity map**: one tracked copy per primary key and model type.
//! - **Change tracking**: writes are scheduled and only reach the database
//!   on [`Session::flush`] or [`Session::commit`].
//! - **Transactional safety**: the first flush begins a transaction; dropping
//!   a session without committing rolls it back. Sessions on other threads
//!   wait for it; a session opened on the same thread nests as a savepoint.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(&engine);
//!
//! // Scheduled for INSERT
//! let key = session.add(&hero);
//!
//! // Get by primary key (identity map first)
//! let other = session.get::<Hero>(1)?;
//!
//! // Mark for deletion
//! session.delete(&villain)?;
//!
//! // DELETE, INSERT, UPDATE, then COMMIT
//! session.commit()?;
//! let saved: Hero = session.object(&key).unwrap();
//! ```

pub mod flush;
pub mod identity_map;

pub use identity_map::{ObjectKey, ObjectState};

use identity_map::TrackedObject;
use sqlmodel_plus_core::{
    Engine, Error, Identity, Model, Params, QueryError, QueryErrorKind, Result, Row,
    TransactionError, TransactionErrorKind, Value,
};
use sqlmodel_plus_query::Executable;
use std::collections::HashMap;
use std::fmt;

/// A unit of work over one [`Engine`].
pub struct Session {
    engine: Engine,
    /// Nesting depth of the engine transaction this session began.
    transaction: Option<usize>,
    identity_map: HashMap<ObjectKey, TrackedObject>,
    pending_new: Vec<ObjectKey>,
    pending_dirty: Vec<ObjectKey>,
    pending_delete: Vec<ObjectKey>,
    /// Keys handed out for new objects, mapped to their keys after INSERT.
    rekeyed: HashMap<ObjectKey, ObjectKey>,
    next_transient: u64,
}

impl Session {
    /// Open a session on an engine. No transaction is started until the
    /// first flush.
    pub fn new(engine: &Engine) -> Self {
        tracing::debug!(url = engine.url(), "session opened");
        Self {
            engine: engine.clone(),
            transaction: None,
            identity_map: HashMap::new(),
            pending_new: Vec::new(),
            pending_dirty: Vec::new(),
            pending_delete: Vec::new(),
            rekeyed: HashMap::new(),
            next_transient: 0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Whether this session holds an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Whether any writes are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        !(self.pending_new.is_empty()
            && self.pending_dirty.is_empty()
            && self.pending_delete.is_empty())
    }

    /// Whether an object with this primary key is tracked.
    pub fn contains<M: Model>(&self, obj: &M) -> bool {
        obj.has_primary_key() && self.identity_map.contains_key(&ObjectKey::from_model(obj))
    }

    /// Current tracked copy of an object returned by [`Session::add`].
    ///
    /// After a flush the copy carries any generated primary key.
    pub fn object<M: Model + Clone>(&self, key: &ObjectKey) -> Option<M> {
        let key = self.rekeyed.get(key).unwrap_or(key);
        self.identity_map
            .get(key)
            .and_then(|tracked| tracked.get::<M>())
    }

    /// Get an object by primary key, from the identity map when tracked.
    ///
    /// Returns `Ok(None)` when no row has that key or the tracked object is
    /// scheduled for deletion.
    #[tracing::instrument(level = "debug", skip(self, identity), fields(table = M::TABLE_NAME))]
    pub fn get<M: Model + Clone>(&mut self, identity: impl Into<Identity>) -> Result<Option<M>> {
        let pk = identity.into().resolve(M::PRIMARY_KEY)?;
        let key = ObjectKey::from_pk::<M>(&pk);

        if let Some(tracked) = self.identity_map.get(&key) {
            tracing::trace!("identity map hit");
            return Ok(match tracked.state {
                ObjectState::Deleted => None,
                ObjectState::New | ObjectState::Persistent => tracked.get::<M>(),
            });
        }

        self.load(&pk)
    }

    /// Schedule an object for writing.
    ///
    /// Objects without a complete primary key, and keys the session has not
    /// seen, are INSERTed. A key already tracked as persistent is UPDATEd.
    /// Returns the key to pass to [`Session::object`].
    pub fn add<M: Model + Clone>(&mut self, obj: &M) -> ObjectKey {
        if !obj.has_primary_key() {
            self.next_transient += 1;
            let key = ObjectKey::transient::<M>(self.next_transient);
            self.identity_map
                .insert(key.clone(), TrackedObject::new(obj, ObjectState::New));
            self.pending_new.push(key.clone());
            tracing::trace!(table = M::TABLE_NAME, "scheduled insert");
            return key;
        }

        let key = ObjectKey::from_model(obj);
        let state = self.identity_map.get_mut(&key).map(|tracked| {
            tracked.replace(obj);
            tracked.state
        });

        match state {
            None => {
                self.identity_map
                    .insert(key.clone(), TrackedObject::new(obj, ObjectState::New));
                self.pending_new.push(key.clone());
                tracing::trace!(table = M::TABLE_NAME, "scheduled insert");
            }
            Some(ObjectState::New) => {}
            Some(ObjectState::Persistent) => self.schedule_update(&key),
            Some(ObjectState::Deleted) => {
                if let Some(tracked) = self.identity_map.get_mut(&key) {
                    tracked.state = ObjectState::Persistent;
                }
                self.pending_delete.retain(|k| *k != key);
                self.schedule_update(&key);
            }
        }
        key
    }

    /// Copy an object's state onto the row with the same primary key.
    ///
    /// The row is loaded when the session does not track it yet; an
    /// existing row is scheduled for UPDATE, a missing one for INSERT.
    #[tracing::instrument(level = "debug", skip(self, obj), fields(table = M::TABLE_NAME))]
    pub fn merge<M: Model + Clone>(&mut self, obj: M) -> Result<M> {
        if obj.has_primary_key() {
            let key = ObjectKey::from_model(&obj);
            if !self.identity_map.contains_key(&key) {
                self.load::<M>(&obj.primary_key_value())?;
            }
        }
        self.add(&obj);
        Ok(obj)
    }

    /// Schedule the row with this object's primary key for DELETE.
    ///
    /// An object still waiting for its INSERT is simply forgotten.
    pub fn delete<M: Model + Clone>(&mut self, obj: &M) -> Result<()> {
        if !obj.has_primary_key() {
            return Err(Error::config(format!(
                "cannot delete from {} without a primary key",
                M::TABLE_NAME
            )));
        }

        let key = ObjectKey::from_model(obj);
        match self.identity_map.get_mut(&key) {
            Some(tracked) => match tracked.state {
                ObjectState::New => {
                    self.identity_map.remove(&key);
                    self.pending_new.retain(|k| *k != key);
                }
                ObjectState::Persistent => {
                    tracked.state = ObjectState::Deleted;
                    self.pending_dirty.retain(|k| *k != key);
                    self.pending_delete.push(key);
                }
                ObjectState::Deleted => {}
            },
            None => {
                self.identity_map
                    .insert(key.clone(), TrackedObject::new(obj, ObjectState::Deleted));
                self.pending_delete.push(key);
            }
        }
        tracing::trace!(table = M::TABLE_NAME, "scheduled delete");
        Ok(())
    }

    /// Write pending changes: DELETEs, then INSERTs, then UPDATEs.
    ///
    /// Begins a transaction first if this session has none open. On error
    /// the statements not yet executed stay pending.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn flush(&mut self) -> Result<()> {
        if !self.has_pending() {
            return Ok(());
        }
        self.begin_if_needed()?;
        let dialect = self.engine.dialect();

        tracing::debug!(
            deletes = self.pending_delete.len(),
            inserts = self.pending_new.len(),
            updates = self.pending_dirty.len(),
            "flushing"
        );

        let deletes = std::mem::take(&mut self.pending_delete);
        for (i, key) in deletes.iter().enumerate() {
            let Some(tracked) = self.identity_map.get(key) else {
                continue;
            };
            let table = tracked.table_name;
            let (sql, params) =
                flush::delete_statement(dialect, table, tracked.pk_columns, &tracked.pk_values());
            match self.engine.execute(&sql, &params) {
                Ok(0) => tracing::warn!(table, "DELETE matched no rows"),
                Ok(_) => {}
                Err(e) => {
                    self.pending_delete = deletes[i..].to_vec();
                    return Err(e);
                }
            }
            self.identity_map.remove(key);
        }

        let inserts = std::mem::take(&mut self.pending_new);
        for (i, key) in inserts.iter().enumerate() {
            let Some(tracked) = self.identity_map.get_mut(key) else {
                continue;
            };
            if tracked.state != ObjectState::New {
                continue;
            }
            let (sql, params) =
                flush::insert_statement(dialect, tracked.table_name, tracked.fields, &tracked.values);
            let rowid = match self.engine.insert(&sql, &params) {
                Ok(rowid) => rowid,
                Err(e) => {
                    self.pending_new = inserts[i..].to_vec();
                    return Err(e);
                }
            };
            if key.is_transient() {
                tracked.apply_generated_id(rowid);
            }
            tracked.mark_persistent();
            tracing::trace!(table = tracked.table_name, rowid, "inserted");

            if key.is_transient() {
                let persistent = key.with_pk(&tracked.pk_values());
                if let Some(tracked) = self.identity_map.remove(key) {
                    self.identity_map.insert(persistent.clone(), tracked);
                }
                self.rekeyed.insert(key.clone(), persistent);
            }
        }

        let updates = std::mem::take(&mut self.pending_dirty);
        for (i, key) in updates.iter().enumerate() {
            let Some(tracked) = self.identity_map.get_mut(key) else {
                continue;
            };
            if tracked.state != ObjectState::Persistent || !tracked.is_dirty() {
                continue;
            }
            let Some((sql, params)) =
                flush::update_statement(dialect, tracked.table_name, tracked.pk_columns, &tracked.values)
            else {
                tracked.mark_persistent();
                continue;
            };
            match self.engine.execute(&sql, &params) {
                Ok(0) => {
                    let message = format!("UPDATE of {} matched no rows", tracked.table_name);
                    self.pending_dirty = updates[i..].to_vec();
                    return Err(QueryError::new(QueryErrorKind::NotFound, message)
                        .with_sql(sql)
                        .into());
                }
                Ok(_) => tracked.mark_persistent(),
                Err(e) => {
                    self.pending_dirty = updates[i..].to_vec();
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Flush pending changes and commit the transaction.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(depth) = self.transaction {
            self.check_innermost(depth)?;
            self.engine.commit()?;
            self.transaction = None;
            tracing::debug!(depth, "transaction committed");
        }
        Ok(())
    }

    /// Discard pending changes, forget every tracked object and roll back
    /// the open transaction.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&mut self) -> Result<()> {
        self.pending_new.clear();
        self.pending_dirty.clear();
        self.pending_delete.clear();
        self.identity_map.clear();
        self.rekeyed.clear();
        self.end_transaction()
    }

    /// Drop the tracked copy of an object and re-read its row.
    ///
    /// Pending writes for that key are discarded.
    pub fn refresh<M: Model + Clone>(&mut self, obj: &M) -> Result<Option<M>> {
        if !obj.has_primary_key() {
            return Err(Error::config(format!(
                "cannot refresh a {} row without a primary key",
                M::TABLE_NAME
            )));
        }
        self.forget(&ObjectKey::from_model(obj));
        self.load(&obj.primary_key_value())
    }

    /// Execute a statement and decode every row.
    ///
    /// Pending changes are flushed first so the statement sees them.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn exec<S: Executable>(&mut self, statement: &S, params: &Params) -> Result<Vec<S::Output>> {
        let rows = self.fetch(statement, params)?;
        rows.iter().map(S::decode).collect()
    }

    /// Execute a statement and decode its first row, if any.
    ///
    /// Rows after the first are never decoded.
    pub fn exec_first<S: Executable>(
        &mut self,
        statement: &S,
        params: &Params,
    ) -> Result<Option<S::Output>> {
        let rows = self.fetch(statement, params)?;
        rows.first().map(S::decode).transpose()
    }

    /// Close the session, rolling back anything left uncommitted.
    pub fn close(mut self) -> Result<()> {
        self.end_transaction()?;
        tracing::debug!("session closed");
        Ok(())
    }

    fn fetch<S: Executable>(&mut self, statement: &S, params: &Params) -> Result<Vec<Row>> {
        self.flush()?;
        let (sql, bound) = statement.compile(self.engine.dialect(), params)?;
        let rows = self.engine.query(&sql, &bound)?;
        tracing::trace!(rows = rows.len(), "fetched");
        Ok(rows)
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if self.transaction.is_none() {
            let depth = self.engine.begin()?;
            self.transaction = Some(depth);
            tracing::debug!(depth, "transaction started");
        }
        Ok(())
    }

    /// Roll back this session's transaction level, if it has one.
    fn end_transaction(&mut self) -> Result<()> {
        let Some(depth) = self.transaction else {
            return Ok(());
        };
        self.check_innermost(depth)?;
        self.transaction = None;
        self.engine.rollback()
    }

    // Levels end in the reverse order they began.
    fn check_innermost(&self, depth: usize) -> Result<()> {
        if self.engine.transaction_depth() == depth {
            return Ok(());
        }
        Err(Error::Transaction(TransactionError {
            kind: TransactionErrorKind::AlreadyActive,
            message: format!(
                "a session nested inside this one is still open (level {})",
                self.engine.transaction_depth()
            ),
        }))
    }

    fn schedule_update(&mut self, key: &ObjectKey) {
        if !self.pending_dirty.contains(key) {
            self.pending_dirty.push(key.clone());
        }
    }

    fn forget(&mut self, key: &ObjectKey) {
        self.identity_map.remove(key);
        self.pending_new.retain(|k| k != key);
        self.pending_dirty.retain(|k| k != key);
        self.pending_delete.retain(|k| k != key);
    }

    fn load<M: Model + Clone>(&mut self, pk: &[Value]) -> Result<Option<M>> {
        let (sql, params) =
            flush::select_by_key(self.engine.dialect(), M::TABLE_NAME, M::PRIMARY_KEY, pk);
        let rows = self.engine.query(&sql, &params)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let obj = M::from_row(row)?;
        self.identity_map.insert(
            ObjectKey::from_model(&obj),
            TrackedObject::new(&obj, ObjectState::Persistent),
        );
        Ok(Some(obj))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            tracing::debug!("rolling back uncommitted session");
            if let Err(e) = self.end_transaction() {
                tracing::warn!(error = %e, "rollback on drop failed");
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("transaction", &self.transaction)
            .field("tracked", &self.identity_map.len())
            .field("pending_new", &self.pending_new.len())
            .field("pending_dirty", &self.pending_dirty.len())
            .field("pending_delete", &self.pending_delete.len())
            .finish()
    }
}
