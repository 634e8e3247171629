//! Engine handle shared by sessions.
//!
//! An engine owns one connection, and a connection holds one transaction at
//! a time. The engine therefore hands the transaction to one thread at a
//! time: while a thread has a transaction open, statements and `begin` calls
//! from other threads wait until it commits or rolls back. A second `begin`
//! on the owning thread nests inside the open transaction as a savepoint.

use crate::Result;
use crate::connection::{Connection, Dialect, Params};
use crate::error::{Error, TransactionError, TransactionErrorKind};
use crate::row::Row;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Which thread owns the open transaction, and how deeply it is nested.
#[derive(Debug, Default)]
struct GateState {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Debug, Default)]
struct TransactionGate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl TransactionGate {
    /// Lock the gate once no other thread owns the transaction.
    fn enter(&self) -> MutexGuard<'_, GateState> {
        let me = thread::current().id();
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.released
            .wait_while(guard, |state| state.owner.is_some_and(|owner| owner != me))
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the gate for the owning thread, without waiting.
    fn enter_owned(&self, action: &str) -> Result<MutexGuard<'_, GateState>> {
        let me = thread::current().id();
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.owner {
            Some(owner) if owner == me => Ok(guard),
            Some(_) => Err(not_active(format!(
                "{action} from a thread that does not own the open transaction"
            ))),
            None => Err(not_active(format!("{action} without an open transaction"))),
        }
    }

    fn depth(&self) -> usize {
        let me = thread::current().id();
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.owner == Some(me) { guard.depth } else { 0 }
    }
}

fn not_active(message: String) -> Error {
    Error::Transaction(TransactionError {
        kind: TransactionErrorKind::NotActive,
        message,
    })
}

fn savepoint_name(depth: usize) -> String {
    format!("sqlmodel_plus_sp{depth}")
}

/// A cheaply clonable handle to a database backend.
///
/// Every session opened on an engine shares its connection. With `echo`
/// enabled each statement is logged at `info` level instead of `debug`.
#[derive(Clone)]
pub struct Engine {
    url: Arc<str>,
    conn: Arc<dyn Connection>,
    gate: Arc<TransactionGate>,
    echo: bool,
}

impl Engine {
    /// Wrap a connection under the URL it was opened from.
    pub fn new(url: impl Into<Arc<str>>, conn: Arc<dyn Connection>) -> Self {
        Self {
            url: url.into(),
            conn,
            gate: Arc::default(),
            echo: false,
        }
    }

    /// Enable or disable statement echo.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    /// The underlying connection.
    ///
    /// Statements issued on it directly bypass the transaction gate.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Whether two handles share the same backend connection.
    pub fn same_backend(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    fn log_sql(&self, sql: &str, params: &Params) {
        if self.echo {
            tracing::info!(url = %self.url, sql, "SQL");
        } else {
            tracing::debug!(sql, "SQL");
        }
        if !params.is_empty() {
            tracing::trace!(?params, "bind parameters");
        }
    }

    pub fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let _turn = self.gate.enter();
        self.log_sql(sql, params);
        self.conn.query(sql, params)
    }

    pub fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
        let _turn = self.gate.enter();
        self.log_sql(sql, params);
        self.conn.execute(sql, params)
    }

    pub fn insert(&self, sql: &str, params: &Params) -> Result<i64> {
        let _turn = self.gate.enter();
        self.log_sql(sql, params);
        self.conn.insert(sql, params)
    }

    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let _turn = self.gate.enter();
        self.log_sql(sql, &Params::new());
        self.conn.execute_raw(sql)
    }

    /// Open a transaction for the calling thread, or a savepoint inside the
    /// one it already owns. Returns the new nesting depth, starting at 1.
    ///
    /// Waits while another thread owns a transaction.
    pub fn begin(&self) -> Result<usize> {
        let mut state = self.gate.enter();
        if state.depth == 0 {
            self.log_sql("BEGIN", &Params::new());
            self.conn.begin()?;
            state.owner = Some(thread::current().id());
        } else {
            let sql = format!("SAVEPOINT {}", savepoint_name(state.depth + 1));
            self.log_sql(&sql, &Params::new());
            self.conn.execute_raw(&sql)?;
        }
        state.depth += 1;
        Ok(state.depth)
    }

    /// Commit the innermost transaction level of the calling thread.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.gate.enter_owned("COMMIT")?;
        if state.depth > 1 {
            let sql = format!("RELEASE SAVEPOINT {}", savepoint_name(state.depth));
            self.log_sql(&sql, &Params::new());
            self.conn.execute_raw(&sql)?;
            state.depth -= 1;
            return Ok(());
        }
        self.log_sql("COMMIT", &Params::new());
        let result = self.conn.commit();
        self.release_if_finished(&mut state);
        result
    }

    /// Roll back the innermost transaction level of the calling thread.
    pub fn rollback(&self) -> Result<()> {
        let mut state = self.gate.enter_owned("ROLLBACK")?;
        if state.depth > 1 {
            let name = savepoint_name(state.depth);
            // the savepoint is gone either way once the outer level ends
            state.depth -= 1;
            let sql = format!("ROLLBACK TO SAVEPOINT {name}");
            self.log_sql(&sql, &Params::new());
            self.conn.execute_raw(&sql)?;
            let sql = format!("RELEASE SAVEPOINT {name}");
            self.log_sql(&sql, &Params::new());
            return self.conn.execute_raw(&sql);
        }
        self.log_sql("ROLLBACK", &Params::new());
        let result = self.conn.rollback();
        self.release_if_finished(&mut state);
        result
    }

    // A failed COMMIT can leave the transaction open; the owner keeps it
    // until a rollback ends it.
    fn release_if_finished(&self, state: &mut GateState) {
        if !self.conn.in_transaction() {
            state.owner = None;
            state.depth = 0;
            self.gate.released.notify_all();
        }
    }

    /// Whether the connection has a transaction open, owned by any thread.
    pub fn in_transaction(&self) -> bool {
        self.conn.in_transaction()
    }

    /// Nesting depth of the calling thread's transaction, 0 when it owns none.
    pub fn transaction_depth(&self) -> usize {
        self.gate.depth()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("url", &self.url)
            .field("dialect", &self.dialect())
            .field("echo", &self.echo)
            .finish_non_exhaustive()
    }
}
