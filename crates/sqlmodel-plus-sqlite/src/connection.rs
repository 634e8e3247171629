//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing the `Connection` trait
//! from sqlmodel-plus-core.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]
#![allow(clippy::if_not_else)]

use crate::ffi;
use crate::types;
use sqlmodel_plus_core::{
    Connection, ConnectionError, ConnectionErrorKind, Dialect, Error, Params, QueryError,
    QueryErrorKind, Result, Row, TransactionError, TransactionErrorKind, row::ColumnInfo,
};
use std::ffi::{CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Whether this config names a private in-memory database.
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:" || self.path.is_empty()
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only touched while holding the connection mutex.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// All calls are serialized through an internal mutex, so one connection can
/// be shared by every session of an engine.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::InvalidPath,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if !db.is_null() {
                // SAFETY: db is non-null; it must be closed even on failure
                unsafe {
                    let msg = ffi::last_error_message(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            } else {
                ffi::error_string(rc)
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database '{}': {}", config.path, msg),
                source: None,
            }));
        }

        // SAFETY: db is valid
        unsafe {
            ffi::sqlite3_extended_result_codes(db, 1);
            if config.busy_timeout_ms > 0 {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "opened sqlite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    // A panic while holding the lock leaves the handle itself intact.
    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute SQL directly without preparing (for DDL, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        exec(inner.db, sql)
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> i32 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_changes(inner.db) }
    }

    /// Prepare and execute a query, returning all rows.
    fn query_sync(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let inner = self.lock();
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind(params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: i is within the column count
            let name =
                unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
            match rc {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: we just got SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt.raw, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }

        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected and the
    /// last inserted rowid, both read under the same lock.
    fn execute_sync(&self, sql: &str, params: &Params) -> Result<(u64, i64)> {
        let inner = self.lock();
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind(params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let (changes, rowid) = unsafe {
                    (
                        ffi::sqlite3_changes(inner.db),
                        ffi::sqlite3_last_insert_rowid(inner.db),
                    )
                };
                Ok((u64::try_from(changes).unwrap_or(0), rowid))
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn in_transaction_sync(&self) -> bool {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_get_autocommit(inner.db) == 0 }
    }

    fn begin_sync(&self) -> Result<()> {
        let inner = self.lock();
        // SAFETY: db is valid
        if unsafe { ffi::sqlite3_get_autocommit(inner.db) } == 0 {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                message: "Already in a transaction".to_string(),
            }));
        }
        exec(inner.db, "BEGIN")
    }

    fn finish_sync(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        // SAFETY: db is valid
        if unsafe { ffi::sqlite3_get_autocommit(inner.db) } != 0 {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: format!("{} without an open transaction", sql),
            }));
        }
        exec(inner.db, sql)
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statements outlive their call
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
        }
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.query_sync(sql, params)
    }

    fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
        self.execute_sync(sql, params).map(|(changes, _)| changes)
    }

    fn insert(&self, sql: &str, params: &Params) -> Result<i64> {
        self.execute_sync(sql, params).map(|(_, rowid)| rowid)
    }

    fn execute_raw(&self, sql: &str) -> Result<()> {
        SqliteConnection::execute_raw(self, sql)
    }

    fn begin(&self) -> Result<()> {
        self.begin_sync()
    }

    fn commit(&self) -> Result<()> {
        self.finish_sync("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.finish_sync("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction_sync()
    }
}

/// A prepared statement, finalized on drop.
struct Statement {
    db: *mut ffi::sqlite3,
    raw: *mut ffi::sqlite3_stmt,
    sql: String,
}

impl Statement {
    fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self> {
        let c_sql = CString::new(sql).map_err(|_| {
            Error::Query(
                QueryError::new(QueryErrorKind::Syntax, "SQL contains null byte").with_sql(sql),
            )
        })?;

        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut raw,
                ptr::null_mut(),
            )
        };

        if rc != ffi::SQLITE_OK {
            return Err(step_error(db, sql));
        }
        if raw.is_null() {
            return Err(Error::Query(
                QueryError::new(QueryErrorKind::Syntax, "empty SQL statement").with_sql(sql),
            ));
        }

        Ok(Self {
            db,
            raw,
            sql: sql.to_string(),
        })
    }

    /// Bind positional values to `?N` and named values to `:name`
    /// (`@name` and `$name` are accepted too).
    ///
    /// Named values the statement does not reference are skipped.
    fn bind(&self, params: &Params) -> Result<()> {
        // SAFETY: stmt is valid
        let expected = unsafe { ffi::sqlite3_bind_parameter_count(self.raw) };
        let given = params.positional().len();
        if given > expected as usize {
            return Err(Error::Query(
                QueryError::new(
                    QueryErrorKind::Binding,
                    format!(
                        "statement takes {} parameters, {} positional values given",
                        expected, given
                    ),
                )
                .with_sql(&self.sql),
            ));
        }

        for (i, value) in params.positional().iter().enumerate() {
            let index = (i + 1) as c_int;
            // SAFETY: stmt is valid, index is 1-based and within range
            let rc = unsafe { types::bind_value(self.raw, index, value) };
            if rc != ffi::SQLITE_OK {
                return Err(self.bind_error(&index.to_string()));
            }
        }

        for (name, value) in params.named() {
            let Some(index) = self.parameter_index(name) else {
                tracing::trace!(name = %name, "named parameter not referenced by statement");
                continue;
            };
            // SAFETY: stmt is valid, index came from SQLite
            let rc = unsafe { types::bind_value(self.raw, index, value) };
            if rc != ffi::SQLITE_OK {
                return Err(self.bind_error(name));
            }
        }

        Ok(())
    }

    fn parameter_index(&self, name: &str) -> Option<c_int> {
        [':', '@', '$'].iter().find_map(|prefix| {
            let c_name = CString::new(format!("{}{}", prefix, name)).ok()?;
            // SAFETY: stmt and c_name are valid
            let index = unsafe { ffi::sqlite3_bind_parameter_index(self.raw, c_name.as_ptr()) };
            (index > 0).then_some(index)
        })
    }

    fn bind_error(&self, param: &str) -> Error {
        // SAFETY: db is valid
        let msg = unsafe { ffi::last_error_message(self.db) };
        Error::Query(
            QueryError::new(
                QueryErrorKind::Binding,
                format!("Failed to bind parameter {}: {}", param, msg),
            )
            .with_sql(&self.sql),
        )
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw came from a successful prepare and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

fn exec(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql).map_err(|_| {
        Error::Query(QueryError::new(QueryErrorKind::Syntax, "SQL contains null byte").with_sql(sql))
    })?;

    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc != ffi::SQLITE_OK {
        let msg = if !errmsg.is_null() {
            // SAFETY: errmsg was allocated by SQLite and is freed exactly once
            unsafe {
                let msg = std::ffi::CStr::from_ptr(errmsg)
                    .to_string_lossy()
                    .into_owned();
                ffi::sqlite3_free(errmsg.cast());
                msg
            }
        } else {
            ffi::error_string(rc)
        };
        // SAFETY: db is valid
        let code = unsafe { ffi::sqlite3_extended_errcode(db) };

        return Err(Error::Query(
            QueryError::new(error_code_to_kind(code), msg)
                .with_sql(sql)
                .with_code(code),
        ));
    }

    Ok(())
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe {
        (
            ffi::last_error_message(db),
            ffi::sqlite3_extended_errcode(db),
        )
    };

    Error::Query(
        QueryError::new(error_code_to_kind(code), msg)
            .with_sql(sql)
            .with_code(code),
    )
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
            QueryErrorKind::UniqueViolation
        }
        _ => match code & 0xff {
            ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
            ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
            ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => {
                QueryErrorKind::Permission
            }
            ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
            ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
            ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
            ffi::SQLITE_RANGE => QueryErrorKind::Binding,
            _ => QueryErrorKind::Database,
        },
    }
}
