//! Low-level bindings to libsqlite3.
//!
//! The C API comes from `libsqlite3-sys`; this module narrows it to what the
//! driver uses and adds the few helpers the bindings lack.

use std::ffi::{CStr, c_int};

pub use libsqlite3_sys::{
    SQLITE_AUTH, SQLITE_BLOB, SQLITE_BUSY, SQLITE_CONSTRAINT, SQLITE_DONE, SQLITE_FLOAT,
    SQLITE_INTEGER, SQLITE_INTERRUPT, SQLITE_LOCKED, SQLITE_NOTFOUND, SQLITE_NULL, SQLITE_OK,
    SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_READONLY,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_PERM, SQLITE_RANGE, SQLITE_READONLY,
    SQLITE_ROW, SQLITE_TEXT, SQLITE_TOOBIG, SQLITE_TRANSIENT, sqlite3, sqlite3_bind_blob,
    sqlite3_bind_double, sqlite3_bind_int, sqlite3_bind_int64, sqlite3_bind_null,
    sqlite3_bind_parameter_count, sqlite3_bind_parameter_index, sqlite3_bind_text,
    sqlite3_busy_timeout, sqlite3_changes, sqlite3_close, sqlite3_column_blob,
    sqlite3_column_bytes, sqlite3_column_count, sqlite3_column_double, sqlite3_column_int64,
    sqlite3_column_name, sqlite3_column_text, sqlite3_column_type, sqlite3_errmsg, sqlite3_errstr,
    sqlite3_exec, sqlite3_extended_errcode, sqlite3_extended_result_codes, sqlite3_finalize,
    sqlite3_free, sqlite3_get_autocommit, sqlite3_last_insert_rowid, sqlite3_libversion,
    sqlite3_libversion_number, sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};

// Missing from the generated bindings; the bundled library exports it.
unsafe extern "C" {
    pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

// Extended constraint codes, see https://sqlite.org/rescode.html
pub const SQLITE_CONSTRAINT_PRIMARYKEY: c_int = SQLITE_CONSTRAINT | (6 << 8);
pub const SQLITE_CONSTRAINT_UNIQUE: c_int = SQLITE_CONSTRAINT | (8 << 8);

/// Get the SQLite library version as a string.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static string
    unsafe {
        let ptr = sqlite3_libversion();
        CStr::from_ptr(ptr).to_str().unwrap_or("unknown")
    }
}

/// Get the SQLite library version as a number.
pub fn version_number() -> i32 {
    // SAFETY: sqlite3_libversion_number is always safe to call
    unsafe { sqlite3_libversion_number() }
}

/// Convert an SQLite result code to a human-readable string.
pub fn error_string(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a static string for any code
    unsafe {
        let ptr = sqlite3_errstr(code);
        if ptr.is_null() {
            return format!("sqlite error {}", code);
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Read the message of the most recent failure on `db`.
///
/// # Safety
/// `db` must be a valid, open database handle.
pub unsafe fn last_error_message(db: *mut sqlite3) -> String {
    // SAFETY: caller guarantees db is valid; errmsg returns a valid C string
    unsafe {
        let ptr = sqlite3_errmsg(db);
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = version();
        assert!(v.starts_with('3'));
        assert!(version_number() >= 3_000_000);
    }

    #[test]
    fn test_error_string() {
        assert_eq!(error_string(SQLITE_OK), "not an error");
        assert!(!error_string(SQLITE_CONSTRAINT).is_empty());
    }

    #[test]
    fn test_open_and_close_v2() {
        let mut db: *mut sqlite3 = std::ptr::null_mut();
        let path = c":memory:";
        // SAFETY: valid out-pointer and NUL-terminated path
        let rc = unsafe {
            sqlite3_open_v2(
                path.as_ptr(),
                &raw mut db,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                std::ptr::null(),
            )
        };
        assert_eq!(rc, SQLITE_OK);
        // SAFETY: db was opened above and is closed once
        assert_eq!(unsafe { sqlite3_close_v2(db) }, SQLITE_OK);
    }

    #[test]
    fn test_extended_constraint_codes() {
        assert_eq!(SQLITE_CONSTRAINT_PRIMARYKEY, 1555);
        assert_eq!(SQLITE_CONSTRAINT_UNIQUE, 2067);
    }
}
