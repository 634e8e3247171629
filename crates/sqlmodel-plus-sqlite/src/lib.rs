//! SQLite engine for SQLModel Plus.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate implements the `Connection` trait from sqlmodel-plus-core on
//! top of libsqlite3 and turns `sqlite://` URLs into [`Engine`] handles.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlmodel_plus_sqlite::create_engine;
//! use sqlmodel_plus_core::params;
//!
//! let engine = create_engine("sqlite:///:memory:")?;
//! engine.execute_raw("CREATE TABLE hero (id INTEGER PRIMARY KEY, name TEXT)")?;
//! let id = engine.insert("INSERT INTO hero (name) VALUES (:name)", &params! { "name" => "Deadpond" })?;
//! ```
//!
//! # Type Mapping
//!
//! | Rust Type | SQLite Type |
//! |-----------|-------------|
//! | `bool` | INTEGER (0/1) |
//! | `i8` .. `i64` | INTEGER |
//! | `f32`, `f64` | REAL |
//! | `String` | TEXT |
//! | `Vec<u8>` | BLOB |
//! | `serde_json::Value` | TEXT |
//! | `Option<T>` | NULL or T |

pub mod connection;
pub mod engine;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use engine::{SqliteUrl, create_engine, create_engine_with};

#[doc(no_inline)]
pub use sqlmodel_plus_core::Engine;

/// The SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}
