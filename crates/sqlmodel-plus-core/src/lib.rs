//! Core types and traits for SQLModel Plus.
//!
//! This crate provides the foundational abstractions shared by the other
//! crates in the workspace:
//!
//! - `Model` trait for ORM-style struct mapping
//! - `Value` and `Row` for dynamically typed data
//! - `Connection` trait and the `Engine` handle built on it
//! - `Identity` for primary key lookups
//! - `Error` for everything that can go wrong below the facade

pub mod connection;
pub mod engine;
pub mod error;
pub mod field;
pub mod identity;
pub mod model;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, Dialect, Params};
pub use engine::Engine;
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind, Result,
    SchemaError, TransactionError, TransactionErrorKind, TypeError,
};
pub use field::FieldInfo;
pub use identity::Identity;
pub use model::Model;
pub use row::{ColumnInfo, FromRow, FromValue, Row};
pub use types::SqlType;
pub use value::Value;
