//! SQLModel Plus - ActiveRecord-style persistence on top of a small ORM.
//!
//! Model types gain verbs that each open one session, perform one ORM
//! operation, commit and release the session:
//!
//! - Per type: `set_engine`, `create_tables`, `find_by_id`, `query`,
//!   `select`, `session`, `with_session`
//! - Per instance: `create`, `update`, `save`, `insert_or_update`, `delete`
//! - Per query: `all`, `first`, `count`, `all_as`, `first_as`
//!
//! Engines are bound per scope in an [`EngineRegistry`] owned by the
//! caller. Types use the `"default"` scope unless they declare another.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlmodel_plus::prelude::*;
//!
//! #[derive(Model, Record, Debug, Clone, PartialEq)]
//! struct Hero {
//!     id: Option<i64>,
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! fn main() -> sqlmodel_plus::Result<()> {
//!     let registry = EngineRegistry::new();
//!     Hero::set_engine(&registry, create_engine("sqlite://")?)?;
//!     Hero::create_tables(&registry, &CreateOptions::default())?;
//!
//!     let mut hero = Hero { id: None, name: "Deadpond".into(), age: None }
//!         .create(&registry)?;
//!     hero.age = Some(48);
//!     hero.save(&registry)?;
//!
//!     let adults = Hero::query(&registry, Hero::select().filter(Expr::col("age").gt(18)))
//!         .all()?;
//!     let first_id = Hero::query(&registry, "SELECT id FROM hero WHERE id = :id")
//!         .params(params! { "id" => 1 })
//!         .first_as::<(i64,)>()?;
//!     Ok(())
//! }
//! ```
//!
//! A type declares its scope with `#[sqlmodel(scope = "analytics")]`.

extern crate self as sqlmodel_plus;

pub mod error;
pub mod query;
pub mod record;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use query::Query;
pub use record::Record;
pub use registry::{DEFAULT_SCOPE, EngineRegistry};
pub use session::SessionScope;

pub use sqlmodel_plus_core::Error as DatabaseError;
pub use sqlmodel_plus_core::{
    Engine, FieldInfo, FromRow, FromValue, Identity, Model, Params, QueryErrorKind, Row, SqlType,
    Value, params,
};
pub use sqlmodel_plus_query::{
    Executable, Expr, IntoStatement, OrderBy, OrderDirection, Select, TextClause, select, text,
};
pub use sqlmodel_plus_schema::{CreateOptions, MetaData, drop_table};
pub use sqlmodel_plus_session::Session;
pub use sqlmodel_plus_sqlite::{SqliteConfig, create_engine, create_engine_with};

/// Derive macros. Each shares its name with the trait it implements.
pub use sqlmodel_plus_macros::{Model, Record};

/// Everything needed to define records and use their verbs.
pub mod prelude {
    pub use crate::{
        CreateOptions, Engine, EngineRegistry, Error, Expr, Identity, MetaData, Model, OrderBy,
        Params, Query, Record, Result, Row, Select, Session, SessionScope, Value, create_engine,
        params, select, text,
    };
}
