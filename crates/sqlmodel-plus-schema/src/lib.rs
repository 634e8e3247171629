//! Schema bootstrap for SQLModel Plus.
//!
//! This crate provides:
//! - `CREATE TABLE` generation from `Model` metadata ([`CreateTable`])
//! - Backend table options ([`CreateOptions`])
//! - A registry of tables created together ([`MetaData`])
//!
//! Migrations are out of scope: tables are created if missing and never
//! altered.

pub mod create;
pub mod metadata;

pub use create::{CreateOptions, CreateTable};
pub use metadata::MetaData;

use sqlmodel_plus_core::{Dialect, Engine, Model, Result};

/// Create the table (and indexes) of `M` on `engine`.
///
/// # Example
///
/// ```ignore
/// create_table::<Hero>(&engine, &CreateOptions::default())?;
/// ```
pub fn create_table<M: Model>(engine: &Engine, options: &CreateOptions) -> Result<()> {
    MetaData::new().with::<M>().create_all(engine, options)
}

/// Drop a table.
pub fn drop_table(engine: &Engine, table_name: &str, if_exists: bool) -> Result<()> {
    let sql = drop_table_sql(engine.dialect(), table_name, if_exists);
    engine.execute_raw(&sql)?;
    tracing::debug!(table = table_name, "dropped table");
    Ok(())
}

/// Generate DROP TABLE SQL.
///
/// This is the same SQL that `drop_table` would execute.
pub fn drop_table_sql(dialect: Dialect, table_name: &str, if_exists: bool) -> String {
    let exists = if if_exists { "IF EXISTS " } else { "" };
    format!(
        "DROP TABLE {}{}",
        exists,
        dialect.quote_identifier(table_name)
    )
}
