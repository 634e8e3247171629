//! Registry of model tables for bulk creation.

use crate::create::{CreateOptions, CreateTable};
use sqlmodel_plus_core::{Dialect, Engine, Model, Result};

type StatementsFn = fn(Dialect, &CreateOptions) -> Result<Vec<String>>;

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    name: &'static str,
    statements: StatementsFn,
}

/// A set of model tables created and dropped together.
///
/// Tables are created in registration order, so register referenced tables
/// before the tables whose foreign keys point at them.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    tables: Vec<TableEntry>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the table of `M`. Registering a table twice is a no-op.
    pub fn register<M: Model>(&mut self) -> &mut Self {
        if !self.contains(M::TABLE_NAME) {
            self.tables.push(TableEntry {
                name: M::TABLE_NAME,
                statements: |dialect, options| {
                    CreateTable::<M>::with_options(options.clone()).statements(dialect)
                },
            });
        }
        self
    }

    /// Builder form of [`MetaData::register`].
    pub fn with<M: Model>(mut self) -> Self {
        self.register::<M>();
        self
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }

    /// Registered table names in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|t| t.name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Every DDL statement `create_all` would run, in order.
    pub fn create_statements(
        &self,
        dialect: Dialect,
        options: &CreateOptions,
    ) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for table in &self.tables {
            out.extend((table.statements)(dialect, options)?);
        }
        Ok(out)
    }

    /// Create every registered table on `engine`.
    pub fn create_all(&self, engine: &Engine, options: &CreateOptions) -> Result<()> {
        for table in &self.tables {
            for sql in (table.statements)(engine.dialect(), options)? {
                engine.execute_raw(&sql)?;
            }
            tracing::debug!(table = table.name, url = engine.url(), "created table");
        }
        Ok(())
    }

    /// Drop every registered table, in reverse creation order.
    pub fn drop_all(&self, engine: &Engine) -> Result<()> {
        for table in self.tables.iter().rev() {
            crate::drop_table(engine, table.name, true)?;
        }
        Ok(())
    }
}
