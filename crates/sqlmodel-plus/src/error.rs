//! Errors raised by the facade.

use thiserror::Error;

/// Error type for facade operations.
///
/// Failures below the facade are carried unchanged in
/// [`Error::Database`]; the facade only adds the configuration errors it
/// detects itself.
#[derive(Debug, Error)]
pub enum Error {
    /// No engine is registered for the scope a record type resolved to.
    #[error("no engine bound to scope '{scope}': call set_engine for this scope before using it")]
    EngineNotSet { scope: String },

    /// The engine registry lock was poisoned by a panicking writer.
    #[error("engine registry lock poisoned")]
    RegistryPoisoned,

    /// Error from the ORM or engine layer.
    #[error(transparent)]
    Database(#[from] sqlmodel_plus_core::Error),
}

impl Error {
    /// Whether this is a unique or primary key violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::Database(e) if e.is_unique_violation())
    }

    /// Whether the record type's scope had no engine bound.
    pub fn is_engine_not_set(&self) -> bool {
        matches!(self, Error::EngineNotSet { .. })
    }

    /// The underlying ORM error, if any.
    pub fn as_database(&self) -> Option<&sqlmodel_plus_core::Error> {
        match self {
            Error::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;
