//! Sessions handed out by record types.
//!
//! A [`SessionScope`] is an ORM [`Session`] tied to the scope whose engine
//! opened it. It dereferences to the session, so every session method is
//! available on it directly.
//!
//! ```ignore
//! let mut session = Hero::session(&registry)?;
//! let hero = session.get::<Hero>(1)?;
//! session.finish()?;
//! ```

use crate::error::Result;
use sqlmodel_plus_core::Engine;
use sqlmodel_plus_session::Session;
use std::ops::{Deref, DerefMut};

/// A session opened for one scope.
///
/// Dropping it without [`SessionScope::finish`] rolls back whatever the
/// session flushed.
#[derive(Debug)]
pub struct SessionScope {
    scope: &'static str,
    session: Session,
}

impl SessionScope {
    pub(crate) fn new(scope: &'static str, engine: &Engine) -> Self {
        Self {
            scope,
            session: Session::new(engine),
        }
    }

    /// Scope whose engine this session uses.
    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// Commit pending work and release the session.
    pub fn finish(mut self) -> Result<()> {
        self.session.commit()?;
        self.session.close()?;
        Ok(())
    }

    /// Release the session, discarding uncommitted work.
    pub fn close(self) -> Result<()> {
        self.session.close()?;
        Ok(())
    }

    pub fn into_inner(self) -> Session {
        self.session
    }
}

impl Deref for SessionScope {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionScope {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
