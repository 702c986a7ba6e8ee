//! Storage of sessions in the host application's key-value transport.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{IntentSession, SessionError, SessionField};

/// Key under which the serialized session is stored.
pub const SESSION_KEY: &str = "intent-session";

/// A key-value store scoped to one user attempt.
///
/// The host decides how values travel (signed cookie, server-side store, ...);
/// this crate only reads and writes strings.
pub trait SessionTransport {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key`.
    fn set(&mut self, key: &str, value: String);
    /// Removes `key`.
    fn remove(&mut self, key: &str);
}

/// In-memory [`SessionTransport`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    entries: HashMap<String, String>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionTransport for MemoryTransport {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

impl IntentSession {
    /// Loads the live session stored in `transport`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Incomplete`] when no session is stored (the flow was
    /// entered without a sender wallet), [`SessionError::Corrupt`] when the
    /// stored value does not decode, and the liveness errors of
    /// [`IntentSession::ensure_live`].
    pub fn load<T>(transport: &T, now: DateTime<Utc>) -> Result<Self, SessionError>
    where
        T: SessionTransport + ?Sized,
    {
        let raw = transport
            .get(SESSION_KEY)
            .ok_or(SessionError::Incomplete {
                field: SessionField::SenderWallet,
            })?;
        let session: Self = serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt {
            reason: e.to_string(),
        })?;
        session.ensure_live(now)?;
        Ok(session)
    }

    /// Writes the session into `transport`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Corrupt`] if the session cannot be encoded.
    pub fn save<T>(&self, transport: &mut T) -> Result<(), SessionError>
    where
        T: SessionTransport + ?Sized,
    {
        let raw = serde_json::to_string(self).map_err(|e| SessionError::Corrupt {
            reason: e.to_string(),
        })?;
        transport.set(SESSION_KEY, raw);
        Ok(())
    }

    /// Removes any stored session from `transport`.
    pub fn clear<T>(transport: &mut T)
    where
        T: SessionTransport + ?Sized,
    {
        transport.remove(SESSION_KEY);
    }
}
