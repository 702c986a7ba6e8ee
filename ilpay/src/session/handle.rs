//! Shared access to one session from concurrent requests.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, watch};

use super::IntentSession;

/// Owns a session that several requests of the same attempt may touch.
///
/// Writers are serialized through an async mutex and may hold it across
/// remote calls. After every write the new state is published as an immutable
/// snapshot, so readers never wait on a writer.
#[derive(Debug)]
pub struct SessionHandle {
    state: Mutex<IntentSession>,
    published: watch::Sender<Arc<IntentSession>>,
}

impl SessionHandle {
    /// Wraps a session.
    #[must_use]
    pub fn new(session: IntentSession) -> Self {
        let (published, _) = watch::channel(Arc::new(session.clone()));
        Self {
            state: Mutex::new(session),
            published,
        }
    }

    /// Returns the last published state without taking the writer lock.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IntentSession> {
        Arc::clone(&self.published.borrow())
    }

    /// Returns a receiver that observes every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<IntentSession>> {
        self.published.subscribe()
    }

    /// Waits for exclusive write access.
    pub async fn lock(&self) -> SessionWriter<'_> {
        SessionWriter {
            guard: self.state.lock().await,
            published: &self.published,
        }
    }

    /// Applies `f` under the writer lock and publishes the result.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub async fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut IntentSession) -> Result<T, E>,
    {
        let mut writer = self.lock().await;
        f(&mut writer)
    }

    /// Consumes the handle and returns the session.
    #[must_use]
    pub fn into_inner(self) -> IntentSession {
        self.state.into_inner()
    }
}

/// Exclusive access to a session; publishes a snapshot when dropped.
#[derive(Debug)]
pub struct SessionWriter<'a> {
    guard: MutexGuard<'a, IntentSession>,
    published: &'a watch::Sender<Arc<IntentSession>>,
}

impl Deref for SessionWriter<'_> {
    type Target = IntentSession;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for SessionWriter<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for SessionWriter<'_> {
    fn drop(&mut self) {
        self.published.send_replace(Arc::new(self.guard.clone()));
    }
}
