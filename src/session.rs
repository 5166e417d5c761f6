//! Authenticated extension session.
//!
//! The host hands us an opaque JWT plus the broadcaster's channel id inside
//! its authorization callback, and may do so again at any point (token
//! refresh). Every consumer that needs credentials holds a [`SessionCell`]
//! and asks it for the current session per request, so a re-authorization is
//! picked up without restarting anything.

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::instrument;

/// One authorization grant from the host. Replaced wholesale on refresh,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub channel_id: String,
    pub user_id: Option<String>,
}

/// Shared owner of the current [`Session`].
///
/// This replaces the ambient mutable auth globals the extension would
/// otherwise accumulate: there is exactly one creation point
/// ([`authorize`](Self::authorize)) and one invalidation point.
#[derive(Debug, Clone, Default)]
pub struct SessionCell {
    inner: Arc<RwLock<Option<Arc<Session>>>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh session, dropping any previous one.
    #[instrument(skip(self, token))]
    pub fn authorize(&self, token: String, channel_id: String, user_id: Option<String>) {
        let session = Arc::new(Session {
            token,
            channel_id,
            user_id,
        });

        let mut guard = self.inner.write().expect("session lock poisoned");
        let replacing = guard.is_some();
        *guard = Some(session);

        tracing::debug!(replacing, "session installed");
    }

    /// Drops the current session. Subsequent [`current`](Self::current) calls
    /// fail until the host re-authorizes.
    pub fn invalidate(&self) {
        let mut guard = self.inner.write().expect("session lock poisoned");
        *guard = None;
    }

    pub fn current(&self) -> SessionResult<Arc<Session>> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .clone()
            .ok_or(SessionErr::NotAuthorized)
    }

    pub fn is_authorized(&self) -> bool {
        self.inner.read().expect("session lock poisoned").is_some()
    }
}

pub type SessionResult<T> = core::result::Result<T, SessionErr>;

#[derive(Debug, Error)]
pub enum SessionErr {
    #[error("no authorization received from the host yet")]
    NotAuthorized,
}
