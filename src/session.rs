//! Authenticated user context shared by the engines and the HTTP remote.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;

/// Credentials of the signed-in account.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UserSession")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Cheaply clonable handle to the current session, if any.
///
/// Push and pull read the user id at the start of every run and abort when
/// nobody is signed in. Sign-ins and sign-outs are announced on a watch
/// channel carrying the current user id.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<RwLock<Option<UserSession>>>,
    changes: Arc<watch::Sender<Option<String>>>,
}

impl Default for Session {
    fn default() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            inner: Arc::new(RwLock::new(None)),
            changes: Arc::new(changes),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch the signed-in user id.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.changes.subscribe()
    }

    pub fn signed_in(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        let session = Self::new();
        session.login(user_id, access_token);
        session
    }

    pub fn login(&self, user_id: impl Into<String>, access_token: impl Into<String>) {
        let user_id = user_id.into();
        {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Some(UserSession {
                user_id: user_id.clone(),
                access_token: access_token.into(),
            });
        }
        self.changes.send_replace(Some(user_id));
    }

    /// Ends the session and returns the departing account.
    pub fn logout(&self) -> Option<UserSession> {
        let departed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if departed.is_some() {
            self.changes.send_replace(None);
        }
        departed
    }

    pub fn current(&self) -> Option<UserSession> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|session| session.user_id)
    }

    pub fn access_token(&self) -> Option<String> {
        self.current().map(|session| session.access_token)
    }
}
