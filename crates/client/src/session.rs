//! Signed-in session state.

use tokio::sync::RwLock;

/// Who is signed in and which upstream key their generations use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub username: Option<String>,
    pub api_key: Option<String>,
}

/// Shared, lock-guarded [`Session`]. Queue tasks read the key from here
/// before every call, so a logout or key change applies to the next
/// variation issued.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sign_in(&self, username: impl Into<String>, api_key: impl Into<String>) {
        let mut session = self.inner.write().await;
        session.authenticated = true;
        session.username = Some(username.into());
        session.api_key = Some(api_key.into());
    }

    /// Forget everything, including the key.
    pub async fn logout(&self) {
        *self.inner.write().await = Session::default();
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }

    /// The current key, if signed in with a non-blank one.
    pub async fn api_key(&self) -> Option<String> {
        let session = self.inner.read().await;
        session
            .api_key
            .as_ref()
            .filter(|key| session.authenticated && !key.trim().is_empty())
            .cloned()
    }
}
