//! The credential store seam used by the auth handlers.
//!
//! [`PgUserStore`] is the production backend. [`MemoryUserStore`] keeps
//! accounts in process memory; the server falls back to it when no
//! `DATABASE_URL` is configured, and tests use it directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::user::{CreateUser, User};
use crate::repositories::UserRepo;
use crate::DbPool;

/// Name of the unique constraint on `users.username`.
const USERNAME_CONSTRAINT: &str = "uq_users_username";

/// Errors from a [`UserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The username is already registered.
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Account lookup and creation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Insert a user. Returns [`StoreError::DuplicateUsername`] on a name clash.
    async fn create(&self, input: CreateUser) -> Result<User, StoreError>;

    /// Whether the backing store is reachable.
    async fn health_check(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`UserStore`] backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_username(&self.pool, username).await?)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(UserRepo::username_exists(&self.pool, username).await?)
    }

    async fn create(&self, input: CreateUser) -> Result<User, StoreError> {
        UserRepo::create(&self.pool, &input)
            .await
            .map_err(|err| classify_insert_error(err, &input.username))
    }

    async fn health_check(&self) -> bool {
        crate::health_check(&self.pool).await.is_ok()
    }
}

/// Map a unique violation (SQLSTATE 23505) on the username constraint to
/// [`StoreError::DuplicateUsername`]; pass everything else through.
fn classify_insert_error(err: sqlx::Error, username: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some(USERNAME_CONSTRAINT)
        {
            return StoreError::DuplicateUsername(username.to_string());
        }
    }
    StoreError::Database(err)
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// [`UserStore`] that lives and dies with the process.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.users.read().await.contains_key(username))
    }

    async fn create(&self, input: CreateUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&input.username) {
            return Err(StoreError::DuplicateUsername(input.username));
        }

        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            username: input.username,
            password_hash: input.password_hash,
            upstream_api_key: input.upstream_api_key,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
