//! Persistence seams.
//!
//! Services talk to storage only through these traits. [`PgStore`] is the
//! production implementation; [`MemoryStore`] keeps everything in process and
//! backs the test suites.

pub mod memory;
pub mod postgres;

pub use memory::{ManualClock, MemoryStore};
pub use postgres::PgStore;

use crate::{
    contexts::UserContext,
    error::Result,
    rights::{Rights, Role},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAccount {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub entitlements: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedLoginRecord {
    pub phone: String,
    pub attempts: i32,
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Read-modify-write step applied to a user's rights under the row lock.
pub type RightsUpdate<'a> = &'a (dyn Fn(Rights) -> Result<Rights> + Send + Sync);

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new account. Duplicate phone or email is a `Conflict`.
    async fn insert_user(&self, user: NewUser) -> Result<()>;

    async fn user_exists(&self, phone: &str, email: Option<&str>) -> Result<bool>;

    async fn user_by_phone(&self, phone: &str) -> Result<Option<UserAccount>>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserAccount>>;

    /// Replace phone and password hash. Returns `false` when the user is missing.
    async fn update_credentials(&self, id: Uuid, phone: &str, password_hash: &str) -> Result<bool>;

    async fn save_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Owner of an unexpired refresh token.
    async fn refresh_token_owner(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>>;

    /// Swap `current` for `next` only if `current` is still the stored token.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &[u8],
        next: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn revoke_refresh_token(&self, token_hash: &[u8]) -> Result<bool>;
}

#[async_trait]
pub trait LockoutStore: Send + Sync {
    async fn failed_login(&self, phone: &str) -> Result<Option<FailedLoginRecord>>;

    /// Create the record on first use and return the incremented count.
    async fn increment_failed_attempts(&self, phone: &str) -> Result<i32>;

    async fn set_blocked_until(&self, phone: &str, until: Option<DateTime<Utc>>) -> Result<()>;

    async fn purge_failed_logins(&self, phone: &str) -> Result<()>;
}

#[async_trait]
pub trait RightsStore: Send + Sync {
    /// `None` when the user does not exist.
    async fn user_rights(&self, user_id: Uuid) -> Result<Option<Rights>>;

    /// Write `rights` only if the user currently holds none.
    async fn grant_user_rights(&self, user_id: Uuid, rights: &Rights) -> Result<bool>;

    async fn replace_user_rights(&self, user_id: Uuid, rights: &Rights) -> Result<bool>;

    /// Apply `apply` to the stored rights atomically and persist the result.
    async fn update_user_rights(&self, user_id: Uuid, apply: RightsUpdate<'_>) -> Result<Rights>;

    async fn insert_role(&self, role: &Role) -> Result<()>;

    async fn update_role(&self, role: &Role) -> Result<bool>;

    async fn delete_role(&self, id: Uuid) -> Result<bool>;

    async fn role(&self, id: Uuid) -> Result<Option<Role>>;

    async fn roles(&self) -> Result<Vec<Role>>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Round-trip to the backing store.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Add or keep a merchant association and drop any global one.
    async fn add_merchant_context(&self, user_id: Uuid, merchant_id: &str) -> Result<()>;

    /// `true` collapses every association into one global row; `false` drops
    /// the global row.
    async fn set_global_context(&self, user_id: Uuid, global: bool) -> Result<()>;

    async fn user_contexts(&self, user_id: Uuid) -> Result<Vec<UserContext>>;

    async fn delete_merchant_context(&self, user_id: Uuid, merchant_id: &str) -> Result<bool>;

    async fn delete_user_contexts(&self, user_id: Uuid) -> Result<u64>;
}
