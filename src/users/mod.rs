//! User profile reads and credential changes.

use crate::{
    auth::password::{hash_password_blocking, normalize_phone, validate_password, validate_phone},
    error::{Error, Result},
    rights::Rights,
    store::{CredentialStore, RightsStore, UserAccount},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Account fields safe to hand out; never includes the password hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub entitlements: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserAccount> for UserProfile {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            phone: account.phone,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            roles: account.roles,
            entitlements: account.entitlements,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    credentials: Arc<dyn CredentialStore>,
    rights: Arc<dyn RightsStore>,
}

impl UserService {
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, rights: Arc<dyn RightsStore>) -> Self {
        Self {
            credentials,
            rights,
        }
    }

    /// # Errors
    /// `NotFound` for an unknown user.
    pub async fn get_user(&self, id: Uuid) -> Result<UserProfile> {
        self.credentials
            .user_by_id(id)
            .await?
            .map(UserProfile::from)
            .ok_or(Error::NotFound("user"))
    }

    /// Change phone and password together.
    ///
    /// # Errors
    /// `Validation` for malformed input, `Conflict` if the phone belongs to
    /// someone else, `NotFound` for an unknown user.
    #[instrument(skip(self, phone, password))]
    pub async fn edit_user(&self, id: Uuid, phone: &str, password: &str) -> Result<UserProfile> {
        let phone = normalize_phone(phone);
        validate_phone(&phone)?;
        validate_password(password)?;

        let password_hash = hash_password_blocking(password.to_string()).await?;
        if !self
            .credentials
            .update_credentials(id, &phone, &password_hash)
            .await?
        {
            return Err(Error::NotFound("user"));
        }

        info!("Updated user credentials");
        self.get_user(id).await
    }

    /// # Errors
    /// `NotFound` for an unknown user.
    pub async fn get_user_rights(&self, id: Uuid) -> Result<Rights> {
        self.rights
            .user_rights(id)
            .await?
            .ok_or(Error::NotFound("user"))
    }
}
