use crate::error::{Error, Result};
use anyhow::anyhow;
use chrono::TimeDelta;
use secrecy::SecretString;

pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
pub const DEFAULT_REFRESH_GRANT_TTL_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Upper bound accepted for any token lifetime, roughly ten years.
pub const MAX_TTL_MINUTES: i64 = 5_256_000;

/// Token lifetimes and the HMAC secret used to sign access tokens.
#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    access_token_ttl_minutes: i64,
    refresh_grant_ttl_minutes: i64,
    refresh_token_ttl_minutes: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_grant_ttl_minutes: DEFAULT_REFRESH_GRANT_TTL_MINUTES,
            refresh_token_ttl_minutes: DEFAULT_REFRESH_TOKEN_TTL_MINUTES,
        }
    }

    #[must_use]
    pub const fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_refresh_grant_ttl_minutes(mut self, minutes: i64) -> Self {
        self.refresh_grant_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_refresh_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.refresh_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    /// Lifetime of access tokens issued at login.
    ///
    /// # Errors
    /// `Internal` if the configured minutes do not fit a duration.
    pub fn access_token_ttl(&self) -> Result<TimeDelta> {
        ttl("access token", self.access_token_ttl_minutes)
    }

    /// Lifetime of access tokens issued by the refresh grant.
    ///
    /// # Errors
    /// `Internal` if the configured minutes do not fit a duration.
    pub fn refresh_grant_ttl(&self) -> Result<TimeDelta> {
        ttl("refresh grant", self.refresh_grant_ttl_minutes)
    }

    /// # Errors
    /// `Internal` if the configured minutes do not fit a duration.
    pub fn refresh_token_ttl(&self) -> Result<TimeDelta> {
        ttl("refresh token", self.refresh_token_ttl_minutes)
    }
}

fn ttl(name: &str, minutes: i64) -> Result<TimeDelta> {
    TimeDelta::try_minutes(minutes)
        .filter(|ttl| *ttl > TimeDelta::zero())
        .ok_or_else(|| Error::Internal(anyhow!("invalid {name} lifetime: {minutes} minutes")))
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_grant_ttl_minutes", &self.refresh_grant_ttl_minutes)
            .field("refresh_token_ttl_minutes", &self.refresh_token_ttl_minutes)
            .finish()
    }
}
