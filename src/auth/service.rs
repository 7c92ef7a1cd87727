use super::{
    config::AuthConfig,
    lockout::LockoutGuard,
    password::{
        hash_password_blocking, normalize_email, normalize_phone, valid_email,
        validate_password, validate_phone, verify_password_blocking,
    },
    token::{generate_refresh_token, hash_refresh_token, Claims, TokenIssuer},
};
use crate::{
    clock::Clock,
    error::{Error, Result},
    store::{CredentialStore, LockoutStore, NewUser, UserAccount},
};
use anyhow::anyhow;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Input for [`AuthService::register`].
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, login, refresh and logout.
#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    lockout: LockoutGuard,
    tokens: TokenIssuer,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        lockout_store: Arc<dyn LockoutStore>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            credentials,
            lockout: LockoutGuard::new(lockout_store, clock.clone()),
            tokens: TokenIssuer::new(config.jwt_secret().clone()),
            clock,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an account.
    ///
    /// # Errors
    /// `Validation` for malformed input, `Conflict` if the phone or email is taken.
    #[instrument(skip_all)]
    pub async fn register(&self, registration: Registration) -> Result<Uuid> {
        let phone = normalize_phone(&registration.phone);
        validate_phone(&phone)?;
        let email = normalize_email(registration.email.as_deref());
        if let Some(email) = &email {
            if !valid_email(email) {
                return Err(Error::validation("invalid email"));
            }
        }
        validate_password(&registration.password)?;

        if self
            .credentials
            .user_exists(&phone, email.as_deref())
            .await?
        {
            return Err(Error::Conflict("user already exists".to_string()));
        }

        let password_hash = hash_password_blocking(registration.password).await?;
        let id = Uuid::now_v7();
        self.credentials
            .insert_user(NewUser {
                id,
                phone,
                email,
                password_hash,
                first_name: blank_to_none(registration.first_name),
                last_name: blank_to_none(registration.last_name),
            })
            .await?;

        info!(user_id = %id, "Registered user");
        Ok(id)
    }

    /// Verify credentials and issue a token pair.
    ///
    /// # Errors
    /// `Validation` for empty fields or a malformed phone, `Locked` while the
    /// phone is locked, `InvalidCredentials` for an unknown phone or wrong
    /// password.
    #[instrument(skip_all)]
    pub async fn login(&self, phone: &str, password: &str) -> Result<TokenPair> {
        let phone = normalize_phone(phone);
        if phone.is_empty() || password.is_empty() {
            return Err(Error::validation("phone and password are required"));
        }
        // Only well-formed phones may reach the failed-login ledger.
        validate_phone(&phone)?;

        // A rejected attempt while locked does not count as another failure.
        self.lockout.check_lock(&phone).await?;

        let account = self.credentials.user_by_phone(&phone).await?;
        let stored_hash = account.as_ref().map(|account| account.password_hash.clone());
        let matches = verify_password_blocking(password.to_string(), stored_hash).await?;

        let account = match account {
            Some(account) if matches => account,
            _ => {
                let attempts = self.lockout.record_failed_attempt(&phone).await?;
                warn!(attempts, "Failed login");
                return Err(Error::InvalidCredentials);
            }
        };

        let pair = self.issue_pair(&account, self.config.access_token_ttl()?)?;
        let expires_at = expiry(self.clock.now(), self.config.refresh_token_ttl()?)?;
        self.credentials
            .save_refresh_token(account.id, &hash_refresh_token(&pair.refresh_token), expires_at)
            .await?;

        info!(user_id = %account.id, "User logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. The presented token is spent.
    ///
    /// # Errors
    /// `InvalidRefreshToken` for unknown, expired or concurrently spent tokens.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        if refresh_token.is_empty() {
            return Err(Error::validation("refresh token is required"));
        }

        let current = hash_refresh_token(refresh_token);
        let now = self.clock.now();
        let owner = self
            .credentials
            .refresh_token_owner(&current, now)
            .await?
            .ok_or(Error::InvalidRefreshToken)?;
        let account = self
            .credentials
            .user_by_id(owner)
            .await?
            .ok_or(Error::InvalidRefreshToken)?;

        let pair = self.issue_pair(&account, self.config.refresh_grant_ttl()?)?;
        let expires_at = expiry(now, self.config.refresh_token_ttl()?)?;
        let rotated = self
            .credentials
            .rotate_refresh_token(
                account.id,
                &current,
                &hash_refresh_token(&pair.refresh_token),
                expires_at,
            )
            .await?;
        if !rotated {
            warn!(user_id = %account.id, "Refresh token was spent concurrently");
            return Err(Error::InvalidRefreshToken);
        }

        info!(user_id = %account.id, "Refreshed tokens");
        Ok(pair)
    }

    /// Invalidate a refresh token.
    ///
    /// # Errors
    /// `InvalidRefreshToken` if no user holds the token.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        if refresh_token.is_empty() {
            return Err(Error::validation("refresh token is required"));
        }

        if self
            .credentials
            .revoke_refresh_token(&hash_refresh_token(refresh_token))
            .await?
        {
            info!("User logged out");
            Ok(())
        } else {
            Err(Error::InvalidRefreshToken)
        }
    }

    /// Verify an access token presented as a bearer credential.
    ///
    /// # Errors
    /// `InvalidSignature`, `Expired` or `InvalidAccessToken`.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        self.tokens.verify_access_token(token)
    }

    fn issue_pair(&self, account: &UserAccount, ttl: TimeDelta) -> Result<TokenPair> {
        let access_token = self.tokens.issue_access_token(
            account.id,
            &account.phone,
            &account.roles,
            &account.entitlements,
            ttl,
        )?;
        let refresh_token = generate_refresh_token()?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> Result<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| Error::Internal(anyhow!("token expiry is out of range")))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore};
    use secrecy::SecretString;

    const PHONE: &str = "+15551234567";
    const PASSWORD: &str = "Secr3t!pw";

    struct Harness {
        service: AuthService,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("test-secret".to_string()))
    }

    fn harness() -> Harness {
        harness_with(config())
    }

    fn harness_with(config: AuthConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let service = AuthService::new(store.clone(), store.clone(), clock.clone(), config);
        Harness {
            service,
            store,
            clock,
        }
    }

    async fn registered() -> Harness {
        register(harness()).await
    }

    async fn register(harness: Harness) -> Harness {
        harness
            .service
            .register(Registration {
                phone: PHONE.to_string(),
                email: Some("user@example.com".to_string()),
                password: PASSWORD.to_string(),
                ..Registration::default()
            })
            .await
            .unwrap();
        harness
    }

    #[tokio::test]
    async fn register_rejects_bad_phone_and_weak_password() {
        let harness = harness();

        let bad_phone = harness
            .service
            .register(Registration {
                phone: "5551234".to_string(),
                password: PASSWORD.to_string(),
                ..Registration::default()
            })
            .await;
        assert!(matches!(bad_phone, Err(Error::Validation(_))));

        let weak = harness
            .service
            .register(Registration {
                phone: PHONE.to_string(),
                password: "password".to_string(),
                ..Registration::default()
            })
            .await;
        assert!(matches!(weak, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let harness = registered().await;
        let again = harness
            .service
            .register(Registration {
                phone: PHONE.to_string(),
                password: PASSWORD.to_string(),
                ..Registration::default()
            })
            .await;
        assert!(matches!(again, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn login_issues_verifiable_tokens() {
        let harness = registered().await;

        let pair = harness.service.login(PHONE, PASSWORD).await.unwrap();
        let claims = harness
            .service
            .verify_access_token(&pair.access_token)
            .unwrap();

        assert_eq!(claims.phone, PHONE);
        assert_eq!(claims.exp - claims.iat, 60 * 60);
        assert!(!pair.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn claims_carry_roles_and_entitlements() {
        let harness = registered().await;
        let id = harness
            .store
            .user_by_phone(PHONE)
            .await
            .unwrap()
            .unwrap()
            .id;
        harness
            .store
            .set_user_claims(id, vec!["MANAGER".to_string()], vec!["exports".to_string()])
            .await;

        let pair = harness.service.login(PHONE, PASSWORD).await.unwrap();
        let claims = harness
            .service
            .verify_access_token(&pair.access_token)
            .unwrap();

        assert_eq!(claims.id, id);
        assert_eq!(claims.roles, vec!["MANAGER"]);
        assert_eq!(claims.entitlements, vec!["exports"]);
    }

    #[tokio::test]
    async fn empty_credentials_are_rejected() {
        let harness = registered().await;
        assert!(matches!(
            harness.service.login("", PASSWORD).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            harness.service.login(PHONE, "").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn malformed_phone_never_reaches_the_ledger() {
        let harness = harness();
        let junk = "x".repeat(100_000);

        assert!(matches!(
            harness.service.login(&junk, PASSWORD).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(harness.store.failed_login(&junk).await.unwrap(), None);
        assert!(matches!(
            harness.service.login("555-1234", PASSWORD).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(harness.store.failed_login("555-1234").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unrepresentable_refresh_expiry_is_an_error() {
        let harness = register(harness_with(
            config().with_refresh_token_ttl_minutes(1_000_000_000_000),
        ))
        .await;
        let service = harness.service.clone();

        let login = tokio::spawn(async move { service.login(PHONE, PASSWORD).await })
            .await
            .unwrap();
        assert!(matches!(login, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn unknown_phone_is_invalid_credentials_and_counted() {
        let harness = harness();
        let result = harness.service.login("+15550000000", PASSWORD).await;

        assert!(matches!(result, Err(Error::InvalidCredentials)));
        let record = harness
            .store
            .failed_login("+15550000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn lockout_escalates_and_does_not_count_rejected_attempts() {
        let harness = registered().await;

        for _ in 0..3 {
            assert!(matches!(
                harness.service.login(PHONE, "Wr0ng!pass").await,
                Err(Error::InvalidCredentials)
            ));
        }

        // Even the right password is refused while locked.
        assert!(matches!(
            harness.service.login(PHONE, PASSWORD).await,
            Err(Error::Locked { .. })
        ));
        let record = harness.store.failed_login(PHONE).await.unwrap().unwrap();
        assert_eq!(record.attempts, 3);

        harness.clock.advance(TimeDelta::seconds(31));
        for _ in 0..2 {
            assert!(matches!(
                harness.service.login(PHONE, "Wr0ng!pass").await,
                Err(Error::InvalidCredentials)
            ));
        }
        assert!(matches!(
            harness.service.login(PHONE, "Wr0ng!pass").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            harness.service.login(PHONE, PASSWORD).await,
            Err(Error::Locked {
                retry_after_seconds: 60
            })
        ));

        harness.clock.advance(TimeDelta::seconds(61));
        assert!(harness.service.login(PHONE, PASSWORD).await.is_ok());
        assert_eq!(harness.store.failed_login(PHONE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_rotates_and_spends_the_old_token() {
        let harness = registered().await;
        let first = harness.service.login(PHONE, PASSWORD).await.unwrap();

        let second = harness.service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let claims = harness
            .service
            .verify_access_token(&second.access_token)
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 15 * 60);

        assert!(matches!(
            harness.service.refresh(&first.refresh_token).await,
            Err(Error::InvalidRefreshToken)
        ));
        assert!(harness.service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_refreshes_spend_the_token_once() {
        let harness = registered().await;
        let pair = harness.service.login(PHONE, PASSWORD).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..2 {
            let service = harness.service.clone();
            let token = pair.refresh_token.clone();
            tasks.spawn(async move { service.refresh(&token).await });
        }

        let mut succeeded = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, Error::InvalidRefreshToken)),
            }
        }
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn refresh_after_expiry_fails() {
        let harness = registered().await;
        let pair = harness.service.login(PHONE, PASSWORD).await.unwrap();

        harness.clock.advance(TimeDelta::days(8));

        assert!(matches!(
            harness.service.refresh(&pair.refresh_token).await,
            Err(Error::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn logout_invalidates_refresh_token() {
        let harness = registered().await;
        let pair = harness.service.login(PHONE, PASSWORD).await.unwrap();

        harness.service.logout(&pair.refresh_token).await.unwrap();

        assert!(matches!(
            harness.service.refresh(&pair.refresh_token).await,
            Err(Error::InvalidRefreshToken)
        ));
        assert!(matches!(
            harness.service.logout(&pair.refresh_token).await,
            Err(Error::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_rejected() {
        let harness = registered().await;
        assert!(matches!(
            harness.service.refresh("never-issued").await,
            Err(Error::InvalidRefreshToken)
        ));
    }
}
