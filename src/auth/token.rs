//! Access and refresh token handling.
//!
//! Access tokens are HS256 JWTs carrying the user's id, phone, roles and
//! entitlements. Refresh tokens are opaque random strings; only their SHA-256
//! digest is ever stored.

use crate::error::{Error, Result};
use anyhow::Context;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub phone: String,
    pub roles: Vec<String>,
    pub entitlements: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: SecretString,
}

impl TokenIssuer {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Sign an access token valid for `ttl` from now.
    ///
    /// # Errors
    /// `Signing` if the secret is empty or encoding fails.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        phone: &str,
        roles: &[String],
        entitlements: &[String],
        ttl: TimeDelta,
    ) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            id: user_id,
            phone: phone.to_string(),
            roles: roles.to_vec(),
            entitlements: entitlements.to_vec(),
            iat,
            exp: iat + ttl.num_seconds(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(Error::Signing("signing secret is empty".to_string()));
        }

        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|err| Error::Signing(err.to_string()))
    }

    /// Check signature and expiry and return the embedded claims.
    ///
    /// # Errors
    /// `InvalidSignature`, `Expired` or `InvalidAccessToken`.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => Error::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Error::InvalidSignature,
            _ => Error::InvalidAccessToken,
        })
    }
}

/// Create a new refresh token.
///
/// # Errors
/// Fails only if the OS random source is unavailable.
pub fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Digest used to store and look up refresh tokens.
#[must_use]
pub fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SecretString::from("test-secret".to_string()))
    }

    #[test]
    fn issued_token_verifies_with_same_claims() {
        let id = Uuid::new_v4();
        let roles = vec!["ADMIN".to_string()];
        let entitlements = vec!["reports".to_string()];

        let token = issuer()
            .issue_access_token(
                id,
                "+15551234567",
                &roles,
                &entitlements,
                TimeDelta::minutes(60),
            )
            .unwrap();
        let claims = issuer().verify_access_token(&token).unwrap();

        assert_eq!(claims.id, id);
        assert_eq!(claims.phone, "+15551234567");
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.entitlements, entitlements);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = issuer()
            .issue_access_token(
                Uuid::new_v4(),
                "+15551234567",
                &[],
                &[],
                TimeDelta::minutes(5),
            )
            .unwrap();
        let other = TokenIssuer::new(SecretString::from("another-secret".to_string()));

        assert!(matches!(
            other.verify_access_token(&token),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn past_expiry_is_expired() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: Uuid::new_v4(),
            phone: "+15551234567".to_string(),
            roles: Vec::new(),
            entitlements: Vec::new(),
            iat: now - 120,
            exp: now - 60,
        };
        let token = issuer().sign(&claims).unwrap();

        assert!(matches!(
            issuer().verify_access_token(&token),
            Err(Error::Expired)
        ));
    }

    #[test]
    fn garbage_is_invalid_token() {
        assert!(matches!(
            issuer().verify_access_token("not.a.jwt"),
            Err(Error::InvalidAccessToken)
        ));
    }

    #[test]
    fn empty_secret_cannot_sign() {
        let issuer = TokenIssuer::new(SecretString::from(String::new()));
        let result = issuer.issue_access_token(
            Uuid::new_v4(),
            "+15551234567",
            &[],
            &[],
            TimeDelta::minutes(1),
        );
        assert!(matches!(result, Err(Error::Signing(_))));
    }

    #[test]
    fn refresh_tokens_are_random_and_url_safe() {
        let first = generate_refresh_token().unwrap();
        let second = generate_refresh_token().unwrap();

        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn refresh_token_hash_is_stable() {
        assert_eq!(hash_refresh_token("abc"), hash_refresh_token("abc"));
        assert_ne!(hash_refresh_token("abc"), hash_refresh_token("abd"));
        assert_eq!(hash_refresh_token("abc").len(), 32);
    }
}
