//! Credential validation and Argon2id password hashing.

use crate::error::{Error, Result};
use anyhow::anyhow;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;
const PASSWORD_SPECIALS: &str = "!@#$%^&*";

/// Trim surrounding whitespace and drop inner spaces from a phone number.
#[must_use]
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalize an email for lookup/uniqueness checks. Blank means absent.
#[must_use]
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
}

/// E.164: a plus sign and up to fifteen digits, no leading zero.
#[must_use]
pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^\+[1-9]\d{1,14}$").is_ok_and(|regex| regex.is_match(phone))
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Enforce the password policy.
///
/// # Errors
/// `Validation` describing the first unmet rule.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(Error::validation(
            "password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::validation("password must contain at least one digit"));
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        return Err(Error::validation(format!(
            "password must contain at least one special character ({PASSWORD_SPECIALS})"
        )));
    }
    Ok(())
}

/// Validate a phone after normalization.
///
/// # Errors
/// `Validation` if the phone is not E.164.
pub fn validate_phone(phone: &str) -> Result<()> {
    if valid_phone(phone) {
        Ok(())
    } else {
        Err(Error::validation("phone must be in E.164 format"))
    }
}

/// Hash a password with Argon2id and a random salt, as a PHC string.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string();
    Ok(hash)
}

/// Constant-time check of `password` against a stored PHC string.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Run [`hash_password`] on the blocking pool.
///
/// # Errors
/// Returns an error if hashing fails or the task panics.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| anyhow!("password hashing task failed: {err}"))?
}

/// Run [`verify_password`] on the blocking pool. Without a stored hash the
/// password is checked against the decoy and never matches.
///
/// # Errors
/// Returns an error if the task panics.
pub async fn verify_password_blocking(
    password: String,
    stored_hash: Option<String>,
) -> Result<bool> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(stored_hash) => verify_password(&password, &stored_hash),
        None => {
            if let Some(decoy) = decoy_hash() {
                let _ = verify_password(&password, decoy);
            }
            false
        }
    })
    .await
        .map_err(|err| Error::Internal(anyhow!("password verification task failed: {err}")))
}

/// Hash checked against when the phone is unknown, so both failure paths cost
/// one Argon2 verification.
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password("decoy-password-for-unknown-phones").ok())
        .as_deref()
}
