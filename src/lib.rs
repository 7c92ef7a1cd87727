//! # Warden
//!
//! User accounts, tokens and role-based access control for a merchant
//! platform.
//!
//! ## Authentication
//!
//! Users register with an E.164 phone number and a password (stored as an
//! Argon2id hash). Login returns a short-lived HS256 JWT access token and an
//! opaque refresh token. Refresh tokens are stored hashed, are single use and
//! rotate on every refresh. Repeated failed logins lock the phone: 3 failures
//! lock it for 30 seconds, 6 failures for 60 seconds, after which the ledger is
//! cleared.
//!
//! ## Authorization
//!
//! Rights map a fixed set of sections to `READ`/`CREATE`/`UPDATE`/`DELETE`.
//! Roles are named rights templates; assigning a role either merges its rights
//! into the user's or replaces them. Users can also be scoped to a list of
//! merchants or marked global.

pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod contexts;
pub mod error;
pub mod rights;
pub mod store;
pub mod users;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
