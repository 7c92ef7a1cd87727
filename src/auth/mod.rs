//! Authentication: credentials, tokens and login lockout.
//!
//! Flow Overview:
//! 1) Register validates the phone (E.164) and password policy, then stores an
//!    Argon2id hash.
//! 2) Login consults the lockout guard, verifies the password and returns an
//!    access token plus a refresh token.
//! 3) Refresh spends the presented refresh token and returns a fresh pair.
//! 4) Logout clears the refresh token.

pub mod config;
pub mod lockout;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use lockout::LockoutGuard;
pub use service::{AuthService, Registration, TokenPair};
pub use token::{Claims, TokenIssuer};
