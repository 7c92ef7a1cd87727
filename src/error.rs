//! Error type shared by the stores, services and HTTP layer.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("too many failed login attempts, retry in {retry_after_seconds}s")]
    Locked { retry_after_seconds: u64 },

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("invalid access token")]
    InvalidAccessToken,

    #[error("access token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("section {0} does not exist")]
    SectionNotFound(String),

    #[error("user already has rights")]
    AlreadyHasRights,

    #[error("invalid section: {0}")]
    InvalidSection(String),

    #[error("invalid permission: {0}")]
    InvalidPermission(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("rights cannot be empty")]
    EmptyRights,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification used to pick an HTTP status and a stable error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Locked,
    Forbidden,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Locked => "locked",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidSection(_)
            | Self::InvalidPermission(_)
            | Self::InvalidRole(_)
            | Self::EmptyRights => ErrorKind::Validation,
            Self::InvalidCredentials
            | Self::InvalidAccessToken
            | Self::Expired
            | Self::InvalidSignature => ErrorKind::Unauthorized,
            Self::Locked { .. } => ErrorKind::Locked,
            Self::InvalidRefreshToken => ErrorKind::Forbidden,
            Self::NotFound(_) | Self::SectionNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) | Self::AlreadyHasRights => ErrorKind::Conflict,
            Self::StoreUnavailable(_) => ErrorKind::Unavailable,
            Self::Signing(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::StoreUnavailable(err.to_string()),
            other => Self::Internal(anyhow::Error::new(other).context("database query failed")),
        }
    }
}

/// Check if the error is a Postgres unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Check if the error is a Postgres foreign-key violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}
