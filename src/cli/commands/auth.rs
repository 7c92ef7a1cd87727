use crate::auth::config::{
    DEFAULT_ACCESS_TOKEN_TTL_MINUTES, DEFAULT_REFRESH_GRANT_TTL_MINUTES,
    DEFAULT_REFRESH_TOKEN_TTL_MINUTES, MAX_TTL_MINUTES,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-minutes";
pub const ARG_REFRESH_GRANT_TTL: &str = "refresh-grant-ttl-minutes";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-minutes";

/// Token settings taken from the command line.
#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub access_token_ttl_minutes: i64,
    pub refresh_grant_ttl_minutes: i64,
    pub refresh_token_ttl_minutes: i64,
}

impl Options {
    /// # Errors
    /// Returns an error if the JWT secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            access_token_ttl_minutes: minutes(matches, ARG_ACCESS_TOKEN_TTL)
                .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_grant_ttl_minutes: minutes(matches, ARG_REFRESH_GRANT_TTL)
                .unwrap_or(DEFAULT_REFRESH_GRANT_TTL_MINUTES),
            refresh_token_ttl_minutes: minutes(matches, ARG_REFRESH_TOKEN_TTL)
                .unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_MINUTES),
        })
    }
}

fn minutes(matches: &ArgMatches, id: &str) -> Option<i64> {
    matches.get_one::<i64>(id).copied()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign access tokens")
                .env("WARDEN_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Lifetime of access tokens issued at login")
                .env("WARDEN_ACCESS_TOKEN_TTL_MINUTES")
                .default_value("60")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_MINUTES)),
        )
        .arg(
            Arg::new(ARG_REFRESH_GRANT_TTL)
                .long(ARG_REFRESH_GRANT_TTL)
                .help("Lifetime of access tokens issued by a refresh")
                .env("WARDEN_REFRESH_GRANT_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_MINUTES)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Lifetime of refresh tokens")
                .env("WARDEN_REFRESH_TOKEN_TTL_MINUTES")
                .default_value("10080")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_MINUTES)),
        )
}
