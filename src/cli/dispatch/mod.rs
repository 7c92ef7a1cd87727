//! Maps validated CLI matches to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let request_timeout_seconds = matches
        .get_one::<u64>("request-timeout-seconds")
        .copied()
        .unwrap_or(10);
    let db_max_connections = matches
        .get_one::<u32>("db-max-connections")
        .copied()
        .unwrap_or(5);

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        access_token_ttl_minutes: auth_opts.access_token_ttl_minutes,
        refresh_grant_ttl_minutes: auth_opts.refresh_grant_ttl_minutes,
        refresh_token_ttl_minutes: auth_opts.refresh_token_ttl_minutes,
        request_timeout_seconds,
        db_max_connections,
    }))
}
