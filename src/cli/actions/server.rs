use crate::{
    api::{self, ServerOptions},
    auth::AuthConfig,
    cli::telemetry,
};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::{fmt::Write, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub access_token_ttl_minutes: i64,
    pub refresh_grant_ttl_minutes: i64,
    pub refresh_token_ttl_minutes: i64,
    pub request_timeout_seconds: u64,
    pub db_max_connections: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = AuthConfig::new(args.jwt_secret)
        .with_access_token_ttl_minutes(args.access_token_ttl_minutes)
        .with_refresh_grant_ttl_minutes(args.refresh_grant_ttl_minutes)
        .with_refresh_token_ttl_minutes(args.refresh_token_ttl_minutes);

    let options = ServerOptions {
        port: args.port,
        db_max_connections: args.db_max_connections,
        request_timeout: Duration::from_secs(args.request_timeout_seconds),
    };

    let result = api::new(options, args.dsn, auth_config).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        (
            "jwt_secret_set",
            (!args.jwt_secret.expose_secret().is_empty()).to_string(),
        ),
        (
            "access_token_ttl",
            format!("{}m", args.access_token_ttl_minutes),
        ),
        (
            "refresh_grant_ttl",
            format!("{}m", args.refresh_grant_ttl_minutes),
        ),
        (
            "refresh_token_ttl",
            format!("{}m", args.refresh_token_ttl_minutes),
        ),
        (
            "request_timeout",
            format!("{}s", args.request_timeout_seconds),
        ),
        ("db_max_connections", args.db_max_connections.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
