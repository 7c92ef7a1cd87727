use crate::{auth::AuthConfig, clock::SystemClock, store::PgStore};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod error;
pub mod handlers;
mod openapi;
mod state;

pub use openapi::{openapi, ApiDoc};
pub use state::AppState;

use handlers::{auth, contexts, health, principal, rights, roles, users};

/// Database pool and request limits for [`new`].
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub port: u16,
    pub db_max_connections: u32,
    pub request_timeout: Duration,
}

/// Build the full application router around `state`.
///
/// `/health`, `/openapi.json` and `/v1/auth/*` are public; everything under
/// `/v1/users` and `/v1/roles` needs a bearer access token.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let protected = Router::new()
        .route("/v1/users/:id", get(users::get_user).put(users::edit_user))
        .route(
            "/v1/users/:id/rights",
            get(rights::get_user_rights)
                .post(rights::grant_rights)
                .put(rights::edit_rights),
        )
        .route("/v1/users/:id/rights/revoke", post(rights::revoke_rights))
        .route("/v1/users/:id/role", post(rights::assign_role))
        .route(
            "/v1/users/:id/contexts",
            get(contexts::get_contexts)
                .post(contexts::add_context)
                .put(contexts::edit_context)
                .delete(contexts::delete_contexts),
        )
        .route(
            "/v1/users/:id/contexts/:merchant_id",
            delete(contexts::delete_context),
        )
        .route("/v1/roles", get(roles::list_roles).post(roles::add_role))
        .route(
            "/v1/roles/:id",
            put(roles::edit_role).delete(roles::delete_role),
        )
        .route("/v1/roles/:id/rights", get(roles::get_role_rights))
        .route_layer(middleware::from_fn(principal::authenticate));

    Router::new()
        .route("/health", get(health::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/refresh", post(auth::refresh))
        .route("/v1/auth/logout", post(auth::logout))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(options: ServerOptions, dsn: String, auth_config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(options.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(Duration::from_secs(5))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    let state = Arc::new(AppState::new(store, Arc::new(SystemClock), auth_config));

    let app = router(state, options.request_timeout);

    let listener = TcpListener::bind(format!("::0:{}", options.port)).await?;

    info!("Listening on [::]:{}", options.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
