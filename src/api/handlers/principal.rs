//! Bearer-token authentication for the `/v1/users` and `/v1/roles` routes.
//!
//! Flow Overview: read `Authorization: Bearer <jwt>`, verify it with the auth
//! service and attach a [`Principal`] to the request. Authorization by role is
//! left to the caller of this service.

use crate::{api::AppState, error::Error};
use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Caller identity taken from a verified access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub phone: String,
    pub roles: Vec<String>,
    pub entitlements: Vec<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the bearer token into a principal.
///
/// # Errors
/// `InvalidAccessToken` when the header is missing or malformed, otherwise
/// whatever token verification reports.
pub fn require_auth(headers: &HeaderMap, state: &AppState) -> Result<Principal, Error> {
    let token = bearer_token(headers).ok_or(Error::InvalidAccessToken)?;
    let claims = state.auth.verify_access_token(token)?;

    Ok(Principal {
        user_id: claims.id,
        phone: claims.phone,
        roles: claims.roles,
        entitlements: claims.entitlements,
    })
}

pub async fn authenticate(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match require_auth(request.headers(), &state) {
        Ok(principal) => {
            debug!(user_id = %principal.user_id, "Authenticated request");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
