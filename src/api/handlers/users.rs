//! User profile endpoints.

use super::{parse_id, principal::Principal};
use crate::{
    api::{error::ErrorBody, AppState},
    error::Error,
    users::UserProfile,
};
use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub entitlements: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserProfile> for UserDetail {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            phone: profile.phone,
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            roles: profile.roles,
            entitlements: profile.entitlements,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdateRequest {
    pub phone: String,
    pub password: String,
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User detail", body = UserDetail),
        (status = 400, description = "Invalid user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<UserDetail>, Error> {
    let user_id = parse_id(&id, "user")?;
    let profile = state.users.get_user(user_id).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "User id")
    ),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = UserDetail),
        (status = 400, description = "Invalid phone or password", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Phone already in use", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn edit_user(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<UserUpdateRequest>,
) -> Result<Json<UserDetail>, Error> {
    let user_id = parse_id(&id, "user")?;
    debug!(actor = %principal.user_id, %user_id, "Editing user credentials");

    let profile = state
        .users
        .edit_user(user_id, &request.phone, &request.password)
        .await?;
    Ok(Json(profile.into()))
}
