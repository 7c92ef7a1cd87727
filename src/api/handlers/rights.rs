//! Per-user rights and role assignment.

use super::{parse_id, principal::Principal, RightsBody};
use crate::{
    api::{error::ErrorBody, AppState},
    error::Error,
};
use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: String,
    /// Union the role's rights into the user's instead of replacing them.
    #[serde(default)]
    pub merge: bool,
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/rights",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Rights held by the user", body = RightsBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "rights"
)]
pub async fn get_user_rights(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<RightsBody>, Error> {
    let user_id = parse_id(&id, "user")?;
    let rights = state.users.get_user_rights(user_id).await?;
    Ok(Json(rights.into()))
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/rights",
    params(("id" = String, Path, description = "User id")),
    request_body = RightsBody,
    responses(
        (status = 200, description = "Rights granted", body = RightsBody),
        (status = 400, description = "Unknown section or permission, or nothing to grant", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "User already has rights", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "rights"
)]
pub async fn grant_rights(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(RightsBody(raw)): Json<RightsBody>,
) -> Result<Json<RightsBody>, Error> {
    let user_id = parse_id(&id, "user")?;
    let rights = state.rights.grant_rights_to_user(user_id, &raw).await?;
    info!(actor = %principal.user_id, %user_id, "Granted rights");
    Ok(Json(rights.into()))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/rights",
    params(("id" = String, Path, description = "User id")),
    request_body = RightsBody,
    responses(
        (status = 200, description = "Rights replaced", body = RightsBody),
        (status = 400, description = "Unknown section or permission, or nothing to set", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "rights"
)]
pub async fn edit_rights(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(RightsBody(raw)): Json<RightsBody>,
) -> Result<Json<RightsBody>, Error> {
    let user_id = parse_id(&id, "user")?;
    let rights = state.rights.edit_rights_to_user(user_id, &raw).await?;
    info!(actor = %principal.user_id, %user_id, "Replaced rights");
    Ok(Json(rights.into()))
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/rights/revoke",
    params(("id" = String, Path, description = "User id")),
    request_body = RightsBody,
    responses(
        (status = 200, description = "Rights left after revocation", body = RightsBody),
        (status = 400, description = "Unknown section or permission", body = ErrorBody),
        (status = 404, description = "User or section not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "rights"
)]
pub async fn revoke_rights(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(RightsBody(raw)): Json<RightsBody>,
) -> Result<Json<RightsBody>, Error> {
    let user_id = parse_id(&id, "user")?;
    let rights = state.rights.revoke_rights_from_user(user_id, &raw).await?;
    info!(actor = %principal.user_id, %user_id, "Revoked rights");
    Ok(Json(rights.into()))
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Rights after applying the role", body = RightsBody),
        (status = 400, description = "Invalid id", body = ErrorBody),
        (status = 404, description = "User or role not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "rights"
)]
pub async fn assign_role(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<AssignRoleRequest>,
) -> Result<Json<RightsBody>, Error> {
    let user_id = parse_id(&id, "user")?;
    let role_id = parse_id(&request.role_id, "role")?;
    let rights = state
        .rights
        .assign_role_to_user(user_id, role_id, request.merge)
        .await?;
    info!(actor = %principal.user_id, %user_id, %role_id, "Assigned role");
    Ok(Json(rights.into()))
}
