//! Role templates.

use super::{parse_id, principal::Principal, RightsBody};
use crate::{
    api::{error::ErrorBody, AppState},
    error::Error,
    rights::{Role, RoleInput},
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: Uuid,
    /// One of `ADMIN`, `MANAGER`, `OPERATOR`, `MERCHANT`, `SUPPORT`.
    pub name: String,
    pub localized_name: String,
    pub notes: String,
    pub rights: BTreeMap<String, Vec<String>>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name.to_string(),
            localized_name: role.localized_name,
            notes: role.notes,
            rights: role.rights.to_raw(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RoleRequest {
    pub name: String,
    pub localized_name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub rights: BTreeMap<String, Vec<String>>,
}

impl From<RoleRequest> for RoleInput {
    fn from(request: RoleRequest) -> Self {
        Self {
            name: request.name,
            localized_name: request.localized_name,
            notes: request.notes,
            rights: request.rights,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/roles",
    responses(
        (status = 200, description = "All roles", body = [RoleResponse]),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn list_roles(
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<RoleResponse>>, Error> {
    let roles = state.rights.get_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/roles",
    request_body = RoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Unknown role name or invalid rights", body = ErrorBody),
        (status = 409, description = "Role name already taken", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn add_role(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RoleRequest>,
) -> Result<impl IntoResponse, Error> {
    let role = state.rights.add_role(&request.into()).await?;
    info!(actor = %principal.user_id, role_id = %role.id, "Role created");
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

#[utoipa::path(
    put,
    path = "/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 400, description = "Unknown role name or invalid rights", body = ErrorBody),
        (status = 404, description = "Role not found", body = ErrorBody),
        (status = 409, description = "Role name already taken", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn edit_role(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<RoleResponse>, Error> {
    let role_id = parse_id(&id, "role")?;
    let role = state.rights.edit_role(role_id, &request.into()).await?;
    Ok(Json(role.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn delete_role(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<StatusCode, Error> {
    let role_id = parse_id(&id, "role")?;
    state.rights.delete_role(role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/roles/{id}/rights",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Rights carried by the role", body = RightsBody),
        (status = 404, description = "Role not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn get_role_rights(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<RightsBody>, Error> {
    let role_id = parse_id(&id, "role")?;
    let rights = state.rights.get_role_rights(role_id).await?;
    Ok(Json(rights.into()))
}
