//! Merchant scoping endpoints.

use super::{parse_id, principal::Principal};
use crate::{
    api::{error::ErrorBody, AppState},
    contexts::UserContexts,
    error::Error,
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContextsResponse {
    pub user_id: Uuid,
    pub merchant_ids: Vec<String>,
    /// Comma-joined `merchant_ids`.
    pub merchants: String,
    pub global: bool,
}

impl From<UserContexts> for ContextsResponse {
    fn from(contexts: UserContexts) -> Self {
        Self {
            merchants: contexts.joined_merchant_ids(),
            user_id: contexts.user_id,
            merchant_ids: contexts.merchant_ids,
            global: contexts.global,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AddContextRequest {
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EditContextRequest {
    pub global: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedContexts {
    pub removed: u64,
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/contexts",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Merchant associations", body = ContextsResponse),
        (status = 400, description = "Invalid user id", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "contexts"
)]
pub async fn get_contexts(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ContextsResponse>, Error> {
    let user_id = parse_id(&id, "user")?;
    let contexts = state.contexts.get_user_contexts(user_id).await?;
    Ok(Json(contexts.into()))
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/contexts",
    params(("id" = String, Path, description = "User id")),
    request_body = AddContextRequest,
    responses(
        (status = 201, description = "Context added", body = ContextsResponse),
        (status = 400, description = "Missing or malformed merchant id", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "contexts"
)]
pub async fn add_context(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<AddContextRequest>,
) -> Result<impl IntoResponse, Error> {
    let user_id = parse_id(&id, "user")?;
    let contexts = state
        .contexts
        .add_user_context(user_id, request.merchant_id.as_deref(), request.global)
        .await?;
    Ok((StatusCode::CREATED, Json(ContextsResponse::from(contexts))))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/contexts",
    params(("id" = String, Path, description = "User id")),
    request_body = EditContextRequest,
    responses(
        (status = 200, description = "Global flag updated", body = ContextsResponse),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "contexts"
)]
pub async fn edit_context(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<EditContextRequest>,
) -> Result<Json<ContextsResponse>, Error> {
    let user_id = parse_id(&id, "user")?;
    let contexts = state
        .contexts
        .edit_user_context(user_id, request.global)
        .await?;
    Ok(Json(contexts.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}/contexts",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "All associations removed", body = DeletedContexts),
    ),
    security(("bearer" = [])),
    tag = "contexts"
)]
pub async fn delete_contexts(
    Path(id): Path<String>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<DeletedContexts>, Error> {
    let user_id = parse_id(&id, "user")?;
    let removed = state.contexts.delete_all_user_contexts(user_id).await?;
    Ok(Json(DeletedContexts { removed }))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}/contexts/{merchant_id}",
    params(
        ("id" = String, Path, description = "User id"),
        ("merchant_id" = String, Path, description = "Merchant id")
    ),
    responses(
        (status = 204, description = "Association removed"),
        (status = 404, description = "No such association", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "contexts"
)]
pub async fn delete_context(
    Path((id, merchant_id)): Path<(String, String)>,
    Extension(_principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<StatusCode, Error> {
    let user_id = parse_id(&id, "user")?;
    state
        .contexts
        .delete_user_context(user_id, &merchant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
