use super::{
    error::ErrorBody,
    handlers::{auth, contexts, health, rights, roles, users, RightsBody},
};
use crate::auth::TokenPair;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        users::get_user,
        users::edit_user,
        rights::get_user_rights,
        rights::grant_rights,
        rights::edit_rights,
        rights::revoke_rights,
        rights::assign_role,
        contexts::get_contexts,
        contexts::add_context,
        contexts::edit_context,
        contexts::delete_contexts,
        contexts::delete_context,
        roles::list_roles,
        roles::add_role,
        roles::edit_role,
        roles::delete_role,
        roles::get_role_rights,
    ),
    components(schemas(
        ErrorBody,
        RightsBody,
        TokenPair,
        health::Health,
        auth::RegisterRequest,
        auth::RegisterResponse,
        auth::LoginRequest,
        auth::RefreshRequest,
        users::UserDetail,
        users::UserUpdateRequest,
        rights::AssignRoleRequest,
        contexts::ContextsResponse,
        contexts::AddContextRequest,
        contexts::EditContextRequest,
        contexts::DeletedContexts,
        roles::RoleResponse,
        roles::RoleRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and database status"),
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "users", description = "User profiles"),
        (name = "rights", description = "Per-user rights and role assignment"),
        (name = "contexts", description = "Merchant scoping"),
        (name = "roles", description = "Role templates"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
