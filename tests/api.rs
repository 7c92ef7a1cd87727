#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use warden::{
    api::{self, AppState},
    auth::AuthConfig,
    store::{ManualClock, MemoryStore},
};

const PHONE: &str = "+15551234567";
const PASSWORD: &str = "Sup3r!secret";

fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let config = AuthConfig::new(SecretString::from("integration-secret".to_string()));
    let state = AppState::new(store, Arc::new(ManualClock::default()), config);
    api::router(Arc::new(state), Duration::from_secs(10))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, phone: &str) -> String {
    let response = send(
        app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({"phone": phone, "password": PASSWORD, "firstName": "Ada"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_str().unwrap().to_string()
}

async fn login(app: &Router, phone: &str) -> (String, String) {
    let response = send(
        app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"phone": phone, "password": PASSWORD})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_reports_database_and_build() {
    let app = app();
    let response = send(&app, "GET", "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["name"], "warden");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = app();
    let response = send(&app, "GET", "/openapi.json", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/v1/auth/login"].is_object());
}

#[tokio::test]
async fn register_validates_and_rejects_duplicates() {
    let app = app();
    register(&app, PHONE).await;

    let duplicate = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({"phone": PHONE, "password": PASSWORD})),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(duplicate).await["error"], "conflict");

    let weak = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({"phone": "+15550000000", "password": "password"})),
    )
    .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    let bad_phone = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({"phone": "555-1234", "password": PASSWORD})),
    )
    .await;
    assert_eq!(bad_phone.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_failures_lock_the_phone() {
    let app = app();
    register(&app, PHONE).await;

    for _ in 0..3 {
        let response = send(
            &app,
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "Wr0ng!password"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Correct password is still refused while locked.
    let locked = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"phone": PHONE, "password": PASSWORD})),
    )
    .await;
    assert_eq!(locked.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = locked
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=30).contains(&retry_after));
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() {
    let app = app();
    let id = register(&app, PHONE).await;

    let anonymous = send(&app, "GET", &format!("/v1/users/{id}"), None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forged = send(
        &app,
        "GET",
        &format!("/v1/users/{id}"),
        Some("not.a.jwt"),
        None,
    )
    .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let (access, _) = login(&app, PHONE).await;
    let response = send(&app, "GET", &format!("/v1/users/{id}"), Some(&access), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["phone"], PHONE);
    assert_eq!(body["firstName"], "Ada");
    assert!(body.get("passwordHash").is_none());

    let bad_id = send(&app, "GET", "/v1/users/42", Some(&access), None).await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() {
    let app = app();
    register(&app, PHONE).await;
    let (_, refresh) = login(&app, PHONE).await;

    let rotated = send(
        &app,
        "POST",
        "/v1/auth/refresh",
        None,
        Some(json!({"refreshToken": refresh})),
    )
    .await;
    assert_eq!(rotated.status(), StatusCode::OK);
    let next = json_body(rotated).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(next, refresh);

    let replay = send(
        &app,
        "POST",
        "/v1/auth/refresh",
        None,
        Some(json!({"refreshToken": refresh})),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::FORBIDDEN);

    let logout = send(
        &app,
        "POST",
        "/v1/auth/logout",
        None,
        Some(json!({"refreshToken": next})),
    )
    .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after_logout = send(
        &app,
        "POST",
        "/v1/auth/refresh",
        None,
        Some(json!({"refreshToken": next})),
    )
    .await;
    assert_eq!(after_logout.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rights_grant_revoke_and_role_assignment() {
    let app = app();
    let id = register(&app, PHONE).await;
    let (access, _) = login(&app, PHONE).await;
    let rights_uri = format!("/v1/users/{id}/rights");

    let granted = send(
        &app,
        "POST",
        &rights_uri,
        Some(&access),
        Some(json!({"ORDERS": ["READ", "UPDATE"], "CATALOG": []})),
    )
    .await;
    assert_eq!(granted.status(), StatusCode::OK);
    assert_eq!(
        json_body(granted).await,
        json!({"ORDERS": ["READ", "UPDATE"]})
    );

    let again = send(
        &app,
        "POST",
        &rights_uri,
        Some(&access),
        Some(json!({"ORDERS": ["READ"]})),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let unknown = send(
        &app,
        "PUT",
        &rights_uri,
        Some(&access),
        Some(json!({"WAREHOUSE": ["READ"]})),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let missing_section = send(
        &app,
        "POST",
        &format!("{rights_uri}/revoke"),
        Some(&access),
        Some(json!({"HISTORY": ["READ"]})),
    )
    .await;
    assert_eq!(missing_section.status(), StatusCode::NOT_FOUND);

    let revoked = send(
        &app,
        "POST",
        &format!("{rights_uri}/revoke"),
        Some(&access),
        Some(json!({"ORDERS": ["UPDATE"]})),
    )
    .await;
    assert_eq!(revoked.status(), StatusCode::OK);
    assert_eq!(json_body(revoked).await, json!({"ORDERS": ["READ"]}));

    let role = send(
        &app,
        "POST",
        "/v1/roles",
        Some(&access),
        Some(json!({
            "name": "MANAGER",
            "localizedName": "Manager",
            "rights": {"PRODUCTS": ["READ", "CREATE"]}
        })),
    )
    .await;
    assert_eq!(role.status(), StatusCode::CREATED);
    let role_id = json_body(role).await["id"].as_str().unwrap().to_string();

    let merged = send(
        &app,
        "POST",
        &format!("/v1/users/{id}/role"),
        Some(&access),
        Some(json!({"roleId": role_id, "merge": true})),
    )
    .await;
    assert_eq!(merged.status(), StatusCode::OK);
    assert_eq!(
        json_body(merged).await,
        json!({"ORDERS": ["READ"], "PRODUCTS": ["READ", "CREATE"]})
    );

    let replaced = send(
        &app,
        "POST",
        &format!("/v1/users/{id}/role"),
        Some(&access),
        Some(json!({"roleId": role_id})),
    )
    .await;
    assert_eq!(
        json_body(replaced).await,
        json!({"PRODUCTS": ["READ", "CREATE"]})
    );

    let current = send(&app, "GET", &rights_uri, Some(&access), None).await;
    assert_eq!(
        json_body(current).await,
        json!({"PRODUCTS": ["READ", "CREATE"]})
    );
}

#[tokio::test]
async fn roles_crud() {
    let app = app();
    register(&app, PHONE).await;
    let (access, _) = login(&app, PHONE).await;

    let invalid = send(
        &app,
        "POST",
        "/v1/roles",
        Some(&access),
        Some(json!({"name": "JANITOR", "localizedName": "Janitor", "rights": {"ORDERS": ["READ"]}})),
    )
    .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let created = send(
        &app,
        "POST",
        "/v1/roles",
        Some(&access),
        Some(json!({"name": "SUPPORT", "localizedName": "Support", "rights": {"HISTORY": ["READ"]}})),
    )
    .await;
    let role_id = json_body(created).await["id"].as_str().unwrap().to_string();

    let edited = send(
        &app,
        "PUT",
        &format!("/v1/roles/{role_id}"),
        Some(&access),
        Some(json!({
            "name": "SUPPORT",
            "localizedName": "Customer support",
            "notes": "tier 1",
            "rights": {"HISTORY": ["READ"], "ORDERS": ["READ"]}
        })),
    )
    .await;
    assert_eq!(edited.status(), StatusCode::OK);
    assert_eq!(json_body(edited).await["localizedName"], "Customer support");

    let rights = send(
        &app,
        "GET",
        &format!("/v1/roles/{role_id}/rights"),
        Some(&access),
        None,
    )
    .await;
    assert_eq!(
        json_body(rights).await,
        json!({"ORDERS": ["READ"], "HISTORY": ["READ"]})
    );

    let listed = send(&app, "GET", "/v1/roles", Some(&access), None).await;
    assert_eq!(json_body(listed).await.as_array().unwrap().len(), 1);

    let deleted = send(
        &app,
        "DELETE",
        &format!("/v1/roles/{role_id}"),
        Some(&access),
        None,
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = send(
        &app,
        "DELETE",
        &format!("/v1/roles/{role_id}"),
        Some(&access),
        None,
    )
    .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contexts_scope_and_globalize() {
    let app = app();
    let id = register(&app, PHONE).await;
    let (access, _) = login(&app, PHONE).await;
    let uri = format!("/v1/users/{id}/contexts");

    for merchant in ["m2", "m1"] {
        let response = send(
            &app,
            "POST",
            &uri,
            Some(&access),
            Some(json!({"merchantId": merchant})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let listed = json_body(send(&app, "GET", &uri, Some(&access), None).await).await;
    assert_eq!(listed["merchantIds"], json!(["m1", "m2"]));
    assert_eq!(listed["merchants"], "m1,m2");
    assert_eq!(listed["global"], false);

    let missing = send(&app, "POST", &uri, Some(&access), Some(json!({}))).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let removed = send(
        &app,
        "DELETE",
        &format!("{uri}/m2"),
        Some(&access),
        None,
    )
    .await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);

    let global = send(
        &app,
        "PUT",
        &uri,
        Some(&access),
        Some(json!({"global": true})),
    )
    .await;
    let global = json_body(global).await;
    assert_eq!(global["global"], true);
    assert_eq!(global["merchantIds"], json!([]));

    let cleared = send(&app, "DELETE", &uri, Some(&access), None).await;
    assert_eq!(json_body(cleared).await["removed"], 1);
}
