//! HTTP tests against the full router over the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use schoolblog::{
    app::build_app,
    state::AppState,
    store::{StoreError, UserStore},
    users::repo_types::{NewUser, User, UserChanges},
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    build_app(AppState::fake())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    read(app, req).await
}

/// Like `send`, but with a verbatim body and an optional content type.
async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    read(app, req).await
}

async fn read(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, name: &str, email: &str, password: &str, teacher: bool) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/users",
        None,
        Some(json!({ "name": name, "email": email, "password": password, "isTeacher": teacher })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let (status, _) = send(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn teacher_posts_and_student_cannot_delete() {
    let app = app();

    let ana = register(&app, "Ana", "ana@x.com", "secret1", true).await;
    assert_eq!(ana["name"], "Ana");
    assert_eq!(ana["isTeacher"], true);
    assert!(ana.get("password").is_none());
    assert!(ana.get("passwordHash").is_none());

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ana@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@x.com");
    assert!(body["user"].get("password").is_none());
    let teacher = body["token"].as_str().unwrap().to_string();

    let (status, post) = send(
        &app,
        "POST",
        "/posts",
        Some(&teacher),
        Some(json!({ "title": "Hi", "content": "World" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["author"], "Ana");
    assert_eq!(post["title"], "Hi");
    assert_eq!(post["content"], "World");
    let post_id = post["postId"].as_i64().unwrap();

    register(&app, "Bia", "bia@x.com", "secret2", false).await;
    let student = login(&app, "bia@x.com", "secret2").await;

    let (status, _) = send(&app, "DELETE", &format!("/posts/{post_id}"), Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "DELETE", &format!("/posts/{post_id}"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, "GET", &format!("/posts/{post_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app();
    register(&app, "Ana", "ana@x.com", "secret1", false).await;

    let wrong = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ana@x.com", "password": "bad" })),
    )
    .await;
    let unknown = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn login_and_register_require_fields() {
    let app = app();
    let (status, _) = send(&app, "POST", "/auth/login", None, Some(json!({ "email": "a@x.com" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({ "email": "a@x.com", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let app = app();
    register(&app, "Ana", "ana@x.com", "secret1", false).await;
    let (status, body) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({ "name": "Ana 2", "email": "ana@x.com", "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn teacher_routes_enforce_guard_then_role() {
    let app = app();
    let ana = register(&app, "Ana", "ana@x.com", "secret1", true).await;
    register(&app, "Bia", "bia@x.com", "secret2", false).await;
    let teacher = login(&app, "ana@x.com", "secret1").await;
    let student = login(&app, "bia@x.com", "secret2").await;
    let spare = register(&app, "Caio", "caio@x.com", "secret3", false).await;
    let ana_id = ana["userId"].as_i64().unwrap();
    let spare_id = spare["userId"].as_i64().unwrap();

    let (status, post) = send(
        &app,
        "POST",
        "/posts",
        Some(&teacher),
        Some(json!({ "title": "first", "content": "c" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = post["postId"].as_i64().unwrap();

    // deletes run last so earlier rows still exist
    let routes = [
        ("GET", "/users".to_string(), None),
        ("GET", format!("/users/{ana_id}"), None),
        ("PUT", format!("/users/{ana_id}"), Some(json!({ "name": "Ana B" }))),
        ("POST", "/posts".to_string(), Some(json!({ "title": "t", "content": "c" }))),
        ("PUT", format!("/posts/{post_id}"), Some(json!({ "title": "edited" }))),
        ("DELETE", format!("/posts/{post_id}"), None),
        ("DELETE", format!("/users/{spare_id}"), None),
    ];

    for (method, uri, body) in routes.iter() {
        let (status, _) = send(&app, method, uri, None, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri} without token");

        let (status, _) = send(&app, method, uri, Some("garbage"), body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri} bad token");

        let (status, _) = send(&app, method, uri, Some(&student), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri} as student");

        let (status, _) = send(&app, method, uri, Some(&teacher), body.clone()).await;
        assert!(status.is_success(), "{method} {uri} as teacher: {status}");
    }
}

#[tokio::test]
async fn user_management() {
    let app = app();
    register(&app, "Ana", "ana@x.com", "secret1", true).await;
    let bia = register(&app, "Bia", "bia@x.com", "secret2", false).await;
    let teacher = login(&app, "ana@x.com", "secret1").await;
    let bia_id = bia["userId"].as_i64().unwrap();

    let (_, all) = send(&app, "GET", "/users", Some(&teacher), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert!(all.to_string().find("password").is_none());

    let (_, teachers) = send(&app, "GET", "/users?isTeacher=true", Some(&teacher), None).await;
    assert_eq!(teachers.as_array().unwrap().len(), 1);
    assert_eq!(teachers[0]["email"], "ana@x.com");

    let (_, students) = send(&app, "GET", "/users?isTeacher=no", Some(&teacher), None).await;
    assert_eq!(students.as_array().unwrap().len(), 1);
    assert_eq!(students[0]["email"], "bia@x.com");

    // new password takes effect, old one stops working
    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/users/{bia_id}"),
        Some(&teacher),
        Some(json!({ "name": "Beatriz", "password": "fresh-pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Beatriz");
    assert_eq!(updated["email"], "bia@x.com");
    login(&app, "bia@x.com", "fresh-pw").await;
    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "bia@x.com", "password": "secret2" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/users/{bia_id}"),
        Some(&teacher),
        Some(json!({ "email": "ana@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "DELETE", &format!("/users/{bia_id}"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/users/{bia_id}"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/users/{bia_id}"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn posts_are_public_and_newest_first() {
    let app = app();
    register(&app, "Ana", "ana@x.com", "secret1", true).await;
    let teacher = login(&app, "ana@x.com", "secret1").await;

    for title in ["one", "two", "three"] {
        let (status, _) = send(
            &app,
            "POST",
            "/posts",
            Some(&teacher),
            Some(json!({ "title": title, "content": "body" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, posts) = send(&app, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["three", "two", "one"]);
    assert!(posts[0]["creationDate"].is_string());

    let id = posts[0]["postId"].as_i64().unwrap();
    let (status, edited) = send(
        &app,
        "PUT",
        &format!("/posts/{id}"),
        Some(&teacher),
        Some(json!({ "content": "edited" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["title"], "three");
    assert_eq!(edited["content"], "edited");

    let (status, _) = send(
        &app,
        "PUT",
        "/posts/9999",
        Some(&teacher),
        Some(json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_body_is_validated_after_role() {
    let app = app();
    register(&app, "Ana", "ana@x.com", "secret1", true).await;
    register(&app, "Bia", "bia@x.com", "secret2", false).await;
    let teacher = login(&app, "ana@x.com", "secret1").await;
    let student = login(&app, "bia@x.com", "secret2").await;

    let (status, _) = send(&app, "POST", "/posts", Some(&student), Some(json!({ "title": "t" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", "/posts", Some(&teacher), Some(json!({ "title": "t" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_outlives_deleted_account() {
    let app = app();
    let ana = register(&app, "Ana", "ana@x.com", "secret1", true).await;
    let token = login(&app, "ana@x.com", "secret1").await;
    let ana_id = ana["userId"].as_i64().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/users/{ana_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // stateless session: the guard still accepts the token
    let (status, users) = send(&app, "GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 0);

    // but the author reference no longer resolves
    let (status, _) = send(
        &app,
        "POST",
        "/posts",
        Some(&token),
        Some(json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_are_checked_after_role() {
    let app = app();
    let ana = register(&app, "Ana", "ana@x.com", "secret1", true).await;
    register(&app, "Bia", "bia@x.com", "secret2", false).await;
    let teacher = login(&app, "ana@x.com", "secret1").await;
    let student = login(&app, "bia@x.com", "secret2").await;
    let ana_uri = format!("/users/{}", ana["userId"]);

    let json = Some("application/json");
    let bad_bodies = [
        ("POST", "/posts", json, r#"{"title": 5, "content": "c"}"#),
        ("POST", "/posts", json, "{not json"),
        ("POST", "/posts", None, r#"{"title": "t", "content": "c"}"#),
        ("PUT", ana_uri.as_str(), json, r#"{"isTeacher": "#),
        ("PUT", "/posts/1", Some("text/plain"), "hello"),
    ];

    for (method, uri, content_type, body) in bad_bodies {
        let (status, _) = send_raw(&app, method, uri, Some(&student), content_type, body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri} {body} as student");

        let (status, res) = send_raw(&app, method, uri, Some(&teacher), content_type, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri} {body} as teacher");
        assert!(res["error"].is_string(), "{method} {uri}: {res}");
    }
}

#[tokio::test]
async fn unparsable_bodies_and_ids_get_json_errors() {
    let app = app();
    register(&app, "Ana", "ana@x.com", "secret1", true).await;
    let teacher = login(&app, "ana@x.com", "secret1").await;

    let (status, body) = send_raw(
        &app,
        "POST",
        "/auth/login",
        None,
        Some("application/json"),
        r#"{"email": ["ana@x.com"]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send_raw(&app, "POST", "/users", None, None, "name=Ana").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    for (method, uri, token) in [
        ("GET", "/posts/abc", None),
        ("DELETE", "/posts/abc", Some(teacher.as_str())),
        ("GET", "/users/1.5", Some(teacher.as_str())),
    ] {
        let (status, body) = send(&app, method, uri, token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(body["error"], "Invalid id", "{method} {uri}");
    }
}

/// Stands in for a race lost at insert time: the email lookup comes back
/// empty and the unique constraint fires on write.
struct LateConflictStore;

#[async_trait]
impl UserStore for LateConflictStore {
    async fn find_user_by_email(&self, _: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }
    async fn find_user(&self, _: i32) -> Result<Option<User>, StoreError> {
        Ok(None)
    }
    async fn list_users(&self, _: Option<bool>) -> Result<Vec<User>, StoreError> {
        Ok(Vec::new())
    }
    async fn create_user(&self, _: NewUser) -> Result<User, StoreError> {
        Err(StoreError::Conflict)
    }
    async fn update_user(&self, _: i32, _: UserChanges) -> Result<Option<User>, StoreError> {
        Ok(None)
    }
    async fn delete_user(&self, _: i32) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[tokio::test]
async fn conflict_on_insert_is_409() {
    let mut state = AppState::fake();
    state.users = Arc::new(LateConflictStore);
    let app = build_app(state);

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({ "name": "Ana", "email": "ana@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}
