// tests/auth_tests.rs

mod common;

use common::{PASSWORD, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn courses_are_public() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/courses"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["courses"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn register_returns_user_without_secrets() {
    let app = spawn_app().await;
    let payload = app.registration("student", 1);

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&payload)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["email"], payload["email"]);
    assert_eq!(user["role"], "student");
    assert_eq!(user["is_verified"], false);
    assert!(user.get("password").is_none());
    assert!(user.get("verification_token").is_none());
}

#[tokio::test]
async fn register_rejects_invalid_payloads() {
    let app = spawn_app().await;

    let mut mismatched = app.registration("student", 1);
    mismatched["confirm_password"] = json!("Differ3nt!pass");

    let mut bad_id = app.registration("student", 1);
    bad_id["id_number"] = json!("9202304720082");

    let mut weak = app.registration("student", 1);
    weak["password"] = json!("password");
    weak["confirm_password"] = json!("password");

    let mut admin = app.registration("admin", 1);
    admin["role"] = json!("admin");

    let unknown_course = app.registration("student", 99);

    for payload in [mismatched, bad_id, weak, admin, unknown_course] {
        let response = app
            .client
            .post(app.url("/api/auth/register"))
            .json(&payload)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 400, "payload: {}", payload);
    }
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = spawn_app().await;
    let payload = app.registration("student", 1);

    let first = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let mut again = payload.clone();
    again["id_number"] = json!(common::unique_id_number());
    let second = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&again)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app().await;
    let payload = app.registration("student", 1);
    app.client
        .post(app.url("/api/auth/register"))
        .json(&payload)
        .send()
        .await
        .unwrap();

    let email = payload["email"].as_str().unwrap();
    assert_eq!(app.login(email, "Wr0ng!pass").await.status().as_u16(), 401);
    assert_eq!(
        app.login("nobody@portal.test", PASSWORD).await.status().as_u16(),
        401
    );

    let ok = app.login(email, PASSWORD).await;
    assert_eq!(ok.status().as_u16(), 200);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["user"]["email"], email);
}

#[tokio::test]
async fn email_verification_consumes_token() {
    let app = spawn_app().await;
    let (user_id, token) = app.register_and_login("student", 1).await;

    let verification_token: String =
        sqlx::query_scalar("SELECT verification_token FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&app.state.pool)
            .await
            .unwrap();

    let response = app
        .client
        .post(app.url("/api/auth/verify-email"))
        .json(&json!({ "token": verification_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let replay = app
        .client
        .post(app.url("/api/auth/verify-email"))
        .json(&json!({ "token": verification_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status().as_u16(), 400);

    let me: Value = app.get("/api/auth/me", &token).await.json().await.unwrap();
    assert_eq!(me["user"]["is_verified"], true);
}

#[tokio::test]
async fn resend_verification_does_not_reveal_accounts() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/resend-verification"))
        .json(&json!({ "email": "nobody@portal.test" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn protected_routes_require_token_and_role() {
    let app = spawn_app().await;
    let (_, student) = app.register_and_login("student", 1).await;

    let anonymous = app
        .client
        .get(app.url("/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let forged = app.get("/api/student/dashboard", "not-a-jwt").await;
    assert_eq!(forged.status().as_u16(), 401);

    assert_eq!(app.get("/api/admin/users", &student).await.status().as_u16(), 403);
    assert_eq!(app.get("/api/lecturer/reports", &student).await.status().as_u16(), 403);
    assert_eq!(app.get("/api/student/dashboard", &student).await.status().as_u16(), 200);

    let (_, lecturer) = app.register_and_login("lecturer", 1).await;
    assert_eq!(app.get("/api/student/dashboard", &lecturer).await.status().as_u16(), 403);
}

#[tokio::test]
async fn profile_update_changes_own_fields() {
    let app = spawn_app().await;
    let (_, token) = app.register_and_login("student", 1).await;

    let response = app
        .put(
            "/api/profile",
            &token,
            json!({
                "name": "Lerato",
                "profile_image": "https://cdn.portal.test/lerato.png"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["name"], "Lerato");
    assert_eq!(body["user"]["surname"], "Nkosi");

    let bad = app
        .put("/api/profile", &token, json!({ "profile_image": "javascript:alert(1)" }))
        .await;
    assert_eq!(bad.status().as_u16(), 400);
}
