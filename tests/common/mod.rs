// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use base64::{Engine, engine::general_purpose::STANDARD};
use exam_portal::{config::Config, db, routes, state::AppState};
use serde_json::{Value, json};

pub const PASSWORD: &str = "Secur3!pass";
pub const ADMIN_EMAIL: &str = "admin@portal.test";
pub const ADMIN_PASSWORD: &str = "Adm1n!secret";

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port against a fresh in-memory database.
/// The exam clock is not started; tests drive it through `state.sessions`.
pub async fn spawn_app() -> TestApp {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:8080".to_string()],
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
    };
    db::seed_admin_user(&pool, &config)
        .await
        .expect("Failed to seed admin");

    let state = AppState::new(pool, config);
    let app = routes::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        state,
        client: reqwest::Client::new(),
    }
}

/// A South African ID number that passes validation and is unique within the test binary.
pub fn unique_id_number() -> String {
    static SEQUENCE: AtomicU32 = AtomicU32::new(1000);
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10000;
    format!("920220{:04}082", sequence)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}_{}@portal.test", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// A minimal JPEG header as a data URL; enough to pass format sniffing.
pub fn jpeg_data_url() -> String {
    let header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    format!("data:image/jpeg;base64,{}", STANDARD.encode(header))
}

pub fn photos() -> Value {
    json!({ "selfie": jpeg_data_url(), "environment": jpeg_data_url() })
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn registration(&self, role: &str, course_id: i64) -> Value {
        json!({
            "name": "Thandi",
            "surname": "Nkosi",
            "gender": "female",
            "email": unique_email(role),
            "id_number": unique_id_number(),
            "password": PASSWORD,
            "confirm_password": PASSWORD,
            "role": role,
            "course_id": course_id,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers a user and returns (user id, bearer token).
    pub async fn register_and_login(&self, role: &str, course_id: i64) -> (i64, String) {
        let payload = self.registration(role, course_id);
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&payload)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        let user: Value = response.json().await.unwrap();

        let login = self
            .login(payload["email"].as_str().unwrap(), PASSWORD)
            .await;
        assert_eq!(login.status().as_u16(), 200);
        let body: Value = login.json().await.unwrap();

        (
            user["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn admin_token(&self) -> String {
        let response = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Advances the exam clock by `secs` one-second steps.
    pub async fn tick(&self, secs: u32) -> usize {
        let mut expired = 0;
        for _ in 0..secs {
            expired += exam_portal::exam::ticker::run_tick(&self.state.pool, &self.state.sessions).await;
        }
        expired
    }
}
