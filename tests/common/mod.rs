// tests/common/mod.rs
//
// Shared harness for the integration tests: an app on a random port backed
// by a private in-memory database and a mailer that keeps what it sends.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use yamdb::{
    config::Config,
    error::AppError,
    routes,
    state::AppState,
    utils::mail::{MailMessage, Mailer},
};

/// Page size used by every test app, kept small to exercise pagination.
pub const PAGE_SIZE: u32 = 2;

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub mailer: Arc<RecordingMailer>,
    pub client: reqwest::Client,
}

/// Helper function to spawn the app on a random port for testing.
pub async fn spawn_app() -> TestApp {
    // 1. Create a pool. A single, never-recycled connection keeps the
    // in-memory database alive for the whole test.
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("Invalid in-memory database URL")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        page_size: PAGE_SIZE,
        mail_from: "yamdb.bot@support.com".to_string(),
        smtp: None,
        admin_username: None,
        admin_email: None,
    };

    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        pool: pool.clone(),
        config,
        mailer: mailer.clone(),
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        mailer,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub async fn signup(&self, username: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/signup"))
            .json(&json!({ "username": username, "email": email }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn request_token(&self, username: &str, code: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/token"))
            .json(&json!({ "username": username, "confirmation_code": code }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Plaintext code carried by the most recent mail.
    pub fn last_code(&self) -> String {
        let sent = self.mailer.sent.lock().unwrap();
        let message = sent.last().expect("No mail was sent");
        message
            .body
            .rsplit(' ')
            .next()
            .expect("Mail body carries no code")
            .to_string()
    }

    /// Signs up `username` and redeems the mailed code. Returns the token.
    pub async fn register(&self, username: &str) -> String {
        let response = self
            .signup(username, &format!("{}@example.com", username))
            .await;
        assert_eq!(response.status().as_u16(), 200, "signup of {}", username);

        let code = self.last_code();
        let response = self.request_token(username, &code).await;
        assert_eq!(response.status().as_u16(), 200, "token for {}", username);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers `username` and promotes it straight in the store.
    pub async fn register_with_role(&self, username: &str, role: &str) -> String {
        let token = self.register(username).await;
        sqlx::query("UPDATE users SET role = ?1 WHERE username = ?2")
            .bind(role)
            .bind(username)
            .execute(&self.pool)
            .await
            .expect("Failed to set role");
        token
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn patch_json(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self.client.patch(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.delete(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    /// Creates a title without category or genres. Returns its id.
    pub async fn create_title(&self, admin_token: &str, name: &str) -> i64 {
        let response = self
            .post_json(
                "/titles",
                Some(admin_token),
                json!({ "name": name, "year": 1999, "genre": [] }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    /// Posts a review and returns its id.
    pub async fn create_review(&self, token: &str, title_id: i64, score: i64) -> i64 {
        let response = self
            .post_json(
                &format!("/titles/{}/reviews", title_id),
                Some(token),
                json!({ "text": "Worth a look", "score": score }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }
}
