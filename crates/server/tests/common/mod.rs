//! Common test utilities.

use argon2::Params;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use database::{Database, PasswordPolicy};
use kb_server::{create_router, AppState, Passwords};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Password accepted by the default policy for every test address.
#[allow(dead_code)]
pub const PASSWORD: &str = "Tr0ub4dor&3x";

/// How a request authenticates.
#[allow(dead_code)]
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    Anonymous,
    Bearer(&'a str),
    ApiKey(&'a str),
}

/// A router over a throwaway database file.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("knowledge.db");
        let db = Database::connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
            .await
            .expect("Failed to open database");
        db.migrate().await.expect("Failed to migrate");

        // Minimum Argon2 cost keeps the suite fast.
        let passwords = Passwords::with_params(
            PasswordPolicy::default(),
            Params::new(Params::MIN_M_COST, 1, 1, None).expect("valid params"),
        );

        let state = AppState::new(db, passwords);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Send a request and decode the JSON body (`Null` when empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth: Auth<'_>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        builder = match auth {
            Auth::Anonymous => builder,
            Auth::Bearer(token) => builder.header("Authorization", format!("Bearer {}", token)),
            Auth::ApiKey(key) => builder.header("X-Api-Key", key),
        };

        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Register an account and return its id.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/users",
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "confirm_password": PASSWORD,
                })),
                Auth::Anonymous,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Log in and return the session token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/users/login",
                Some(json!({ "email": email, "password": password })),
                Auth::Anonymous,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Register and log in; returns (user id, session token).
    pub async fn signup(&self, email: &str) -> (String, String) {
        let id = self.register(email).await;
        let token = self.login(email, PASSWORD).await;
        (id, token)
    }

    /// Create a knowledge base and return its id.
    pub async fn create_kb(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/knowledge-bases",
                Some(json!({ "name": name })),
                Auth::Bearer(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }
}
