/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - Test database setup (requires `DATABASE_URL`)
/// - One admin and one caller account per test
/// - JWT token generation
/// - Request helpers

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use foodbank_api::app::{build_router, AppState};
use foodbank_api::config::Config;
use foodbank_shared::auth::jwt::{create_token, Claims, TokenType};
use foodbank_shared::auth::password::hash_password;
use foodbank_shared::models::profile::UserRole;
use foodbank_shared::models::user::{CreateUser, User, UserWithRole};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub admin: UserWithRole,
    pub caller: UserWithRole,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(database_url.clone()),
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            "LIVE_DEBOUNCE_MS" => Some("50".to_string()),
            _ => None,
        })?;

        let db = PgPool::connect(&config.database.url).await?;

        // Path relative to Cargo.toml, not this file
        sqlx::migrate!("../migrations").run(&db).await?;

        let admin = create_user(&db, UserRole::Admin).await?;
        let caller = create_user(&db, UserRole::Caller).await?;

        let state = AppState::new(db.clone(), config);
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            admin,
            caller,
        })
    }

    /// Access token for `user` carrying its role
    pub fn token_for(&self, user: &UserWithRole) -> String {
        let claims = Claims::new(user.id, Some(user.role), TokenType::Access);
        create_token(&claims, TEST_SECRET).unwrap()
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and parses the JSON body, asserting the status
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
        expected: StatusCode,
    ) -> serde_json::Value {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        assert_eq!(
            status,
            expected,
            "{} {} returned {}",
            method,
            uri,
            String::from_utf8_lossy(&bytes)
        );

        if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        }
    }

    pub async fn cleanup(&self) -> anyhow::Result<()> {
        User::delete(&self.db, self.admin.id).await?;
        User::delete(&self.db, self.caller.id).await?;
        Ok(())
    }
}

async fn create_user(db: &PgPool, role: UserRole) -> anyhow::Result<UserWithRole> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("{}-{}@example.com", role, Uuid::new_v4()),
            password_hash: hash_password(TEST_PASSWORD)?,
            role,
        },
    )
    .await?;
    Ok(user)
}
