//! Shared harness: the full router over an in-memory database

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use shared::models::CheckoutSession;
use tempfile::TempDir;
use tower::ServiceExt;

use urbanfix_server::api::create_router;
use urbanfix_server::db::DbService;
use urbanfix_server::integrations::{
    CheckoutItem, InMemoryIdentity, LocalBlobStore, PaymentError, PaymentProvider,
};
use urbanfix_server::{AppState, Config};

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Checkout provider that hands out predictable sessions
pub struct FakeCheckout;

#[async_trait]
impl PaymentProvider for FakeCheckout {
    async fn create_checkout_session(
        &self,
        item: &CheckoutItem<'_>,
    ) -> Result<CheckoutSession, PaymentError> {
        Ok(CheckoutSession {
            id: format!("cs_test_{}", item.purpose.as_str()),
            url: format!("https://checkout.test/{}", item.email),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub identity: Arc<InMemoryIdentity>,
    _uploads: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = TempDir::new().unwrap();
        let config = Config {
            upload_dir: uploads.path().to_string_lossy().into_owned(),
            stripe_webhook_secret: WEBHOOK_SECRET.into(),
            ..Config::default()
        };

        let pool = DbService::in_memory().await.unwrap().pool;
        let identity = Arc::new(InMemoryIdentity::new());
        let blobs = Arc::new(LocalBlobStore::new(uploads.path(), &config.public_base_url));
        let state = AppState::from_parts(&config, pool, identity.clone(), Arc::new(FakeCheckout), blobs);

        Self {
            router: create_router(state.clone()),
            state,
            identity,
            _uploads: uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse { status, body }
    }

    /// JSON request, authenticated as `as_user` when given
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        as_user: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(email) = as_user {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", InMemoryIdentity::token_for(email)),
            );
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Register a citizen through the API
    pub async fn register(&self, email: &str) -> Value {
        let res = self
            .call(
                Method::POST,
                "/users",
                None,
                Some(serde_json::json!({ "email": email, "name": email })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
        res.body
    }

    /// Register and grant a role directly in the store
    pub async fn register_with_role(&self, email: &str, role: &str) {
        self.register(email).await;
        sqlx::query("UPDATE users SET role = ?1 WHERE email = ?2")
            .bind(role)
            .bind(email)
            .execute(&self.state.pool)
            .await
            .unwrap();
    }

    /// Report an issue and return its id
    pub async fn report(&self, email: &str, title: &str) -> String {
        let res = self
            .call(
                Method::POST,
                "/issues",
                None,
                Some(serde_json::json!({
                    "title": title,
                    "description": "reported from the street",
                    "category": "Roads",
                    "location": "Main St",
                    "email": email,
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_str().unwrap().to_string()
    }
}
