#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use zkp_visa_backend::api;
use zkp_visa_backend::config::Simulation;
use zkp_visa_backend::db;
use zkp_visa_backend::issuer::Issuer;
use zkp_visa_backend::registry::{Address, LocalRegistry, VisaRegistry};
use zkp_visa_backend::state::AppState;

pub const API_KEY: &str = "test-key";

pub fn owner() -> Address {
    Address::repeat_byte(0xaa)
}

/// Router plus the temp dir holding its database. Keep the dir alive for the whole test.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<dyn VisaRegistry>,
    _dir: TempDir,
}

pub async fn app_with(
    issuer: impl FnOnce(Arc<dyn VisaRegistry>) -> Issuer,
    registry: Arc<dyn VisaRegistry>,
    simulation: Simulation,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.sqlite").to_string_lossy());
    let pool = db::connect(&url).await.unwrap();
    db::init_schema(&pool).await.unwrap();

    let state = AppState::new(pool, issuer(registry.clone()), registry.clone(), simulation, API_KEY);
    TestApp {
        router: api::router(state),
        registry,
        _dir: dir,
    }
}

pub async fn local_app() -> TestApp {
    app_with(
        |_| Issuer::Local,
        Arc::new(LocalRegistry::owned_by(owner())),
        Simulation::instant(),
    )
    .await
}

impl TestApp {
    pub async fn raw(&self, method: Method, uri: &str, body: Option<Value>, key: Option<&str>) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-API-KEY", key);
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, bytes, content_type)
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call_with_key(method, uri, body, None).await
    }

    pub async fn call_with_key(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        key: Option<&str>,
    ) -> (StatusCode, Value) {
        let (status, bytes, _) = self.raw(method, uri, body, key).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call_with_key(method, uri, body, Some(API_KEY)).await
    }

    /// POST to each session route in turn, asserting 200 for all of them.
    pub async fn post_all(&self, id: &str, steps: &[(&str, Option<Value>)]) {
        for (route, body) in steps {
            let uri = format!("/api/v1/sessions/{id}/{route}");
            let (status, body) = self.call(Method::POST, &uri, body.clone()).await;
            assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        }
    }

    pub async fn new_session(&self) -> String {
        let (status, created) = self.call(Method::POST, "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        created["sessionId"].as_str().unwrap().to_string()
    }

    /// From home to uploadDocuments with both slots filled.
    pub async fn fill_to_documents(&self, id: &str) {
        self.post_all(id, &[("start", None), ("info", Some(user_data())), ("documents/sample", None)])
            .await;
    }

    /// Create a session and walk it to the payment screen.
    pub async fn session_at_payment(&self) -> String {
        let id = self.new_session().await;
        self.fill_to_documents(&id).await;
        self.post_all(&id, &[("documents/verify", None), ("documents/continue", None)]).await;
        id
    }
}

/// Run a request on its own task so another one can interleave with it.
pub fn spawn_call(
    app: &Arc<TestApp>,
    method: Method,
    uri: String,
    body: Option<Value>,
) -> tokio::task::JoinHandle<(StatusCode, Value)> {
    let app = Arc::clone(app);
    tokio::spawn(async move { app.call(method, &uri, body).await })
}

pub fn user_data() -> Value {
    json!({
        "firstName": "Alice",
        "lastName": "Tan",
        "passportNumber": "E1234567",
        "nationality": "SGP",
        "dateOfBirth": "1999-05-12",
        "nickname": "alice",
        "durationMinutes": 60
    })
}

pub fn card() -> Value {
    json!({
        "cardNumber": "4111111111111111",
        "cardholderName": "Alice Tan",
        "expiryDate": "12/27",
        "cvv": "123",
        "billingAddress": "1 Orchard Road",
        "city": "Singapore",
        "state": "SG",
        "zipCode": "238801"
    })
}
