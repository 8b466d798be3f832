//! HTTP API for the vehicle-service backend.
//!
//! [`router`] builds the axum application; [`serve`] binds it to an address.
//! Every handler opens its own database handle via [`AppState::db`].

mod error;
mod routes;

pub use error::{ASSISTANT_UNAVAILABLE, ApiError, ApiResult};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use autoservice_agent::WorkshopAgent;
use autoservice_llm::{CompletionClient, WebSearch};
use autoservice_shared::{AppConfig, AutoserviceError, Result};
use autoservice_storage::Storage;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Storage>,
    completion: Arc<dyn CompletionClient>,
    agent: WorkshopAgent,
    chat_temperature: f32,
    started: Instant,
}

impl AppState {
    pub fn new(
        storage: Storage,
        completion: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn WebSearch>>,
        config: &AppConfig,
    ) -> Self {
        let agent = WorkshopAgent::new(
            Arc::clone(&completion),
            search,
            &config.completion,
            &config.search,
        );
        Self {
            storage: Arc::new(storage),
            completion,
            agent,
            chat_temperature: config.completion.chat_temperature,
            started: Instant::now(),
        }
    }

    /// Fresh read-write handle for one request.
    pub(crate) async fn db(&self) -> Result<Storage> {
        self.storage.connect().await
    }
}

/// Build the application router with CORS and request tracing.
pub fn router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .merge(routes::service_routes())
        .merge(routes::record_routes())
        .merge(routes::assist_routes())
        .with_state(state)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!(%origin, "invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

/// Serve the API on `addr` until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr, cors_origin: &str) -> Result<()> {
    let app = router(state, cors_origin);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AutoserviceError::config(format!("cannot bind {addr}: {e}")))?;
    info!(%addr, "listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| AutoserviceError::config(format!("server error: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    /// Completion client replaying canned replies, failing once they run out.
    struct CannedCompletion(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl CompletionClient for CannedCompletion {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| AutoserviceError::completion("no API key configured"))
        }
    }

    async fn test_app(replies: &[&'static str]) -> (Router, Storage) {
        let path = std::env::temp_dir().join(format!("as_api_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&path).await.unwrap();
        storage.seed_demo_data().await.unwrap();
        let db = storage.connect().await.unwrap();

        let completion = Arc::new(CannedCompletion(Mutex::new(replies.iter().copied().collect())));
        let state = AppState::new(storage, completion, None, &AppConfig::default());
        (router(state, "http://localhost:5173"), db)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = test_app(&[]).await;
        let (status, json) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["web_search"], false);
    }

    #[tokio::test]
    async fn customer_lifecycle() {
        let (app, _) = test_app(&[]).await;

        let (status, created) = send(
            &app,
            "POST",
            "/customers",
            Some(json!({ "name": "Lena Vogel", "email": "lena@example.com", "phone": "+49 40 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = send(&app, "GET", &format!("/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Lena Vogel");

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/customers/{id}"),
            Some(json!({
                "name": "Lena Vogel-Kraus",
                "email": "lena@example.com",
                "phone": "+49 40 2"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["phone"], "+49 40 2");

        let (status, deleted) = send(&app, "DELETE", &format!("/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(deleted["message"].as_str().unwrap().contains("deleted"));

        let (status, err) = send(&app, "GET", &format!("/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"], format!("customer {id} not found"));
    }

    #[tokio::test]
    async fn blank_name_is_bad_request() {
        let (app, _) = test_app(&[]).await;
        let (status, err) = send(
            &app,
            "POST",
            "/customers",
            Some(json!({ "name": " ", "email": "x@example.com", "phone": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn dangling_reference_is_bad_request() {
        let (app, _) = test_app(&[]).await;
        let (status, _) = send(
            &app,
            "POST",
            "/vehicles",
            Some(json!({ "make": "Opel", "model": "Astra", "year": 2018, "customer_id": 999 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn nested_listings() {
        let (app, db) = test_app(&[]).await;
        let customer = db.list_customers().await.unwrap()[0].clone();

        let (status, vehicles) =
            send(&app, "GET", &format!("/customers/{}/vehicles", customer.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(vehicles.as_array().unwrap().len(), 2);

        let vehicle_id = vehicles[0]["id"].as_i64().unwrap();
        let (status, orders) =
            send(&app, "GET", &format!("/vehicles/{vehicle_id}/orders"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(orders.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/customers/999/vehicles", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn orders_filter_by_status_ignoring_case() {
        let (app, _) = test_app(&[]).await;
        let (status, orders) = send(&app, "GET", "/orders/status/OPEN", None).await;
        assert_eq!(status, StatusCode::OK);
        let orders = orders.as_array().unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o["status"] == "open"));
    }

    #[tokio::test]
    async fn order_intake_creates_order_and_logs() {
        let (app, db) = test_app(&[]).await;
        let vehicle_id = db.list_vehicles().await.unwrap()[0].id;

        let (status, interaction) = send(
            &app,
            "POST",
            "/ki/auftrag",
            Some(json!({ "message": "Bremsen quietschen", "vehicle_id": vehicle_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let order_id = interaction["order_id"].as_i64().unwrap();
        let order = db.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, "open");
        assert_eq!(db.list_interactions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn direct_chat_returns_response() {
        let (app, db) = test_app(&["Guten Tag!"]).await;
        let (status, json) =
            send(&app, "POST", "/openai/chat", Some(json!({ "message": "Hallo" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], "Guten Tag!");
        assert_eq!(db.list_interactions().await.unwrap()[0].reply, "Guten Tag!");
    }

    #[tokio::test]
    async fn completion_failure_is_bad_gateway() {
        let (app, db) = test_app(&[]).await;
        let (status, json) =
            send(&app, "POST", "/openai/chat", Some(json!({ "message": "Hallo" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].as_str().unwrap().starts_with("completion unavailable"));
        assert!(db.list_interactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn agent_completion_failure_hides_details() {
        let (app, db) = test_app(&[]).await;
        let (status, json) = send(
            &app,
            "POST",
            "/agent/chat",
            Some(json!({ "message": "Wie oft Ölwechsel?" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"], ASSISTANT_UNAVAILABLE);
        assert!(!json.to_string().contains("API key"));
        assert!(db.list_interactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn agent_chat_answers_and_logs() {
        let (app, db) = test_app(&[
            "CATEGORY: WORKSHOP_SEARCH\nFORWARD: YES\nLOCATION: Berlin",
            "Meister Auto in Berlin ist zu empfehlen.",
        ])
        .await;
        let (status, json) = send(
            &app,
            "POST",
            "/agent/chat",
            Some(json!({ "message": "Finde eine Werkstatt in Berlin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["response"].as_str().unwrap().contains("Meister Auto"));
        assert_eq!(db.list_interactions().await.unwrap().len(), 1);
    }
}
