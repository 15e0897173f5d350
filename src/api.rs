//! REST API server
//!
//! Exposes `Orchestrator::handle` over HTTP:
//! - `GET /health`
//! - `POST /api/query` with `{"query": "..."}` → `QueryResponse`

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::models::QueryResponse;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub request_timeout: Duration,
}

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let capabilities: Vec<&str> = state
        .orchestrator
        .capabilities()
        .into_iter()
        .map(|(c, _)| c.as_str())
        .collect();

    Json(serde_json::json!({
        "status": "healthy",
        "capabilities": capabilities,
        "summarizer": state.orchestrator.summarizer_name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn query_handler(
    State(state): State<ApiState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let query = req.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse::error(
                Uuid::new_v4(),
                "질문을 입력해주세요.".to_string(),
            )),
        );
    }

    info!("Received query: {}", query);

    // Dropping the handle future on timeout cancels its capability calls
    match tokio::time::timeout(state.request_timeout, state.orchestrator.handle(query)).await {
        Ok(response) if response.is_success() => (StatusCode::OK, Json(response)),
        Ok(response) => (StatusCode::BAD_GATEWAY, Json(response)),
        Err(_) => {
            let timeout_ms = state.request_timeout.as_millis() as u64;
            warn!(timeout_ms, "Query timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(QueryResponse::error(
                    Uuid::new_v4(),
                    format!("request timed out after {} ms", timeout_ms),
                )),
            )
        }
    }
}

pub fn create_router(orchestrator: Arc<Orchestrator>, request_timeout: Duration) -> Router {
    let state = ApiState {
        orchestrator,
        request_timeout,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
    request_timeout: Duration,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator, request_timeout);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ResultAggregator;
    use crate::classifier::IntentClassifier;
    use crate::collaborators::market_data::tests::sample_dataset;
    use crate::collaborators::{Collaborator, CollaboratorRegistry, InMemoryMarketData};
    use crate::dispatcher::{DispatchTable, Dispatcher};
    use crate::models::{Capability, CollaboratorRequest, CollaboratorResponse, ResponseStatus};
    use crate::summarizer::TemplateSummarizer;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct StalledMarket;

    #[async_trait::async_trait]
    impl Collaborator for StalledMarket {
        fn capability(&self) -> Capability {
            Capability::PriceLookup
        }

        fn description(&self) -> &'static str {
            "never answers in time"
        }

        async fn execute(&self, _request: &CollaboratorRequest) -> crate::Result<CollaboratorResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CollaboratorResponse::success(serde_json::json!({})))
        }
    }

    fn router_with(market: Arc<dyn Collaborator>, request_timeout: Duration) -> Router {
        let mut registry = CollaboratorRegistry::new();
        registry.register(market);
        let orchestrator = Orchestrator::new(
            IntentClassifier::new(),
            Dispatcher::new(registry, DispatchTable::new(), Duration::from_secs(10)),
            ResultAggregator::new(),
            Box::new(TemplateSummarizer),
        );
        create_router(Arc::new(orchestrator), request_timeout)
    }

    fn router() -> Router {
        router_with(
            Arc::new(InMemoryMarketData::new(sample_dataset())),
            Duration::from_secs(5),
        )
    }

    fn post_query(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "query": query }).to_string()))
            .unwrap()
    }

    async fn read_envelope(response: axum::response::Response) -> QueryResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["capabilities"][0], "price-lookup");
    }

    #[tokio::test]
    async fn test_query_returns_envelope() {
        let response = router().oneshot(post_query("상승률 상위 2개 종목")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let envelope = read_envelope(response).await;
        assert_eq!(envelope.status, ResponseStatus::Success);
        assert!(envelope.response.unwrap().contains("에코프로비엠"));
        assert_eq!(envelope.structured.unwrap().parameters.limit, Some(2));
    }

    #[tokio::test]
    async fn test_blank_query_is_bad_request() {
        let response = router().oneshot(post_query("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_envelope(response).await.status, ResponseStatus::Error);
    }

    #[tokio::test]
    async fn test_timeout_is_gateway_timeout() {
        let router = router_with(Arc::new(StalledMarket), Duration::from_millis(20));
        let response = router.oneshot(post_query("카카오 현재가")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let envelope = read_envelope(response).await;
        assert!(envelope.message.unwrap().contains("timed out after 20 ms"));
    }
}
