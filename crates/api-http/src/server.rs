//! HTTP Server
//!
//! Binds the router on TCP and serves until the shutdown token fires.

use crate::handler::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use callq_core::application::ShutdownToken;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
const DEFAULT_HTTP_PORT: u16 = 8000;

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::welcome))
        .route("/health", get(handler::health))
        .route("/queue/increment", post(handler::join_queue))
        .route("/queue/decrement", post(handler::leave_queue))
        .route("/queue/:queue_name/:phone_number", get(handler::get_position))
        .route("/queues/summary", get(handler::summary))
        .route("/stream/queues/summary", get(handler::stream_summary))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Dashboard is served from another origin
        .layer(CorsLayer::permissive())
}

/// HTTP Server
pub struct HttpServer {
    config: HttpServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and start serving in a background task
    ///
    /// When `shutdown` fires the listener stops accepting and every open
    /// summary stream is closed so in-flight connections can drain.
    pub async fn start(self, mut shutdown: ShutdownToken) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind HTTP server on {}: {}", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read local address: {}", e))?;

        info!(addr = %local_addr, "HTTP server listening");

        let hub = self.state.hub.clone();
        let router = create_router(self.state);

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown.wait().await;
                    hub.close_all();
                })
                .await;

            match &result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => error!(error = %e, "HTTP server failed"),
            }
            result
        });

        Ok(ServerHandle { local_addr, task })
    }
}

/// Running HTTP server
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server task to exit after shutdown was signalled
    pub async fn stopped(self) -> Result<(), String> {
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("HTTP server error: {}", e)),
            Err(e) => Err(format!("HTTP server task panicked: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callq_core::application::{
        shutdown_channel, AggregationCache, BroadcastHub, QueueService, ShutdownSender,
    };
    use callq_core::port::queue_repository::mocks::InMemoryQueueRepository;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct TestServer {
        base_url: String,
        cache: Arc<AggregationCache>,
        hub: BroadcastHub,
        repo: InMemoryQueueRepository,
        shutdown: ShutdownSender,
        handle: ServerHandle,
    }

    async fn spawn_server() -> TestServer {
        let repo = InMemoryQueueRepository::new();
        let service = Arc::new(QueueService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        ));
        let cache = Arc::new(AggregationCache::new(Arc::new(repo.clone()), vec![]));
        let hub = BroadcastHub::new(8);
        let state = AppState::new(service, cache.clone(), hub.clone());

        let config = HttpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let (shutdown, token) = shutdown_channel();
        let handle = HttpServer::new(config, state).start(token).await.unwrap();

        TestServer {
            base_url: format!("http://{}", handle.local_addr()),
            cache,
            hub,
            repo,
            shutdown,
            handle,
        }
    }

    async fn post(server: &TestServer, path: &str, body: Value) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{}{}", server.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_join_leave_over_http() {
        let server = spawn_server().await;
        let caller = json!({"phone_number": "555-1111", "queue_name": "Sales"});

        let (status, body) = post(&server, "/queue/increment", caller.clone()).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"position": 1}));

        let (status, body) = post(&server, "/queue/increment", caller.clone()).await;
        assert_eq!(status, 409);
        assert_eq!(body["error"]["code"], "DUPLICATE_MEMBERSHIP");

        let (status, body) = post(&server, "/queue/decrement", caller.clone()).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({}));

        let (status, body) = post(&server, "/queue/decrement", caller).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"]["code"], "NOT_IN_QUEUE");

        server.shutdown.shutdown();
        server.handle.stopped().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_input_is_bad_request() {
        let server = spawn_server().await;

        let (status, body) =
            post(&server, "/queue/increment", json!({"phone_number": "555-1111"})).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = post(
            &server,
            "/queue/increment",
            json!({"phone_number": "  ", "queue_name": "Sales"}),
        )
        .await;
        assert_eq!(status, 400);

        let resp = reqwest::Client::new()
            .post(format!("{}/queue/increment", server.base_url))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        assert!(server.repo.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_position_lookup() {
        let server = spawn_server().await;
        for phone in ["1", "2"] {
            post(
                &server,
                "/queue/increment",
                json!({"phone_number": phone, "queue_name": "Support"}),
            )
            .await;
        }

        let resp = reqwest::get(format!("{}/queue/Support/2", server.base_url))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["position"], 2);

        let resp = reqwest::get(format!("{}/queue/Support/9", server.base_url))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_store_failure_is_service_unavailable() {
        let server = spawn_server().await;
        for phone in ["1", "2"] {
            post(
                &server,
                "/queue/increment",
                json!({"phone_number": phone, "queue_name": "Sales"}),
            )
            .await;
        }
        let before = server.repo.entries().await;

        server.repo.set_fail_writes(true);
        let (status, body) = post(
            &server,
            "/queue/decrement",
            json!({"phone_number": "1", "queue_name": "Sales"}),
        )
        .await;
        assert_eq!(status, 503);
        assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");

        let (status, _) = post(
            &server,
            "/queue/increment",
            json!({"phone_number": "3", "queue_name": "Sales"}),
        )
        .await;
        assert_eq!(status, 503);

        assert_eq!(server.repo.entries().await, before);
    }

    #[tokio::test]
    async fn test_join_completes_after_client_disconnects() {
        let server = spawn_server().await;
        let hold = server.repo.hold().await;

        let result = reqwest::Client::new()
            .post(format!("{}/queue/increment", server.base_url))
            .json(&json!({"phone_number": "555-1111", "queue_name": "Sales"}))
            .timeout(std::time::Duration::from_millis(100))
            .send()
            .await;
        assert!(result.is_err());

        drop(hold);
        let mut entries = Vec::new();
        for _ in 0..50 {
            entries = server.repo.entries().await;
            if !entries.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position, 1);
    }

    #[tokio::test]
    async fn test_cached_summary_and_health() {
        let server = spawn_server().await;

        let body: Value = reqwest::get(format!("{}/queues/summary", server.base_url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({}));

        post(
            &server,
            "/queue/increment",
            json!({"phone_number": "1", "queue_name": "Sales"}),
        )
        .await;
        server.cache.refresh().await.unwrap();

        let body: Value = reqwest::get(format!("{}/queues/summary", server.base_url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"Sales": 1}));

        let health: Value = reqwest::get(format!("{}/health", server.base_url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_stream_primed_then_closed_on_shutdown() {
        let server = spawn_server().await;
        post(
            &server,
            "/queue/increment",
            json!({"phone_number": "1", "queue_name": "Sales"}),
        )
        .await;
        server.cache.refresh().await.unwrap();

        let resp = reqwest::get(format!("{}/stream/queues/summary", server.base_url))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let mut body = resp.bytes_stream();
        let mut received = String::new();
        while !received.contains("\n\n") {
            let chunk = body.next().await.unwrap().unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(received.contains(r#"data: {"Sales":1}"#));
        assert_eq!(server.hub.subscriber_count(), 1);

        server.shutdown.shutdown();
        while let Some(chunk) = body.next().await {
            if chunk.is_err() {
                break;
            }
        }
        server.handle.stopped().await.unwrap();
        assert_eq!(server.hub.subscriber_count(), 0);
    }
}
