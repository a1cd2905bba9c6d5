//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router that hands every path to one [`Endpoint`]
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a listener until the shutdown signal fires
//!
//! # Design Decisions
//! - Shutdown is graceful but bounded: connections still open after the
//!   grace period are dropped with the server future

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::http::endpoint::{Endpoint, EndpointError};
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;

/// Plaintext HTTP server in front of a single endpoint.
pub struct HttpServer {
    router: Router,
    shutdown_grace: Duration,
}

impl HttpServer {
    pub fn new<E: Endpoint>(config: &HttpConfig, endpoint: E) -> Self {
        let router = Self::build_router(config, Arc::new(endpoint));
        Self {
            router,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<E: Endpoint>(config: &HttpConfig, endpoint: Arc<E>) -> Router {
        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

        Router::new()
            .route("/", any(serve_endpoint::<E>))
            .route("/{*path}", any(serve_endpoint::<E>))
            .with_state(endpoint)
            .layer(layers)
    }

    /// The router, for serving it some other way.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// In-flight connections get the configured grace period to finish,
    /// then the listener and every remaining connection are dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut draining = shutdown.clone();
        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { draining.wait().await })
            .into_future();
        let grace = self.shutdown_grace;

        tokio::select! {
            result = server => result?,
            _ = async {
                shutdown.wait().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(grace = ?grace, "HTTP connections still open after grace period, dropping them");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Decode, handle and encode one request, logging any error.
async fn serve_endpoint<E: Endpoint>(
    State(endpoint): State<Arc<E>>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = match dispatch(endpoint.as_ref(), request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %e,
                "Endpoint error"
            );
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start_time);
    response
}

async fn dispatch<E: Endpoint>(endpoint: &E, request: Request<Body>) -> Result<Response, EndpointError> {
    let decoded = endpoint.decode(request).await?;
    let response = endpoint.handle(decoded).await?;
    endpoint.encode(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::Shutdown;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    /// Echoes the `name` query parameter, rejecting requests without one.
    struct Greeter;

    impl Endpoint for Greeter {
        type Request = String;
        type Response = serde_json::Value;

        async fn decode(&self, request: Request<Body>) -> Result<String, EndpointError> {
            request
                .uri()
                .query()
                .and_then(|q| q.strip_prefix("name="))
                .map(str::to_string)
                .ok_or_else(|| EndpointError::Decode("missing name".into()))
        }

        async fn handle(&self, name: String) -> Result<serde_json::Value, EndpointError> {
            if name == "nobody" {
                return Err(EndpointError::Handler("no such person".into()));
            }
            Ok(serde_json::json!({ "hello": name }))
        }
    }

    fn router() -> Router {
        HttpServer::new(&HttpConfig::default(), Greeter).router()
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn routes_any_path_to_endpoint() {
        let response = router()
            .oneshot(Request::get("/deep/path?name=ada").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body(response).await, "{\"hello\":\"ada\"}\n");
    }

    #[tokio::test]
    async fn keeps_client_request_id() {
        let response = router()
            .oneshot(
                Request::post("/?name=ada")
                    .header("x-request-id", "client-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "client-7");
    }

    #[tokio::test]
    async fn decode_and_handler_errors() {
        let response = router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(response).await, "decode: missing name");

        let response = router()
            .oneshot(Request::get("/?name=nobody").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn run_returns_after_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(&HttpConfig::default(), Greeter);

        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stalled_request_does_not_outlive_grace_period() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let config = HttpConfig {
            shutdown_grace_secs: 1,
            ..HttpConfig::default()
        };
        let server = HttpServer::new(&config, Greeter);
        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

        // Headers never finished: no blank line.
        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut client, b"GET / HTTP/1.1\r\nHost: x\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("server should stop once the grace period ends")
            .unwrap();
        assert!(result.is_ok());
        drop(client);
    }
}
