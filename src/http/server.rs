//! Front server setup.
//!
//! # Responsibilities
//! - Create the Axum router; every path is a proxied URL
//! - Wire up middleware (request ID, tracing)
//! - Hand requests to `Relay::launch` and write the result back
//! - Serve with graceful shutdown

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::FrontConfig;
use crate::dispatch::Relay;
use crate::http::request::{into_front_request, RequestUuid, X_REQUEST_ID};
use crate::http::response::{bad_gateway, into_front_response};

/// State injected into the handler.
#[derive(Clone)]
pub struct FrontState {
    pub relay: Arc<Relay>,
    pub body_limit: usize,
}

/// Local HTTP front for the relay engine.
pub struct FrontServer {
    router: Router,
}

impl FrontServer {
    pub fn new(config: &FrontConfig, relay: Arc<Relay>) -> Self {
        let state = FrontState {
            relay,
            body_limit: config.max_body_bytes,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: FrontState) -> Router {
        Router::new()
            .fallback(front_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(RequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Front server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Front server stopped");
        Ok(())
    }
}

async fn front_handler(State(state): State<FrontState>, request: Request<Body>) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let front = match into_front_request(state.relay.urls(), request, state.body_limit).await {
        Ok(front) => front,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Rejected front request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %front.request.method,
        url = %front.target,
        client = %front.client,
        "Launching"
    );

    match state.relay.launch(front.request, &front.target, &front.client).await {
        Some(launched) => into_front_response(launched, state.relay.cookies()),
        None => {
            tracing::warn!(request_id = %request_id, url = %front.target, "Launch failed");
            bad_gateway()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RelayConfig, RelayNodeConfig};
    use tower::ServiceExt;

    fn server() -> FrontServer {
        let mut config = RelayConfig::default();
        config.relay.nodes.push(RelayNodeConfig {
            name: "a".into(),
            host: "a.test".into(),
            weight: 1,
        });
        let relay = Arc::new(Relay::from_config(&config).unwrap());
        FrontServer::new(&config.front, relay)
    }

    #[tokio::test]
    async fn test_non_proxied_path_is_rejected_with_request_id() {
        let response = server()
            .router()
            .oneshot(Request::get("/favicon.ico").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }
}
