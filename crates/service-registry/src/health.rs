use axum::{routing::get, Router};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::registry::ServiceDiscovery;

/// Router answering the registry's health check at `/{endpoint}`.
pub fn router(endpoint: &str) -> Router {
    let path = format!("/{}", endpoint.trim_start_matches('/'));
    Router::new()
        .route(&path, get(health))
        .layer(TraceLayer::new_for_http())
}

pub async fn health() -> &'static str {
    "OK"
}

/// Bind the health listener on all interfaces at `port`.
pub async fn bind(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Serve the health endpoint on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, endpoint: &str, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(
        "Health endpoint listening on http://{}/{}",
        listener.local_addr()?,
        endpoint.trim_start_matches('/')
    );

    axum::serve(listener, router(endpoint))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Serve the health endpoint on all interfaces at `port` until `shutdown` resolves.
pub async fn serve<F>(endpoint: &str, port: u16, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(port).await?;
    serve_on(listener, endpoint, shutdown).await
}

/// Register `discovery`, serve its health endpoint until `shutdown` resolves,
/// then deregister.
///
/// The listener is bound before registering, so a port that cannot be bound
/// never leaves an entry behind. Once registered, the instance is deregistered
/// even when serving fails.
pub async fn serve_registered<F>(discovery: &ServiceDiscovery, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let options = discovery.options();
    let listener = bind(options.listen_port).await?;

    discovery.register().await?;

    let served = serve_on(listener, &options.health_endpoint, shutdown).await;
    if let Err(e) = &served {
        tracing::error!("Health endpoint stopped with error: {}", e);
    }

    discovery.deregister().await?;
    served?;
    Ok(())
}

/// Resolves once `signal` fires. If the signal cannot be awaited the error is
/// logged and this never resolves, so the caller keeps serving.
pub async fn shutdown_on<S>(signal: S)
where
    S: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal, serving until killed: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn answers_on_configured_endpoint() {
        let response = router("ok")
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn leading_slash_is_accepted() {
        let response = router("/healthz")
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn shutdown_on_resolves_when_signal_fires() {
        let waited = tokio::time::timeout(
            Duration::from_millis(200),
            shutdown_on(async { Ok::<(), io::Error>(()) }),
        )
        .await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn shutdown_on_keeps_waiting_when_signal_fails() {
        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            shutdown_on(async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no handler")) }),
        )
        .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn bind_fails_when_port_is_taken() {
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        assert!(bind(port).await.is_err());
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let response = router("ok")
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
