//! Tiny HTTP responder so that an external uptime monitor has something to
//! ping. It knows nothing about the bot itself.

use std::net::{Ipv4Addr, SocketAddr};

use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;

async fn index() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Bot is running!")
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Routes served by [`serve`]: `GET /` and `GET /health`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

/// Serve the keep-alive routes on `0.0.0.0:port` until the process dies.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("Keep-alive responder listening on {addr}");
    axum::serve(listener, router()).await
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;

    async fn get_path(path: &str) -> (StatusCode, String) {
        let response = router()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_and_health_are_ok() {
        assert_eq!(
            get_path("/").await,
            (StatusCode::OK, "Bot is running!".to_string())
        );
        assert_eq!(get_path("/health").await, (StatusCode::OK, "OK".to_string()));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (status, _) = get_path("/amogus").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
