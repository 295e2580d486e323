//! Health, metrics and status endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use rbacsync_sync::Counters;

use crate::error::{io_err, DaemonError};
use crate::status::{DaemonStatus, SharedStatus};

#[derive(Clone)]
pub struct HttpState {
    pub counters: Arc<Counters>,
    pub status: SharedStatus,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .with_state(state)
}

/// Serve until a shutdown message arrives.
pub async fn serve(
    addr: SocketAddr,
    state: HttpState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| DaemonError::Bind { addr, source })?;
    tracing::info!(%addr, "serving /healthz, /metrics and /status");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| io_err("http server", e))
}

async fn healthz() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    match state.counters.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.counters.content_type())],
            body,
        ),
        Err(error) => {
            tracing::error!(%error, "unable to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_string())],
                error.to_string(),
            )
        }
    }
}

async fn status(State(state): State<HttpState>) -> Json<DaemonStatus> {
    Json(state.status.read().await.clone())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    use rbacsync_sync::{Category, Metrics};

    use super::*;

    fn state() -> HttpState {
        HttpState {
            counters: Arc::new(Counters::new().expect("counters")),
            status: DaemonStatus::shared(Utc::now()),
        }
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let (status, body) = get_body(router(state()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn metrics_expose_counters() {
        let state = state();
        state.counters.record_success(Category::CreateRolebinding);
        state.counters.record_failure(Category::ListNamespaces);

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .expect("request");
        let response = router(state.clone())
            .oneshot(request)
            .await
            .expect("response");
        let content_type = response.headers()[header::CONTENT_TYPE]
            .to_str()
            .expect("ascii");
        assert!(content_type.starts_with("text/plain; version=0.0.4"));

        let (status, body) = get_body(router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("rbac_sync_success{operation=\"create-rolebinding\"} 1"));
        assert!(body.contains("rbac_sync_errors{operation=\"list-namespaces\"} 1"));
    }

    #[tokio::test]
    async fn status_reports_cycle_counts() {
        let state = state();
        state
            .status
            .write()
            .await
            .record_abort(Utc::now(), "unable to list namespaces".to_string());

        let (status, body) = get_body(router(state), "/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["aborted_cycles"], serde_json::json!(1));
        assert_eq!(json["last_error"], "unable to list namespaces");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (status, _) = get_body(router(state()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
