//! HTTP endpoint for the station's custom upload server.
//!
//! The station issues `GET /data?tempf=..&humidity=..` on every report.
//! Success is an empty `200 OK`.

use crate::config::HttpConfig;
use crate::dispatch::{report_from_pairs, DispatchError, Dispatcher};
use crate::publisher::Publisher;
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = if self.has_transform_failure() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, self.to_string()).into_response()
    }
}

/// GET /data - Republish a station report
async fn ingest_report<P: Publisher>(
    State(dispatcher): State<Arc<Dispatcher<P>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<StatusCode, DispatchError> {
    let report = report_from_pairs(pairs);
    log::debug!("/data {:?}", report);
    match dispatcher.dispatch(&report).await {
        Ok(handled) => {
            log::debug!("Report handled: {} of {} fields recognized", handled, report.len());
            Ok(StatusCode::OK)
        }
        Err(e) => {
            log::error!("Report failed: {}", e);
            Err(e)
        }
    }
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Access log, debug level only.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::debug!(
        "{} {} {} {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Create the HTTP router
pub fn create_router<P: Publisher>(dispatcher: Arc<Dispatcher<P>>) -> Router {
    Router::new()
        .route("/data", get(ingest_report::<P>))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(dispatcher)
}

/// Serve on an already-bound listener until `shutdown` fires.
pub async fn serve<P: Publisher>(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<P>>,
    mut shutdown: watch::Receiver<()>,
) -> std::io::Result<()> {
    let app = create_router(dispatcher);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            log::info!("HTTP server shutting down");
        })
        .await
}

/// Run the HTTP server
pub async fn run_http_server<P: Publisher>(
    dispatcher: Arc<Dispatcher<P>>,
    config: &HttpConfig,
    shutdown: watch::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    log::info!("HTTP server listening on {}:{}", config.bind, config.port);
    serve(listener, dispatcher, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::FieldFailure;
    use crate::publisher::PublishError;
    use crate::sensor::{HandleError, TransformError};

    fn failure(error: HandleError) -> DispatchError {
        DispatchError {
            failures: vec![FieldFailure {
                field: "dateutc",
                error,
            }],
        }
    }

    #[test]
    fn test_transform_failure_is_bad_request() {
        let err = failure(HandleError::Transform(TransformError::MissingSeparator {
            value: "x".into(),
        }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_publish_failure_is_unavailable() {
        let err = failure(HandleError::Publish(PublishError::SendFailed {
            topic: "t".into(),
            reason: "closed".into(),
        }));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
