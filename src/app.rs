use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::oneshot,
    time::{timeout_at, Instant},
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::request_id;
use crate::shutdown::wait_for_shutdown;
use crate::state::AppState;
use crate::{items, users};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .nest("/api", users::router().merge(items::router()))
        .with_state(state)
        .layer(cors)
        .layer(PropagateRequestIdLayer::new(request_id::header()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let request_id = req
                        .headers()
                        .get(request_id::header())
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("n/a")
                        .to_string();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        %request_id,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
        // outermost, so the trace span and handlers already see the id
        .layer(SetRequestIdLayer::new(request_id::header(), MakeRequestUuid))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "appName": state.config.app_name }))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        // credentials cannot be combined with a wildcard origin
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            request_id::header(),
        ])
        .expose_headers([request_id::header()])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

/// Serve until SIGINT/SIGTERM, then drain in-flight requests for at most
/// `shutdown_timeout` and close the pool.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, app = %state.config.app_name, "listening");

    serve_until(state, listener, wait_for_shutdown()).await
}

/// Serve on `listener` until `signal` resolves. Draining and closing the pool
/// share one deadline; whatever is still running at the deadline is abandoned.
pub async fn serve_until<F>(state: AppState, listener: TcpListener, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let app = build_app(state.clone());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        res = &mut server => {
            // the server stopped on its own
            state.close().await;
            return res.context("server task panicked")?.context("server failed");
        }
        signal = signal => signal?,
    }

    let grace = state.config.shutdown_timeout;
    let deadline = Instant::now() + grace;
    let _ = stop_tx.send(());
    match timeout_at(deadline, &mut server).await {
        Ok(Ok(Ok(()))) => info!("server drained"),
        Ok(Ok(Err(e))) => warn!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "server task failed during shutdown"),
        Err(_) => {
            warn!(
                timeout_secs = grace.as_secs(),
                "shutdown deadline reached; abandoning in-flight requests"
            );
            server.abort();
        }
    }

    // abandoned handlers may still hold connections
    match timeout_at(deadline, state.close()).await {
        Ok(()) => info!("database pool closed"),
        Err(_) => warn!("database pool still busy at the deadline; not waiting"),
    }
    Ok(())
}
