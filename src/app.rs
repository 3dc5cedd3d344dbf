use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{db, users};

const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.cors_origins)?;

    let app = Router::new()
        .nest("/api/v1/users", users::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| request_span(req))
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
        // outside the trace layer so probes don't flood the log
        .route("/api/healthz", get(healthz))
        .with_state(state);

    Ok(app)
}

fn request_span<B>(req: &axum::http::Request<B>) -> tracing::Span {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::info_span!(
        "http_request",
        %method,
        uri = %uri,
        status = tracing::field::Empty
    )
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    // a wildcard cannot be combined with credentials
    if origins.iter().any(|o| o == "*") {
        anyhow::bail!("CORS_ALLOWED_ORIGINS must list explicit origins, not \"*\"");
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true))
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match db::ping(&state.db).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error")
        }
    }
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(app = %config.app_name, "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
