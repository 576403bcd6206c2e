mod error;
mod handlers;

use std::time::Instant;

use axum::{
    Json, Router,
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use eveboard_app::AppRuntime;
use log::{error, info, warn};

pub use error::ApiError;

/// Builds the dashboard API with every route bound to `runtime`.
pub fn router(runtime: AppRuntime) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/auth/login", get(handlers::login))
        .route("/auth/callback", get(handlers::callback))
        .route("/auth/verify/{token_id}", get(handlers::verify_token))
        .route("/auth/refresh/{token_id}", post(handlers::refresh_token))
        .route("/sync/enqueue/assets/{token_id}", post(handlers::enqueue_assets))
        .route(
            "/sync/enqueue/industry/{token_id}",
            post(handlers::enqueue_industry_jobs),
        )
        .route("/sync/status/{job_id}", get(handlers::job_status))
        .route("/dashboard/overview", get(handlers::overview))
        .route("/data/assets/{character_id}", get(handlers::assets))
        .route(
            "/data/industry-jobs/{character_id}",
            get(handlers::industry_jobs),
        )
        .route("/data/sde-type/{type_id}", get(handlers::sde_type))
        .route("/data/sde-group/{group_id}", get(handlers::sde_group))
        .fallback(not_found)
        .layer(middleware::from_fn(access_log))
        .with_state(runtime)
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not_found", "message": "no such route" })),
    )
        .into_response()
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let resp = next.run(req).await;

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis();
    if status.is_server_error() {
        error!("| {:>3} | {:^7} | {path} | {latency_ms}ms", status.as_u16(), method.as_str());
    } else if status.is_client_error() {
        warn!("| {:>3} | {:^7} | {path} | {latency_ms}ms", status.as_u16(), method.as_str());
    } else {
        info!("| {:>3} | {:^7} | {path} | {latency_ms}ms", status.as_u16(), method.as_str());
    }

    resp
}
