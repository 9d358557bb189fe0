use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::EngineError;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; connect-src 'self'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1/exam-sessions", exam_session_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn exam_session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::exam_sessions::create_session))
        .route(
            "/{id}",
            get(handlers::exam_sessions::get_session)
                .delete(handlers::exam_sessions::close_session),
        )
        .route("/{id}/select", post(handlers::exam_sessions::select_option))
        .route("/{id}/clear", post(handlers::exam_sessions::clear_answer))
        .route("/{id}/review", post(handlers::exam_sessions::mark_for_review))
        .route("/{id}/navigate", post(handlers::exam_sessions::navigate))
        .route(
            "/{id}/visibility",
            post(handlers::exam_sessions::visibility_changed),
        )
        .route("/{id}/submit", post(handlers::exam_sessions::submit))
        .route(
            "/{id}/unload-guard",
            get(handlers::exam_sessions::unload_guard),
        )
        .route("/{id}/stream", get(handlers::sse::session_stream))
}
