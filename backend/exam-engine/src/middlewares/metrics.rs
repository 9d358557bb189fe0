use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per route.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(req.uri().path());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Collapses session ids so every session shares one label set.
fn route_label(path: &str) -> String {
    let mut segments = path.split('/').peekable();
    let mut label = Vec::new();
    let mut after_sessions = false;

    while let Some(segment) = segments.next() {
        if after_sessions && !segment.is_empty() {
            label.push("{id}");
            after_sessions = false;
            continue;
        }
        after_sessions = segment == "exam-sessions" && segments.peek().is_some();
        label.push(segment);
    }

    label.join("/")
}
