use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::api::auth::{extract_bearer, AccessRequest};
use crate::api::render::{Renderer, JSON_CONTENT_TYPE};
use crate::api::ApiState;
use crate::error::ApiError;

/// Policy check before dispatch; rejects with the JSON error envelope.
pub async fn authorize(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let allowed = {
        let access = AccessRequest {
            method: req.method(),
            path: req.uri().path(),
            bearer: extract_bearer(req.headers()),
        };
        state.authorizer.authorize(&access)
    };

    if !allowed {
        tracing::warn!(method = %req.method(), path = %req.uri().path(), "request denied by authorization policy");
        return Renderer::new(state.error_status).render_error(&ApiError::Unauthorized);
    }

    next.run(req).await
}

/// Every API response is JSON, whatever the handler or extractor produced.
pub async fn force_json(mut res: Response) -> Response {
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    res
}

pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let res = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = res.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    res
}
