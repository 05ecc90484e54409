use std::future::Future;
use std::sync::Arc;

use axum::response::Html;
use axum::{
    extract::{rejection::PathRejection, Path},
    http::{StatusCode, Uri},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::api::auth::{AllowAll, Authorizer, BearerToken};
use crate::api::context::{RequestContext, ShutdownSignal};
use crate::api::models::{JobPage, StatusAck};
use crate::api::pagination::page_from_uri;
use crate::api::render::error_response;
use crate::client::{DeadJobKey, EngineResult, SharedEngine};
use crate::config::Config;
use crate::error::{ApiError, ErrorStatusMode};

pub mod auth;
pub mod context;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod render;

#[derive(Clone)]
pub struct ApiState {
    pub engine: SharedEngine,
    pub authorizer: Arc<dyn Authorizer>,
    pub error_status: ErrorStatusMode,
    pub shutdown: ShutdownSignal,
}

impl ApiState {
    /// Open access, legacy status codes, never cancelled.
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            authorizer: Arc::new(AllowAll),
            error_status: ErrorStatusMode::Legacy,
            shutdown: ShutdownSignal::never(),
        }
    }

    pub fn from_config(engine: SharedEngine, cfg: &Config) -> Self {
        let state = Self::new(engine).with_error_status(cfg.error_status);
        match &cfg.api_token {
            Some(token) => state.with_authorizer(BearerToken::new(token.clone(), cfg.token_scope)),
            None => state,
        }
    }

    pub fn with_error_status(mut self, mode: ErrorStatusMode) -> Self {
        self.error_status = mode;
        self
    }

    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// The full route table. Built once; nothing about it changes per request.
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/:namespace/queues", get(queues))
        .route("/:namespace/worker_pools", get(worker_pools))
        .route("/:namespace/busy_workers", get(busy_workers))
        .route("/:namespace/retry_jobs", get(retry_jobs))
        .route("/:namespace/scheduled_jobs", get(scheduled_jobs))
        .route("/:namespace/dead_jobs", get(dead_jobs))
        .route(
            "/:namespace/delete_dead_job/:died_at/:job_id",
            post(delete_dead_job),
        )
        .route(
            "/:namespace/retry_dead_job/:died_at/:job_id",
            post(retry_dead_job),
        )
        .route("/:namespace/delete_all_dead_jobs", post(delete_all_dead_jobs))
        .route("/:namespace/retry_all_dead_jobs", post(retry_all_dead_jobs))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize,
        ))
        .layer(axum_middleware::map_response(middleware::force_json));

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .merge(api)
        .layer(axum_middleware::from_fn(middleware::log_requests))
        .with_state(state)
}

const WELCOME_HTML: &str = "<h2>Welcome to workwebui.</h2>
<h4>Please provide a namespace in the url.</h4>
<h4>Example: <a href='/ns/queues'>/ns/queues</a></h4>
";

pub async fn welcome() -> Html<&'static str> {
    Html(WELCOME_HTML)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// ----------------------------
// Read-only views
// ----------------------------

pub async fn queues(ctx: RequestContext) -> Response {
    let res = ctx.call(ctx.client.queues()).await;
    ctx.render(res)
}

pub async fn worker_pools(ctx: RequestContext) -> Response {
    let res = ctx.call(ctx.client.worker_pool_heartbeats()).await;
    ctx.render(res)
}

pub async fn busy_workers(ctx: RequestContext) -> Response {
    let res = ctx.call(ctx.client.busy_workers()).await;
    ctx.render(res)
}

async fn paged<T, F, Fut>(ctx: &RequestContext, uri: &Uri, fetch: F) -> Result<JobPage<T>, ApiError>
where
    F: FnOnce(u64) -> Fut,
    Fut: Future<Output = EngineResult<(Vec<T>, i64)>>,
{
    let page = page_from_uri(uri)?;
    let (jobs, count) = ctx.call(fetch(page.get())).await?;
    Ok(JobPage { count, jobs })
}

pub async fn retry_jobs(ctx: RequestContext, uri: Uri) -> Response {
    let res = paged(&ctx, &uri, |page| ctx.client.retry_jobs(page)).await;
    ctx.render(res)
}

pub async fn scheduled_jobs(ctx: RequestContext, uri: Uri) -> Response {
    let res = paged(&ctx, &uri, |page| ctx.client.scheduled_jobs(page)).await;
    ctx.render(res)
}

pub async fn dead_jobs(ctx: RequestContext, uri: Uri) -> Response {
    let res = paged(&ctx, &uri, |page| ctx.client.dead_jobs(page)).await;
    ctx.render(res)
}

// ----------------------------
// Dead set mutations
// ----------------------------

#[derive(Debug, Deserialize)]
pub struct DeadJobPath {
    pub namespace: String,
    pub died_at: String,
    pub job_id: String,
}

impl DeadJobPath {
    /// The route only exists for `died_at` segments that start with a digit.
    pub fn matches_route(&self) -> bool {
        self.died_at.as_bytes().first().is_some_and(u8::is_ascii_digit)
    }

    pub fn key(&self) -> Result<DeadJobKey, ApiError> {
        let died_at = self
            .died_at
            .parse::<i64>()
            .map_err(|source| ApiError::InvalidDiedAt {
                value: self.died_at.clone(),
                source,
            })?;
        Ok(DeadJobKey::new(died_at, self.job_id.clone()))
    }
}

fn dead_job_path(path: Result<Path<DeadJobPath>, PathRejection>) -> Result<DeadJobPath, ApiError> {
    path.map(|Path(path)| path)
        .map_err(|rejection| ApiError::InvalidPath(rejection.body_text()))
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found".to_string())
}

pub async fn delete_dead_job(
    ctx: RequestContext,
    path: Result<Path<DeadJobPath>, PathRejection>,
) -> Response {
    let path = match dead_job_path(path) {
        Ok(path) => path,
        Err(e) => return ctx.render::<StatusAck>(Err(e)),
    };
    if !path.matches_route() {
        return not_found();
    }

    let res = match path.key() {
        Ok(key) => ctx.call(ctx.client.delete_dead_job(&key)).await,
        Err(e) => Err(e),
    };

    if res.is_ok() {
        tracing::info!(namespace = %ctx.namespace(), died_at = %path.died_at, job_id = %path.job_id, "deleted dead job");
    }
    ctx.render(res.map(|()| StatusAck::OK))
}

pub async fn retry_dead_job(
    ctx: RequestContext,
    path: Result<Path<DeadJobPath>, PathRejection>,
) -> Response {
    let path = match dead_job_path(path) {
        Ok(path) => path,
        Err(e) => return ctx.render::<StatusAck>(Err(e)),
    };
    if !path.matches_route() {
        return not_found();
    }

    let res = match path.key() {
        Ok(key) => ctx.call(ctx.client.retry_dead_job(&key)).await,
        Err(e) => Err(e),
    };

    if res.is_ok() {
        tracing::info!(namespace = %ctx.namespace(), died_at = %path.died_at, job_id = %path.job_id, "re-enqueued dead job");
    }
    ctx.render(res.map(|()| StatusAck::OK))
}

/// Irreversible and unconfirmed: callers gate this above the API.
pub async fn delete_all_dead_jobs(ctx: RequestContext) -> Response {
    tracing::warn!(namespace = %ctx.namespace(), "deleting all dead jobs");
    let res = ctx.call(ctx.client.delete_all_dead_jobs()).await;
    ctx.render(res.map(|()| StatusAck::OK))
}

pub async fn retry_all_dead_jobs(ctx: RequestContext) -> Response {
    tracing::warn!(namespace = %ctx.namespace(), "re-enqueueing all dead jobs");
    let res = ctx.call(ctx.client.retry_all_dead_jobs()).await;
    ctx.render(res.map(|()| StatusAck::OK))
}
