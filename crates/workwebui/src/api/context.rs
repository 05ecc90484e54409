//! Per-request context handed to every API handler.

use std::collections::HashMap;
use std::future::Future;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use tokio::sync::watch;

use crate::api::render::{error_response, Renderer};
use crate::api::ApiState;
use crate::client::{EngineResult, NamespaceClient};
use crate::error::ApiError;

/// Broadcast from the lifecycle controller telling in-flight handlers to
/// give up on outstanding engine calls.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn channel() -> (watch::Sender<bool>, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, ShutdownSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> ShutdownSignal {
        let (_tx, signal) = Self::channel();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested; pends forever if the
    /// sending side is gone without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Namespace-bound engine handle plus the rendering policy, built fresh for
/// each request from the `:namespace` path segment.
pub struct RequestContext {
    pub client: NamespaceClient,
    renderer: Renderer,
    shutdown: ShutdownSignal,
}

impl RequestContext {
    pub fn new(client: NamespaceClient, renderer: Renderer, shutdown: ShutdownSignal) -> Self {
        Self {
            client,
            renderer,
            shutdown,
        }
    }

    pub fn namespace(&self) -> &str {
        self.client.namespace()
    }

    /// Run one engine call, abandoning it if the server is being torn down.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = EngineResult<T>>,
    {
        let res = tokio::select! {
            res = fut => res.map_err(ApiError::from),
            _ = self.shutdown.cancelled() => Err(ApiError::ShuttingDown),
        };

        if let Err(e) = &res {
            tracing::error!(namespace = %self.namespace(), error = %e, "engine call failed");
        }
        res
    }

    pub fn render<T: Serialize>(&self, result: Result<T, ApiError>) -> Response {
        self.renderer.render(result)
    }
}

#[async_trait]
impl FromRequestParts<ApiState> for RequestContext {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let renderer = Renderer::new(state.error_status);

        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                renderer.render_error(&ApiError::InvalidPath(rejection.body_text()))
            })?;

        let namespace = match params.get("namespace") {
            Some(ns) if !ns.is_empty() => ns.clone(),
            _ => {
                return Err(error_response(
                    StatusCode::NOT_FOUND,
                    "namespace missing from path".to_string(),
                ))
            }
        };

        Ok(RequestContext::new(
            NamespaceClient::new(namespace, state.engine.clone()),
            renderer,
            state.shutdown.clone(),
        ))
    }
}
