//! Lifecycle controller for the management API listener.
//!
//! `Created -> Running -> Stopping -> Stopped`, one way only. `start` spawns
//! the accept loop on the tokio runtime and returns straight away; `stop`
//! closes the listener and waits for every request already being handled.
//! With a shutdown timeout configured, requests still running when it
//! expires are told to abandon their engine calls, and `stop` then waits for
//! them to answer.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::{self, context::ShutdownSignal, ApiState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot {action} a server that is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: Lifecycle,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

pub struct WebUiServer {
    bind: Option<Bind>,
    app: Option<Router>,
    lifecycle: Lifecycle,
    shutdown_timeout: Option<Duration>,
    cancel_tx: watch::Sender<bool>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<io::Result<()>>>,
    exited_rx: Option<watch::Receiver<bool>>,
}

impl WebUiServer {
    /// Server that binds `addr` (host:port) when started.
    pub fn new(addr: impl Into<String>, state: ApiState) -> Self {
        Self::with_bind(Bind::Addr(addr.into()), state)
    }

    /// Server over an already-bound listener.
    pub fn from_listener(listener: TcpListener, state: ApiState) -> Self {
        Self::with_bind(Bind::Listener(listener), state)
    }

    fn with_bind(bind: Bind, state: ApiState) -> Self {
        let (cancel_tx, shutdown) = ShutdownSignal::channel();
        let app = api::router(state.with_shutdown(shutdown));

        Self {
            bind: Some(bind),
            app: Some(app),
            lifecycle: Lifecycle::Created,
            shutdown_timeout: None,
            cancel_tx,
            stop_tx: None,
            handle: None,
            exited_rx: None,
        }
    }

    /// Bound how long `stop` waits before cancelling in-flight requests.
    pub fn with_shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Address of a pre-bound listener; `None` once started or for `new`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.bind {
            Some(Bind::Listener(l)) => l.local_addr().ok(),
            _ => None,
        }
    }

    /// Spawn the accept loop. Does not wait for the listener to be ready.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let (Lifecycle::Created, Some(bind), Some(app)) =
            (self.lifecycle, self.bind.take(), self.app.take())
        else {
            return Err(ServerError::InvalidTransition {
                action: "start",
                state: self.lifecycle,
            });
        };

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (exited_tx, exited_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let res = serve(bind, app, stop_rx).await;
            if let Err(e) = &res {
                tracing::error!(error = %e, "webui server exited with error");
            }
            exited_tx.send_replace(true);
            res
        });

        self.stop_tx = Some(stop_tx);
        self.exited_rx = Some(exited_rx);
        self.handle = Some(handle);
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Resolves when the serving task has finished, whatever the reason.
    /// Pends forever if the server was never started.
    pub async fn exited(&self) {
        let Some(rx) = &self.exited_rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Stop accepting connections and wait for in-flight requests to drain.
    ///
    /// Dropping the returned future mid-drain leaves the server `Stopping`;
    /// calling `stop` again resumes waiting on the same serving task.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        match self.lifecycle {
            Lifecycle::Running => {
                self.lifecycle = Lifecycle::Stopping;
                tracing::info!("stopping webui server, draining in-flight requests");
                if let Some(tx) = self.stop_tx.take() {
                    let _ = tx.send(());
                }
            }
            Lifecycle::Stopping => {
                tracing::info!("resuming drain of webui server");
            }
            state => {
                return Err(ServerError::InvalidTransition {
                    action: "stop",
                    state,
                })
            }
        }

        let Some(handle) = self.handle.as_mut() else {
            self.lifecycle = Lifecycle::Stopped;
            return Ok(());
        };

        let joined = match self.shutdown_timeout {
            None => handle.await,
            Some(limit) => match tokio::time::timeout(limit, &mut *handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = limit.as_millis() as u64,
                        "shutdown deadline passed, cancelling in-flight requests"
                    );
                    self.cancel_tx.send_replace(true);
                    handle.await
                }
            },
        };

        self.handle = None;
        self.lifecycle = Lifecycle::Stopped;
        tracing::info!("webui server stopped");
        joined??;
        Ok(())
    }
}

async fn serve(bind: Bind, app: Router, stop_rx: oneshot::Receiver<()>) -> io::Result<()> {
    let listener = match bind {
        Bind::Addr(addr) => TcpListener::bind(&addr).await?,
        Bind::Listener(listener) => listener,
    };

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "webui listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // A dropped sender means the controller is gone: stop as well.
            let _ = stop_rx.await;
        })
        .await
}
