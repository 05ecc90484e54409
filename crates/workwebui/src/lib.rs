pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;

pub use api::{router, ApiState};
pub use client::{NamespaceClient, PgQueueEngine, QueueEngine, SharedEngine};
pub use config::Config;
pub use error::{ApiError, EngineError, ErrorStatusMode};
pub use server::{Lifecycle, ServerError, WebUiServer};
