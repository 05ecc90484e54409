use std::sync::Arc;

use workwebui::client::PgQueueEngine;
use workwebui::{config, db, logging, ApiState, WebUiServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = config::Config::from_env()?;

    tracing::info!(
        listen_addr = %cfg.listen_addr,
        auth = if cfg.api_token.is_some() { "bearer" } else { "disabled" },
        token_scope = ?cfg.token_scope,
        error_status = ?cfg.error_status,
        shutdown_timeout_secs = cfg.shutdown_timeout.map(|d| d.as_secs()),
        migrate_on_startup = cfg.migrate_on_startup,
        "workwebui starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
        tracing::info!("migrations applied");
    }

    let engine = Arc::new(PgQueueEngine::new(pool));
    let state = ApiState::from_config(engine, &cfg);

    let mut server = WebUiServer::new(cfg.listen_addr.clone(), state)
        .with_shutdown_timeout(cfg.shutdown_timeout);
    server.start()?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("ctrl-c received");
        }
        _ = server.exited() => {
            tracing::warn!("webui server exited on its own");
        }
    }

    server.stop().await?;
    Ok(())
}
