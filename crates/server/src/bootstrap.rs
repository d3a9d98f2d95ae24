use std::sync::Arc;

use axum::Router;
use shopkeep_agent::{client_from_config, AgentRuntime, LlmError};
use shopkeep_core::config::{AppConfig, ConfigError, LoadOptions};
use shopkeep_db::{connect_with_config, migrations, CatalogRepository, DbPool, SqlCatalogRepository};
use shopkeep_line::{LineReplyClient, ReplyError};
use thiserror::Error;
use tracing::info;

use crate::{admin, health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub catalog: Arc<dyn CatalogRepository>,
    pub agent_runtime: AgentRuntime,
    pub reply_client: Arc<LineReplyClient>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client could not be built: {0}")]
    Llm(#[source] LlmError),
    #[error("line reply client could not be built: {0}")]
    Reply(#[source] ReplyError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let llm = client_from_config(&config.llm).map_err(BootstrapError::Llm)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = %config.llm.provider,
        model = %config.llm.model,
        "llm client configured"
    );

    let catalog: Arc<dyn CatalogRepository> = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let agent_runtime = AgentRuntime::new(llm, catalog.clone());
    let reply_client = Arc::new(LineReplyClient::new(&config.line).map_err(BootstrapError::Reply)?);

    Ok(Application { config, db_pool, catalog, agent_runtime, reply_client })
}

impl Application {
    /// Webhook, admin and health routes on one listener.
    pub fn router(&self) -> Router {
        let dispatcher =
            webhook::agent_dispatcher(self.agent_runtime.clone(), self.reply_client.clone());
        let webhook_state =
            webhook::WebhookState::new(self.config.line.channel_secret.clone(), dispatcher);

        webhook::router(webhook_state)
            .merge(admin::router(self.catalog.clone()))
            .merge(health::router(self.db_pool.clone()))
    }
}
