use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use medicert_core::clock::SystemClock;
use medicert_core::codes::RandomCodeGenerator;
use medicert_core::config::{AppConfig, ConfigError, LoadOptions};
use medicert_db::repositories::SqlCertificateRepository;
use medicert_db::{connect_with_settings, migrations, CertificateIssuer, CertificateRepository, DbPool};
use medicert_notify::{BrevoMailer, NoopSink, NotificationSink, NotifyError, NotifyHandle};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub repository: Arc<dyn CertificateRepository>,
    pub issuer: Arc<CertificateIssuer>,
    pub notifier: NotifyHandle,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notification sink setup failed: {0}")]
    Notify(#[source] NotifyError),
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

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let repository: Arc<dyn CertificateRepository> =
        Arc::new(SqlCertificateRepository::new(db_pool.clone()));
    let issuer = Arc::new(CertificateIssuer::new(
        repository.clone(),
        Arc::new(RandomCodeGenerator),
        Arc::new(SystemClock),
    ));

    let sink: Arc<dyn NotificationSink> = if config.notify.enabled {
        Arc::new(BrevoMailer::new(&config.notify).map_err(BootstrapError::Notify)?)
    } else {
        Arc::new(NoopSink)
    };
    let notifier = medicert_notify::spawn(sink, config.notify.queue_capacity);
    info!(
        event_name = "system.bootstrap.notifier_ready",
        correlation_id = "bootstrap",
        enabled = config.notify.enabled,
        "notification worker started"
    );

    Ok(Application { config, db_pool, repository, issuer, notifier })
}

#[cfg(test)]
mod tests {
    use medicert_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_collaborators() {
        let app = bootstrap(options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'certificate'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("certificate table should exist after bootstrap");
        assert_eq!(table_count, 1);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_notify_is_enabled_without_a_key() {
        let mut options = options("sqlite::memory:");
        options.overrides.notify_enabled = Some(true);

        let result = bootstrap(options).await;
        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("notify.api_key"), "unexpected error: {message}");
    }
}
