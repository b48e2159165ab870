//! Wiring for the email pipeline service.
//!
//! Loads configuration, connects to PostgreSQL, applies migrations, picks the
//! delivery provider for the environment and serves the HTTP surface.

use axum::{Router, extract::State, response::IntoResponse, response::Response, routing::get};
use axum_helpers::server::{
    HealthCheckFuture, create_app, create_router, health_router, run_health_checks,
};
use core_config::{Environment, FromEnv, app_info, server::ServerConfig};
use database::postgres::{self, DatabaseConnection, PostgresConfig};
use domain_notifications::providers::{ResendConfig, ResendProvider, SmtpConfig, SmtpProvider};
use domain_notifications::{
    ApiConfig, ApiDoc, EmailPipeline, EmailProvider, PipelineConfig, Repositories, SystemClock,
    TemplateEngine, router,
};
use eyre::WrapErr;
use std::sync::Arc;
use tracing::info;

/// Everything read from the environment at startup.
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: PostgresConfig,
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env().wrap_err("Invalid server configuration")?,
            database: PostgresConfig::from_env().wrap_err("Invalid database configuration")?,
            pipeline: PipelineConfig::from_env().wrap_err("Invalid pipeline configuration")?,
            api: ApiConfig::from_env().wrap_err("Invalid API configuration")?,
        })
    }
}

/// Resend in production, SMTP (Mailpit/MailHog) everywhere else.
pub fn provider_for(environment: &Environment) -> eyre::Result<Arc<dyn EmailProvider>> {
    if environment.is_production() {
        let config = ResendConfig::from_env().wrap_err("Invalid Resend configuration")?;
        let provider = ResendProvider::new(config).wrap_err("Failed to build Resend client")?;
        Ok(Arc::new(provider))
    } else {
        let config = SmtpConfig::from_env().wrap_err("Invalid SMTP configuration")?;
        let provider = SmtpProvider::new(config).wrap_err("Failed to build SMTP transport")?;
        Ok(Arc::new(provider))
    }
}

async fn ready_handler(State(db): State<DatabaseConnection>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "database",
        Box::pin(async {
            postgres::check_health(&db)
                .await
                .map_err(|e| format!("Database ping failed: {e}"))
        }),
    )];

    match run_health_checks(checks).await {
        Ok((status, json)) => (status, json).into_response(),
        Err((status, json)) => (status, json).into_response(),
    }
}

/// `GET /ready`, backed by a database ping.
pub fn ready_router(db: DatabaseConnection) -> Router {
    Router::new()
        .route("/ready", get(ready_handler))
        .with_state(db)
}

pub async fn run() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();

    let config = Config::from_env()?;
    core_config::tracing::init_tracing(&config.environment);

    let db = postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .wrap_err("PostgreSQL connection failed")?;
    postgres::run_migrations::<migration::Migrator>(&db, "zerg_email_pipeline")
        .await
        .wrap_err("Failed to run migrations")?;

    let provider = provider_for(&config.environment)?;
    info!(provider = provider.name(), "Email provider selected");

    let templates = TemplateEngine::new().wrap_err("Failed to register email templates")?;
    let pipeline = EmailPipeline::new(
        config.pipeline,
        Repositories::postgres(db.clone()),
        templates,
        provider,
        Arc::new(SystemClock),
    );

    let app = create_router::<ApiDoc>(router(pipeline, &config.api))
        .merge(health_router(app_info!()))
        .merge(ready_router(db.clone()));

    info!("Starting zerg email pipeline");
    create_app(app, &config.server)
        .await
        .wrap_err("Server error")?;

    if let Err(e) = db.close().await {
        tracing::error!("Error closing PostgreSQL: {}", e);
    }
    info!("Zerg email pipeline shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_database_url() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", None::<&str>),
                ("EMAIL_API_SECRET", Some("secret")),
            ],
            || {
                let err = Config::from_env().err().map(|e| format!("{e:#}"));
                assert!(err.unwrap().contains("DATABASE_URL"));
            },
        );
    }

    #[test]
    fn test_config_requires_api_secret() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/email")),
                ("EMAIL_API_SECRET", None),
            ],
            || {
                let err = Config::from_env().err().map(|e| format!("{e:#}"));
                assert!(err.unwrap().contains("EMAIL_API_SECRET"));
            },
        );
    }

    #[test]
    fn test_production_requires_resend_key() {
        temp_env::with_vars(
            [
                ("RESEND_API_KEY", None::<&str>),
                ("EMAIL_FROM_ADDRESS", Some("noreply@example.com")),
            ],
            || {
                let err = provider_for(&Environment::Production).err().map(|e| format!("{e:#}"));
                assert!(err.unwrap().contains("RESEND_API_KEY"));
            },
        );
    }

    #[tokio::test]
    async fn test_development_uses_smtp() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("localhost")),
                ("SMTP_PORT", Some("1025")),
                ("EMAIL_FROM_ADDRESS", Some("noreply@example.com")),
            ],
            || {
                let provider = provider_for(&Environment::Development).unwrap();
                assert_eq!(provider.name(), "smtp");
            },
        );
    }
}
