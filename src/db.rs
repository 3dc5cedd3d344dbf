use std::time::Duration;

use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tracing::info;

use crate::config::DatabaseConfig;

/// The password is sent only when `DB_USE_PASSWORD` enabled it.
fn effective_password(config: &DatabaseConfig) -> Option<&str> {
    config.password.as_deref().filter(|_| config.use_password)
}

pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user);
    match effective_password(config) {
        Some(password) => options.password(password),
        None => options,
    }
}

pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(10))
        .connect_with(connect_options(config))
        .await
        .with_context(|| {
            format!(
                "connect to database {} at {}:{}",
                config.name, config.host, config.port
            )
        })?;
    info!(host = %config.host, port = config.port, db = %config.name, "database connection success");
    Ok(db)
}

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,
    password    TEXT NOT NULL,
    role        INTEGER NOT NULL DEFAULT 2,
    gender      BIGINT,
    is_active   BOOLEAN NOT NULL DEFAULT TRUE,
    is_deleted  BOOLEAN NOT NULL DEFAULT FALSE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const USERS_EMAIL_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_idx ON users (lower(email))";

/// Declares every table the service owns. Idempotent.
pub async fn ensure_schema(db: &PgPool) -> anyhow::Result<()> {
    for statement in [USERS_TABLE, USERS_EMAIL_INDEX] {
        sqlx::query(statement)
            .execute(db)
            .await
            .context("ensure schema")?;
    }
    info!("database schema ready");
    Ok(())
}

/// Round-trips a trivial query; used by the health check.
pub async fn ping(db: &PgPool) -> anyhow::Result<()> {
    let (result,): (i32,) = sqlx::query_as("SELECT 1 + 1")
        .fetch_one(db)
        .await
        .context("ping database")?;
    anyhow::ensure!(result == 2, "unexpected ping result {result}");
    Ok(())
}
