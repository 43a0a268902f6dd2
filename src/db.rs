use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::redact_url;

pub async fn connect_pg(database_url: &str) -> anyhow::Result<PgPool> {
    tracing::info!("Connecting to {}", redact_url(database_url));

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Pool for the clinical records database. Reads only, so connections are
/// opened in a read-only transaction mode.
pub async fn connect_pg_read_only(database_url: &str) -> anyhow::Result<PgPool> {
    tracing::info!("Connecting (read-only) to {}", redact_url(database_url));

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    Ok(pool)
}
