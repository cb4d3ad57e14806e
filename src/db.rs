use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let connect_options = PgConnectOptions::from_str(database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(3600))
            .connect_with(connect_options)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        let migrations = vec![include_str!("../migrations/postgres/001_initial.sql")];

        for (idx, migration_sql) in migrations.iter().enumerate() {
            tracing::info!("Running migration {}", idx + 1);

            // Statements run one at a time so an existing object does not abort the rest
            for statement in migration_sql.split(';') {
                let trimmed = strip_comments(statement);
                if trimmed.is_empty() {
                    continue;
                }
                match sqlx::query(&trimmed).execute(&self.pool).await {
                    Ok(_) => {}
                    Err(e) if is_existing_object(&e.to_string()) => {
                        tracing::debug!("Skipping existing object in migration {}: {}", idx + 1, e);
                    }
                    Err(e) => {
                        tracing::error!("Migration {} failed on statement: {}", idx + 1, trimmed);
                        return Err(e).with_context(|| format!("migration {} failed", idx + 1));
                    }
                }
            }
        }

        tracing::info!("All migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Errors a rerun of the bootstrap migration is allowed to skip
fn is_existing_object(message: &str) -> bool {
    message.contains("already exists")
}

fn strip_comments(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
