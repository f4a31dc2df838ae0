use std::env;

use anyhow::{Context, Result};
use db::pg::PgDatabase;
use sqlx::{Executor, PgPool};
use tracing::debug;
use uuid::Uuid;

/// Creates throwaway databases on the server named by `TEST_ADMIN_URL` (or `DATABASE_URL`).
pub struct DbFixture {
    admin_url: String,
}

impl DbFixture {
    pub fn from_env() -> Result<Self> {
        Self::from_urls(
            env::var("TEST_ADMIN_URL").ok(),
            env::var("DATABASE_URL").ok(),
        )
    }

    /// The admin URL wins over the application URL; empty values count as unset.
    pub fn from_urls(admin_url: Option<String>, database_url: Option<String>) -> Result<Self> {
        let admin_url = admin_url
            .into_iter()
            .chain(database_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .find(|url| !url.is_empty())
            .context("TEST_ADMIN_URL or DATABASE_URL must be set for tests")?;
        Ok(Self { admin_url })
    }

    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    /// Empty database; the schema is applied by `PgDatabase::connect`.
    pub async fn create(&self, prefix: &str) -> Result<DatabaseHandle> {
        let db_name = format!("{}_{}", prefix, Uuid::new_v4().simple());
        let admin_pool = PgPool::connect(&self.admin_url).await?;
        let create_sql = format!("CREATE DATABASE \"{}\"", db_name);
        admin_pool.execute(create_sql.as_str()).await?;
        debug!(database = %db_name, "created test database");
        Ok(DatabaseHandle {
            url: format!("{}/{}", self.admin_url, db_name),
            name: db_name,
            admin_url: self.admin_url.clone(),
        })
    }
}

pub struct DatabaseHandle {
    url: String,
    name: String,
    admin_url: String,
}

impl DatabaseHandle {
    pub async fn connect(&self) -> Result<PgDatabase> {
        Ok(PgDatabase::connect(&self.url).await?)
    }

    /// Callers must drop every pool on this database first.
    pub async fn cleanup(self) -> Result<()> {
        let admin_pool = PgPool::connect(&self.admin_url).await?;
        let terminate_sql = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.name
        );
        admin_pool.execute(terminate_sql.as_str()).await?;
        let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\"", self.name);
        admin_pool.execute(drop_sql.as_str()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_takes_precedence_over_database_url() {
        let fixture = DbFixture::from_urls(
            Some("postgres://admin@localhost:5432/".into()),
            Some("postgres://app@localhost:5432/stack_overflow".into()),
        )
        .unwrap();
        assert_eq!(fixture.admin_url(), "postgres://admin@localhost:5432");
    }

    #[test]
    fn falls_back_to_database_url_and_skips_blank_values() {
        let fixture =
            DbFixture::from_urls(Some("  ".into()), Some("postgres://localhost:5432".into()))
                .unwrap();
        assert_eq!(fixture.admin_url(), "postgres://localhost:5432");
    }

    #[test]
    fn missing_urls_are_an_error() {
        let err = DbFixture::from_urls(None, None).err().expect("no url configured");
        assert!(err.to_string().contains("TEST_ADMIN_URL"));
    }
}
