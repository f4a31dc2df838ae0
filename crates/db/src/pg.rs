use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::time::{sleep, Duration};
use tracing::{debug, instrument, warn};

use crate::errors::{DbError, Result};
use crate::models::{
    column_list, placeholders, QuestionRow, INSERT_COLUMNS, QUESTIONS_TABLE, SAMPLE_COLUMNS,
};
use crate::repositories::{QuestionRepository, Repositories};

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(DbError::Migration)
}

#[derive(Clone)]
pub struct PgDatabase {
    question_repo: Arc<PgQuestionRepository>,
}

impl PgDatabase {
    /// Retries establishing the pool only; statements issued later are never retried.
    pub async fn connect(database_url: &str) -> Result<Self> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 500;

        let mut attempts = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await
            {
                Ok(pool) => {
                    run_migrations(&pool).await?;
                    return Ok(Self::from_pool(pool));
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        return Err(DbError::Connect(err));
                    }

                    let exp = (attempts - 1).min(5);
                    let backoff = Duration::from_millis(BASE_DELAY_MS * (1u64 << exp));
                    warn!(
                        attempts,
                        error = %err,
                        wait_ms = backoff.as_millis(),
                        "database connection failed; retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            question_repo: Arc::new(PgQuestionRepository::new(pool)),
        }
    }
}

impl Repositories for PgDatabase {
    fn questions(&self) -> &dyn QuestionRepository {
        &*self.question_repo
    }
}

#[derive(Clone)]
struct PgQuestionRepository {
    pool: PgPool,
    insert_sql: String,
    sample_sql: String,
}

impl PgQuestionRepository {
    fn new(pool: PgPool) -> Self {
        let insert_sql = format!(
            "INSERT INTO {QUESTIONS_TABLE} ({}) VALUES ({})",
            column_list(&INSERT_COLUMNS),
            placeholders(INSERT_COLUMNS.len()),
        );
        let sample_sql = format!(
            "SELECT {} FROM {QUESTIONS_TABLE} ORDER BY score DESC, question_id LIMIT $1",
            column_list(&SAMPLE_COLUMNS),
        );
        Self {
            pool,
            insert_sql,
            sample_sql,
        }
    }
}

#[async_trait]
impl QuestionRepository for PgQuestionRepository {
    #[instrument(skip(self))]
    async fn truncate(&self) -> Result<()> {
        sqlx::query(&format!("TRUNCATE TABLE {QUESTIONS_TABLE}"))
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(DbError::Query)
    }

    #[instrument(skip(self, question), fields(question_id = question.question_id))]
    async fn insert(&self, question: QuestionRow) -> Result<()> {
        let result = sqlx::query(&self.insert_sql)
            .bind(question.question_id)
            .bind(question.title)
            .bind(question.is_answered)
            .bind(question.link)
            .bind(question.owner_reputation)
            .bind(question.owner_accept_rate)
            .bind(question.score)
            .bind(question.tags)
            .bind(question.creation_date)
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        debug!(rows = result.rows_affected(), "question inserted");
        Ok(())
    }

    async fn sample(&self, limit: i64) -> Result<Vec<QuestionRow>> {
        sqlx::query_as::<_, QuestionRow>(&self.sample_sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {QUESTIONS_TABLE}"))
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }
}
