use std::sync::Arc;

use db::models::QuestionRow;
use db::{DbError, Repositories};
use normalizer::{normalize_question, NormalizedQuestion};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::metrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub fetched: usize,
    pub inserted: usize,
}

/// Replace-all writer for the `questions` table.
pub struct Loader {
    repos: Arc<dyn Repositories>,
}

impl Loader {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    /// Drops every row of the previous run.
    pub async fn reset_store(&self) -> Result<(), DbError> {
        self.repos.questions().truncate().await?;
        info!("questions table truncated");
        Ok(())
    }

    /// Inserts rows one statement at a time. Rows written before a failure stay written.
    pub async fn insert<I>(&self, rows: I) -> Result<usize, DbError>
    where
        I: IntoIterator<Item = NormalizedQuestion>,
    {
        let mut inserted = 0;
        for row in rows {
            self.insert_one(row).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Normalizes and inserts each raw record in order, stopping at the first failure.
    pub async fn load<I>(&self, raw: I) -> Result<LoadSummary, PipelineError>
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: ExactSizeIterator,
    {
        let raw = raw.into_iter();
        let mut summary = LoadSummary {
            fetched: raw.len(),
            inserted: 0,
        };
        metrics::QUESTIONS_FETCHED_TOTAL.inc_by(summary.fetched as u64);

        for record in raw {
            let question = match normalize_question(&record) {
                Ok(question) => question,
                Err(err) => {
                    metrics::NORMALIZE_FAILURES_TOTAL.inc();
                    warn!(inserted = summary.inserted, error = %err, "aborting load");
                    return Err(err.into());
                }
            };
            self.insert_one(question).await?;
            summary.inserted += 1;
        }

        info!(
            fetched = summary.fetched,
            inserted = summary.inserted,
            "questions loaded"
        );
        Ok(summary)
    }

    async fn insert_one(&self, question: NormalizedQuestion) -> Result<(), DbError> {
        self.repos.questions().insert(to_question_row(question)).await?;
        metrics::QUESTIONS_INSERTED_TOTAL.inc();
        Ok(())
    }
}

pub fn to_question_row(normalized: NormalizedQuestion) -> QuestionRow {
    QuestionRow {
        question_id: normalized.question_id,
        title: normalized.title,
        is_answered: normalized.is_answered,
        link: normalized.link,
        owner_reputation: normalized.owner_reputation,
        owner_accept_rate: normalized.owner_accept_rate,
        score: normalized.score,
        tags: normalized.tags,
        creation_date: normalized.creation_date,
    }
}
