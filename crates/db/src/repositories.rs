use async_trait::async_trait;

use crate::errors::Result;
use crate::models::QuestionRow;

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Removes every row. Irreversible.
    async fn truncate(&self) -> Result<()>;
    /// One statement per row; nothing spans more than a single insert.
    async fn insert(&self, question: QuestionRow) -> Result<()>;
    /// At most `limit` rows, highest score first.
    async fn sample(&self, limit: i64) -> Result<Vec<QuestionRow>>;
    async fn count(&self) -> Result<i64>;
}

pub trait Repositories: Send + Sync {
    fn questions(&self) -> &dyn QuestionRepository;
}
