#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use collector::{QuestionBatch, QuestionSource, SourceError, TimeWindow};
use db::models::QuestionRow;
use db::{DbError, QuestionRepository, Repositories};
use serde_json::{json, Value};

/// Keeps rows in insertion order and enforces the primary key like Postgres would.
#[derive(Default)]
pub struct MemoryDatabase {
    rows: Mutex<Vec<QuestionRow>>,
    truncations: AtomicUsize,
    fail_truncate: bool,
}

impl MemoryDatabase {
    pub fn failing_truncate() -> Self {
        Self {
            fail_truncate: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, rows: Vec<QuestionRow>) {
        self.rows.lock().unwrap().extend(rows);
    }

    pub fn rows(&self) -> Vec<QuestionRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.rows().into_iter().map(|row| row.question_id).collect()
    }

    pub fn truncations(&self) -> usize {
        self.truncations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionRepository for MemoryDatabase {
    async fn truncate(&self) -> Result<(), DbError> {
        if self.fail_truncate {
            return Err(DbError::Query(sqlx::Error::PoolTimedOut));
        }
        self.truncations.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().clear();
        Ok(())
    }

    async fn insert(&self, question: QuestionRow) -> Result<(), DbError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|row| row.question_id == question.question_id) {
            return Err(DbError::Query(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint \"questions_pkey\" ({})",
                question.question_id
            ))));
        }
        rows.push(question);
        Ok(())
    }

    async fn sample(&self, limit: i64) -> Result<Vec<QuestionRow>, DbError> {
        let mut rows = self.rows();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.question_id.cmp(&b.question_id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, DbError> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

impl Repositories for MemoryDatabase {
    fn questions(&self) -> &dyn QuestionRepository {
        self
    }
}

pub enum Reply {
    Items(Vec<Value>),
    Status(u16, &'static str),
}

/// Serves canned replies in order and records every requested window.
pub struct StubSource {
    replies: Mutex<Vec<Reply>>,
    calls: Mutex<Vec<(String, TimeWindow)>>,
}

impl StubSource {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn items(items: Vec<Value>) -> Self {
        Self::new(vec![Reply::Items(items)])
    }

    pub fn calls(&self) -> Vec<(String, TimeWindow)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSource for StubSource {
    async fn fetch(&self, tag: &str, window: TimeWindow) -> Result<QuestionBatch, SourceError> {
        self.calls.lock().unwrap().push((tag.to_string(), window));
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok(QuestionBatch::default());
        }
        match replies.remove(0) {
            Reply::Items(items) => Ok(QuestionBatch::new(items)),
            Reply::Status(code, body) => Err(collector::ApiError::new(
                reqwest::StatusCode::from_u16(code).unwrap(),
                body,
            )
            .into()),
        }
    }
}

pub fn raw_question(question_id: i64, score: i64) -> Value {
    json!({
        "question_id": question_id,
        "title": format!("question {question_id}"),
        "is_answered": question_id % 2 == 0,
        "link": format!("https://stackoverflow.com/q/{question_id}"),
        "owner": {"reputation": 100 + question_id, "accept_rate": 50},
        "score": score,
        "tags": ["pandas", "python"],
        "creation_date": 1_700_000_000 + question_id
    })
}
