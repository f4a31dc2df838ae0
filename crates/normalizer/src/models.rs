use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical shape of one stored question. Field order is the `questions` column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedQuestion {
    pub question_id: i64,
    pub title: String,
    pub is_answered: bool,
    pub link: String,
    pub owner_reputation: i64,
    pub owner_accept_rate: Option<i64>,
    pub score: i64,
    pub tags: Vec<String>,
    pub creation_date: DateTime<Utc>,
}
