use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

pub const QUESTIONS_TABLE: &str = "questions";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct QuestionRow {
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

impl QuestionRow {
    pub fn value_of(&self, column: Column) -> Value {
        match column {
            Column::QuestionId => json!(self.question_id),
            Column::Title => json!(self.title),
            Column::IsAnswered => json!(self.is_answered),
            Column::Link => json!(self.link),
            Column::OwnerReputation => json!(self.owner_reputation),
            Column::OwnerAcceptRate => json!(self.owner_accept_rate),
            Column::Score => json!(self.score),
            Column::Tags => json!(self.tags),
            Column::CreationDate => json!(self.creation_date),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    QuestionId,
    Title,
    IsAnswered,
    Link,
    OwnerReputation,
    OwnerAcceptRate,
    Score,
    Tags,
    CreationDate,
}

impl Column {
    pub const fn name(self) -> &'static str {
        match self {
            Column::QuestionId => "question_id",
            Column::Title => "title",
            Column::IsAnswered => "is_answered",
            Column::Link => "link",
            Column::OwnerReputation => "owner_reputation",
            Column::OwnerAcceptRate => "owner_accept_rate",
            Column::Score => "score",
            Column::Tags => "tags",
            Column::CreationDate => "creation_date",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Positional order of the insert statement.
pub const INSERT_COLUMNS: [Column; 9] = [
    Column::QuestionId,
    Column::Title,
    Column::IsAnswered,
    Column::Link,
    Column::OwnerReputation,
    Column::OwnerAcceptRate,
    Column::Score,
    Column::Tags,
    Column::CreationDate,
];

/// Order in which the verification read reports columns.
pub const SAMPLE_COLUMNS: [Column; 9] = [
    Column::Title,
    Column::IsAnswered,
    Column::Link,
    Column::Score,
    Column::Tags,
    Column::QuestionId,
    Column::OwnerReputation,
    Column::OwnerAcceptRate,
    Column::CreationDate,
];

pub fn column_list(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|column| column.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("${index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sample_columns_cover_insert_columns() {
        let inserted: HashSet<_> = INSERT_COLUMNS.iter().collect();
        let sampled: HashSet<_> = SAMPLE_COLUMNS.iter().collect();
        assert_eq!(inserted, sampled);
        assert_eq!(sampled.len(), 9);
    }

    #[test]
    fn insert_column_list_matches_table_order() {
        assert_eq!(
            column_list(&INSERT_COLUMNS),
            "question_id, title, is_answered, link, owner_reputation, owner_accept_rate, score, tags, creation_date"
        );
        assert_eq!(placeholders(3), "$1, $2, $3");
    }
}
