#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("question {}: missing required field `{field}`", record_label(.question_id))]
    MissingField {
        /// `None` when the record carries no usable `question_id` itself.
        question_id: Option<i64>,
        field: &'static str,
    },
    #[error("question {question_id}: creation_date {value} is not a valid unix timestamp")]
    InvalidTimestamp { question_id: i64, value: i64 },
    #[error("malformed question record: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl NormalizeError {
    pub fn missing(question_id: i64, field: &'static str) -> Self {
        Self::MissingField {
            question_id: Some(question_id),
            field,
        }
    }
}

fn record_label(question_id: &Option<i64>) -> String {
    question_id.map_or_else(|| "<unknown>".to_string(), |id| id.to_string())
}
