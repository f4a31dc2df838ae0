use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::models::NormalizedQuestion;
use crate::payloads::QuestionPayload;

/// `owner.accept_rate` when the owner has no accept rate on record.
pub const DEFAULT_ACCEPT_RATE: i64 = 0;

/// Top-level keys every item must carry with a non-null value.
const REQUIRED_FIELDS: [&str; 6] = [
    "question_id",
    "title",
    "is_answered",
    "link",
    "score",
    "creation_date",
];

/// Parses one raw `items` element and maps it onto the canonical row.
///
/// Absent or null required keys are `MissingField`; present keys of the wrong
/// type are `Malformed`.
pub fn normalize_question(raw: &Value) -> Result<NormalizedQuestion, NormalizeError> {
    if let Some(object) = raw.as_object() {
        let missing = REQUIRED_FIELDS
            .iter()
            .copied()
            .find(|field| object.get(*field).map_or(true, Value::is_null));
        if let Some(field) = missing {
            return Err(NormalizeError::MissingField {
                question_id: object.get("question_id").and_then(Value::as_i64),
                field,
            });
        }
    }
    let payload = QuestionPayload::deserialize(raw).map_err(NormalizeError::Malformed)?;
    normalize_payload(payload)
}

pub fn normalize_payload(payload: QuestionPayload) -> Result<NormalizedQuestion, NormalizeError> {
    let question_id = payload.question_id;
    let owner = payload
        .owner
        .ok_or_else(|| NormalizeError::missing(question_id, "owner"))?;
    let owner_reputation = owner
        .reputation
        .ok_or_else(|| NormalizeError::missing(question_id, "owner.reputation"))?;
    let owner_accept_rate = owner.accept_rate.unwrap_or(Some(DEFAULT_ACCEPT_RATE));

    Ok(NormalizedQuestion {
        question_id,
        title: payload.title,
        is_answered: payload.is_answered,
        link: payload.link,
        owner_reputation,
        owner_accept_rate,
        score: payload.score,
        tags: payload.tags,
        creation_date: epoch_to_utc(question_id, payload.creation_date)?,
    })
}

fn epoch_to_utc(question_id: i64, seconds: i64) -> Result<DateTime<Utc>, NormalizeError> {
    DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(NormalizeError::InvalidTimestamp {
        question_id,
        value: seconds,
    })
}
