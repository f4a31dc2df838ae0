use std::sync::Arc;

use db::models::{Column, QuestionRow, SAMPLE_COLUMNS};
use db::{DbError, Repositories};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{info, warn};

/// One stored row keyed by column name, in the declared column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    fields: Vec<(Column, Value)>,
}

impl SampleRecord {
    pub fn from_row(row: &QuestionRow, columns: &[Column]) -> Self {
        Self {
            fields: columns
                .iter()
                .map(|&column| (column, row.value_of(column)))
                .collect(),
        }
    }

    pub fn get(&self, column: Column) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(candidate, _)| *candidate == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.fields.iter().map(|(column, _)| *column)
    }
}

impl Serialize for SampleRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column.name(), value)?;
        }
        map.end()
    }
}

/// Read-only smoke check over the freshly loaded table.
pub struct Verifier {
    repos: Arc<dyn Repositories>,
    limit: i64,
}

impl Verifier {
    pub fn new(repos: Arc<dyn Repositories>, limit: i64) -> Self {
        Self { repos, limit }
    }

    pub async fn verify(&self) -> Result<Vec<SampleRecord>, DbError> {
        let rows = self.repos.questions().sample(self.limit).await?;
        let records: Vec<SampleRecord> = rows
            .iter()
            .map(|row| SampleRecord::from_row(row, &SAMPLE_COLUMNS))
            .collect();
        for record in &records {
            log_record(record);
        }
        info!(sampled = records.len(), limit = self.limit, "verification read complete");
        Ok(records)
    }
}

fn log_record(record: &SampleRecord) {
    match render(record) {
        Ok(rendered) => info!(record = %rendered, "sampled question"),
        Err(err) => warn!(error = %err, "could not render sampled question"),
    }
}

fn render(record: &SampleRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn row(question_id: i64, title: &str) -> QuestionRow {
        QuestionRow {
            question_id,
            title: title.into(),
            is_answered: false,
            link: format!("https://stackoverflow.com/q/{question_id}"),
            owner_reputation: 10,
            owner_accept_rate: None,
            score: 1,
            tags: vec![],
            creation_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn each_record_binds_its_own_row() {
        let rows = [row(1, "first"), row(2, "second")];
        let records: Vec<_> = rows
            .iter()
            .map(|r| SampleRecord::from_row(r, &SAMPLE_COLUMNS))
            .collect();
        assert_eq!(records[0].get(Column::Title), Some(&json!("first")));
        assert_eq!(records[1].get(Column::Title), Some(&json!("second")));
        assert_eq!(records[1].get(Column::QuestionId), Some(&json!(2)));
    }

    #[test]
    fn serializes_in_declared_column_order() {
        let record = SampleRecord::from_row(&row(5, "t"), &SAMPLE_COLUMNS);
        let rendered = serde_json::to_string(&record).unwrap();
        let positions: Vec<usize> = SAMPLE_COLUMNS
            .iter()
            .map(|c| rendered.find(&format!("\"{}\":", c.name())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(rendered.contains("\"owner_accept_rate\":null"));
        assert_eq!(record.columns().count(), 9);
    }

    #[test]
    fn rendered_record_is_a_json_object_of_every_column() {
        let record = SampleRecord::from_row(&row(9, "rendered"), &SAMPLE_COLUMNS);
        let rendered = render(&record).expect("record renders");
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        let object = parsed.as_object().expect("json object");
        assert_eq!(object.len(), SAMPLE_COLUMNS.len());
        assert_eq!(object["title"], json!("rendered"));
        assert_eq!(object["question_id"], json!(9));
    }
}
