use serde::Deserialize;

/// One element of the API's `items` array. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionPayload {
    pub question_id: i64,
    pub title: String,
    pub is_answered: bool,
    pub link: String,
    #[serde(default)]
    pub owner: Option<OwnerPayload>,
    pub score: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub creation_date: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerPayload {
    #[serde(default)]
    pub reputation: Option<i64>,
    /// Outer `None`: key absent. `Some(None)`: explicit `null`.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub accept_rate: Option<Option<i64>>,
}
