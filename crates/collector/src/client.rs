use std::time::Duration;

use async_trait::async_trait;
use common::config::StackOverflowConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ApiError, SourceError};
use crate::window::TimeWindow;

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub key: String,
}

impl From<&StackOverflowConfig> for Credentials {
    fn from(config: &StackOverflowConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            key: config.key.clone(),
        }
    }
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Questions tagged `tag` created inside `window`, highest voted first. First page only.
    async fn fetch(&self, tag: &str, window: TimeWindow) -> Result<QuestionBatch, SourceError>;
}

/// One decoded response page. Consumed once via `IntoIterator`.
#[derive(Debug, Clone, Default)]
pub struct QuestionBatch {
    items: Vec<Value>,
    pub has_more: bool,
    pub quota_remaining: Option<i64>,
}

impl QuestionBatch {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for QuestionBatch {
    type Item = Value;
    type IntoIter = RawQuestions;

    fn into_iter(self) -> RawQuestions {
        RawQuestions {
            inner: self.items.into_iter(),
        }
    }
}

#[derive(Debug)]
pub struct RawQuestions {
    inner: std::vec::IntoIter<Value>,
}

impl Iterator for RawQuestions {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for RawQuestions {}

#[derive(Debug, Deserialize)]
struct QuestionEnvelope {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    quota_remaining: Option<i64>,
}

pub struct StackExchangeClient {
    http: reqwest::Client,
    base: Url,
    site: String,
    page_size: u32,
    credentials: Credentials,
}

impl StackExchangeClient {
    pub fn new(config: &StackOverflowConfig, page_size: u32) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("so-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SourceError::Client)?;
        Ok(Self {
            http,
            base: Url::parse(&config.question_url)?,
            site: config.site.clone(),
            page_size,
            credentials: Credentials::from(config),
        })
    }

    fn request_url(&self, tag: &str, window: TimeWindow) -> Url {
        let mut url = self.base.clone();
        let params = [
            ("fromdate", window.fromdate().to_string()),
            ("todate", window.todate().to_string()),
            ("sort", "votes".to_string()),
            ("site", self.site.clone()),
            ("order", "desc".to_string()),
            ("tagged", tag.to_string()),
            ("pagesize", self.page_size.to_string()),
            ("client_id", self.credentials.client_id.clone()),
            ("client_secret", self.credentials.client_secret.clone()),
            ("key", self.credentials.key.clone()),
        ];
        {
            let mut query_pairs = url.query_pairs_mut();
            for (key, val) in &params {
                query_pairs.append_pair(key, val);
            }
        }
        url
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base.host_str().unwrap_or_default(),
            self.base.path()
        )
    }
}

#[async_trait]
impl QuestionSource for StackExchangeClient {
    #[instrument(skip(self), fields(from = window.fromdate(), to = window.todate()))]
    async fn fetch(&self, tag: &str, window: TimeWindow) -> Result<QuestionBatch, SourceError> {
        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, page_size = self.page_size, "requesting questions");

        let transport = |source| SourceError::Transport {
            endpoint: endpoint.clone(),
            source,
        };
        let response = self
            .http
            .get(self.request_url(tag, window))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        // The API answers 200 or an error envelope; anything else is not a result page.
        if status != StatusCode::OK {
            return Err(ApiError::new(status, String::from_utf8_lossy(&body)).into());
        }

        let envelope: QuestionEnvelope =
            serde_json::from_slice(&body).map_err(|source| SourceError::Decode {
                endpoint: endpoint.clone(),
                source,
            })?;
        let batch = QuestionBatch {
            items: envelope.items.unwrap_or_default(),
            has_more: envelope.has_more,
            quota_remaining: envelope.quota_remaining,
        };
        if batch.has_more {
            warn!(
                fetched = batch.len(),
                "more questions exist in the window; only the first page is loaded"
            );
        }
        debug!(
            fetched = batch.len(),
            quota_remaining = ?batch.quota_remaining,
            "questions received"
        );
        Ok(batch)
    }
}
