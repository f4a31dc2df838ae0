use db::DbError;
use normalizer::NormalizeError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::pipeline::GraphError;
use crate::window::WindowError;

/// Non-success response from the question API. Carries the body verbatim.
#[derive(Debug, Error)]
#[error("cannot fetch questions: {status}\n{body}")]
pub struct ApiError {
    pub status: StatusCode,
    pub body: String,
}

impl ApiError {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || self.status.is_server_error()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {endpoint} is not a question envelope: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid question url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl SourceError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SourceError::Api(err) => Some(err.status),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Api(err) => err.is_transient(),
            SourceError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            SourceError::Decode { .. } | SourceError::Url(_) | SourceError::Client(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("store error: {0}")]
    Store(#[from] DbError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl PipelineError {
    /// Worth a workflow-level retry. Nothing inside the pipeline retries.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Source(err) => err.is_transient(),
            PipelineError::Store(err) => err.is_connection(),
            PipelineError::Normalize(_) | PipelineError::Window(_) | PipelineError::Graph(_) => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert!(ApiError::new(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(!ApiError::new(StatusCode::BAD_REQUEST, "").is_transient());
        assert!(!ApiError::new(StatusCode::FORBIDDEN, "").is_transient());
    }

    #[test]
    fn missing_fields_are_fatal() {
        let err = PipelineError::from(NormalizeError::missing(7, "owner"));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn api_error_message_includes_status_and_body() {
        let err = PipelineError::from(SourceError::from(ApiError::new(
            StatusCode::BAD_REQUEST,
            r#"{"error_id":400,"error_name":"bad_parameter"}"#,
        )));
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("bad_parameter"));
    }
}
