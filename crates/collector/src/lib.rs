pub mod client;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod verifier;
pub mod window;

pub use client::{Credentials, QuestionBatch, QuestionSource, RawQuestions, StackExchangeClient};
pub use error::{ApiError, PipelineError, SourceError};
pub use loader::{LoadSummary, Loader};
pub use pipeline::{Pipeline, Step, StepFailure, StepOutcome, TaskGraph};
pub use verifier::{SampleRecord, Verifier};
pub use window::TimeWindow;
