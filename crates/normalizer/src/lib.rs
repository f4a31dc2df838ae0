pub mod error;
pub mod models;
pub mod payloads;
pub mod transform;

pub use error::NormalizeError;
pub use models::NormalizedQuestion;
pub use payloads::{OwnerPayload, QuestionPayload};
pub use transform::{normalize_payload, normalize_question};
