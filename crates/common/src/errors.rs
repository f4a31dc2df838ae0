pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    pub fn logging(err: impl std::fmt::Display) -> Self {
        Self::Logging(err.to_string())
    }
}
