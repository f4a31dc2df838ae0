use std::fmt;
use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Flat variable names used by the scheduler's variable store, mapped onto
/// the nested `stackoverflow.*` keys.
pub const LEGACY_VARIABLES: [(&str, &str); 4] = [
    ("STACKOVERFLOW_QUESTION_URL", "stackoverflow.question_url"),
    ("STACKOVERFLOW_CLIENT_ID", "stackoverflow.client_id"),
    ("STACKOVERFLOW_CLIENT_SECRET", "stackoverflow.client_secret"),
    ("STACKOVERFLOW_KEY", "stackoverflow.key"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub stackoverflow: StackOverflowConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Self::builder(path.as_ref())
            .add_source(Environment::default().separator("__"));
        for (variable, key) in LEGACY_VARIABLES {
            builder = builder.set_override_option(key, std::env::var(variable).ok())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder(path: &Path) -> ConfigBuilder<DefaultState> {
        Config::builder()
            .add_source(File::from(config_file(path, "default")).required(false))
            .add_source(File::from(config_file(path, "local")).required(false))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stackoverflow.question_url.trim().is_empty() {
            return Err(invalid("stackoverflow.question_url must not be empty"));
        }
        self.pipeline.validate()
    }
}

fn config_file(root: &Path, name: &str) -> PathBuf {
    root.join("config").join(name)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone, Deserialize)]
pub struct StackOverflowConfig {
    pub question_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub key: String,
    #[serde(default = "StackOverflowConfig::default_site")]
    pub site: String,
    #[serde(default = "StackOverflowConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StackOverflowConfig {
    fn default_site() -> String {
        "stackoverflow".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        30
    }
}

impl fmt::Debug for StackOverflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackOverflowConfig")
            .field("question_url", &self.question_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("key", &"<redacted>")
            .field("site", &self.site)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "PipelineConfig::default_tag")]
    pub tag: String,
    #[serde(default = "PipelineConfig::default_page_size")]
    pub page_size: u32,
    #[serde(default = "PipelineConfig::default_window_start_days_ago")]
    pub window_start_days_ago: u32,
    #[serde(default = "PipelineConfig::default_window_end_days_ago")]
    pub window_end_days_ago: u32,
    #[serde(default = "PipelineConfig::default_sample_limit")]
    pub sample_limit: i64,
}

impl PipelineConfig {
    /// Upper bound the Stack Exchange API accepts for `pagesize`.
    pub const MAX_PAGE_SIZE: u32 = 100;

    fn default_tag() -> String {
        "pandas".to_string()
    }

    const fn default_page_size() -> u32 {
        100
    }

    const fn default_window_start_days_ago() -> u32 {
        3
    }

    const fn default_window_end_days_ago() -> u32 {
        2
    }

    const fn default_sample_limit() -> i64 {
        2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tag.trim().is_empty() {
            return Err(invalid("pipeline.tag must not be empty"));
        }
        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(invalid("pipeline.page_size must be between 1 and 100"));
        }
        if self.window_start_days_ago <= self.window_end_days_ago {
            return Err(invalid(
                "pipeline.window_start_days_ago must be greater than pipeline.window_end_days_ago",
            ));
        }
        if self.sample_limit < 0 {
            return Err(invalid("pipeline.sample_limit must not be negative"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tag: Self::default_tag(),
            page_size: Self::default_page_size(),
            window_start_days_ago: Self::default_window_start_days_ago(),
            window_end_days_ago: Self::default_window_end_days_ago(),
            sample_limit: Self::default_sample_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilityConfig {
    /// When set, metrics are written here in text exposition format after each invocation.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(source: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
        [database]
        url = "postgres://localhost/stack_overflow"

        [stackoverflow]
        question_url = "https://api.stackexchange.com/2.3/questions"
        client_id = "id"
        client_secret = "secret"
        key = "key"
    "#;

    #[test]
    fn defaults_preserve_reference_window() {
        let config = from_toml(MINIMAL).expect("minimal config");
        assert_eq!(config.pipeline.tag, "pandas");
        assert_eq!(config.pipeline.page_size, 100);
        assert_eq!(config.pipeline.window_start_days_ago, 3);
        assert_eq!(config.pipeline.window_end_days_ago, 2);
        assert_eq!(config.pipeline.sample_limit, 2);
        assert_eq!(config.stackoverflow.site, "stackoverflow");
        assert_eq!(config.logging.level, "info");
        assert!(config.observability.metrics_textfile.is_none());
    }

    #[test]
    fn rejects_inverted_window() {
        let source = format!(
            "{MINIMAL}\n[pipeline]\nwindow_start_days_ago = 2\nwindow_end_days_ago = 2\n"
        );
        let err = from_toml(&source).expect_err("window must be rejected");
        assert!(err.to_string().contains("window_start_days_ago"));
    }

    #[test]
    fn rejects_oversized_page() {
        let source = format!("{MINIMAL}\n[pipeline]\npage_size = 250\n");
        assert!(from_toml(&source).is_err());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let config = from_toml(MINIMAL).expect("minimal config");
        let rendered = format!("{:?}", config.stackoverflow);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret\""));
    }

    #[test]
    fn loads_layered_files_from_directory() {
        let root = std::env::temp_dir().join(format!("so-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("config")).expect("create config dir");
        std::fs::write(root.join("config/default.toml"), MINIMAL).expect("write default");
        std::fs::write(
            root.join("config/local.toml"),
            "[pipeline]\ntag = \"rust\"\n",
        )
        .expect("write local");

        let config = AppConfig::builder(&root)
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .expect("layered config");
        assert_eq!(config.pipeline.tag, "rust");
        assert_eq!(config.stackoverflow.client_id, "id");

        std::fs::remove_dir_all(&root).ok();
    }
}
