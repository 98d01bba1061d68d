use serde::Deserialize;
use std::path::PathBuf;

/// Which analysis adapter to run behind POST /api/ml/analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerMode {
    /// Spawn the bundled classifier script per request.
    #[default]
    Local,
    /// Call a hosted vision API.
    Hosted,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g. "0.0.0.0:5000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Browser origin allowed by CORS; "*" for permissive.
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,

    #[serde(default)]
    pub analyzer_mode: AnalyzerMode,

    /// Python interpreter used for the local classifier.
    #[serde(default = "default_python_bin")]
    pub python_bin: String,

    #[serde(default = "default_ml_script_path")]
    pub ml_script_path: PathBuf,

    #[serde(default = "default_ml_model_path")]
    pub ml_model_path: PathBuf,

    /// Hard bound on one analysis call, local or hosted.
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,

    /// Hosted vision endpoint; required when ANALYZER_MODE=hosted.
    #[serde(default)]
    pub vision_api_url: Option<String>,

    /// Hosted vision bearer token; required when ANALYZER_MODE=hosted.
    #[serde(default)]
    pub vision_api_token: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_frontend_origin() -> String {
    "*".to_string()
}

fn default_python_bin() -> String {
    "python3".to_string()
}

fn default_ml_script_path() -> PathBuf {
    PathBuf::from("ml/ml_service.py")
}

fn default_ml_model_path() -> PathBuf {
    PathBuf::from("ml/cosmetic_fake_real_model.keras")
}

fn default_analysis_timeout_secs() -> u64 {
    30
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),

    #[error("configuration error: {0}")]
    Invalid(&'static str),
}

impl AppConfig {
    /// Load from the environment (and an optional .env file), failing fast
    /// with a descriptive message so the process never serves half-configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: AppConfig = envy::from_env()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.analyzer_mode == AnalyzerMode::Hosted
            && (self.vision_api_url.as_deref().unwrap_or("").is_empty()
                || self.vision_api_token.as_deref().unwrap_or("").is_empty())
        {
            return Err(ConfigError::Invalid(
                "VISION_API_URL and VISION_API_TOKEN are required when ANALYZER_MODE=hosted",
            ));
        }
        if self.analysis_timeout_secs == 0 {
            return Err(ConfigError::Invalid("ANALYSIS_TIMEOUT_SECS must be > 0"));
        }
        Ok(())
    }
}
