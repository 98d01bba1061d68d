//! Analysis provider adapter: local classifier subprocess or hosted vision API.
//!
//! Both variants honor the same contract — image-type and size checks up
//! front, a hard latency bound, defensive parsing of the provider's free-form
//! JSON, and temp-file cleanup on every path — so the routes stay agnostic to
//! which one is configured.

use base64::Engine;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::models::scan::{MlStatus, ScanResult, ScanStatus};

/// Upload cap, matched by the router's request body limit.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("analysis provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("analysis provider returned malformed output: {0}")]
    MalformedResponse(String),

    #[error("analysis timed out after {0}s")]
    Timeout(u64),
}

/// The configured analysis capability.
pub enum Analyzer {
    Local(LocalModelAnalyzer),
    Hosted(HostedVisionAnalyzer),
}

impl Analyzer {
    pub fn from_config(config: &AppConfig) -> Self {
        let deadline = Duration::from_secs(config.analysis_timeout_secs);
        match config.analyzer_mode {
            crate::config::AnalyzerMode::Local => Self::Local(LocalModelAnalyzer {
                python_bin: config.python_bin.clone(),
                script_path: config.ml_script_path.clone(),
                model_path: config.ml_model_path.clone(),
                deadline,
            }),
            crate::config::AnalyzerMode::Hosted => Self::Hosted(HostedVisionAnalyzer::new(
                config.vision_api_url.clone().unwrap_or_default(),
                config.vision_api_token.clone().unwrap_or_default(),
                deadline,
            )),
        }
    }

    /// Classify a product image, returning the canonical result shape.
    pub async fn analyze(&self, image: &[u8]) -> Result<ScanResult, AnalyzerError> {
        validate_image(image)?;
        match self {
            Self::Local(a) => a.analyze(image).await,
            Self::Hosted(a) => a.analyze(image).await,
        }
    }

    /// Readiness probe for GET /api/ml/ml-status.
    pub fn status(&self) -> MlStatus {
        match self {
            Self::Local(a) => {
                let model_exists = a.model_path.exists();
                let script_exists = a.script_path.exists();
                MlStatus {
                    model_exists,
                    script_exists,
                    ready: model_exists && script_exists,
                }
            }
            Self::Hosted(a) => {
                // No local artifacts; readiness is having credentials.
                let configured = !a.api_url.is_empty() && !a.api_token.is_empty();
                MlStatus {
                    model_exists: configured,
                    script_exists: configured,
                    ready: configured,
                }
            }
        }
    }
}

/// Reject non-images and oversized payloads before any provider work.
fn validate_image(image: &[u8]) -> Result<(), AnalyzerError> {
    if image.is_empty() {
        return Err(AnalyzerError::InvalidImage("empty upload".to_string()));
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(AnalyzerError::InvalidImage(format!(
            "image is {} bytes, limit is {} bytes",
            image.len(),
            MAX_IMAGE_BYTES
        )));
    }
    image::guess_format(image)
        .map_err(|_| AnalyzerError::InvalidImage("unrecognized image format".to_string()))?;
    Ok(())
}

/// Runs the bundled Keras classifier as a one-shot python subprocess.
pub struct LocalModelAnalyzer {
    pub python_bin: String,
    pub script_path: PathBuf,
    pub model_path: PathBuf,
    pub deadline: Duration,
}

impl LocalModelAnalyzer {
    async fn analyze(&self, image: &[u8]) -> Result<ScanResult, AnalyzerError> {
        // NamedTempFile deletes on drop, covering every exit from this fn.
        let mut tmp = NamedTempFile::new()
            .map_err(|e| AnalyzerError::ProviderUnavailable(e.to_string()))?;
        tmp.write_all(image)
            .and_then(|_| tmp.flush())
            .map_err(|e| AnalyzerError::ProviderUnavailable(e.to_string()))?;

        tracing::debug!(script = %self.script_path.display(), "spawning local classifier");

        let run = Command::new(&self.python_bin)
            .arg(&self.script_path)
            .arg(tmp.path())
            .output();

        let output = timeout(self.deadline, run)
            .await
            .map_err(|_| AnalyzerError::Timeout(self.deadline.as_secs()))?
            .map_err(|e| AnalyzerError::ProviderUnavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(code = ?output.status.code(), "classifier subprocess failed");
            return Err(AnalyzerError::AnalysisFailed(stderr));
        }

        parse_provider_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Calls a hosted vision model over HTTPS with a structured-JSON prompt.
pub struct HostedVisionAnalyzer {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
    deadline: Duration,
}

#[derive(Deserialize)]
struct VisionResponse {
    result: VisionResult,
}

#[derive(Deserialize)]
struct VisionResult {
    description: String,
}

impl HostedVisionAnalyzer {
    pub fn new(api_url: String, api_token: String, deadline: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_token,
            deadline,
        }
    }

    async fn analyze(&self, image: &[u8]) -> Result<ScanResult, AnalyzerError> {
        let prompt = concat!(
            "Analyze this cosmetic product photo for authenticity. Return ONLY valid JSON ",
            "with exactly these fields: productName, brand, ",
            "status (one of AUTHENTIC, SUSPICIOUS, FAKE, UNKNOWN), ",
            "confidenceScore (0-100), reasoning (array of strings), ",
            "extractedText (array of visible text lines), and optionally ",
            "manufacturingDate, batchCode, officialWebsite, reportingUrl."
        );

        let body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image),
            "prompt": prompt,
            "max_tokens": 1024,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .timeout(self.deadline)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyzerError::Timeout(self.deadline.as_secs())
                } else {
                    AnalyzerError::ProviderUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AnalyzerError::AnalysisFailed(format!(
                "provider returned HTTP {}",
                response.status()
            )));
        }

        let vision: VisionResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::MalformedResponse(e.to_string()))?;

        parse_provider_output(&vision.result.description)
    }
}

/// Provider output with the required fields strict and the rest optional.
/// A missing required field fails the whole parse; we never surface a
/// partially filled result.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    status: String,
    confidence_score: f64,
    reasoning: Vec<String>,
    product_name: String,
    brand: String,
    extracted_text: Vec<String>,
    manufacturing_date: Option<String>,
    batch_code: Option<String>,
    official_website: Option<String>,
    reporting_url: Option<String>,
}

fn parse_provider_output(raw: &str) -> Result<ScanResult, AnalyzerError> {
    let parsed: RawAnalysis = serde_json::from_str(raw.trim())
        .map_err(|e| AnalyzerError::MalformedResponse(e.to_string()))?;

    Ok(ScanResult {
        product_name: parsed.product_name,
        brand: parsed.brand,
        status: ScanStatus::coerce(&parsed.status),
        confidence_score: parsed.confidence_score,
        reasoning: parsed.reasoning,
        manufacturing_date: parsed.manufacturing_date,
        batch_code: parsed.batch_code,
        official_website: parsed.official_website,
        reporting_url: parsed.reporting_url,
        extracted_text: parsed.extracted_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    const FULL_OUTPUT: &str = r#"{
        "status": "FAKE",
        "confidenceScore": 87.5,
        "reasoning": ["Font weight differs from genuine packaging"],
        "productName": "Radiance Cream",
        "brand": "Lumiere",
        "extractedText": ["LUMIERE", "50 mL"],
        "batchCode": "LT-2209"
    }"#;

    #[test]
    fn parses_complete_provider_output() {
        let result = parse_provider_output(FULL_OUTPUT).unwrap();
        assert_eq!(result.status, ScanStatus::Fake);
        assert_eq!(result.confidence_score, 87.5);
        assert_eq!(result.brand, "Lumiere");
        assert_eq!(result.batch_code.as_deref(), Some("LT-2209"));
        assert_eq!(result.manufacturing_date, None);
    }

    #[test]
    fn missing_required_field_is_malformed() {
        // No productName.
        let raw = r#"{"status":"FAKE","confidenceScore":80,"reasoning":[],"brand":"X","extractedText":[]}"#;
        assert!(matches!(
            parse_provider_output(raw),
            Err(AnalyzerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_json_output_is_malformed() {
        assert!(matches!(
            parse_provider_output("Traceback (most recent call last): ..."),
            Err(AnalyzerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn unrecognized_status_coerces_to_unknown() {
        let raw = r#"{"status":"COUNTERFEIT","confidenceScore":50,"reasoning":[],
                      "productName":"P","brand":"B","extractedText":[]}"#;
        let result = parse_provider_output(raw).unwrap();
        assert_eq!(result.status, ScanStatus::Unknown);
    }

    #[test]
    fn out_of_range_confidence_parses_but_fails_validation() {
        // The adapter passes it through; the store-side garde check is what
        // rejects it before persistence.
        let raw = r#"{"status":"FAKE","confidenceScore":150,"reasoning":[],
                      "productName":"P","brand":"B","extractedText":[]}"#;
        let result = parse_provider_output(raw).unwrap();
        assert_eq!(result.confidence_score, 150.0);
        assert!(result.validate().is_err());
    }

    #[test]
    fn validate_image_rejects_garbage_and_oversize() {
        assert!(matches!(
            validate_image(b"definitely not an image"),
            Err(AnalyzerError::InvalidImage(_))
        ));
        assert!(matches!(
            validate_image(&[]),
            Err(AnalyzerError::InvalidImage(_))
        ));
        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image(&oversized),
            Err(AnalyzerError::InvalidImage(_))
        ));
    }

    #[test]
    fn validate_image_accepts_png_magic() {
        // Minimal PNG signature is enough for format sniffing.
        let png_header: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert!(validate_image(png_header).is_ok());
    }

    #[tokio::test]
    async fn local_analyzer_reports_missing_artifacts() {
        let analyzer = Analyzer::Local(LocalModelAnalyzer {
            python_bin: "python3".to_string(),
            script_path: PathBuf::from("/nonexistent/ml_service.py"),
            model_path: PathBuf::from("/nonexistent/model.keras"),
            deadline: Duration::from_secs(5),
        });
        let status = analyzer.status();
        assert!(!status.model_exists);
        assert!(!status.script_exists);
        assert!(!status.ready);
    }
}
