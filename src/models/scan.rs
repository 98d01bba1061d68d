use garde::Validate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

/// Authenticity verdict for a scanned product.
///
/// Closed set: anything else coming back from an analysis provider is
/// coerced to `Unknown` at the parse boundary, never carried as a raw string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Authentic,
    Suspicious,
    Fake,
    Unknown,
}

impl ScanStatus {
    /// Parse a status string leniently, falling back to `Unknown`.
    pub fn coerce(raw: &str) -> Self {
        Self::from_str(raw.trim().to_uppercase().as_str()).unwrap_or(Self::Unknown)
    }

    /// FAKE and SUSPICIOUS both count as intercepted counterfeits.
    pub fn is_risky(self) -> bool {
        matches!(self, Self::Fake | Self::Suspicious)
    }
}

/// Outcome of one authenticity analysis.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[garde(length(min = 1, max = 300))]
    pub product_name: String,

    #[garde(length(min = 1, max = 200))]
    pub brand: String,

    #[garde(skip)]
    pub status: ScanStatus,

    #[garde(range(min = 0.0, max = 100.0))]
    pub confidence_score: f64,

    /// Human-readable justification lines, in display order.
    #[garde(skip)]
    #[serde(default)]
    pub reasoning: Vec<String>,

    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturing_date: Option<String>,

    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_code: Option<String>,

    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_website: Option<String>,

    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_url: Option<String>,

    /// OCR lines in reading order.
    #[garde(skip)]
    #[serde(default)]
    pub extracted_text: Vec<String>,
}

/// One entry in the scan history. Doubles as the POST /api/scans request body.
///
/// `date` stays a string on this type: client-generated items may carry
/// timestamps the analytics layer has to parse defensively, and the store
/// validates/normalizes it on insert.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanHistoryItem {
    #[garde(length(min = 1, max = 100))]
    pub id: String,

    /// ISO-8601 timestamp; empty means "now" at insert time.
    #[garde(skip)]
    #[serde(default)]
    pub date: String,

    /// Base64 data-URI or URL, treated as opaque.
    #[garde(length(min = 1))]
    pub thumbnail: String,

    #[garde(dive)]
    pub result: ScanResult,
}

/// Readiness probe for the analysis adapter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MlStatus {
    pub model_exists: bool,
    pub script_exists: bool,
    pub ready: bool,
}

/// Aggregate counts from the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_scans: i64,
    /// FAKE or SUSPICIOUS.
    pub fake_scans: i64,
    pub authentic_scans: i64,
    /// One-decimal percentage string; "0.0" on an empty store.
    pub fake_percentage: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> ScanHistoryItem {
        ScanHistoryItem {
            id: "1735689600000".to_string(),
            date: "2025-01-01T00:00:00Z".to_string(),
            thumbnail: "data:image/png;base64,AAAA".to_string(),
            result: ScanResult {
                product_name: "Hydra Glow Serum".to_string(),
                brand: "Lumiere".to_string(),
                status: ScanStatus::Authentic,
                confidence_score: 92.5,
                reasoning: vec!["Holographic seal intact".to_string()],
                manufacturing_date: None,
                batch_code: Some("LT-2209".to_string()),
                official_website: None,
                reporting_url: None,
                extracted_text: vec!["LUMIERE".to_string(), "50 mL".to_string()],
            },
        }
    }

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ScanStatus::Authentic).unwrap(),
            "\"AUTHENTIC\""
        );
        assert_eq!(ScanStatus::Fake.to_string(), "FAKE");
    }

    #[test]
    fn status_coerce_falls_back_to_unknown() {
        assert_eq!(ScanStatus::coerce("FAKE"), ScanStatus::Fake);
        assert_eq!(ScanStatus::coerce("suspicious"), ScanStatus::Suspicious);
        assert_eq!(ScanStatus::coerce("COUNTERFEIT"), ScanStatus::Unknown);
        assert_eq!(ScanStatus::coerce(""), ScanStatus::Unknown);
    }

    #[test]
    fn item_serializes_camel_case() {
        let json = serde_json::to_value(sample_item()).unwrap();
        assert_eq!(json["result"]["productName"], "Hydra Glow Serum");
        assert_eq!(json["result"]["confidenceScore"], 92.5);
        assert_eq!(json["result"]["extractedText"][0], "LUMIERE");
        assert!(json["result"].get("manufacturingDate").is_none());
    }

    #[test]
    fn out_of_range_confidence_fails_validation() {
        let mut item = sample_item();
        item.result.confidence_score = 150.0;
        assert!(item.validate().is_err());
    }

    #[test]
    fn empty_brand_fails_validation() {
        let mut item = sample_item();
        item.result.brand = String::new();
        assert!(item.validate().is_err());
    }

    #[test]
    fn valid_item_passes_validation() {
        assert!(sample_item().validate().is_ok());
    }
}
