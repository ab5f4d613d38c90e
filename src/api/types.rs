//! Wire types exchanged with the classification API.
//!
//! Field names follow the server's JSON exactly (including the
//! `fullText_based_content` spelling), so every struct derives serde without
//! a custom naming strategy.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Categorical labels
// ---------------------------------------------------------------------------

/// Classifier verdict for a statement.
///
/// Anything the server sends other than `"Real"` is treated as `Fake`, so the
/// two counts always partition a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "Real",
            Self::Fake => "Fake",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == "Real" { Self::Real } else { Self::Fake })
    }
}

/// Risk bucket assigned by the classifier from its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Medium => "Medium Risk",
            Self::High => "High Risk",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sure the classifier is, as a coarse category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceCategory {
    #[serde(rename = "Very Confident")]
    VeryConfident,
    #[serde(rename = "Moderately Confident")]
    ModeratelyConfident,
    #[serde(rename = "Low Confidence")]
    LowConfidence,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ConfidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VeryConfident => write!(f, "Very Confident"),
            Self::ModeratelyConfident => write!(f, "Moderately Confident"),
            Self::LowConfidence => write!(f, "Low Confidence"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One persisted prediction outcome, as returned by `GET /history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub statement: String,
    #[serde(
        rename = "fullText_based_content",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub full_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub speaker: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: String,
    pub prediction: Label,
    pub confidence: f64,
    #[serde(default)]
    pub num_sources: u32,
    #[serde(default)]
    pub has_official_source: bool,
    pub risk_level: RiskLevel,
    pub timestamp: String,
    #[serde(default)]
    pub input_completeness: f64,
}

impl HistoryRecord {
    /// Parse the record timestamp.
    ///
    /// Accepts RFC 3339 with an offset, or a naive ISO-8601 date-time which is
    /// taken to be UTC (the server stores naive UTC timestamps).
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Split the delimited source list into trimmed, non-empty entries.
    pub fn source_list(&self) -> Vec<&str> {
        self.sources
            .split([';', ',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Optional text columns come back as `null` for older rows.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse an ISO-8601 timestamp as delivered by the server.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Some(naive.and_utc())
}

/// Response body of `GET /history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub data: Vec<HistoryRecord>,
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Body of `POST /predict`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub speaker: String,
    pub statement: String,
    #[serde(rename = "fullText_based_content", default)]
    pub full_text: String,
    #[serde(default)]
    pub sources: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub fake: f64,
    pub real: f64,
}

impl Probabilities {
    /// Whether the two class probabilities sum to one within `tolerance`.
    pub fn is_normalized(&self, tolerance: f64) -> bool {
        ((self.fake + self.real) - 1.0).abs() <= tolerance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDetails {
    pub num_sources: u32,
    pub has_official_source: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustIndicators {
    pub risk_level: RiskLevel,
    pub confidence_category: ConfidenceCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explainability {
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub input_completeness: f64,
    #[serde(default)]
    pub speaker_recognized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetadata {
    #[serde(default)]
    pub timestamp: String,
}

/// Result of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: Label,
    pub confidence: f64,
    pub probabilities: Probabilities,
    pub details: SourceDetails,
    pub trust_indicators: TrustIndicators,
    #[serde(default)]
    pub explainability: Explainability,
    #[serde(default)]
    pub metadata: PredictionMetadata,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Response body of `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

/// Authenticated user identity from `GET /me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub id: i64,
    #[serde(default)]
    pub is_admin: bool,
}

/// Body of `POST /register`.
#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

// ---------------------------------------------------------------------------
// Admin analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetrics {
    #[serde(default)]
    pub avg_sources: f64,
    #[serde(default)]
    pub official_source_count: u64,
    #[serde(default)]
    pub avg_completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalPoint {
    pub date: String,
    pub count: u64,
    pub prediction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPrediction {
    pub id: i64,
    pub statement: String,
    pub prediction: String,
    pub confidence: f64,
    pub timestamp: String,
}

/// Server-side aggregate statistics from `GET /admin/model-performance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    #[serde(default)]
    pub total_predictions: u64,
    #[serde(default)]
    pub prediction_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub avg_confidence: f64,
    #[serde(default)]
    pub confidence_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub risk_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub source_metrics: SourceMetrics,
    #[serde(default)]
    pub temporal_data: Vec<TemporalPoint>,
    #[serde(default)]
    pub recent_predictions: Vec<RecentPrediction>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
