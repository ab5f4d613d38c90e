//! History aggregation: summary statistics over prediction records.
//!
//! [`summarize`] walks the records exactly once and never mutates them.

use serde::Serialize;

use crate::api::types::{HistoryRecord, Label, RiskLevel};

/// Confidence at or above which a prediction counts as high confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Summary statistics over a history snapshot.
///
/// `real_count + fake_count == total_records` holds for every input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub total_records: usize,
    pub real_count: usize,
    pub fake_count: usize,
    pub avg_confidence: f64,
    pub high_confidence_count: usize,
    pub with_official_source_count: usize,
    pub avg_input_completeness: f64,
    pub risk_distribution: RiskDistribution,
    pub time_series: TimeSeries,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub low_risk: usize,
    pub medium_risk: usize,
    pub high_risk: usize,
}

impl RiskDistribution {
    pub fn count(&self, risk: RiskLevel) -> usize {
        match risk {
            RiskLevel::Low => self.low_risk,
            RiskLevel::Medium => self.medium_risk,
            RiskLevel::High => self.high_risk,
            RiskLevel::Unknown => 0,
        }
    }

    /// Number of records with a recognised risk level.
    pub fn rated(&self) -> usize {
        self.low_risk + self.medium_risk + self.high_risk
    }
}

/// Three parallel sequences in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    pub timestamps: Vec<String>,
    pub confidences: Vec<f64>,
    pub predictions: Vec<Label>,
}

impl AggregateSummary {
    /// Percentage of the total, or 0.0 when there are no records.
    pub fn pct(&self, count: usize) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            (count as f64 / self.total_records as f64) * 100.0
        }
    }
}

/// Reduce a record sequence to an [`AggregateSummary`] in one pass.
pub fn summarize(records: &[HistoryRecord]) -> AggregateSummary {
    let total = records.len();
    if total == 0 {
        return AggregateSummary::default();
    }

    let mut summary = AggregateSummary {
        total_records: total,
        time_series: TimeSeries {
            timestamps: Vec::with_capacity(total),
            confidences: Vec::with_capacity(total),
            predictions: Vec::with_capacity(total),
        },
        ..Default::default()
    };
    let mut confidence_sum = 0.0;
    let mut completeness_sum = 0.0;

    for record in records {
        match record.prediction {
            Label::Real => summary.real_count += 1,
            Label::Fake => summary.fake_count += 1,
        }

        confidence_sum += record.confidence;
        completeness_sum += record.input_completeness;

        if record.confidence >= HIGH_CONFIDENCE_THRESHOLD {
            summary.high_confidence_count += 1;
        }
        if record.has_official_source {
            summary.with_official_source_count += 1;
        }

        let risk = &mut summary.risk_distribution;
        match record.risk_level {
            RiskLevel::Low => risk.low_risk += 1,
            RiskLevel::Medium => risk.medium_risk += 1,
            RiskLevel::High => risk.high_risk += 1,
            RiskLevel::Unknown => {}
        }

        let series = &mut summary.time_series;
        series.timestamps.push(record.timestamp.clone());
        series.confidences.push(record.confidence);
        series.predictions.push(record.prediction);
    }

    summary.avg_confidence = confidence_sum / total as f64;
    summary.avg_input_completeness = completeness_sum / total as f64;
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
