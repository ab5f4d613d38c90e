//! Chart data derivers.
//!
//! Each deriver is a pure function of a record slice plus the user's filters.
//! The output is plain data; rendering is left to the CLI and dashboard.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::api::types::{HistoryRecord, Label, PredictionResponse, RiskLevel};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFilter {
    #[default]
    All,
    Real,
    Fake,
}

impl LabelFilter {
    pub fn matches(&self, label: Label) -> bool {
        match self {
            Self::All => true,
            Self::Real => label == Label::Real,
            Self::Fake => label == Label::Fake,
        }
    }
}

impl FromStr for LabelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "real" => Ok(Self::Real),
            "fake" => Ok(Self::Fake),
            other => Err(format!("unknown label filter '{other}' (all|real|fake)")),
        }
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Real => write!(f, "real"),
            Self::Fake => write!(f, "fake"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl RiskFilter {
    pub fn matches(&self, risk: RiskLevel) -> bool {
        match self {
            Self::All => true,
            Self::Low => risk == RiskLevel::Low,
            Self::Medium => risk == RiskLevel::Medium,
            Self::High => risk == RiskLevel::High,
        }
    }
}

impl FromStr for RiskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.trim_end_matches(" risk") {
            "" | "all" => Ok(Self::All),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("unknown risk filter '{s}' (all|low|medium|high)")),
        }
    }
}

impl fmt::Display for RiskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Default cap on timeline points before subsampling kicks in.
pub const DEFAULT_TIMELINE_CAP: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub id: i64,
    pub timestamp: String,
    pub label: Label,
    pub risk_level: RiskLevel,
    /// Confidence as a percentage (0–100).
    pub confidence_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineStats {
    pub shown: usize,
    pub real: usize,
    pub fake: usize,
    pub avg_confidence_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineView {
    /// Chronological, possibly subsampled points.
    pub points: Vec<TimelinePoint>,
    /// Records that passed the filters, before subsampling.
    pub filtered_len: usize,
    /// Records in the input.
    pub total_len: usize,
    /// Every `step`-th filtered record was kept (1 = no sampling).
    pub step: usize,
    pub stats: TimelineStats,
}

impl TimelineView {
    pub fn sampled(&self) -> bool {
        self.step > 1
    }
}

/// Filter, sort chronologically, and subsample to at most `cap` points.
///
/// Sampling keeps filtered indices `i` with `i % k == 0` where
/// `k = ceil(len / cap)`, so the earliest filtered record is always kept.
/// `cap == 0` disables sampling.
pub fn timeline(
    records: &[HistoryRecord],
    label: LabelFilter,
    risk: RiskFilter,
    cap: usize,
) -> TimelineView {
    let mut filtered: Vec<(Option<DateTime<Utc>>, &HistoryRecord)> = records
        .iter()
        .filter(|r| label.matches(r.prediction) && risk.matches(r.risk_level))
        .map(|r| (r.parsed_timestamp(), r))
        .collect();

    // Stable sort; unparseable timestamps (None) order first.
    filtered.sort_by(|a, b| a.0.cmp(&b.0));

    let filtered_len = filtered.len();
    let step = if cap > 0 && filtered_len > cap {
        filtered_len.div_ceil(cap)
    } else {
        1
    };

    let points: Vec<TimelinePoint> = filtered
        .into_iter()
        .step_by(step)
        .map(|(_, r)| TimelinePoint {
            id: r.id,
            timestamp: r.timestamp.clone(),
            label: r.prediction,
            risk_level: r.risk_level,
            confidence_pct: r.confidence * 100.0,
        })
        .collect();

    let stats = timeline_stats(&points);

    TimelineView {
        points,
        filtered_len,
        total_len: records.len(),
        step,
        stats,
    }
}

fn timeline_stats(points: &[TimelinePoint]) -> TimelineStats {
    let shown = points.len();
    let real = points.iter().filter(|p| p.label == Label::Real).count();
    let avg_confidence_pct = if shown == 0 {
        0.0
    } else {
        points.iter().map(|p| p.confidence_pct).sum::<f64>() / shown as f64
    };
    TimelineStats {
        shown,
        real,
        fake: shown - real,
        avg_confidence_pct,
    }
}

// ---------------------------------------------------------------------------
// Risk hierarchy
// ---------------------------------------------------------------------------

/// One node of the hierarchy. `parent` is empty for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub label: String,
    pub parent: String,
    pub value: usize,
}

/// Nested counts: root → label → risk, plus a sibling official-source split.
///
/// Every parent's value is the exact sum of its children within each branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskHierarchy {
    pub nodes: Vec<HierarchyNode>,
}

pub const ROOT_LABEL: &str = "All Predictions";
pub const WITH_OFFICIAL_LABEL: &str = "With Official Sources";
pub const WITHOUT_OFFICIAL_LABEL: &str = "Without Official Sources";

fn label_node_name(label: Label) -> &'static str {
    match label {
        Label::Real => "Real News",
        Label::Fake => "Fake News",
    }
}

fn risk_leaf_name(label: Label, risk: RiskLevel) -> String {
    let risk = match risk {
        RiskLevel::Unknown => "Unrated",
        other => other.as_str(),
    };
    format!("{} - {}", label.as_str(), risk)
}

const RISKS: [RiskLevel; 4] = [
    RiskLevel::Low,
    RiskLevel::Medium,
    RiskLevel::High,
    RiskLevel::Unknown,
];

fn risk_index(risk: RiskLevel) -> usize {
    match risk {
        RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High => 2,
        RiskLevel::Unknown => 3,
    }
}

/// Build the risk hierarchy in one pass.
///
/// Records with an unrecognised risk level land in a `<label> - Unrated` leaf
/// so the tree stays additive; that leaf is omitted when empty.
pub fn hierarchy(records: &[HistoryRecord]) -> RiskHierarchy {
    // [label][risk]
    let mut counts = [[0usize; 4]; 2];
    let mut with_official = 0usize;

    for r in records {
        let li = match r.prediction {
            Label::Real => 0,
            Label::Fake => 1,
        };
        counts[li][risk_index(r.risk_level)] += 1;
        if r.has_official_source {
            with_official += 1;
        }
    }

    let total = records.len();
    let mut nodes = vec![HierarchyNode {
        label: ROOT_LABEL.to_string(),
        parent: String::new(),
        value: total,
    }];

    for (li, label) in [Label::Real, Label::Fake].into_iter().enumerate() {
        nodes.push(HierarchyNode {
            label: label_node_name(label).to_string(),
            parent: ROOT_LABEL.to_string(),
            value: counts[li].iter().sum(),
        });
    }

    for (li, label) in [Label::Real, Label::Fake].into_iter().enumerate() {
        for risk in RISKS {
            let value = counts[li][risk_index(risk)];
            if risk == RiskLevel::Unknown && value == 0 {
                continue;
            }
            nodes.push(HierarchyNode {
                label: risk_leaf_name(label, risk),
                parent: label_node_name(label).to_string(),
                value,
            });
        }
    }

    nodes.push(HierarchyNode {
        label: WITH_OFFICIAL_LABEL.to_string(),
        parent: ROOT_LABEL.to_string(),
        value: with_official,
    });
    nodes.push(HierarchyNode {
        label: WITHOUT_OFFICIAL_LABEL.to_string(),
        parent: ROOT_LABEL.to_string(),
        value: total - with_official,
    });

    RiskHierarchy { nodes }
}

impl RiskHierarchy {
    pub fn root(&self) -> Option<&HierarchyNode> {
        self.nodes.iter().find(|n| n.parent.is_empty())
    }

    pub fn node(&self, label: &str) -> Option<&HierarchyNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    pub fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a HierarchyNode> {
        self.nodes.iter().filter(move |n| n.parent == parent)
    }

    /// Share of the root, as a percentage. 0.0 for an empty tree.
    pub fn pct_of_root(&self, node: &HierarchyNode) -> f64 {
        match self.root() {
            Some(root) if root.value > 0 => node.value as f64 / root.value as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// Check additivity: every non-leaf node equals the sum of each of its
    /// branches. The root has two branches (label split and source split).
    pub fn is_additive(&self) -> bool {
        let label_nodes = [label_node_name(Label::Real), label_node_name(Label::Fake)];
        let source_nodes = [WITH_OFFICIAL_LABEL, WITHOUT_OFFICIAL_LABEL];

        let Some(root) = self.root() else {
            return false;
        };
        let branch_sum = |names: &[&str]| -> usize {
            self.children(&root.label)
                .filter(|n| names.contains(&n.label.as_str()))
                .map(|n| n.value)
                .sum()
        };
        if branch_sum(&label_nodes) != root.value || branch_sum(&source_nodes) != root.value {
            return false;
        }

        label_nodes.iter().all(|name| {
            let Some(node) = self.node(name) else {
                return false;
            };
            self.children(name).map(|c| c.value).sum::<usize>() == node.value
        })
    }
}

// ---------------------------------------------------------------------------
// Temporal matrix
// ---------------------------------------------------------------------------

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Mean confidence by (day-of-week, hour-of-day).
///
/// Rows are days with Sunday first; columns are hours 0–23. Empty cells are
/// `None`, which is distinct from a mean of zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalMatrix {
    /// Mean confidence percentage per cell.
    pub cells: [[Option<f64>; 24]; 7],
    pub counts: [[usize; 24]; 7],
    /// Records whose timestamp could not be parsed.
    pub skipped: usize,
}

impl TemporalMatrix {
    pub fn get(&self, day: usize, hour: usize) -> Option<f64> {
        self.cells.get(day)?.get(hour).copied().flatten()
    }

    pub fn populated_cells(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// The populated cell with the highest mean, as `(day, hour, mean)`.
    pub fn peak(&self) -> Option<(usize, usize, f64)> {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(d, row)| {
                row.iter()
                    .enumerate()
                    .filter_map(move |(h, c)| c.map(|v| (d, h, v)))
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
    }
}

/// Bucket records into the 7×24 matrix, interpreting timestamps in `tz`.
pub fn temporal_matrix<Tz: TimeZone>(records: &[HistoryRecord], tz: &Tz) -> TemporalMatrix {
    let mut sums = [[0.0f64; 24]; 7];
    let mut counts = [[0usize; 24]; 7];
    let mut skipped = 0usize;

    for r in records {
        let Some(ts) = r.parsed_timestamp() else {
            skipped += 1;
            continue;
        };
        let local = ts.with_timezone(tz);
        let day = local.weekday().num_days_from_sunday() as usize;
        let hour = local.hour() as usize;
        sums[day][hour] += r.confidence * 100.0;
        counts[day][hour] += 1;
    }

    let mut cells = [[None; 24]; 7];
    for day in 0..7 {
        for hour in 0..24 {
            if counts[day][hour] > 0 {
                cells[day][hour] = Some(sums[day][hour] / counts[day][hour] as f64);
            }
        }
    }

    TemporalMatrix {
        cells,
        counts,
        skipped,
    }
}

// ---------------------------------------------------------------------------
// Single-prediction views
// ---------------------------------------------------------------------------

/// Confidence bands shared by the gauge and the timeline reference lines.
pub const MEDIUM_BAND_PCT: f64 = 70.0;
pub const LOW_RISK_BAND_PCT: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Red,
    Amber,
    Green,
}

impl Band {
    pub fn for_pct(pct: f64) -> Self {
        if pct >= LOW_RISK_BAND_PCT {
            Self::Green
        } else if pct >= MEDIUM_BAND_PCT {
            Self::Amber
        } else {
            Self::Red
        }
    }

    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => Self::Green,
            RiskLevel::Medium => Self::Amber,
            RiskLevel::High | RiskLevel::Unknown => Self::Red,
        }
    }
}

/// Gauge and probability bars for one prediction result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub label: Label,
    pub confidence_pct: f64,
    /// Band the confidence falls in.
    pub band: Band,
    /// Colour of the gauge bar, from the risk level.
    pub risk_band: Band,
    pub real_pct: f64,
    pub fake_pct: f64,
    pub probabilities_normalized: bool,
}

pub fn prediction_view(prediction: &PredictionResponse) -> PredictionView {
    let confidence_pct = prediction.confidence * 100.0;
    PredictionView {
        label: prediction.prediction,
        confidence_pct,
        band: Band::for_pct(confidence_pct),
        risk_band: Band::for_risk(prediction.trust_indicators.risk_level),
        real_pct: prediction.probabilities.real * 100.0,
        fake_pct: prediction.probabilities.fake * 100.0,
        probabilities_normalized: prediction.probabilities.is_normalized(0.01),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
