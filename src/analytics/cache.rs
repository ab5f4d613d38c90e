//! Memoized derivations over an immutable history snapshot.
//!
//! Derived views are recomputed only when the snapshot generation changes or
//! a new filter combination is requested. Records are shared via `Arc` and
//! never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, Utc};

use super::aggregate::{AggregateSummary, summarize};
use super::charts::{
    LabelFilter, RiskFilter, RiskHierarchy, TemporalMatrix, TimelineView, hierarchy,
    temporal_matrix, timeline,
};
use crate::api::types::HistoryRecord;

/// An immutable set of history records tagged with a generation number.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    records: Arc<[HistoryRecord]>,
    generation: u64,
}

impl HistorySnapshot {
    pub fn new(records: Vec<HistoryRecord>, generation: u64) -> Self {
        Self {
            records: records.into(),
            generation,
        }
    }

    /// Generation 0, no records.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for HistorySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

type TimelineKey = (LabelFilter, RiskFilter, usize);

#[derive(Debug, Default)]
pub struct DerivedCache {
    generation: Option<u64>,
    summary: Option<Arc<AggregateSummary>>,
    hierarchy: Option<Arc<RiskHierarchy>>,
    timelines: HashMap<TimelineKey, Arc<TimelineView>>,
    /// Keyed by "interpret in UTC".
    matrices: HashMap<bool, Arc<TemporalMatrix>>,
    computations: usize,
}

impl DerivedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many derivations have actually been computed.
    pub fn computations(&self) -> usize {
        self.computations
    }

    pub fn summary(&mut self, snapshot: &HistorySnapshot) -> Arc<AggregateSummary> {
        self.sync(snapshot);
        if let Some(cached) = &self.summary {
            return Arc::clone(cached);
        }
        self.computations += 1;
        let value = Arc::new(summarize(snapshot.records()));
        self.summary = Some(Arc::clone(&value));
        value
    }

    pub fn hierarchy(&mut self, snapshot: &HistorySnapshot) -> Arc<RiskHierarchy> {
        self.sync(snapshot);
        if let Some(cached) = &self.hierarchy {
            return Arc::clone(cached);
        }
        self.computations += 1;
        let value = Arc::new(hierarchy(snapshot.records()));
        self.hierarchy = Some(Arc::clone(&value));
        value
    }

    pub fn timeline(
        &mut self,
        snapshot: &HistorySnapshot,
        label: LabelFilter,
        risk: RiskFilter,
        cap: usize,
    ) -> Arc<TimelineView> {
        self.sync(snapshot);
        let computations = &mut self.computations;
        let view = self.timelines.entry((label, risk, cap)).or_insert_with(|| {
            *computations += 1;
            Arc::new(timeline(snapshot.records(), label, risk, cap))
        });
        Arc::clone(view)
    }

    /// Temporal matrix in the local time zone, or UTC when `utc` is set.
    pub fn temporal_matrix(&mut self, snapshot: &HistorySnapshot, utc: bool) -> Arc<TemporalMatrix> {
        self.sync(snapshot);
        let computations = &mut self.computations;
        let matrix = self.matrices.entry(utc).or_insert_with(|| {
            *computations += 1;
            let records = snapshot.records();
            Arc::new(if utc {
                temporal_matrix(records, &Utc)
            } else {
                temporal_matrix(records, &Local)
            })
        });
        Arc::clone(matrix)
    }

    fn sync(&mut self, snapshot: &HistorySnapshot) {
        if self.generation == Some(snapshot.generation()) {
            return;
        }
        tracing::debug!(
            from = ?self.generation,
            to = snapshot.generation(),
            "history generation changed, dropping derived views"
        );
        self.generation = Some(snapshot.generation());
        self.summary = None;
        self.hierarchy = None;
        self.timelines.clear();
        self.matrices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{Label, RiskLevel};

    fn snapshot(n: usize, generation: u64) -> HistorySnapshot {
        let records = (0..n)
            .map(|i| HistoryRecord {
                id: i as i64,
                statement: String::new(),
                full_text: String::new(),
                speaker: String::new(),
                sources: String::new(),
                prediction: if i % 2 == 0 { Label::Real } else { Label::Fake },
                confidence: 0.8,
                num_sources: 0,
                has_official_source: false,
                risk_level: RiskLevel::Medium,
                timestamp: format!("2025-03-01T12:{:02}:00Z", i % 60),
                input_completeness: 50.0,
            })
            .collect();
        HistorySnapshot::new(records, generation)
    }

    #[test]
    fn same_generation_reuses_results() {
        let snap = snapshot(4, 1);
        let mut cache = DerivedCache::new();

        let a = cache.summary(&snap);
        let b = cache.summary(&snap);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.computations(), 1);

        cache.hierarchy(&snap);
        cache.hierarchy(&snap);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn timelines_are_keyed_by_filters() {
        let snap = snapshot(10, 1);
        let mut cache = DerivedCache::new();

        cache.timeline(&snap, LabelFilter::All, RiskFilter::All, 100);
        cache.timeline(&snap, LabelFilter::Real, RiskFilter::All, 100);
        cache.timeline(&snap, LabelFilter::All, RiskFilter::All, 100);
        assert_eq!(cache.computations(), 2);

        let real = cache.timeline(&snap, LabelFilter::Real, RiskFilter::All, 100);
        assert_eq!(real.filtered_len, 5);
    }

    #[test]
    fn new_generation_invalidates() {
        let mut cache = DerivedCache::new();
        let first = cache.summary(&snapshot(2, 1));
        let second = cache.summary(&snapshot(6, 2));
        assert_eq!(first.total_records, 2);
        assert_eq!(second.total_records, 6);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn matrix_cached_per_zone() {
        let snap = snapshot(3, 7);
        let mut cache = DerivedCache::new();
        let utc = cache.temporal_matrix(&snap, true);
        cache.temporal_matrix(&snap, true);
        assert_eq!(cache.computations(), 1);
        assert_eq!(utc.counts.iter().flatten().sum::<usize>(), 3);
    }
}
