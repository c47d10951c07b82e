//! Merging per-source analysis records into one [`ProjectSummary`].
//!
//! Records are a closed set of variants (files and SQL objects). Each record
//! becomes a one-source summary and summaries are merged additively, so the
//! result does not depend on the order in which records arrive.

mod record;
mod summary;

use tracing::warn;

pub use record::{
    AnalysisRecord, CategoryMetrics, ClassInfo, Comment, FileAnalysis, FunctionInfo,
    SqlObjectAnalysis, SqlObjectKind, SqlParameter, Todo, TodoPriority,
};
pub use summary::{
    CodeMetrics, DerivedMetrics, ImportMetrics, Maintenance, ProjectStats, ProjectSummary,
    SourceNote, SqlMetrics, Structure, COMPLEX_SQL_THRESHOLD,
};

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("source '{0}' was already aggregated")]
    DuplicateSource(String),
}

/// Append-only accumulator over analysis records.
#[derive(Debug, Default)]
pub struct Aggregator {
    summary: ProjectSummary,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record. A record whose identifier was already added is
    /// rejected and logged; returns whether the record was taken.
    pub fn push(&mut self, record: AnalysisRecord) -> bool {
        match self.summary.merge(ProjectSummary::from_record(record)) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "skipping duplicate analysis record");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.summary.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.sources.is_empty()
    }

    pub fn finish(self) -> ProjectSummary {
        self.summary
    }
}

impl Extend<AnalysisRecord> for Aggregator {
    fn extend<I: IntoIterator<Item = AnalysisRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

/// Merge `records` into a single summary.
pub fn combine<I>(records: I) -> ProjectSummary
where
    I: IntoIterator<Item = AnalysisRecord>,
{
    let mut aggregator = Aggregator::new();
    aggregator.extend(records);
    aggregator.finish()
}
