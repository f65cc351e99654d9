//! Per-entity migration results and run-level aggregation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gitferry_types::{EntityKind, MigrationStatus};

/// Outcome of one entity migration attempt.
///
/// Created at dispatch, finalized exactly once; a terminal status is never
/// overwritten.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub kind: EntityKind,
    pub source_id: u64,
    /// Human-readable handle (username or path) for operator reports.
    pub label: String,
    pub status: MigrationStatus,
    pub destination_id: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl MigrationResult {
    /// Start tracking an attempt.
    pub fn begin(kind: EntityKind, source_id: u64, label: impl Into<String>) -> Self {
        Self {
            kind,
            source_id,
            label: label.into(),
            status: MigrationStatus::InProgress,
            destination_id: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Record a non-fatal warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Finalize as succeeded.
    pub fn succeed(self, destination_id: Option<u64>) -> Self {
        self.finalize(MigrationStatus::Succeeded, destination_id, None)
    }

    /// Finalize as failed.
    pub fn fail(self, error: impl Into<String>) -> Self {
        self.finalize(MigrationStatus::Failed, None, Some(error.into()))
    }

    /// Finalize as skipped, recording the reason as a warning.
    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.warnings.push(reason.into());
        let destination_id = self.destination_id;
        self.finalize(MigrationStatus::Skipped, destination_id, None)
    }

    fn finalize(
        mut self,
        status: MigrationStatus,
        destination_id: Option<u64>,
        error: Option<String>,
    ) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        self.status = status;
        self.destination_id = destination_id.or(self.destination_id);
        self.error = error;
        self.completed_at = Some(Utc::now());
        self
    }
}

/// Per-kind outcome counts.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PhaseTally {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl PhaseTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    fn record(&mut self, status: MigrationStatus) {
        match status {
            MigrationStatus::Succeeded => self.succeeded += 1,
            MigrationStatus::Failed => self.failed += 1,
            MigrationStatus::Skipped => self.skipped += 1,
            MigrationStatus::Pending | MigrationStatus::InProgress => {}
        }
    }
}

/// Final report of a migration run, handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tallies: BTreeMap<EntityKind, PhaseTally>,
    pub results: Vec<MigrationResult>,
}

impl MigrationSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            tallies: BTreeMap::new(),
            results: Vec::new(),
        }
    }

    /// Fold one phase's results into the summary.
    pub fn record_phase(&mut self, kind: EntityKind, results: Vec<MigrationResult>) {
        let tally = self.tallies.entry(kind).or_default();
        for result in &results {
            tally.record(result.status);
        }
        self.results.extend(results);
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn tally(&self, kind: EntityKind) -> PhaseTally {
        self.tallies.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_succeeded(&self) -> usize {
        self.tallies.values().map(|t| t.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.tallies.values().map(|t| t.failed).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.tallies.values().map(|t| t.skipped).sum()
    }

    /// Entities skipped over a destination-side conflict, as opposed to
    /// failed over an error; the two need different operator follow-up.
    pub fn skipped_results(&self) -> impl Iterator<Item = &MigrationResult> {
        self.results
            .iter()
            .filter(|r| r.status == MigrationStatus::Skipped)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

impl Default for MigrationSummary {
    fn default() -> Self {
        Self::new()
    }
}
