//! Progress reporting for migration runs.
//!
//! The engine emits typed updates through a callback; rendering (progress
//! bars, log lines) is the caller's concern.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use gitferry_types::{EntityKind, MigrationStatus};

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// One progress event.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Entity kind currently being migrated.
    pub kind: Option<EntityKind>,
    /// Entities finished in the current phase.
    pub completed: u64,
    /// Entities queued in the current phase.
    pub total: u64,
    /// Label of the entity that just finished.
    pub item: Option<String>,
    /// Outcome of the entity that just finished.
    pub status: Option<MigrationStatus>,
}

/// Progress tracker shared between the engine and its caller.
pub struct MigrationProgress {
    kind: Mutex<Option<EntityKind>>,
    completed: AtomicU64,
    total: AtomicU64,
    callback: Option<Arc<ProgressCallback>>,
}

impl MigrationProgress {
    pub fn new() -> Self {
        Self {
            kind: Mutex::new(None),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            callback: None,
        }
    }

    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::new()
        }
    }

    /// Enter a new phase with `total` queued entities.
    pub fn start_phase(&self, kind: EntityKind, total: u64) {
        *self.kind.lock() = Some(kind);
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.notify(None, None);
    }

    /// Record one finished entity.
    pub fn entity_done(&self, item: &str, status: MigrationStatus) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.notify(Some(item.to_string()), Some(status));
    }

    pub fn percentage(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        let completed = self.completed.load(Ordering::SeqCst);
        (completed as f64 / total as f64) * 100.0
    }

    fn notify(&self, item: Option<String>, status: Option<MigrationStatus>) {
        if let Some(callback) = &self.callback {
            callback(ProgressUpdate {
                kind: *self.kind.lock(),
                completed: self.completed.load(Ordering::SeqCst),
                total: self.total.load(Ordering::SeqCst),
                item,
                status,
            });
        }
    }
}

impl Default for MigrationProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_tracks_phase() {
        let progress = MigrationProgress::new();
        progress.start_phase(EntityKind::User, 4);
        assert_eq!(progress.percentage(), 0.0);

        progress.entity_done("alice", MigrationStatus::Succeeded);
        assert!((progress.percentage() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn callback_receives_updates() {
        use std::sync::atomic::AtomicUsize;

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_callback = Arc::clone(&seen);
        let progress = MigrationProgress::with_callback(Box::new(move |update| {
            if update.item.is_some() {
                seen_in_callback.fetch_add(1, Ordering::SeqCst);
            }
        }));

        progress.start_phase(EntityKind::Group, 2);
        progress.entity_done("devs", MigrationStatus::Succeeded);
        progress.entity_done("ops", MigrationStatus::Failed);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
