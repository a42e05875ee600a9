//! Partitions result directories into lifecycle classes by combining marker
//! files written by the capture tool with live scheduler queries.

use std::fmt::{Display, Formatter};
use std::path::Path;

use crate::Map;
use crate::common::fsutils::subdirs;
use crate::common::settings::Settings;
use crate::report::ReportStore;
use crate::scheduler::StatusSource;

/// Zero-byte sentinel recording that capture of this result failed.
pub const CAPTURE_FAILED_MARKER: &str = ".capture-failed";
/// Zero-byte sentinel recording that this result was captured downstream.
pub const CAPTURE_COMPLETE_MARKER: &str = ".capture-complete";

/// Lifecycle class of one result directory. Recomputed on every scan, never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    /// Terminal: capture failed, recorded by marker file.
    Failed,
    /// Terminal: result captured, recorded by marker file.
    Captured,
    /// Job finished, result is ready for downstream capture.
    PendingCapture,
    /// Job is still active in the scheduler.
    Running,
}

impl Display for ResultState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResultState::Failed => "FAILED",
            ResultState::Captured => "CAPTURED",
            ResultState::PendingCapture => "PENDING_CAPTURE",
            ResultState::Running => "RUNNING",
        };
        f.write_str(name)
    }
}

/// Partition of the scanned result set. Every classified directory is in
/// exactly one class.
#[derive(Debug, Default)]
pub struct Classification {
    states: Map<String, ResultState>,
    /// Directories without a readable job record: not yet submitted, skipped.
    skipped: Vec<String>,
}

impl Classification {
    pub fn state_of(&self, result: &str) -> Option<ResultState> {
        self.states.get(result).copied()
    }

    pub fn states(&self) -> impl Iterator<Item = (&str, ResultState)> {
        self.states.iter().map(|(name, state)| (name.as_str(), *state))
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    fn in_state(&self, state: ResultState) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.in_state(ResultState::Failed)
    }

    pub fn captured(&self) -> Vec<&str> {
        self.in_state(ResultState::Captured)
    }

    pub fn pending(&self) -> Vec<&str> {
        self.in_state(ResultState::PendingCapture)
    }

    pub fn running(&self) -> Vec<&str> {
        self.in_state(ResultState::Running)
    }
}

pub struct ResultClassifier<'a, S: StatusSource> {
    settings: &'a Settings,
    scheduler: &'a S,
}

impl<'a, S: StatusSource> ResultClassifier<'a, S> {
    pub fn new(settings: &'a Settings, scheduler: &'a S) -> Self {
        ResultClassifier {
            settings,
            scheduler,
        }
    }

    /// Result directory names under the bench path, sorted.
    pub fn all_results(&self) -> crate::Result<Vec<String>> {
        Ok(subdirs(&self.settings.bench_path)?)
    }

    /// Classifies one result directory. Marker files always win over the
    /// live scheduler state; a directory whose job record cannot be read is
    /// treated as not yet submitted and yields `None`.
    pub fn classify(&self, dir: &Path) -> crate::Result<Option<ResultState>> {
        if dir.join(CAPTURE_FAILED_MARKER).is_file() {
            return Ok(Some(ResultState::Failed));
        }
        if dir.join(CAPTURE_COMPLETE_MARKER).is_file() {
            return Ok(Some(ResultState::Captured));
        }

        let store = ReportStore::new(self.settings);
        let job_id = match store.read(dir)?.and_then(|report| report.job_id()) {
            Some(id) => id,
            None => return Ok(None),
        };

        if self.scheduler.status_of(job_id).is_terminal() {
            Ok(Some(ResultState::PendingCapture))
        } else {
            Ok(Some(ResultState::Running))
        }
    }

    /// Scans every result directory and partitions the set into the four
    /// lifecycle classes.
    pub fn classify_all(&self) -> crate::Result<Classification> {
        let mut classification = Classification::default();
        for result in self.all_results()? {
            let dir = self.settings.bench_path.join(&result);
            match self.classify(&dir)? {
                Some(state) => {
                    classification.states.insert(result, state);
                }
                None => classification.skipped.push(result),
            }
        }
        Ok(classification)
    }

    /// Logs a note about results that finished but were not captured yet.
    pub fn report_pending(&self) -> crate::Result<()> {
        let pending = self.classify_all()?.pending().len();
        if pending > 0 {
            log::info!(
                "There are {pending} uncaptured results in {}",
                self.settings.rel_path(&self.settings.bench_path)
            );
        } else {
            log::info!("No new results found.");
        }
        Ok(())
    }
}
