//! Failure reporting.
//!
//! Assertion failures are reported through a [Report](trait.Report.html)
//! sink injected at server construction, keeping the crate decoupled from
//! any particular test harness. Reporting never interrupts request
//! processing; a request completes with its configured response whether or
//! not its assertions held.

use std::sync::{Arc, Mutex, MutexGuard};

/// A sink for failed request checks.
pub trait Report: Send + Sync {
    /// Record a failed check along with its diagnostic. Must not panic.
    fn fail(&self, diagnostic: String);
}

/// Default [Report](trait.Report.html) implementation that records every
/// diagnostic and logs it.
///
/// `FailureLog` is cheap to clone; clones share the same underlying record,
/// so a test can keep a handle while the server owns another.
#[derive(Debug, Clone, Default)]
pub struct FailureLog(Arc<Mutex<Vec<String>>>);

impl FailureLog {
    /// Create an empty failure log.
    pub fn new() -> Self {
        FailureLog::default()
    }

    /// true if any failure has been recorded.
    pub fn is_failed(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Snapshot of the recorded diagnostics.
    pub fn failures(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Drain the recorded diagnostics, leaving the log clean.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock().expect("poisoned failure log")
    }
}

impl Report for FailureLog {
    fn fail(&self, diagnostic: String) {
        log::error!("request failed assertion: {}", diagnostic);
        self.lock().push(diagnostic);
    }
}
