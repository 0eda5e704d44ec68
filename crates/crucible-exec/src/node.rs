//! Per-node execution outcomes (spec §3.5, §4.G).

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub name: String,
    pub executable: PathBuf,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Result of a full scheduler run: independent branches continue past a
/// compile/link failure, so every failure a run produced is collected
/// rather than aborting at the first one (spec §4.G "Failure handling").
#[derive(Debug, Default)]
pub struct RunReport {
    pub compiled: usize,
    /// Compile nodes whose inputs/command hash matched the build database
    /// and were not re-invoked (spec §4.G "Incremental rebuild").
    pub skipped: usize,
    pub archived: usize,
    pub linked: usize,
    /// Nodes never run because an ancestor compile/archive/link failed.
    pub blocked: usize,
    pub compile_failures: Vec<crate::error::Error>,
    pub link_failures: Vec<crate::error::Error>,
    pub test_outcomes: Vec<TestOutcome>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn test_failures(&self) -> Vec<TestOutcome> {
        self.test_outcomes
            .iter()
            .filter(|t| !t.passed())
            .cloned()
            .collect()
    }

    /// Rolls the collected per-node failures up into the single error the
    /// driver surfaces, per the precedence in spec §4.G: cancellation,
    /// then non-test failures, then test failures.
    pub fn into_result(mut self) -> crate::error::Result<Self> {
        if self.cancelled {
            return Err(crate::error::Error::UserCancelled);
        }
        if !self.compile_failures.is_empty() {
            return Err(self.compile_failures.remove(0));
        }
        if !self.link_failures.is_empty() {
            return Err(self.link_failures.remove(0));
        }
        let failures = self.test_failures();
        if !failures.is_empty() {
            return Err(crate::error::Error::TestFailure { failures });
        }
        Ok(self)
    }
}
