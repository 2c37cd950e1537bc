//! Best-effort step runner for teardown and bulk operations

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// Outcome of a best-effort run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// First failure, in step order
    pub first_failure: Option<StepFailure>,
    pub failures: Vec<StepFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs independent steps, recording failures without stopping at them
#[derive(Debug, Default)]
pub struct BestEffort {
    report: CleanupReport,
}

impl BestEffort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one step. Returns the value on success.
    pub fn step<T, E: Display>(&mut self, name: &str, result: Result<T, E>) -> Option<T> {
        self.report.attempted += 1;
        match result {
            Ok(value) => {
                self.report.succeeded += 1;
                Some(value)
            }
            Err(e) => {
                tracing::warn!(step = name, error = %e, "Best-effort step failed");
                let failure = StepFailure {
                    step: name.to_string(),
                    error: e.to_string(),
                };
                if self.report.first_failure.is_none() {
                    self.report.first_failure = Some(failure.clone());
                }
                self.report.failures.push(failure);
                None
            }
        }
    }

    pub async fn step_async<T, E, F>(&mut self, name: &str, fut: F) -> Option<T>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let result = fut.await;
        self.step(name, result)
    }

    pub fn finish(self) -> CleanupReport {
        self.report
    }
}
