// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Round-trip test drivers.

Three drivers exercise a [`DeviceContext`]:

* [`write_test`]: a kernel writes a known pattern into each format; the host reads it
  back and checks it.
* [`read_test`]: the host uploads a known pattern in each format; a kernel samples it at
  permuted coordinates and writes sums into an R32 buffer that the host checks.
* [`compile_test`]: compiles a kernel from disk with defines.

Each outcome prints one `Test <NAME> ...` line and lands in a [`Report`].  A failing
test never aborts the run.
*/

pub mod compile_test;
pub mod fixtures;

use crate::device::DeviceContext;
use crate::error::Result;
use std::fmt::Display;
use std::path::Path;

/// How one test ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed,
    /// The error or the measured deviation.
    Failed(String),
    /// The device cannot run this test.
    Skipped(String),
}

impl Outcome {
    /// Passes when `error` is below `tolerance`, otherwise fails reporting it.
    pub fn within(error: f32, tolerance: f32) -> Self {
        if error < tolerance {
            Outcome::Passed
        } else {
            Outcome::Failed(error.to_string())
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed!"),
            Outcome::Failed(e) => write!(f, "failed! Error: {e}"),
            Outcome::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

/// Outcomes in the order the tests ran.
#[derive(Debug, Default)]
pub struct Report {
    entries: Vec<(String, Outcome)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `result` under `name` and prints its line.  An error counts as a
    /// failure.
    pub fn record(&mut self, name: impl Into<String>, result: Result<Outcome>) -> &Outcome {
        let name = name.into();
        let outcome = result.unwrap_or_else(|e| Outcome::Failed(e.to_string()));
        println!("Test {name} {outcome}");
        if let Outcome::Failed(reason) = &outcome {
            logwise::warn_sync!(
                "Report::record {name} failed: {reason}",
                name = logwise::privacy::LogIt(&name),
                reason = logwise::privacy::LogIt(reason)
            );
        }
        self.entries.push((name, outcome));
        &self.entries[self.entries.len() - 1].1
    }

    pub fn entries(&self) -> &[(String, Outcome)] {
        &self.entries
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, f: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| f(o)).count()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Runs the write, read and compile drivers in that order.
pub fn run_all(context: &DeviceContext, array_sum_path: &Path) -> Report {
    let mut report = Report::new();
    write_test::run(context, &mut report);
    read_test::run(context, &mut report);
    compile_test::run(context, array_sum_path, &mut report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn outcome_lines() {
        assert_eq!(Outcome::Passed.to_string(), "passed!");
        assert_eq!(
            Outcome::Failed("0.25".to_string()).to_string(),
            "failed! Error: 0.25"
        );
        assert_eq!(
            Outcome::Skipped("no storage".to_string()).to_string(),
            "skipped (no storage)"
        );
    }

    #[test]
    fn errors_are_recorded_as_failures() {
        let mut report = Report::new();
        report.record("R8_UNORM", Ok(Outcome::Passed));
        report.record("R32_FLOAT", Err(Error::NotInitialized("staging")));
        report.record("R16_FLOAT", Ok(Outcome::Skipped("no storage".to_string())));
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(
            report.outcome("R32_FLOAT"),
            Some(&Outcome::Failed("staging is not initialized".to_string()))
        );
        assert_eq!(report.to_string(), "1 passed, 1 failed, 1 skipped");
    }

    #[test]
    fn within_tolerance() {
        assert_eq!(Outcome::within(0.0, 1e-5), Outcome::Passed);
        assert_eq!(Outcome::within(0.5, 1e-5), Outcome::Failed("0.5".to_string()));
    }
}
