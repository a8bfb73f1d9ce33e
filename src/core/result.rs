use crate::core::matcher::MatchOutcome;
use crate::domain::model::{ItemId, MatchKey, Mode, PlannedOperation};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_OPERATIONS_FAILED: u8 = 1;
pub const EXIT_FATAL_SETUP: u8 = 3;

/// Process exit status for a finished (or aborted) run. Errors returned by
/// the engine are setup failures: nothing was planned or written.
pub fn exit_code(outcome: &Result<RunResult>) -> u8 {
    match outcome {
        Ok(result) => result.exit_code(),
        Err(_) => EXIT_FATAL_SETUP,
    }
}

/// What happened to one planned operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Applied,
    Simulated,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub title: String,
    pub username: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub title: String,
    pub username: String,
    pub target: ItemId,
    pub error: String,
}

/// Final, read-only tally of a run. The user-facing summary and the JSON
/// report are both rendered from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub mode: Mode,
    pub simulated_run: bool,
    pub source_records: usize,
    pub matched: usize,
    pub applied: usize,
    pub simulated: usize,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<FailedEntry>,
    pub orphaned: Vec<MatchKey>,
    pub ambiguous: Vec<MatchKey>,
}

impl RunResult {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn exit_code(&self) -> u8 {
        if self.has_failures() {
            EXIT_OPERATIONS_FAILED
        } else {
            EXIT_SUCCESS
        }
    }

    pub fn render_summary(&self) -> String {
        let rule = "=".repeat(40);
        let thin = "-".repeat(40);
        let mut out = String::new();

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "SUMMARY ({})", self.mode.action_label());
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Source items w/ TOTP:       {}", self.source_records);
        let _ = writeln!(out, "Items Matched (Title+User): {}", self.matched);
        if self.simulated_run {
            let _ = writeln!(out, "Operations simulated:       {}", self.simulated);
            let _ = writeln!(out, "Mode: DRY RUN (No changes made)");
        } else {
            let _ = writeln!(out, "Successful Actions:         {}", self.applied);
            let _ = writeln!(out, "Failed Actions:             {}", self.failed.len());
        }
        let _ = writeln!(out, "Skipped:                    {}", self.skipped.len());

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "{}", thin);
            let _ = writeln!(out, "SKIPPED ITEMS:");
            for entry in &self.skipped {
                let _ = writeln!(
                    out,
                    " - {} (User: {}): {}",
                    entry.title, entry.username, entry.reason
                );
            }
        }

        if !self.failed.is_empty() {
            let _ = writeln!(out, "{}", thin);
            let _ = writeln!(out, "FAILED ITEMS:");
            for entry in &self.failed {
                let _ = writeln!(
                    out,
                    " - {} (User: {}): {}",
                    entry.title, entry.username, entry.error
                );
            }
        }

        if !self.orphaned.is_empty() {
            let _ = writeln!(out, "{}", thin);
            let _ = writeln!(out, "MISSING / UNMATCHED ITEMS:");
            for key in &self.orphaned {
                let _ = writeln!(out, " - {}", key);
            }
        }

        if !self.ambiguous.is_empty() {
            let _ = writeln!(out, "{}", thin);
            let _ = writeln!(out, "AMBIGUOUS MATCHES (several destination items, resolve manually):");
            for key in &self.ambiguous {
                let _ = writeln!(out, " - {}", key);
            }
        }

        let _ = writeln!(out, "{}", rule);
        out
    }

    pub fn to_report(&self) -> RunReport<'_> {
        RunReport {
            generated_at: Utc::now(),
            result: self,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: &'a RunResult,
}

/// Collects per-record and per-operation outcomes while a run progresses.
#[derive(Debug)]
pub struct RunRecorder {
    result: RunResult,
}

impl RunRecorder {
    pub fn new(mode: Mode, simulated_run: bool) -> Self {
        Self {
            result: RunResult {
                mode,
                simulated_run,
                source_records: 0,
                matched: 0,
                applied: 0,
                simulated: 0,
                skipped: Vec::new(),
                failed: Vec::new(),
                orphaned: Vec::new(),
                ambiguous: Vec::new(),
            },
        }
    }

    pub fn record_sources(&mut self, count: usize) {
        self.result.source_records = count;
    }

    pub fn record_matching(&mut self, outcome: &MatchOutcome) {
        self.result.matched = outcome.pairs.len();
        self.result.orphaned = outcome.orphans.iter().map(|s| s.key()).collect();
        self.result.ambiguous = outcome.ambiguous.clone();
    }

    pub fn record(&mut self, planned: &PlannedOperation, outcome: OperationOutcome) {
        match outcome {
            OperationOutcome::Applied => self.result.applied += 1,
            OperationOutcome::Simulated => self.result.simulated += 1,
            OperationOutcome::Skipped { reason } => self.result.skipped.push(SkippedEntry {
                title: planned.key.title.clone(),
                username: planned.key.username.clone(),
                reason,
            }),
            OperationOutcome::Failed { error } => {
                self.record_failure(&planned.key, planned.target(), error)
            }
        }
    }

    /// A failure that happened before an operation could be planned.
    pub fn record_failure(&mut self, key: &MatchKey, target: &ItemId, error: String) {
        self.result.failed.push(FailedEntry {
            title: key.title.clone(),
            username: key.username.clone(),
            target: target.clone(),
            error,
        });
    }

    pub fn finish(self) -> RunResult {
        self.result
    }
}
