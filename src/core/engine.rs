use crate::core::executor::{Executor, ExecutorOptions};
use crate::core::matcher::{match_records, MatchOutcome};
use crate::core::normalizer::check_well_formed;
use crate::core::planner::PlanBuilder;
use crate::core::result::{RunRecorder, RunResult};
use crate::domain::model::{MatchedPair, Mode, Operation, PlannedOperation, SourceRecord};
use crate::domain::ports::{ConfigProvider, Destination};
use crate::utils::error::{MigrationError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Mode,
    /// Forces every operation to be simulated (`--dry-run` with `--clear`).
    pub simulate: bool,
    pub issuer: Option<String>,
    pub executor: ExecutorOptions,
}

impl RunOptions {
    pub fn new(mode: Mode, simulate: bool) -> Self {
        Self {
            mode,
            simulate,
            ..Self::default()
        }
    }

    pub fn with_config<C: ConfigProvider>(mut self, config: &C) -> Self {
        self.issuer = config.issuer().map(str::to_string);
        self.executor = ExecutorOptions {
            concurrency: config.concurrent_requests(),
            retry_attempts: config.retry_attempts(),
            retry_delay: config.retry_delay(),
        };
        self
    }

    pub fn is_simulated(&self) -> bool {
        self.simulate || self.mode == Mode::DryRun
    }
}

pub struct MigrationEngine<D: Destination + 'static> {
    destination: Arc<D>,
    options: RunOptions,
}

impl<D: Destination + 'static> MigrationEngine<D> {
    pub fn new(destination: D, options: RunOptions) -> Self {
        Self::from_shared(Arc::new(destination), options)
    }

    pub fn from_shared(destination: Arc<D>, options: RunOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    /// Runs one migration. Only setup failures are returned as errors; every
    /// per-record or per-operation problem ends up in the [`RunResult`].
    pub async fn run(&self, sources: Vec<SourceRecord>) -> Result<RunResult> {
        let mode = self.options.mode;
        let mut recorder = RunRecorder::new(mode, self.options.is_simulated());
        recorder.record_sources(sources.iter().filter(|s| s.secret.is_some()).count());
        tracing::info!(
            "--> Starting {} ({})...",
            mode.action_label(),
            if self.options.is_simulated() { "DRY RUN" } else { "LIVE" }
        );

        // Extract
        self.destination.check_available().await?;
        let destinations = self.destination.list_items().await.map_err(|e| match e {
            MigrationError::Adapter { message, .. } => MigrationError::fatal(message),
            other => other,
        })?;
        tracing::info!(
            "Loaded {} source records and {} destination items",
            sources.len(),
            destinations.len()
        );

        // Transform
        let outcome = match_records(&sources, &destinations);
        report_matching(&outcome);
        recorder.record_matching(&outcome);

        let pairs = if mode == Mode::Cleanup {
            self.inspect_fields(outcome.pairs, &mut recorder).await
        } else {
            outcome.pairs
        };

        let plan = PlanBuilder::new()
            .issuer(self.options.issuer.clone())
            .simulate(self.options.simulate)
            .build(&pairs, mode);
        warn_malformed_uris(&plan);
        tracing::debug!("Planned {} operations", plan.len());

        // Load
        Executor::new(Arc::clone(&self.destination), self.options.executor.clone())
            .execute(plan, &mut recorder)
            .await;

        Ok(recorder.finish())
    }

    /// Fills in the OTP field state of each matched item. Items that cannot be
    /// inspected are recorded as failed and left out of the plan.
    async fn inspect_fields(
        &self,
        pairs: Vec<MatchedPair>,
        recorder: &mut RunRecorder,
    ) -> Vec<MatchedPair> {
        let mut inspected = Vec::with_capacity(pairs.len());
        for mut pair in pairs {
            let target = pair.destination.item_id.clone();
            match self.destination.inspect_otp_field(&target).await {
                Ok(state) => {
                    pair.destination = pair.destination.with_otp_field(state);
                    inspected.push(pair);
                }
                Err(e) => {
                    tracing::error!("    [FAIL] {}: {}", pair.source.key(), e);
                    recorder.record_failure(&pair.source.key(), &target, e.to_string());
                }
            }
        }
        inspected
    }
}

fn report_matching(outcome: &MatchOutcome) {
    tracing::info!(
        "Matched {} items, {} unmatched, {} ambiguous",
        outcome.pairs.len(),
        outcome.orphans.len(),
        outcome.ambiguous.len()
    );
    for key in &outcome.ambiguous {
        tracing::warn!("{}", MigrationError::AmbiguousMatch { key: key.clone() });
    }
}

fn warn_malformed_uris(plan: &[PlannedOperation]) {
    for planned in plan {
        if let Operation::Patch { uri, .. } = &planned.operation {
            if let Err(reason) = check_well_formed(uri) {
                tracing::warn!(
                    "Existing otpauth URI for {} looks malformed ({}); writing it unchanged",
                    planned.key,
                    reason
                );
            }
        }
    }
}
