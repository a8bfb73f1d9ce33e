use crate::core::result::{OperationOutcome, RunRecorder};
use crate::domain::model::{ItemId, Operation, PlannedOperation};
use crate::domain::ports::Destination;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub concurrency: usize,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry_attempts: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Applies a plan to a destination. Operations on the same item run one after
/// another in plan order; distinct items run in parallel up to `concurrency`.
/// Outcomes are recorded in plan order.
pub struct Executor<D: Destination + 'static> {
    destination: Arc<D>,
    options: ExecutorOptions,
}

impl<D: Destination + 'static> Executor<D> {
    pub fn new(destination: Arc<D>, options: ExecutorOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    pub async fn execute(&self, plan: Vec<PlannedOperation>, recorder: &mut RunRecorder) {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut outcomes: Vec<Option<OperationOutcome>> = vec![None; plan.len()];

        // Pending writes grouped per target, in order of first appearance
        let mut group_of: HashMap<&ItemId, usize> = HashMap::new();
        let mut groups: Vec<Vec<(usize, PlannedOperation)>> = Vec::new();

        for (index, planned) in plan.iter().enumerate() {
            if let Operation::Skip { reason, .. } = &planned.operation {
                tracing::info!("    [SKIP] {}: {}", planned.key, reason);
                outcomes[index] = Some(OperationOutcome::Skipped {
                    reason: reason.clone(),
                });
                continue;
            }
            if planned.simulated {
                announce_simulated(planned);
                outcomes[index] = Some(OperationOutcome::Simulated);
                continue;
            }

            let slot = *group_of.entry(planned.target()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push((index, planned.clone()));
        }

        for group in groups {
            if group.len() > 1 {
                tracing::debug!(
                    "{} operations target {}; applying them in order",
                    group.len(),
                    group[0].1.target()
                );
            }
            let destination = Arc::clone(&self.destination);
            let semaphore = Arc::clone(&semaphore);
            let options = self.options.clone();
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let mut done = Vec::with_capacity(group.len());
                for (index, planned) in group {
                    let outcome = apply_with_retry(destination.as_ref(), &planned, &options).await;
                    done.push((index, outcome));
                }
                done
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => {
                    for (index, outcome) in done {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(e) => tracing::error!("Operation task aborted: {}", e),
            }
        }

        for (planned, outcome) in plan.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| OperationOutcome::Failed {
                error: "operation task aborted".to_string(),
            });
            recorder.record(planned, outcome);
        }
    }
}

fn announce_simulated(planned: &PlannedOperation) {
    match &planned.operation {
        Operation::Patch { uri, .. } => {
            tracing::info!("    [DRY RUN] Would update: {}", planned.key);
            tracing::debug!("    [DRY RUN] URI: {}", uri.redacted());
        }
        Operation::Delete { .. } => {
            tracing::info!("    [DRY RUN] Would DELETE TOTP for: {}", planned.key)
        }
        Operation::Skip { .. } => {}
    }
}

async fn apply_once<D: Destination + ?Sized>(destination: &D, planned: &PlannedOperation) -> Result<()> {
    match &planned.operation {
        Operation::Patch { target, uri } => {
            tracing::info!("    [LIVE] Updating: {}", planned.key);
            tracing::debug!("    [LIVE] {} <- {}", target, uri.redacted());
            destination.set_otp_field(target, uri).await
        }
        Operation::Delete { target } => {
            tracing::info!("    [LIVE] Deleting TOTP for: {}", planned.key);
            destination.clear_otp_field(target).await
        }
        Operation::Skip { .. } => Ok(()),
    }
}

async fn apply_with_retry<D: Destination + ?Sized>(
    destination: &D,
    planned: &PlannedOperation,
    options: &ExecutorOptions,
) -> OperationOutcome {
    let mut attempt = 0;
    loop {
        match apply_once(destination, planned).await {
            Ok(()) => return OperationOutcome::Applied,
            Err(e) if attempt < options.retry_attempts => {
                attempt += 1;
                tracing::warn!(
                    "    [RETRY {}/{}] {}: {}",
                    attempt,
                    options.retry_attempts,
                    planned.key,
                    e
                );
                tokio::time::sleep(options.retry_delay).await;
            }
            Err(e) => {
                tracing::error!("    [FAIL] {}: {}", planned.key, e);
                return OperationOutcome::Failed {
                    error: e.to_string(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        DestinationRecord, ItemId, MatchKey, Mode, OtpFieldState, TotpUri,
    };
    use crate::utils::error::MigrationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FlakyDestination {
        writes: Mutex<Vec<String>>,
        failures_left: AtomicUsize,
        always_fail: Option<String>,
        slow_secret: Option<String>,
    }

    #[async_trait]
    impl Destination for FlakyDestination {
        async fn list_items(&self) -> Result<Vec<DestinationRecord>> {
            Ok(Vec::new())
        }

        async fn inspect_otp_field(&self, _target: &ItemId) -> Result<OtpFieldState> {
            Ok(OtpFieldState::absent())
        }

        async fn set_otp_field(&self, target: &ItemId, uri: &TotpUri) -> Result<()> {
            if self.always_fail.as_deref() == Some(target.as_str()) {
                return Err(MigrationError::adapter("update", target, "permission denied"));
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(MigrationError::adapter("update", target, "timed out"));
            }
            if let Some(secret) = &self.slow_secret {
                if uri.as_str().contains(secret.as_str()) {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
            self.writes
                .lock()
                .unwrap()
                .push(format!("set {} {}", target, uri));
            Ok(())
        }

        async fn clear_otp_field(&self, target: &ItemId) -> Result<()> {
            self.writes.lock().unwrap().push(format!("clear {}", target));
            Ok(())
        }
    }

    fn patch(id: &str, simulated: bool) -> PlannedOperation {
        PlannedOperation {
            operation: Operation::Patch {
                target: ItemId::new(id),
                uri: TotpUri::new(format!("otpauth://totp/{}?secret=ABC", id)),
            },
            simulated,
            key: MatchKey::new(id, "alice"),
        }
    }

    #[tokio::test]
    async fn test_simulated_operations_never_write() {
        let destination = Arc::new(FlakyDestination::default());
        let executor = Executor::new(Arc::clone(&destination), ExecutorOptions::default());
        let mut recorder = RunRecorder::new(Mode::DryRun, true);

        executor
            .execute(vec![patch("a", true), patch("b", true)], &mut recorder)
            .await;

        assert!(destination.writes.lock().unwrap().is_empty());
        let result = recorder.finish();
        assert_eq!(result.simulated, 2);
        assert_eq!(result.applied, 0);
    }

    #[tokio::test]
    async fn test_partial_failure_is_recorded_not_aborted() {
        let destination = Arc::new(FlakyDestination {
            always_fail: Some("b".to_string()),
            ..Default::default()
        });
        let executor = Executor::new(Arc::clone(&destination), ExecutorOptions::default());
        let mut recorder = RunRecorder::new(Mode::Live, false);

        executor
            .execute(vec![patch("a", false), patch("b", false), patch("c", false)], &mut recorder)
            .await;

        let result = recorder.finish();
        assert_eq!(result.applied, 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].target.as_str(), "b");
        assert_eq!(destination.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let destination = Arc::new(FlakyDestination {
            failures_left: AtomicUsize::new(1),
            ..Default::default()
        });
        let options = ExecutorOptions {
            concurrency: 1,
            retry_attempts: 2,
            retry_delay: Duration::from_millis(1),
        };
        let executor = Executor::new(Arc::clone(&destination), options);
        let mut recorder = RunRecorder::new(Mode::Live, false);

        executor.execute(vec![patch("a", false)], &mut recorder).await;

        let result = recorder.finish();
        assert_eq!(result.applied, 1);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn test_skip_is_recorded_without_destination_call() {
        let destination = Arc::new(FlakyDestination::default());
        let executor = Executor::new(Arc::clone(&destination), ExecutorOptions::default());
        let mut recorder = RunRecorder::new(Mode::Cleanup, false);
        let skip = PlannedOperation {
            operation: Operation::Skip {
                target: ItemId::new("a"),
                reason: "no field to clean".to_string(),
            },
            simulated: false,
            key: MatchKey::new("A", "alice"),
        };

        executor.execute(vec![skip], &mut recorder).await;

        assert!(destination.writes.lock().unwrap().is_empty());
        assert_eq!(recorder.finish().skipped[0].reason, "no field to clean");
    }

    #[tokio::test]
    async fn test_writes_to_one_item_follow_plan_order() {
        let destination = Arc::new(FlakyDestination {
            slow_secret: Some("AAAABBBB".to_string()),
            ..Default::default()
        });
        let executor = Executor::new(Arc::clone(&destination), ExecutorOptions::default());
        let mut recorder = RunRecorder::new(Mode::Live, false);
        let write = |secret: &str, title: &str| PlannedOperation {
            operation: Operation::Patch {
                target: ItemId::new("gh1"),
                uri: TotpUri::new(format!("otpauth://totp/GitHub?secret={}", secret)),
            },
            simulated: false,
            key: MatchKey::new(title, "alice"),
        };

        executor
            .execute(
                vec![
                    write("AAAABBBB", "GitHub"),
                    patch("other", false),
                    write("CCCCDDDD", " GitHub"),
                ],
                &mut recorder,
            )
            .await;

        let writes = destination.writes.lock().unwrap().clone();
        let to_gh1: Vec<&String> = writes.iter().filter(|w| w.starts_with("set gh1 ")).collect();
        assert_eq!(to_gh1.len(), 2);
        assert!(to_gh1[0].contains("AAAABBBB"));
        assert!(to_gh1[1].contains("CCCCDDDD"));
        assert_eq!(recorder.finish().applied, 3);
    }
}
