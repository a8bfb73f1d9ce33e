use crate::core::normalizer::normalize_with_issuer;
use crate::domain::model::{MatchedPair, Mode, Operation, PlannedOperation};

pub const NO_FIELD_TO_CLEAN: &str = "no field to clean";

/// Builds the operation list for a set of matched pairs. Building a plan has
/// no side effects; the executor decides what actually reaches the vault.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    issuer: Option<String>,
    simulate: bool,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issuer written into synthesized URIs instead of the record title.
    pub fn issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Tags every operation as simulated, whatever the mode.
    pub fn simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn build(&self, pairs: &[MatchedPair], mode: Mode) -> Vec<PlannedOperation> {
        let simulated = self.simulate || mode == Mode::DryRun;

        pairs
            .iter()
            .map(|pair| PlannedOperation {
                operation: self.operation_for(pair, mode),
                simulated,
                key: pair.source.key(),
            })
            .collect()
    }

    fn operation_for(&self, pair: &MatchedPair, mode: Mode) -> Operation {
        let target = pair.destination.item_id.clone();

        match mode {
            Mode::Cleanup if pair.destination.otp_field_present => Operation::Delete { target },
            Mode::Cleanup => Operation::Skip {
                target,
                reason: NO_FIELD_TO_CLEAN.to_string(),
            },
            Mode::Live | Mode::DryRun => {
                let Some(secret) = pair.source.secret.as_deref() else {
                    return Operation::Skip {
                        target,
                        reason: "source record has no secret".to_string(),
                    };
                };
                match normalize_with_issuer(secret, &pair.source.title, self.issuer.as_deref()) {
                    Ok(uri) => Operation::Patch { target, uri },
                    Err(e) => Operation::Skip {
                        target,
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

/// Plan with default settings: title as issuer, simulation only in dry-run.
pub fn build_plan(pairs: &[MatchedPair], mode: Mode) -> Vec<PlannedOperation> {
    PlanBuilder::new().build(pairs, mode)
}
