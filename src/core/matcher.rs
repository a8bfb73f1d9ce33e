use crate::domain::model::{DestinationRecord, MatchKey, MatchedPair, SourceRecord};
use std::collections::{HashMap, HashSet};

/// Result of matching source records against the destination vault. Every
/// list keeps the order of the source records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub pairs: Vec<MatchedPair>,
    pub orphans: Vec<SourceRecord>,
    pub ambiguous: Vec<MatchKey>,
}

/// Pairs each source record holding a secret with the single destination item
/// sharing its `(title, username)` key. Keys shared by several destination
/// items are reported as ambiguous and never paired.
pub fn match_records(sources: &[SourceRecord], destinations: &[DestinationRecord]) -> MatchOutcome {
    let mut index: HashMap<MatchKey, Vec<&DestinationRecord>> = HashMap::new();
    for destination in destinations {
        index.entry(destination.key()).or_default().push(destination);
    }

    let mut outcome = MatchOutcome::default();
    let mut seen_ambiguous = HashSet::new();

    for source in sources.iter().filter(|s| s.secret.is_some()) {
        let key = source.key();
        match index.get(&key).map(Vec::as_slice) {
            Some([destination]) => outcome.pairs.push(MatchedPair {
                source: source.clone(),
                destination: (*destination).clone(),
            }),
            None | Some([]) => outcome.orphans.push(source.clone()),
            Some(_) => {
                if seen_ambiguous.insert(key.clone()) {
                    outcome.ambiguous.push(key);
                }
            }
        }
    }

    outcome
}
