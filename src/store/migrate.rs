use std::collections::BTreeMap;

use crate::store::keys;
use crate::store::operations::phrases::Phrase;
use crate::store::{Bucket, LearnerId, Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_rebuild_learner_counters", m002_rebuild_learner_counters),
    ]
}

/// Schema version after every migration has run.
pub fn latest_version() -> u32 {
    migrations().len() as u32
}

/// Runs every migration not yet applied.
///
/// - Each migration must be idempotent: the process may crash after the
///   migration but before the version is written.
/// - The version is persisted right after each successful migration.
/// - Forward only: `set_version` refuses to go back.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| {
                StoreError::corrupt(Bucket::Meta, format!("version is {} bytes", raw.len()))
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LearnerCounters {
    zero_scores: u64,
    score_total: i64,
}

/// Recomputes `zero_scores` and `score_totals` from the phrase and study
/// indexes in one write. Returns how many learners had drifted counters.
pub fn rebuild_learner_counters(store: &Store) -> Result<usize, StoreError> {
    store.write(|tx| {
        let mut expected: BTreeMap<LearnerId, LearnerCounters> = BTreeMap::new();
        for (key, raw) in tx.iter(Bucket::Phrases)? {
            let (learner, _) = keys::parse_item_key(&key)
                .ok_or_else(|| StoreError::corrupt(Bucket::Phrases, "bad item key"))?;
            let phrase: Phrase = Store::deserialize(&raw)?;
            let counters = expected.entry(learner).or_default();
            counters.score_total = counters.score_total.saturating_add(phrase.score);
            if phrase.score == 0 && tx.contains(Bucket::StudyTimes, &key)? {
                counters.zero_scores += 1;
            }
        }

        let mut learners: Vec<LearnerId> = expected.keys().copied().collect();
        for bucket in [Bucket::ZeroScores, Bucket::ScoreTotals] {
            learners.extend(tx.iter(bucket)?.iter().filter_map(|(key, _)| keys::btoi(key)));
        }
        learners.sort_unstable();
        learners.dedup();

        let mut drifted = 0;
        for learner in learners {
            let key = keys::learner_key(learner);
            let want = expected.get(&learner).copied().unwrap_or_default();
            let have = LearnerCounters {
                zero_scores: tx.get_u64(Bucket::ZeroScores, &key)?.unwrap_or(0),
                score_total: tx.get_i64(Bucket::ScoreTotals, &key)?.unwrap_or(0),
            };
            if want == have {
                continue;
            }

            drifted += 1;
            tracing::warn!(learner, ?have, ?want, "Repairing learner counters");
            if want.zero_scores == 0 {
                tx.remove(Bucket::ZeroScores, &key);
            } else {
                tx.put_u64(Bucket::ZeroScores, &key, want.zero_scores);
            }
            if want.score_total == 0 {
                tx.remove(Bucket::ScoreTotals, &key);
            } else {
                tx.put_i64(Bucket::ScoreTotals, &key, want.score_total);
            }
        }
        Ok(drifted)
    })
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

fn m002_rebuild_learner_counters(store: &Store) -> Result<(), StoreError> {
    let drifted = rebuild_learner_counters(store)?;
    tracing::info!(drifted, "Learner counters rebuilt");
    Ok(())
}
