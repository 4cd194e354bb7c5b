use phrasebot::store::operations::phrases::Phrase;
use phrasebot::store::{LearnerId, Store};

pub const T0: i64 = 1_700_000_000;

pub fn seed_phrases(store: &Store, learner: LearnerId, count: usize, created_at: i64) -> Vec<Phrase> {
    (0..count)
        .map(|i| {
            store
                .add_phrase(learner, &format!("phrase {i}"), &format!("meaning {i}"), created_at)
                .expect("add phrase")
        })
        .collect()
}

/// Asserts both per-learner counters match a full recount of the indexes.
pub fn assert_counters_consistent(store: &Store, learner: LearnerId) {
    let entries = store.list_phrases(learner).expect("list phrases");
    let zero_in_rotation = entries
        .iter()
        .filter(|e| e.next_study.is_some() && e.phrase.score == 0)
        .count() as u64;
    let total: i64 = entries.iter().map(|e| e.phrase.score).sum();

    assert_eq!(store.zero_score_count(learner).unwrap(), zero_in_rotation);
    assert_eq!(store.score_total(learner).unwrap(), total);
}
