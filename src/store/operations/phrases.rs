use serde::{Deserialize, Serialize};

use crate::constants::STUDY_INTERVALS;
use crate::store::keys;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    pub sequence: u64,
    pub text: String,
    pub explanation: String,
    pub score: i64,
}

/// A phrase that has not been stored yet (import candidates, API input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseDraft {
    pub text: String,
    pub explanation: String,
}

impl PhraseDraft {
    pub fn new(text: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            explanation: explanation.into(),
        }
    }
}

/// Export row: the phrase plus its add time and schedule. `next_study` is
/// `None` while the phrase waits in the new-phrase queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseEntry {
    #[serde(flatten)]
    pub phrase: Phrase,
    pub added_at: i64,
    pub next_study: Option<i64>,
}

impl Tx<'_> {
    pub(crate) fn load_phrase(
        &self,
        learner: LearnerId,
        sequence: u64,
    ) -> Result<Option<Phrase>, StoreError> {
        self.get_json(Bucket::Phrases, &keys::item_key(learner, sequence))
    }

    pub(crate) fn save_phrase(
        &mut self,
        learner: LearnerId,
        phrase: &Phrase,
    ) -> Result<(), StoreError> {
        self.put_json(
            Bucket::Phrases,
            &keys::item_key(learner, phrase.sequence),
            phrase,
        )
    }

    pub(crate) fn learner_phrases(&self, learner: LearnerId) -> Result<Vec<Phrase>, StoreError> {
        self.scan_prefix(Bucket::Phrases, &keys::learner_key(learner))?
            .into_iter()
            .map(|(_, raw)| Store::deserialize(&raw))
            .collect()
    }

    /// The add pipeline: store with score 0, queue, record the add time and
    /// admit from the queue front with `study_at` as the first review.
    pub(crate) fn append_phrase(
        &mut self,
        learner: LearnerId,
        draft: PhraseDraft,
        added_at: i64,
        study_at: i64,
    ) -> Result<Phrase, StoreError> {
        let sequence = self.store().next_sequence()?;
        let phrase = Phrase {
            sequence,
            text: draft.text,
            explanation: draft.explanation,
            score: 0,
        };
        let key = keys::item_key(learner, sequence);

        self.save_phrase(learner, &phrase)?;
        self.put_timestamp(Bucket::AddTimes, &key, added_at);
        self.enqueue_new_phrase(learner, sequence)?;
        let admitted = self.admit_new_phrases(learner, study_at)?;

        tracing::debug!(learner, sequence, admitted, "Phrase added");
        Ok(phrase)
    }
}

impl Store {
    pub fn add_phrase(
        &self,
        learner: LearnerId,
        text: &str,
        explanation: &str,
        created_at: i64,
    ) -> Result<Phrase, StoreError> {
        let draft = PhraseDraft::new(text, explanation);
        self.write(|tx| {
            tx.append_phrase(learner, draft, created_at, created_at + STUDY_INTERVALS[0])
        })
    }

    pub fn get_phrase(
        &self,
        learner: LearnerId,
        sequence: u64,
    ) -> Result<Option<Phrase>, StoreError> {
        self.read(|tx| tx.load_phrase(learner, sequence))
    }

    /// Case-insensitive lookup by phrase text, used to warn about re-adding.
    pub fn find_phrase(&self, learner: LearnerId, text: &str) -> Result<Option<Phrase>, StoreError> {
        let needle = text.trim().to_lowercase();
        self.read(|tx| {
            Ok(tx
                .learner_phrases(learner)?
                .into_iter()
                .find(|p| p.text.trim().to_lowercase() == needle))
        })
    }

    /// Replaces text and explanation; score and schedule are untouched.
    pub fn update_phrase(
        &self,
        learner: LearnerId,
        sequence: u64,
        text: &str,
        explanation: &str,
    ) -> Result<Phrase, StoreError> {
        self.write(|tx| {
            let mut phrase = tx
                .load_phrase(learner, sequence)?
                .ok_or_else(|| StoreError::not_found("phrase", sequence))?;
            phrase.text = text.to_string();
            phrase.explanation = explanation.to_string();
            tx.save_phrase(learner, &phrase)?;
            Ok(phrase)
        })
    }

    /// Removes the phrase from every index in one transaction and returns it.
    pub fn delete_phrase(&self, learner: LearnerId, sequence: u64) -> Result<Phrase, StoreError> {
        self.write(|tx| {
            let key = keys::item_key(learner, sequence);
            let phrase = tx
                .load_phrase(learner, sequence)?
                .ok_or_else(|| StoreError::not_found("phrase", sequence))?;

            if tx.contains(Bucket::StudyTimes, &key)? {
                tx.remove(Bucket::StudyTimes, &key);
                if phrase.score == 0 {
                    tx.bump_counter(Bucket::ZeroScores, &keys::learner_key(learner), -1)?;
                }
            } else {
                tx.dequeue_new_phrase(learner, sequence)?;
            }
            if phrase.score != 0 {
                tx.add_score_total(learner, -phrase.score)?;
            }
            tx.remove(Bucket::AddTimes, &key);
            tx.remove(Bucket::Phrases, &key);

            tracing::debug!(learner, sequence, score = phrase.score, "Phrase deleted");
            Ok(phrase)
        })
    }

    /// All phrases of a learner ordered by add time, oldest first.
    pub fn list_phrases(&self, learner: LearnerId) -> Result<Vec<PhraseEntry>, StoreError> {
        self.read(|tx| {
            let mut entries = Vec::new();
            for phrase in tx.learner_phrases(learner)? {
                let key = keys::item_key(learner, phrase.sequence);
                let added_at = tx.get_timestamp(Bucket::AddTimes, &key)?.unwrap_or(0);
                let next_study = tx.get_timestamp(Bucket::StudyTimes, &key)?;
                entries.push(PhraseEntry {
                    phrase,
                    added_at,
                    next_study,
                });
            }
            entries.sort_by_key(|e| (e.added_at, e.phrase.sequence));
            Ok(entries)
        })
    }

    pub fn phrase_count(&self, learner: LearnerId) -> Result<u64, StoreError> {
        self.read(|tx| {
            Ok(tx
                .scan_prefix(Bucket::Phrases, &keys::learner_key(learner))?
                .len() as u64)
        })
    }
}
