use rand::Rng;
use serde::Serialize;

use crate::constants::{MAX_NEW_STUDIES, STUDY_INTERVALS, STUDY_TIME_DIFFUSION};
use crate::store::keys;
use crate::store::operations::phrases::Phrase;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    pub phrase: Phrase,
    pub previous_score: i64,
    /// `None` when the phrase went back to the new-phrase queue.
    pub next_study: Option<i64>,
    /// Queued phrases admitted because this one left the zero pool.
    pub admitted: u64,
}

/// A score as it arrives from a chat button or the API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreSubmission<'a> {
    pub delta: i64,
    /// The phrase the client is answering. A mismatch means it was already scored.
    pub sequence: Option<u64>,
    /// Delivery id, recorded only when the score is applied.
    pub message_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Scored(ScoreOutcome),
    DuplicateMessage,
    DuplicatePayload,
    /// The earliest-due phrase is no longer the one the client answered.
    StudyChanged { due: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum Study {
    /// Earliest-due phrase plus how many are due in total.
    #[serde(rename_all = "camelCase")]
    Due { phrase: Phrase, due_count: u64 },
    /// Nothing due. `next_study` is the closest upcoming review, if any.
    #[serde(rename_all = "camelCase")]
    Idle { next_study: Option<i64> },
}

/// Interval ladder rung for a score. Negative scores use the first rung.
pub fn interval_index(score: i64) -> usize {
    score.clamp(0, (STUDY_INTERVALS.len() - 1) as i64) as usize
}

pub fn next_study_time<R: Rng + ?Sized>(score: i64, now: i64, rng: &mut R) -> i64 {
    let interval = STUDY_INTERVALS[interval_index(score)];
    let jitter = rng.gen_range(0.0..=STUDY_TIME_DIFFUSION) * interval as f64;
    now + interval + jitter as i64
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduleScan {
    /// (sequence, timestamp) of the earliest due phrase.
    pub earliest_due: Option<(u64, i64)>,
    pub due_count: u64,
    pub next_future: Option<i64>,
}

impl Tx<'_> {
    pub(crate) fn queued_sequences(&self, learner: LearnerId) -> Result<Vec<u64>, StoreError> {
        Ok(self
            .get(Bucket::NewPhrases, &keys::learner_key(learner))?
            .map(|raw| keys::decode_queue(&raw))
            .unwrap_or_default())
    }

    fn store_queue(&mut self, learner: LearnerId, queue: &[u64]) {
        let key = keys::learner_key(learner);
        if queue.is_empty() {
            self.remove(Bucket::NewPhrases, &key);
        } else {
            self.insert(Bucket::NewPhrases, &key, keys::encode_queue(queue));
        }
    }

    pub(crate) fn enqueue_new_phrase(
        &mut self,
        learner: LearnerId,
        sequence: u64,
    ) -> Result<(), StoreError> {
        let mut queue = self.queued_sequences(learner)?;
        queue.push(sequence);
        self.store_queue(learner, &queue);
        Ok(())
    }

    /// Puts a phrase back at the queue front, ahead of never-seen phrases.
    pub(crate) fn requeue_new_phrase(
        &mut self,
        learner: LearnerId,
        sequence: u64,
    ) -> Result<(), StoreError> {
        let mut queue = self.queued_sequences(learner)?;
        queue.retain(|s| *s != sequence);
        queue.insert(0, sequence);
        self.store_queue(learner, &queue);
        Ok(())
    }

    pub(crate) fn dequeue_new_phrase(
        &mut self,
        learner: LearnerId,
        sequence: u64,
    ) -> Result<bool, StoreError> {
        let mut queue = self.queued_sequences(learner)?;
        let before = queue.len();
        queue.retain(|s| *s != sequence);
        if queue.len() == before {
            return Ok(false);
        }
        self.store_queue(learner, &queue);
        Ok(true)
    }

    /// Moves phrases from the queue front into rotation while the zero pool
    /// has room. Returns how many were admitted.
    pub(crate) fn admit_new_phrases(
        &mut self,
        learner: LearnerId,
        study_at: i64,
    ) -> Result<u64, StoreError> {
        let counter_key = keys::learner_key(learner);
        let zero_scores = self.get_u64(Bucket::ZeroScores, &counter_key)?.unwrap_or(0);
        let slots = MAX_NEW_STUDIES.saturating_sub(zero_scores) as usize;
        if slots == 0 {
            return Ok(0);
        }

        let queue = self.queued_sequences(learner)?;
        let take = slots.min(queue.len());
        if take == 0 {
            return Ok(0);
        }

        for sequence in &queue[..take] {
            self.put_timestamp(
                Bucket::StudyTimes,
                &keys::item_key(learner, *sequence),
                study_at,
            );
        }
        self.store_queue(learner, &queue[take..]);
        self.bump_counter(Bucket::ZeroScores, &counter_key, take as i64)?;

        Ok(take as u64)
    }

    pub(crate) fn add_score_total(&mut self, learner: LearnerId, delta: i64) -> Result<i64, StoreError> {
        let key = keys::learner_key(learner);
        let total = self
            .get_i64(Bucket::ScoreTotals, &key)?
            .unwrap_or(0)
            .saturating_add(delta);
        if total == 0 {
            self.remove(Bucket::ScoreTotals, &key);
        } else {
            self.put_i64(Bucket::ScoreTotals, &key, total);
        }
        Ok(total)
    }

    /// One pass over the learner's schedule. Keys are ordered by sequence, so
    /// a strict `<` keeps the lowest sequence among equal timestamps.
    pub(crate) fn scan_schedule(
        &self,
        learner: LearnerId,
        now: i64,
    ) -> Result<ScheduleScan, StoreError> {
        let mut scan = ScheduleScan::default();
        for (key, value) in self.scan_prefix(Bucket::StudyTimes, &keys::learner_key(learner))? {
            let (_, sequence) = keys::parse_item_key(&key)
                .ok_or_else(|| StoreError::corrupt(Bucket::StudyTimes, "bad item key"))?;
            let ts = keys::bytes_timestamp(&value)
                .ok_or_else(|| StoreError::corrupt(Bucket::StudyTimes, "bad timestamp"))?;

            if ts <= now {
                scan.due_count += 1;
                match scan.earliest_due {
                    Some((_, best)) if best <= ts => {}
                    _ => scan.earliest_due = Some((sequence, ts)),
                }
            } else if scan.next_future.map_or(true, |next| ts < next) {
                scan.next_future = Some(ts);
            }
        }
        Ok(scan)
    }

    /// Body of `score_study`; the caller owns the write.
    fn score_due<R: Rng + ?Sized>(
        &mut self,
        learner: LearnerId,
        delta: i64,
        now: i64,
        rng: &mut R,
    ) -> Result<ScoreOutcome, StoreError> {
        let Some((sequence, _)) = self.scan_schedule(learner, now)?.earliest_due else {
            return Err(StoreError::not_found("study", learner));
        };
        let key = keys::item_key(learner, sequence);
        let mut phrase = self.load_phrase(learner, sequence)?.ok_or_else(|| {
            StoreError::corrupt(
                Bucket::StudyTimes,
                format!("schedule for missing phrase {sequence}"),
            )
        })?;

        // Stored scores may go negative; only the interval lookup clamps.
        let previous_score = phrase.score;
        phrase.score = previous_score.saturating_add(delta);

        self.save_phrase(learner, &phrase)?;
        if phrase.score != previous_score {
            self.add_score_total(learner, phrase.score - previous_score)?;
        }

        let counter_key = keys::learner_key(learner);
        let mut admitted = 0;
        let mut next_study = Some(next_study_time(phrase.score, now, rng));
        match (previous_score == 0, phrase.score == 0) {
            (true, false) => {
                self.bump_counter(Bucket::ZeroScores, &counter_key, -1)?;
                admitted = self.admit_new_phrases(learner, now + STUDY_INTERVALS[0])?;
            }
            (false, true) => {
                let pool = self.get_u64(Bucket::ZeroScores, &counter_key)?.unwrap_or(0);
                if pool >= MAX_NEW_STUDIES {
                    // Zero pool is full: back to the queue front until a slot opens.
                    self.remove(Bucket::StudyTimes, &key);
                    self.requeue_new_phrase(learner, sequence)?;
                    next_study = None;
                } else {
                    self.bump_counter(Bucket::ZeroScores, &counter_key, 1)?;
                }
            }
            _ => {}
        }
        if let Some(at) = next_study {
            self.put_timestamp(Bucket::StudyTimes, &key, at);
        }

        tracing::debug!(
            learner,
            sequence,
            previous_score,
            score = phrase.score,
            next_study,
            admitted,
            "Study scored"
        );
        Ok(ScoreOutcome {
            phrase,
            previous_score,
            next_study,
            admitted,
        })
    }
}

impl Store {
    /// Scores the earliest-due phrase and reschedules it.
    pub fn score_study(
        &self,
        learner: LearnerId,
        delta: i64,
        now: i64,
    ) -> Result<ScoreOutcome, StoreError> {
        self.score_study_with_rng(learner, delta, now, &mut rand::thread_rng())
    }

    pub fn score_study_with_rng<R: Rng + ?Sized>(
        &self,
        learner: LearnerId,
        delta: i64,
        now: i64,
        rng: &mut R,
    ) -> Result<ScoreOutcome, StoreError> {
        self.write(|tx| tx.score_due(learner, delta, now, rng))
    }

    /// Applies a client score with its dedupe checks in one write. A rejected
    /// submission writes nothing, so its message id stays usable for a retry.
    pub fn submit_score(
        &self,
        learner: LearnerId,
        submission: &ScoreSubmission<'_>,
        now: i64,
    ) -> Result<Submitted, StoreError> {
        self.write(|tx| {
            if let Some(message_id) = submission.message_id {
                if tx.contains(Bucket::MessageIds, message_id.as_bytes())? {
                    return Ok(Submitted::DuplicateMessage);
                }
            }

            let Some((due, _)) = tx.scan_schedule(learner, now)?.earliest_due else {
                return Err(StoreError::not_found("study", learner));
            };
            // Keyed on the answered phrase, so a double tap on one button counts once.
            let answered = submission.sequence.unwrap_or(due);
            let payload = format!("score:{answered}:{}", submission.delta);
            if tx.is_repeat_payload(learner, payload.as_bytes(), now)? {
                return Ok(Submitted::DuplicatePayload);
            }
            if answered != due {
                return Ok(Submitted::StudyChanged { due });
            }

            let outcome = tx.score_due(learner, submission.delta, now, &mut rand::thread_rng())?;
            tx.remember_payload(learner, payload.as_bytes(), now);
            if let Some(message_id) = submission.message_id {
                tx.put_timestamp(Bucket::MessageIds, message_id.as_bytes(), now);
            }
            tx.mark_engaged(learner, now)?;
            Ok(Submitted::Scored(outcome))
        })
    }

    pub fn get_study(&self, learner: LearnerId, now: i64) -> Result<Study, StoreError> {
        self.read(|tx| {
            let scan = tx.scan_schedule(learner, now)?;
            let Some((sequence, _)) = scan.earliest_due else {
                return Ok(Study::Idle {
                    next_study: scan.next_future,
                });
            };
            let phrase = tx.load_phrase(learner, sequence)?.ok_or_else(|| {
                StoreError::corrupt(
                    Bucket::StudyTimes,
                    format!("schedule for missing phrase {sequence}"),
                )
            })?;
            Ok(Study::Due {
                phrase,
                due_count: scan.due_count,
            })
        })
    }

    pub fn zero_score_count(&self, learner: LearnerId) -> Result<u64, StoreError> {
        self.read(|tx| {
            Ok(tx
                .get_u64(Bucket::ZeroScores, &keys::learner_key(learner))?
                .unwrap_or(0))
        })
    }

    pub fn score_total(&self, learner: LearnerId) -> Result<i64, StoreError> {
        self.read(|tx| {
            Ok(tx
                .get_i64(Bucket::ScoreTotals, &keys::learner_key(learner))?
                .unwrap_or(0))
        })
    }

    /// Sequences waiting for admission, in admission order.
    pub fn queued_phrases(&self, learner: LearnerId) -> Result<Vec<u64>, StoreError> {
        self.read(|tx| tx.queued_sequences(learner))
    }
}
