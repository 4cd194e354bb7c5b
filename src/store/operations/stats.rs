use serde::Serialize;

use crate::constants::STAT_INTERVAL;
use crate::store::keys;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

/// Periodic progress summary shown to a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub phrase_count: u64,
    pub queued: u64,
    pub in_rotation: u64,
    /// Phrases added within the last `STAT_INTERVAL`.
    pub added_recently: u64,
    pub score_total: i64,
    /// 1-based; ties share a rank.
    pub rank: u64,
    /// Learners on the leaderboard, this one included.
    pub learners: u64,
    pub import_count: u64,
    pub notify_count: u64,
}

impl Tx<'_> {
    fn compute_stats(&self, learner: LearnerId, now: i64) -> Result<LearnerStats, StoreError> {
        let prefix = keys::learner_key(learner);

        let phrase_count = self.scan_prefix(Bucket::Phrases, &prefix)?.len() as u64;
        let in_rotation = self.scan_prefix(Bucket::StudyTimes, &prefix)?.len() as u64;
        let queued = self.queued_sequences(learner)?.len() as u64;

        let mut added_recently = 0;
        for (_, raw) in self.scan_prefix(Bucket::AddTimes, &prefix)? {
            let added_at = keys::bytes_timestamp(&raw)
                .ok_or_else(|| StoreError::corrupt(Bucket::AddTimes, "bad timestamp"))?;
            if now - added_at < STAT_INTERVAL {
                added_recently += 1;
            }
        }

        let score_total = self.get_i64(Bucket::ScoreTotals, &prefix)?.unwrap_or(0);
        let mut ahead = 0;
        let mut learners = 0;
        let mut listed = false;
        for (key, raw) in self.iter(Bucket::ScoreTotals)? {
            let total = keys::bytes_signed(&raw)
                .ok_or_else(|| StoreError::corrupt(Bucket::ScoreTotals, "short integer"))?;
            learners += 1;
            listed |= key.as_slice() == prefix.as_slice();
            if total > score_total {
                ahead += 1;
            }
        }
        if !listed {
            learners += 1;
        }

        Ok(LearnerStats {
            phrase_count,
            queued,
            in_rotation,
            added_recently,
            score_total,
            rank: ahead + 1,
            learners,
            import_count: self.get_u64(Bucket::ImportCounts, &prefix)?.unwrap_or(0),
            notify_count: self.get_u64(Bucket::NotifyCounts, &prefix)?.unwrap_or(0),
        })
    }
}

impl Store {
    /// Throttled summary: `NotReady` until `STAT_INTERVAL` has passed since the
    /// last one (or since registration). Records `now` on success.
    pub fn get_stats(&self, learner: LearnerId, now: i64) -> Result<LearnerStats, StoreError> {
        self.write(|tx| {
            let key = keys::learner_key(learner);
            let last = match tx.get_timestamp(Bucket::StatsTimestamps, &key)? {
                Some(ts) => Some(ts),
                None => tx.get_timestamp(Bucket::RegisterDates, &key)?,
            };
            if let Some(last) = last {
                let ready_at = last + STAT_INTERVAL;
                if now < ready_at {
                    return Err(StoreError::NotReady { ready_at });
                }
            }

            let stats = tx.compute_stats(learner, now)?;
            tx.put_timestamp(Bucket::StatsTimestamps, &key, now);
            Ok(stats)
        })
    }

    /// Same summary without throttling or bookkeeping.
    pub fn peek_stats(&self, learner: LearnerId, now: i64) -> Result<LearnerStats, StoreError> {
        self.read(|tx| tx.compute_stats(learner, now))
    }
}
