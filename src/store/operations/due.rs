//! Notification eligibility: who has enough due phrases to be pinged.

use std::collections::{BTreeMap, HashMap};

use crate::constants::{DUE_MIN_COUNT, DUE_MIN_INACTIVE};
use crate::store::keys;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

/// Why a learner with due phrases is not notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withheld {
    TooFewDue,
    RecentlyActive,
    UnreadNotification,
}

impl Withheld {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooFewDue => "too_few_due",
            Self::RecentlyActive => "recently_active",
            Self::UnreadNotification => "unread_notification",
        }
    }
}

impl Tx<'_> {
    pub(crate) fn advance_read_mark(&mut self, learner: LearnerId, watermark: i64) -> Result<(), StoreError> {
        let key = keys::learner_key(learner);
        let current = self.get_timestamp(Bucket::ReadMarks, &key)?.unwrap_or(i64::MIN);
        if watermark > current {
            self.put_timestamp(Bucket::ReadMarks, &key, watermark);
        }
        Ok(())
    }

    /// The learner acted in the conversation, so everything sent before
    /// `now` has been seen.
    pub(crate) fn mark_engaged(&mut self, learner: LearnerId, now: i64) -> Result<(), StoreError> {
        self.put_timestamp(Bucket::Activity, &keys::learner_key(learner), now);
        self.advance_read_mark(learner, now)
    }

    fn notification_gate(
        &self,
        learner: LearnerId,
        due_count: u64,
        now: i64,
    ) -> Result<Option<Withheld>, StoreError> {
        if due_count < DUE_MIN_COUNT {
            return Ok(Some(Withheld::TooFewDue));
        }

        let key = keys::learner_key(learner);
        let activity = self.get_timestamp(Bucket::Activity, &key)?;
        if let Some(active_at) = activity {
            if now - active_at < DUE_MIN_INACTIVE {
                return Ok(Some(Withheld::RecentlyActive));
            }
        }

        // Platforms without read receipts never write a read mark.
        if let (Some(read_at), Some(active_at)) =
            (self.get_timestamp(Bucket::ReadMarks, &key)?, activity)
        {
            if read_at < active_at {
                return Ok(Some(Withheld::UnreadNotification));
            }
        }

        Ok(None)
    }
}

impl Store {
    /// Subscribed learners to notify, with their due counts.
    pub fn get_due_studies(&self, now: i64) -> Result<BTreeMap<LearnerId, u64>, StoreError> {
        self.read(|tx| {
            let mut subscribed: HashMap<LearnerId, bool> = HashMap::new();
            let mut due: BTreeMap<LearnerId, u64> = BTreeMap::new();

            for (key, value) in tx.iter(Bucket::StudyTimes)? {
                let Some((learner, _)) = keys::parse_item_key(&key) else {
                    tracing::warn!(key_len = key.len(), "Skipping malformed study time key");
                    continue;
                };
                let ts = keys::bytes_timestamp(&value)
                    .ok_or_else(|| StoreError::corrupt(Bucket::StudyTimes, "bad timestamp"))?;
                if ts > now {
                    continue;
                }

                let is_subscribed = match subscribed.get(&learner) {
                    Some(flag) => *flag,
                    None => {
                        let flag = tx.contains(Bucket::Subscriptions, &keys::learner_key(learner))?;
                        subscribed.insert(learner, flag);
                        flag
                    }
                };
                if is_subscribed {
                    *due.entry(learner).or_default() += 1;
                }
            }

            let mut eligible = BTreeMap::new();
            let mut withheld: HashMap<&'static str, u32> = HashMap::new();
            for (learner, count) in due {
                match tx.notification_gate(learner, count, now)? {
                    None => {
                        eligible.insert(learner, count);
                    }
                    Some(reason) => *withheld.entry(reason.as_str()).or_default() += 1,
                }
            }

            tracing::debug!(
                eligible = eligible.len(),
                withheld = ?withheld,
                "Due studies computed"
            );
            Ok(eligible)
        })
    }

    pub fn subscribe(&self, learner: LearnerId) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.insert(Bucket::Subscriptions, &keys::learner_key(learner), Vec::new());
            Ok(())
        })
    }

    pub fn unsubscribe(&self, learner: LearnerId) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.remove(Bucket::Subscriptions, &keys::learner_key(learner));
            Ok(())
        })
    }

    pub fn is_subscribed(&self, learner: LearnerId) -> Result<bool, StoreError> {
        self.read(|tx| tx.contains(Bucket::Subscriptions, &keys::learner_key(learner)))
    }

    pub fn subscribed_learners(&self) -> Result<Vec<LearnerId>, StoreError> {
        self.read(|tx| {
            Ok(tx
                .iter(Bucket::Subscriptions)?
                .into_iter()
                .filter_map(|(key, _)| keys::btoi(&key))
                .collect())
        })
    }

    /// Last time the conversation saw traffic in either direction.
    pub fn record_activity(&self, learner: LearnerId, ts: i64) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.put_timestamp(Bucket::Activity, &keys::learner_key(learner), ts);
            Ok(())
        })
    }

    pub fn last_activity(&self, learner: LearnerId) -> Result<Option<i64>, StoreError> {
        self.read(|tx| tx.get_timestamp(Bucket::Activity, &keys::learner_key(learner)))
    }

    /// Read-receipt watermark; never moves backwards.
    pub fn record_read(&self, learner: LearnerId, watermark: i64) -> Result<(), StoreError> {
        self.write(|tx| tx.advance_read_mark(learner, watermark))
    }

    /// Activity plus read mark in one write. Called for learner-initiated
    /// requests.
    pub fn record_engagement(&self, learner: LearnerId, now: i64) -> Result<(), StoreError> {
        self.write(|tx| tx.mark_engaged(learner, now))
    }

    /// A reminder was delivered: count it and stamp it as conversation
    /// activity. The next reminder waits at least `DUE_MIN_INACTIVE`, and
    /// once a read mark exists it also waits for the read receipt.
    pub fn record_notification(&self, learner: LearnerId, now: i64) -> Result<u64, StoreError> {
        self.write(|tx| {
            let key = keys::learner_key(learner);
            tx.put_timestamp(Bucket::Activity, &key, now);
            tx.bump_counter(Bucket::NotifyCounts, &key, 1)
        })
    }

    pub fn notify_count(&self, learner: LearnerId) -> Result<u64, StoreError> {
        self.read(|tx| {
            Ok(tx
                .get_u64(Bucket::NotifyCounts, &keys::learner_key(learner))?
                .unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::{DUE_MIN_COUNT, DUE_MIN_INACTIVE, STUDY_INTERVALS};
    use crate::store::test_support::temp_store;
    use crate::store::Store;

    const T0: i64 = 1_700_000_000;

    fn add_many(store: &Store, learner: u64, n: u64) {
        for i in 0..n {
            store
                .add_phrase(learner, &format!("p{i}"), &format!("e{i}"), T0)
                .unwrap();
        }
    }

    #[test]
    fn one_below_threshold_is_excluded() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT - 1);
        let due = store.get_due_studies(T0 + STUDY_INTERVALS[0]).unwrap();
        assert!(due.is_empty());
    }

    #[test]
    fn threshold_count_is_included() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT);
        let due = store.get_due_studies(T0 + STUDY_INTERVALS[0]).unwrap();
        assert_eq!(due.get(&1), Some(&DUE_MIN_COUNT));
    }

    #[test]
    fn unsubscribed_learners_are_ignored() {
        let (_dir, store) = temp_store();
        add_many(&store, 1, DUE_MIN_COUNT + 2);
        assert!(store.get_due_studies(T0 + STUDY_INTERVALS[0]).unwrap().is_empty());

        store.subscribe(1).unwrap();
        assert!(store.is_subscribed(1).unwrap());
        store.unsubscribe(1).unwrap();
        assert!(store.get_due_studies(T0 + STUDY_INTERVALS[0]).unwrap().is_empty());
    }

    #[test]
    fn recent_activity_withholds_notification() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT);
        let now = T0 + STUDY_INTERVALS[0];

        store.record_activity(1, now - DUE_MIN_INACTIVE + 1).unwrap();
        assert!(store.get_due_studies(now).unwrap().is_empty());

        store.record_activity(1, now - DUE_MIN_INACTIVE).unwrap();
        store.record_read(1, now - DUE_MIN_INACTIVE).unwrap();
        assert_eq!(store.get_due_studies(now).unwrap().len(), 1);
    }

    #[test]
    fn unread_notification_withholds_until_read() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT);
        let now = T0 + STUDY_INTERVALS[0] + 2 * DUE_MIN_INACTIVE;

        store.record_read(1, T0).unwrap();
        store.record_activity(1, T0 + 100).unwrap();
        assert!(store.get_due_studies(now).unwrap().is_empty());

        store.record_read(1, T0 + 100).unwrap();
        assert_eq!(store.get_due_studies(now).unwrap().get(&1), Some(&DUE_MIN_COUNT));
    }

    #[test]
    fn read_mark_never_moves_backwards() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT);
        let now = T0 + STUDY_INTERVALS[0] + 2 * DUE_MIN_INACTIVE;
        store.record_activity(1, T0 + 100).unwrap();
        store.record_read(1, T0 + 200).unwrap();
        store.record_read(1, T0).unwrap();
        assert_eq!(store.get_due_studies(now).unwrap().len(), 1);
    }

    #[test]
    fn delivered_reminder_waits_for_read() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT);
        let now = T0 + STUDY_INTERVALS[0];
        store.record_engagement(1, T0).unwrap();

        assert_eq!(store.get_due_studies(now).unwrap().len(), 1);
        assert_eq!(store.record_notification(1, now).unwrap(), 1);

        // Held back inside the quiet period, and after it while still unread.
        assert!(store.get_due_studies(now + 600).unwrap().is_empty());
        assert!(store.get_due_studies(now + 3 * DUE_MIN_INACTIVE).unwrap().is_empty());

        store.record_read(1, now + 10).unwrap();
        assert_eq!(store.get_due_studies(now + 3 * DUE_MIN_INACTIVE).unwrap().len(), 1);
    }

    #[test]
    fn engagement_marks_prior_messages_read() {
        let (_dir, store) = temp_store();
        store.subscribe(1).unwrap();
        add_many(&store, 1, DUE_MIN_COUNT);
        let now = T0 + STUDY_INTERVALS[0] + 2 * DUE_MIN_INACTIVE;

        store.record_read(1, T0).unwrap();
        store.record_notification(1, T0 + 100).unwrap();
        assert!(store.get_due_studies(now).unwrap().is_empty());

        store.record_engagement(1, T0 + 200).unwrap();
        assert_eq!(store.last_activity(1).unwrap(), Some(T0 + 200));
        assert_eq!(store.get_due_studies(now).unwrap().len(), 1);
    }

    #[test]
    fn notify_counter_accumulates() {
        let (_dir, store) = temp_store();
        assert_eq!(store.record_notification(4, T0).unwrap(), 1);
        assert_eq!(store.record_notification(4, T0 + 60).unwrap(), 2);
        assert_eq!(store.notify_count(4).unwrap(), 2);
        assert_eq!(store.last_activity(4).unwrap(), Some(T0 + 60));
        assert_eq!(store.notify_count(5).unwrap(), 0);
    }

    #[test]
    fn subscribed_learners_lists_ids() {
        let (_dir, store) = temp_store();
        store.subscribe(9).unwrap();
        store.subscribe(3).unwrap();
        assert_eq!(store.subscribed_learners().unwrap(), vec![3, 9]);
    }
}
