//! Inbound message deduplication. Chat platforms redeliver on timeouts, and
//! some clients send the same callback payload twice in quick succession.

use crate::constants::{MESSAGE_ID_MAX_AGE, PAYLOAD_DUPLICATE_INTERVAL};
use crate::store::keys;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

impl Tx<'_> {
    pub(crate) fn is_repeat_payload(
        &self,
        learner: LearnerId,
        payload: &[u8],
        now: i64,
    ) -> Result<bool, StoreError> {
        Ok(match self.get(Bucket::PrevPayloads, &keys::learner_key(learner))? {
            Some(raw) => keys::parse_stamped_value(&raw).is_some_and(|(sent_at, previous)| {
                previous == payload && now - sent_at < PAYLOAD_DUPLICATE_INTERVAL
            }),
            None => false,
        })
    }

    pub(crate) fn remember_payload(&mut self, learner: LearnerId, payload: &[u8], now: i64) {
        self.insert(
            Bucket::PrevPayloads,
            &keys::learner_key(learner),
            keys::stamped_value(now, payload),
        );
    }
}

impl Store {
    /// Records a delivered message id. A repeat is `AlreadyExists`.
    pub fn queue_message(&self, message_id: &str, now: i64) -> Result<(), StoreError> {
        self.write(|tx| {
            if tx.contains(Bucket::MessageIds, message_id.as_bytes())? {
                return Err(StoreError::already_exists("message", message_id));
            }
            tx.put_timestamp(Bucket::MessageIds, message_id.as_bytes(), now);
            Ok(())
        })
    }

    /// Drops message ids older than `MESSAGE_ID_MAX_AGE`. Returns how many.
    pub fn purge_message_ids(&self, now: i64) -> Result<usize, StoreError> {
        let removed = self.write(|tx| {
            let mut removed = 0;
            for (id, raw) in tx.iter(Bucket::MessageIds)? {
                // Undecodable entries are dropped along with expired ones.
                let expired = keys::bytes_timestamp(&raw)
                    .map_or(true, |received| now - received > MESSAGE_ID_MAX_AGE);
                if expired {
                    tx.remove(Bucket::MessageIds, &id);
                    removed += 1;
                }
            }
            Ok(removed)
        })?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired message ids");
        }
        Ok(removed)
    }

    /// True when the learner sent the same payload within
    /// `PAYLOAD_DUPLICATE_INTERVAL`. The new payload is stored either way.
    pub fn is_duplicate_payload(
        &self,
        learner: LearnerId,
        payload: &[u8],
        now: i64,
    ) -> Result<bool, StoreError> {
        self.write(|tx| {
            let duplicate = tx.is_repeat_payload(learner, payload, now)?;
            tx.remember_payload(learner, payload, now);
            Ok(duplicate)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::{MESSAGE_ID_MAX_AGE, PAYLOAD_DUPLICATE_INTERVAL};
    use crate::store::test_support::temp_store;
    use crate::store::StoreError;

    #[test]
    fn queue_message_rejects_repeats() {
        let (_dir, store) = temp_store();
        store.queue_message("m-1", 100).unwrap();
        let err = store.queue_message("m-1", 101).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        store.queue_message("m-2", 101).unwrap();
    }

    #[test]
    fn purge_removes_only_expired_ids() {
        let (_dir, store) = temp_store();
        store.queue_message("old", 0).unwrap();
        store.queue_message("fresh", MESSAGE_ID_MAX_AGE).unwrap();

        let removed = store.purge_message_ids(MESSAGE_ID_MAX_AGE + 1).unwrap();
        assert_eq!(removed, 1);
        store.queue_message("old", MESSAGE_ID_MAX_AGE + 2).unwrap();
        assert!(store.queue_message("fresh", MESSAGE_ID_MAX_AGE + 2).is_err());
    }

    #[test]
    fn payload_duplicate_window() {
        let (_dir, store) = temp_store();
        assert!(!store.is_duplicate_payload(1, b"score:+1", 100).unwrap());
        assert!(store.is_duplicate_payload(1, b"score:+1", 101).unwrap());
        assert!(!store.is_duplicate_payload(1, b"score:-1", 102).unwrap());
        assert!(!store
            .is_duplicate_payload(1, b"score:-1", 102 + PAYLOAD_DUPLICATE_INTERVAL)
            .unwrap());
        assert!(!store.is_duplicate_payload(2, b"score:-1", 103).unwrap());
    }
}
