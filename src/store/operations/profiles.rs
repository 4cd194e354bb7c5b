use serde::{Deserialize, Serialize};

use crate::constants::PROFILE_MAX_CACHE_TIME;
use crate::store::keys;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

/// Chat-platform profile, cached so replies can be localized without a
/// platform round trip on every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub locale: String,
    /// UTC offset in hours.
    pub timezone: f64,
    pub cached_at: i64,
}

impl Profile {
    pub fn is_stale(&self, now: i64) -> bool {
        now - self.cached_at > PROFILE_MAX_CACHE_TIME
    }
}

impl Tx<'_> {
    pub(crate) fn touch_register_date(&mut self, learner: LearnerId, now: i64) -> Result<i64, StoreError> {
        let key = keys::learner_key(learner);
        if let Some(existing) = self.get_timestamp(Bucket::RegisterDates, &key)? {
            return Ok(existing);
        }
        self.put_timestamp(Bucket::RegisterDates, &key, now);
        tracing::info!(learner, "New learner registered");
        Ok(now)
    }
}

impl Store {
    pub fn set_profile(&self, learner: LearnerId, profile: &Profile) -> Result<(), StoreError> {
        self.write(|tx| tx.put_json(Bucket::Profiles, &keys::learner_key(learner), profile))
    }

    pub fn get_profile(&self, learner: LearnerId) -> Result<Option<Profile>, StoreError> {
        self.read(|tx| tx.get_json(Bucket::Profiles, &keys::learner_key(learner)))
    }

    /// Records the first-seen time once. Returns the stored register date.
    pub fn touch_register_date(&self, learner: LearnerId, now: i64) -> Result<i64, StoreError> {
        self.write(|tx| tx.touch_register_date(learner, now))
    }

    pub fn register_date(&self, learner: LearnerId) -> Result<Option<i64>, StoreError> {
        self.read(|tx| tx.get_timestamp(Bucket::RegisterDates, &keys::learner_key(learner)))
    }
}
