use std::collections::HashSet;

use crate::store::keys;
use crate::store::operations::phrases::PhraseDraft;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

impl Tx<'_> {
    /// Drops drafts whose explanation already exists for the learner, and
    /// repeats within the batch. Exact string match.
    fn dedupe_drafts(
        &self,
        learner: LearnerId,
        drafts: Vec<PhraseDraft>,
    ) -> Result<Vec<PhraseDraft>, StoreError> {
        let mut seen: HashSet<String> = self
            .learner_phrases(learner)?
            .into_iter()
            .map(|p| p.explanation)
            .collect();
        Ok(drafts
            .into_iter()
            .filter(|d| seen.insert(d.explanation.clone()))
            .collect())
    }
}

impl Store {
    /// Stages an import batch for confirmation. Returns how many drafts
    /// survived deduplication; nothing is written when none did.
    pub fn queue_import(
        &self,
        learner: LearnerId,
        drafts: Vec<PhraseDraft>,
    ) -> Result<usize, StoreError> {
        self.write(|tx| {
            let fresh = tx.dedupe_drafts(learner, drafts)?;
            if fresh.is_empty() {
                return Ok(0);
            }
            tx.put_json(Bucket::PendingImports, &keys::learner_key(learner), &fresh)?;
            tracing::debug!(learner, pending = fresh.len(), "Import queued");
            Ok(fresh.len())
        })
    }

    pub fn pending_import(&self, learner: LearnerId) -> Result<Option<Vec<PhraseDraft>>, StoreError> {
        self.read(|tx| tx.get_json(Bucket::PendingImports, &keys::learner_key(learner)))
    }

    /// Adds the pending batch through the regular add pipeline, scheduling
    /// admitted phrases for `now`. Returns the number of phrases added.
    pub fn apply_import(&self, learner: LearnerId, now: i64) -> Result<usize, StoreError> {
        self.write(|tx| {
            let key = keys::learner_key(learner);
            let drafts: Vec<PhraseDraft> = tx
                .get_json(Bucket::PendingImports, &key)?
                .ok_or_else(|| StoreError::not_found("pending_import", learner))?;

            // The learner may have added phrases since the batch was queued.
            let fresh = tx.dedupe_drafts(learner, drafts)?;
            let imported = fresh.len();
            for draft in fresh {
                tx.append_phrase(learner, draft, now, now)?;
            }

            tx.bump_counter(Bucket::ImportCounts, &key, 1)?;
            tx.remove(Bucket::PendingImports, &key);

            tracing::info!(learner, imported, "Import applied");
            Ok(imported)
        })
    }

    /// Discards a pending batch. Returns whether one existed.
    pub fn clear_import(&self, learner: LearnerId) -> Result<bool, StoreError> {
        self.write(|tx| {
            let key = keys::learner_key(learner);
            let existed = tx.contains(Bucket::PendingImports, &key)?;
            tx.remove(Bucket::PendingImports, &key);
            Ok(existed)
        })
    }

    pub fn import_count(&self, learner: LearnerId) -> Result<u64, StoreError> {
        self.read(|tx| {
            Ok(tx
                .get_u64(Bucket::ImportCounts, &keys::learner_key(learner))?
                .unwrap_or(0))
        })
    }
}
