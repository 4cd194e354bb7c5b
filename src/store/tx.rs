//! Single-writer transaction layer.
//!
//! sled transactions cannot iterate, and the scheduling operations need
//! prefix scans in the middle of a write. A write therefore holds the writer
//! side of `Store::gate`, stages every mutation in an in-memory write set
//! (reads and scans see the staged values), and commits the whole set through
//! one multi-tree sled transaction. Readers hold the reader side of the same
//! gate, so a query never observes a half-applied commit.

use std::collections::BTreeMap;
use std::sync::PoisonError;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionError;
use sled::Transactional;

use crate::store::keys;
use crate::store::{Bucket, Store, StoreError};

type WriteSet = BTreeMap<(Bucket, Vec<u8>), Option<Vec<u8>>>;

pub struct Tx<'a> {
    store: &'a Store,
    writes: WriteSet,
}

impl Store {
    /// Runs `f` against a consistent view of the store.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&Tx<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let tx = Tx::new(self);
        f(&tx)
    }

    /// Runs `f` and commits its staged writes atomically. Nothing is written
    /// when `f` returns an error.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let mut tx = Tx::new(self);
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl<'a> Tx<'a> {
    fn new(store: &'a Store) -> Self {
        Self {
            store,
            writes: BTreeMap::new(),
        }
    }

    pub(crate) fn store(&self) -> &'a Store {
        self.store
    }

    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.writes.get(&(bucket, key.to_vec())) {
            return Ok(staged.clone());
        }
        Ok(self.store.tree(bucket).get(key)?.map(|v| v.to_vec()))
    }

    pub fn contains(&self, bucket: Bucket, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(bucket, key)?.is_some())
    }

    /// All entries under `prefix`, in key order, with staged writes applied.
    pub fn scan_prefix(
        &self,
        bucket: Bucket,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut merged = BTreeMap::new();
        for item in self.store.tree(bucket).scan_prefix(prefix) {
            let (k, v) = item?;
            merged.insert(k.to_vec(), v.to_vec());
        }

        let staged = self
            .writes
            .range((bucket, prefix.to_vec())..)
            .take_while(|((b, k), _)| *b == bucket && k.starts_with(prefix));
        for ((_, key), value) in staged {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    pub fn iter(&self, bucket: Bucket) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.scan_prefix(bucket, &[])
    }

    pub fn insert(&mut self, bucket: Bucket, key: &[u8], value: impl Into<Vec<u8>>) {
        self.writes
            .insert((bucket, key.to_vec()), Some(value.into()));
    }

    pub fn remove(&mut self, bucket: Bucket, key: &[u8]) {
        self.writes.insert((bucket, key.to_vec()), None);
    }

    pub fn get_u64(&self, bucket: Bucket, key: &[u8]) -> Result<Option<u64>, StoreError> {
        self.get(bucket, key)?
            .map(|raw| keys::btoi(&raw).ok_or_else(|| StoreError::corrupt(bucket, "short integer")))
            .transpose()
    }

    pub fn put_u64(&mut self, bucket: Bucket, key: &[u8], value: u64) {
        self.insert(bucket, key, keys::itob(value).to_vec());
    }

    pub fn get_i64(&self, bucket: Bucket, key: &[u8]) -> Result<Option<i64>, StoreError> {
        self.get(bucket, key)?
            .map(|raw| {
                keys::bytes_signed(&raw).ok_or_else(|| StoreError::corrupt(bucket, "short integer"))
            })
            .transpose()
    }

    pub fn put_i64(&mut self, bucket: Bucket, key: &[u8], value: i64) {
        self.insert(bucket, key, keys::signed_bytes(value).to_vec());
    }

    pub fn get_timestamp(&self, bucket: Bucket, key: &[u8]) -> Result<Option<i64>, StoreError> {
        self.get(bucket, key)?
            .map(|raw| {
                keys::bytes_timestamp(&raw).ok_or_else(|| StoreError::corrupt(bucket, "bad timestamp"))
            })
            .transpose()
    }

    pub fn put_timestamp(&mut self, bucket: Bucket, key: &[u8], ts: i64) {
        self.insert(bucket, key, keys::timestamp_bytes(ts).to_vec());
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        bucket: Bucket,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        self.get(bucket, key)?
            .map(|raw| Store::deserialize(&raw))
            .transpose()
    }

    pub fn put_json<T: Serialize>(
        &mut self,
        bucket: Bucket,
        key: &[u8],
        value: &T,
    ) -> Result<(), StoreError> {
        let raw = Store::serialize(value)?;
        self.insert(bucket, key, raw);
        Ok(())
    }

    /// Adds `delta` to an unsigned counter, saturating at 0. Returns the new value.
    pub fn bump_counter(
        &mut self,
        bucket: Bucket,
        key: &[u8],
        delta: i64,
    ) -> Result<u64, StoreError> {
        let current = self.get_u64(bucket, key)?.unwrap_or(0);
        let next = if delta >= 0 {
            current.saturating_add(delta as u64)
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        if next == 0 {
            self.remove(bucket, key);
        } else {
            self.put_u64(bucket, key, next);
        }
        Ok(next)
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let mut buckets: Vec<Bucket> = self.writes.keys().map(|(bucket, _)| *bucket).collect();
        buckets.dedup();
        let trees: Vec<&sled::Tree> = buckets.iter().map(|b| self.store.tree(*b)).collect();
        let writes = &self.writes;

        trees
            .as_slice()
            .transaction(|views| {
                for (view, bucket) in views.iter().zip(&buckets) {
                    let staged = writes
                        .range((*bucket, Vec::new())..)
                        .take_while(|((b, _), _)| b == bucket);
                    for ((_, key), value) in staged {
                        match value {
                            Some(v) => {
                                view.insert(key.as_slice(), v.as_slice())?;
                            }
                            None => {
                                view.remove(key.as_slice())?;
                            }
                        }
                    }
                }
                Ok(())
            })
            .map_err(|error: TransactionError<StoreError>| match error {
                TransactionError::Abort(store_error) => store_error,
                TransactionError::Storage(storage_error) => StoreError::Sled(storage_error),
            })?;

        tracing::trace!(writes = writes.len(), trees = buckets.len(), "Committed write set");
        Ok(())
    }
}
