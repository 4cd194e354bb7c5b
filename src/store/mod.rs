pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;
pub mod tx;

use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

pub use trees::Bucket;
pub use tx::Tx;

/// Chat-platform user id. Every index is keyed by it.
pub type LearnerId = u64;

#[derive(Debug)]
pub struct Store {
    db: Db,
    gate: RwLock<()>,
    // Scheduling indexes
    pub phrases: sled::Tree,
    pub study_times: sled::Tree,
    pub add_times: sled::Tree,
    pub new_phrases: sled::Tree,
    pub zero_scores: sled::Tree,
    pub score_totals: sled::Tree,
    // Learner state
    pub subscriptions: sled::Tree,
    pub profiles: sled::Tree,
    pub register_dates: sled::Tree,
    pub stats_timestamps: sled::Tree,
    pub activity: sled::Tree,
    pub read_marks: sled::Tree,
    pub import_counts: sled::Tree,
    pub notify_counts: sled::Tree,
    // Auth / dedupe
    pub message_ids: sled::Tree,
    pub tokens: sled::Tree,
    pub learner_tokens: sled::Tree,
    pub pending_imports: sled::Tree,
    pub prev_payloads: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("already exists: entity={entity}, key={key}")]
    AlreadyExists { entity: String, key: String },
    #[error("not ready until {ready_at}")]
    NotReady { ready_at: i64 },
    #[error("corrupt index entry in {bucket}: {detail}")]
    Corrupt { bucket: &'static str, detail: String },
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl StoreError {
    pub fn not_found(entity: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    pub fn already_exists(entity: &str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn corrupt(bucket: Bucket, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            bucket: bucket.name(),
            detail: detail.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let phrases = db.open_tree(trees::PHRASES)?;
        let study_times = db.open_tree(trees::STUDY_TIMES)?;
        let add_times = db.open_tree(trees::ADD_TIMES)?;
        let new_phrases = db.open_tree(trees::NEW_PHRASES)?;
        let zero_scores = db.open_tree(trees::ZERO_SCORES)?;
        let score_totals = db.open_tree(trees::SCORE_TOTALS)?;
        let subscriptions = db.open_tree(trees::SUBSCRIPTIONS)?;
        let profiles = db.open_tree(trees::PROFILES)?;
        let register_dates = db.open_tree(trees::REGISTER_DATES)?;
        let stats_timestamps = db.open_tree(trees::STATS_TIMESTAMPS)?;
        let activity = db.open_tree(trees::ACTIVITY)?;
        let read_marks = db.open_tree(trees::READ_MARKS)?;
        let import_counts = db.open_tree(trees::IMPORT_COUNTS)?;
        let notify_counts = db.open_tree(trees::NOTIFY_COUNTS)?;
        let message_ids = db.open_tree(trees::MESSAGE_IDS)?;
        let tokens = db.open_tree(trees::TOKENS)?;
        let learner_tokens = db.open_tree(trees::LEARNER_TOKENS)?;
        let pending_imports = db.open_tree(trees::PENDING_IMPORTS)?;
        let prev_payloads = db.open_tree(trees::PREV_PAYLOADS)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            gate: RwLock::new(()),
            phrases,
            study_times,
            add_times,
            new_phrases,
            zero_scores,
            score_totals,
            subscriptions,
            profiles,
            register_dates,
            stats_timestamps,
            activity,
            read_marks,
            import_counts,
            notify_counts,
            message_ids,
            tokens,
            learner_tokens,
            pending_imports,
            prev_payloads,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub fn tree(&self, bucket: Bucket) -> &sled::Tree {
        match bucket {
            Bucket::Phrases => &self.phrases,
            Bucket::StudyTimes => &self.study_times,
            Bucket::AddTimes => &self.add_times,
            Bucket::NewPhrases => &self.new_phrases,
            Bucket::ZeroScores => &self.zero_scores,
            Bucket::ScoreTotals => &self.score_totals,
            Bucket::Subscriptions => &self.subscriptions,
            Bucket::Profiles => &self.profiles,
            Bucket::RegisterDates => &self.register_dates,
            Bucket::StatsTimestamps => &self.stats_timestamps,
            Bucket::MessageIds => &self.message_ids,
            Bucket::Tokens => &self.tokens,
            Bucket::LearnerTokens => &self.learner_tokens,
            Bucket::PendingImports => &self.pending_imports,
            Bucket::PrevPayloads => &self.prev_payloads,
            Bucket::ImportCounts => &self.import_counts,
            Bucket::NotifyCounts => &self.notify_counts,
            Bucket::Activity => &self.activity,
            Bucket::ReadMarks => &self.read_marks,
            Bucket::Meta => &self.meta,
        }
    }

    /// Store-wide monotonic phrase sequence. Only the add pipeline calls this.
    pub(crate) fn next_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.db.generate_id()?)
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
