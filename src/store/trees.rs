pub const PHRASES: &str = "phrases";
pub const STUDY_TIMES: &str = "study_times";
pub const ADD_TIMES: &str = "add_times";
pub const NEW_PHRASES: &str = "new_phrases";
pub const ZERO_SCORES: &str = "zero_scores";
pub const SCORE_TOTALS: &str = "score_totals";

pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const PROFILES: &str = "profiles";
pub const REGISTER_DATES: &str = "register_dates";
pub const STATS_TIMESTAMPS: &str = "stats_timestamps";
pub const MESSAGE_IDS: &str = "message_ids";
pub const TOKENS: &str = "tokens";
pub const LEARNER_TOKENS: &str = "learner_tokens";
pub const PENDING_IMPORTS: &str = "pending_imports";
pub const PREV_PAYLOADS: &str = "prev_payloads";
pub const IMPORT_COUNTS: &str = "import_counts";
pub const NOTIFY_COUNTS: &str = "notify_counts";
pub const ACTIVITY: &str = "activity";
pub const READ_MARKS: &str = "read_marks";

pub const META: &str = "meta";

/// Logical bucket identifier. Ordering is only used to group staged writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Phrases,
    StudyTimes,
    AddTimes,
    NewPhrases,
    ZeroScores,
    ScoreTotals,
    Subscriptions,
    Profiles,
    RegisterDates,
    StatsTimestamps,
    MessageIds,
    Tokens,
    LearnerTokens,
    PendingImports,
    PrevPayloads,
    ImportCounts,
    NotifyCounts,
    Activity,
    ReadMarks,
    Meta,
}

impl Bucket {
    pub const ALL: [Bucket; 20] = [
        Bucket::Phrases,
        Bucket::StudyTimes,
        Bucket::AddTimes,
        Bucket::NewPhrases,
        Bucket::ZeroScores,
        Bucket::ScoreTotals,
        Bucket::Subscriptions,
        Bucket::Profiles,
        Bucket::RegisterDates,
        Bucket::StatsTimestamps,
        Bucket::MessageIds,
        Bucket::Tokens,
        Bucket::LearnerTokens,
        Bucket::PendingImports,
        Bucket::PrevPayloads,
        Bucket::ImportCounts,
        Bucket::NotifyCounts,
        Bucket::Activity,
        Bucket::ReadMarks,
        Bucket::Meta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Phrases => PHRASES,
            Self::StudyTimes => STUDY_TIMES,
            Self::AddTimes => ADD_TIMES,
            Self::NewPhrases => NEW_PHRASES,
            Self::ZeroScores => ZERO_SCORES,
            Self::ScoreTotals => SCORE_TOTALS,
            Self::Subscriptions => SUBSCRIPTIONS,
            Self::Profiles => PROFILES,
            Self::RegisterDates => REGISTER_DATES,
            Self::StatsTimestamps => STATS_TIMESTAMPS,
            Self::MessageIds => MESSAGE_IDS,
            Self::Tokens => TOKENS,
            Self::LearnerTokens => LEARNER_TOKENS,
            Self::PendingImports => PENDING_IMPORTS,
            Self::PrevPayloads => PREV_PAYLOADS,
            Self::ImportCounts => IMPORT_COUNTS,
            Self::NotifyCounts => NOTIFY_COUNTS,
            Self::Activity => ACTIVITY,
            Self::ReadMarks => READ_MARKS,
            Self::Meta => META,
        }
    }
}
