/// Seconds per hour.
pub const SECS_PER_HOUR: i64 = 3_600;

/// Seconds per day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Maximum number of never-graduated phrases a learner has in rotation at once.
pub const MAX_NEW_STUDIES: u64 = 20;

/// Review interval ladder, indexed by the (clamped) phrase score.
pub const STUDY_INTERVALS: [i64; 14] = [
    SECS_PER_HOUR,
    8 * SECS_PER_HOUR,
    20 * SECS_PER_HOUR,
    44 * SECS_PER_HOUR,
    92 * SECS_PER_HOUR,
    164 * SECS_PER_HOUR,
    332 * SECS_PER_HOUR,
    720 * SECS_PER_HOUR,
    1_440 * SECS_PER_HOUR,
    2_400 * SECS_PER_HOUR,
    3_600 * SECS_PER_HOUR,
    5_760 * SECS_PER_HOUR,
    8_640 * SECS_PER_HOUR,
    10_800 * SECS_PER_HOUR,
];

/// Upper bound of the random share added on top of an interval.
pub const STUDY_TIME_DIFFUSION: f64 = 0.2;

/// Fewest due phrases worth a reminder.
pub const DUE_MIN_COUNT: u64 = 10;

/// Learners active within this many seconds are not reminded.
pub const DUE_MIN_INACTIVE: i64 = SECS_PER_HOUR;

pub const AUTH_TOKEN_LENGTH: usize = 77;

/// Same quick-reply payload inside this window is treated as a double delivery.
pub const PAYLOAD_DUPLICATE_INTERVAL: i64 = 5;

/// Webhook message ids older than this are purged.
pub const MESSAGE_ID_MAX_AGE: i64 = SECS_PER_DAY;

/// Minimum gap between two stats summaries.
pub const STAT_INTERVAL: i64 = 7 * SECS_PER_DAY;

/// Cached platform profiles older than this should be re-fetched by the caller.
pub const PROFILE_MAX_CACHE_TIME: i64 = SECS_PER_DAY;

/// Longest accepted phrase or explanation, in characters.
pub const MAX_PHRASE_CHARS: usize = 1_000;

/// Most phrases accepted in one import batch.
pub const MAX_IMPORT_PHRASES: usize = 5_000;
