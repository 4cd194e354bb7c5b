pub mod dedup;
pub mod due;
pub mod imports;
pub mod phrases;
pub mod profiles;
pub mod stats;
pub mod study;
pub mod tokens;
