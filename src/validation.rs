//! Request body checks shared by the phrase and import routes.

use crate::constants::{MAX_IMPORT_PHRASES, MAX_PHRASE_CHARS};
use crate::store::operations::phrases::PhraseDraft;

fn validate_field(
    value: &str,
    empty_msg: &'static str,
    long_msg: &'static str,
) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err(empty_msg);
    }
    if value.chars().count() > MAX_PHRASE_CHARS {
        return Err(long_msg);
    }
    Ok(())
}

/// Both fields non-blank and at most `MAX_PHRASE_CHARS` characters.
pub fn validate_phrase(text: &str, explanation: &str) -> Result<(), &'static str> {
    validate_field(text, "Phrase is empty", "Phrase is too long")?;
    validate_field(explanation, "Explanation is empty", "Explanation is too long")
}

/// A non-empty batch of at most `MAX_IMPORT_PHRASES` valid drafts.
pub fn validate_import_batch(drafts: &[PhraseDraft]) -> Result<(), &'static str> {
    if drafts.is_empty() {
        return Err("Import batch is empty");
    }
    if drafts.len() > MAX_IMPORT_PHRASES {
        return Err("Import batch is too large");
    }
    drafts
        .iter()
        .try_for_each(|d| validate_phrase(&d.text, &d.explanation))
}
