//! Byte-level key and value codec.
//!
//! Every integer is written as 8 big-endian bytes so that byte-lexicographic
//! order equals numeric order. Per-item keys are `learner ++ secondary`, which
//! lets a prefix scan over the learner yield that learner's records sorted by
//! the secondary part.

use crate::store::LearnerId;

pub const INT_WIDTH: usize = 8;
pub const ITEM_KEY_WIDTH: usize = INT_WIDTH * 2;

pub fn itob(value: u64) -> [u8; INT_WIDTH] {
    value.to_be_bytes()
}

/// Reads the first 8 bytes. Returns `None` for short input.
pub fn btoi(bytes: &[u8]) -> Option<u64> {
    let head: [u8; INT_WIDTH] = bytes.get(..INT_WIDTH)?.try_into().ok()?;
    Some(u64::from_be_bytes(head))
}

/// Timestamps before the epoch collapse to 0.
pub fn timestamp_bytes(ts: i64) -> [u8; INT_WIDTH] {
    itob(ts.max(0) as u64)
}

pub fn bytes_timestamp(bytes: &[u8]) -> Option<i64> {
    btoi(bytes).and_then(|v| i64::try_from(v).ok())
}

/// Signed values (score totals) round-trip through two's complement; they are
/// never used as keys.
pub fn signed_bytes(value: i64) -> [u8; INT_WIDTH] {
    value.to_be_bytes()
}

pub fn bytes_signed(bytes: &[u8]) -> Option<i64> {
    let head: [u8; INT_WIDTH] = bytes.get(..INT_WIDTH)?.try_into().ok()?;
    Some(i64::from_be_bytes(head))
}

pub fn learner_key(learner: LearnerId) -> [u8; INT_WIDTH] {
    itob(learner)
}

pub fn item_key(learner: LearnerId, secondary: u64) -> [u8; ITEM_KEY_WIDTH] {
    let mut key = [0u8; ITEM_KEY_WIDTH];
    key[..INT_WIDTH].copy_from_slice(&itob(learner));
    key[INT_WIDTH..].copy_from_slice(&itob(secondary));
    key
}

pub fn parse_item_key(key: &[u8]) -> Option<(LearnerId, u64)> {
    if key.len() != ITEM_KEY_WIDTH {
        return None;
    }
    Some((btoi(&key[..INT_WIDTH])?, btoi(&key[INT_WIDTH..])?))
}

pub fn encode_queue(sequences: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(sequences.len() * INT_WIDTH);
    for seq in sequences {
        out.extend_from_slice(&itob(*seq));
    }
    out
}

/// Trailing bytes that do not form a full entry are ignored.
pub fn decode_queue(bytes: &[u8]) -> Vec<u64> {
    bytes.chunks_exact(INT_WIDTH).filter_map(btoi).collect()
}

/// `timestamp ++ payload`, used for token back-references and payload dedupe.
pub fn stamped_value(ts: i64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(INT_WIDTH + payload.len());
    out.extend_from_slice(&timestamp_bytes(ts));
    out.extend_from_slice(payload);
    out
}

pub fn parse_stamped_value(bytes: &[u8]) -> Option<(i64, &[u8])> {
    let ts = bytes_timestamp(bytes)?;
    Some((ts, &bytes[INT_WIDTH..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_bytes_sort_numerically() {
        let values = [0u64, 1, 255, 256, 65_535, 1 << 40, u64::MAX];
        for pair in values.windows(2) {
            assert!(itob(pair[0]) < itob(pair[1]));
        }
    }

    #[test]
    fn item_keys_group_by_learner_then_secondary() {
        let a = item_key(1, 900);
        let b = item_key(2, 3);
        let c = item_key(2, 4);
        assert!(a < b && b < c);
        assert!(b.starts_with(&learner_key(2)));
        assert_eq!(parse_item_key(&c), Some((2, 4)));
    }

    #[test]
    fn parse_item_key_rejects_wrong_width() {
        assert_eq!(parse_item_key(&[0u8; 15]), None);
        assert_eq!(parse_item_key(&[0u8; 17]), None);
    }

    #[test]
    fn negative_timestamp_clamps_to_zero() {
        assert_eq!(timestamp_bytes(-5), itob(0));
    }

    #[test]
    fn queue_keeps_order_and_drops_partial_tail() {
        let mut raw = encode_queue(&[7, 3, 9]);
        raw.extend_from_slice(&[1, 2, 3]);
        assert_eq!(decode_queue(&raw), vec![7, 3, 9]);
    }

    #[test]
    fn stamped_value_splits_timestamp_and_payload() {
        let raw = stamped_value(1_700_000_000, b"QUICK_REPLY");
        let (ts, payload) = parse_stamped_value(&raw).unwrap();
        assert_eq!(ts, 1_700_000_000);
        assert_eq!(payload, b"QUICK_REPLY");
        assert!(parse_stamped_value(&raw[..4]).is_none());
    }

    #[test]
    fn signed_values_survive_negative_totals() {
        assert_eq!(bytes_signed(&signed_bytes(-42)), Some(-42));
    }
}
