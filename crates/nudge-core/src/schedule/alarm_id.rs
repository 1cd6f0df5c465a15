//! Stable identifiers for alarm and notification slots.
//!
//! A slot is one `(reminder id, offset)` pair. Its identifier must come out
//! the same on every run so a reschedule replaces the previous alarm instead
//! of stacking a duplicate.

use crate::models::ReminderId;

/// Identifier shared by the platform alarm and the notification of a slot.
pub fn slot_id(reminder_id: &ReminderId, offset_millis: i64) -> i32 {
    fold_non_negative(string_hash(reminder_id.as_str()) ^ long_hash(offset_millis))
}

/// Polynomial hash (base 31) over UTF-16 code units, wrapping at 32 bits
fn string_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0_i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Fold the high 32 bits of a 64-bit value into the low 32
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn long_hash(value: i64) -> i32 {
    let bits = value as u64;
    (bits ^ (bits >> 32)) as i32
}

/// `i32::MIN` has no positive counterpart, so it maps to zero
const fn fold_non_negative(hash: i32) -> i32 {
    if hash == i32::MIN {
        0
    } else {
        hash.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_hash_matches_known_values() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("abc"), 96_354);
        // Overflows and wraps negative
        assert_eq!(string_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn long_hash_folds_high_bits() {
        assert_eq!(long_hash(0), 0);
        assert_eq!(long_hash(300_000), 300_000);
        assert_eq!(long_hash(-1), 0);
        assert_eq!(long_hash(1 << 32), 1);
    }

    #[test]
    fn slot_id_is_deterministic_and_non_negative() {
        let id = ReminderId::from("abc");
        assert_eq!(slot_id(&id, 0), 96_354);
        assert_eq!(slot_id(&id, 0), slot_id(&id, 0));
        assert_eq!(slot_id(&id, 1), 96_355);
        assert!(slot_id(&ReminderId::from("0193a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b"), 900_000) >= 0);
    }

    #[test]
    fn different_offsets_get_different_slots() {
        let id = ReminderId::from("reminder-1");
        assert_ne!(slot_id(&id, 0), slot_id(&id, 300_000));
        assert_ne!(slot_id(&id, 300_000), slot_id(&id, 3_600_000));
    }

    #[test]
    fn minimum_hash_maps_to_zero() {
        assert_eq!(slot_id(&ReminderId::from("polygenelubricants"), 0), 0);
        assert_eq!(fold_non_negative(i32::MIN), 0);
        assert_eq!(fold_non_negative(-42), 42);
    }
}
