//! Repeat rule model

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How a reminder repeats after its anchor instant.
///
/// Unrecognized rule strings parse to [`RepeatRule::None`], so a typo in a
/// stored or synced value degrades to one-time semantics instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RepeatRule {
    /// One-time reminder
    #[default]
    None,
    /// Every minute (debug aid)
    EveryMinute,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RepeatRule {
    /// Parse a stored rule string, mapping anything unknown to `None`.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "every_minute" | "every-minute" | "minute" => Self::EveryMinute,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "yearly" => Self::Yearly,
            _ => Self::None,
        }
    }

    /// Canonical storage string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::EveryMinute => "every_minute",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Whether the reminder is re-armed after each firing
    #[must_use]
    pub const fn is_repeating(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatRule {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl Serialize for RepeatRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RepeatRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::None, Self::parse_lenient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_rules() {
        assert_eq!(RepeatRule::parse_lenient("daily"), RepeatRule::Daily);
        assert_eq!(RepeatRule::parse_lenient(" Weekly "), RepeatRule::Weekly);
        assert_eq!(RepeatRule::parse_lenient("YEARLY"), RepeatRule::Yearly);
        assert_eq!(
            RepeatRule::parse_lenient("every_minute"),
            RepeatRule::EveryMinute
        );
    }

    #[test]
    fn unknown_rule_is_one_time() {
        assert_eq!(RepeatRule::parse_lenient("fortnightly"), RepeatRule::None);
        assert_eq!(RepeatRule::parse_lenient(""), RepeatRule::None);
        assert!(!RepeatRule::parse_lenient("dialy").is_repeating());
    }

    #[test]
    fn deserialize_null_and_unknown_as_none() {
        let rule: RepeatRule = serde_json::from_str("null").unwrap();
        assert_eq!(rule, RepeatRule::None);
        let rule: RepeatRule = serde_json::from_str("\"hourly\"").unwrap();
        assert_eq!(rule, RepeatRule::None);
        let rule: RepeatRule = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(rule, RepeatRule::Monthly);
    }
}
