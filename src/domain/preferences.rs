//! Stored player preferences and their migration to the current shape.
//!
//! Older clients stored `difficulty` either as a single level or as a map of
//! per-game levels. Both are migrated once, when the payload is read, into
//! [`Preferences`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 3;

/// Current preference record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preferences {
    pub difficulty_level: Option<u8>,
}

/// Every payload shape ever written to the preference store.
///
/// Variant order matters: a payload carrying `difficulty_level` is current
/// even when a stale `difficulty` field survives next to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StoredPreferences {
    Current {
        #[serde(deserialize_with = "Option::deserialize")]
        difficulty_level: Option<Value>,
    },
    Legacy {
        difficulty: LegacyDifficulty,
    },
    Empty {},
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LegacyDifficulty {
    PerGame(BTreeMap<String, Value>),
    Level(Value),
}

impl StoredPreferences {
    /// Normalise to the current shape, clamping levels into the supported range.
    pub fn migrate(self) -> Preferences {
        let raw = match self {
            StoredPreferences::Current { difficulty_level } => {
                difficulty_level.as_ref().and_then(coerce_level)
            }
            StoredPreferences::Empty {} => None,
            StoredPreferences::Legacy {
                difficulty: LegacyDifficulty::Level(level),
            } => coerce_level(&level),
            StoredPreferences::Legacy {
                difficulty: LegacyDifficulty::PerGame(levels),
            } => levels.values().filter_map(coerce_level).max(),
        };
        Preferences {
            difficulty_level: raw.map(clamp_difficulty),
        }
    }
}

/// Read a stored level leniently: integers, numeric strings, floats
/// (truncated) and booleans all count. Anything else has no level.
fn coerce_level(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn clamp_difficulty(level: i64) -> u8 {
    let clamped = level.clamp(i64::from(MIN_DIFFICULTY), i64::from(MAX_DIFFICULTY));
    u8::try_from(clamped).unwrap_or(MIN_DIFFICULTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrate(json: &str) -> Preferences {
        serde_json::from_str::<StoredPreferences>(json)
            .expect("payload parses")
            .migrate()
    }

    #[test]
    fn current_payload_passes_through() {
        assert_eq!(migrate(r#"{"difficulty_level": 2}"#).difficulty_level, Some(2));
    }

    #[test]
    fn legacy_level_is_clamped() {
        assert_eq!(migrate(r#"{"difficulty": 9}"#).difficulty_level, Some(3));
        assert_eq!(migrate(r#"{"difficulty": -1}"#).difficulty_level, Some(1));
    }

    #[test]
    fn legacy_map_takes_the_highest_level() {
        let prefs = migrate(r#"{"difficulty": {"anidle": 1, "poster_zoomed": 3, "redacted_synopsis": 2}}"#);
        assert_eq!(prefs.difficulty_level, Some(3));
    }

    #[test]
    fn current_field_wins_over_legacy_field() {
        let prefs = migrate(r#"{"difficulty_level": 1, "difficulty": 3}"#);
        assert_eq!(prefs.difficulty_level, Some(1));
        assert_eq!(migrate(r#"{"difficulty_level": null}"#).difficulty_level, None);
    }

    #[test]
    fn unreadable_legacy_value_has_no_level() {
        assert_eq!(migrate(r#"{"difficulty": "hard"}"#).difficulty_level, None);
        assert_eq!(migrate(r#"{"difficulty": null}"#).difficulty_level, None);
        assert_eq!(migrate(r#"{"difficulty": {"anidle": "x"}}"#).difficulty_level, None);
    }

    #[test]
    fn numeric_strings_are_read_as_levels() {
        assert_eq!(migrate(r#"{"difficulty": "2"}"#).difficulty_level, Some(2));
        assert_eq!(migrate(r#"{"difficulty_level": " 3 "}"#).difficulty_level, Some(3));
        assert_eq!(migrate(r#"{"difficulty": 2.9}"#).difficulty_level, Some(2));
    }

    #[test]
    fn legacy_map_skips_values_that_are_not_levels() {
        let prefs = migrate(r#"{"difficulty": {"anidle": "x", "poster_zoomed": 2, "synopsis": [3]}}"#);
        assert_eq!(prefs.difficulty_level, Some(2));
        let prefs = migrate(r#"{"difficulty": {"anidle": "3", "poster_zoomed": 1}}"#);
        assert_eq!(prefs.difficulty_level, Some(3));
    }

    #[test]
    fn empty_payload_has_no_level() {
        assert_eq!(migrate("{}").difficulty_level, None);
        assert_eq!(migrate(r#"{"difficulty": {}}"#).difficulty_level, None);
    }
}
