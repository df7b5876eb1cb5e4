//! Ambient soundtrack moods and interface languages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The desired ambient music track, chosen by the reasoning collaborator
/// per response and consumed by the audio engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Mystery,
    Tension,
    Melancholy,
    Epiphany,
}

/// Interface language, sent with every reasoning request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Zh,
    Ja,
    Ko,
    Es,
    Fr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn mood_round_trips_through_name() {
        for mood in Mood::iter() {
            assert_eq!(Mood::from_str(&mood.to_string()).unwrap(), mood);
        }
    }

    #[test]
    fn mood_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mood::Melancholy).unwrap(), "\"melancholy\"");
        let parsed: Mood = serde_json::from_str("\"epiphany\"").unwrap();
        assert_eq!(parsed, Mood::Epiphany);
    }

    #[test]
    fn language_codes() {
        assert_eq!(Language::Zh.to_string(), "zh");
        assert_eq!(Language::from_str("fr").unwrap(), Language::Fr);
    }
}
