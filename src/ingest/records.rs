//! Source record shapes for the two input trees.
//!
//! Every field is optional: a JSON `null` (or an absent key) becomes `None`,
//! which is kept apart from `""` and `0` all the way down to the store.

use serde::{Deserialize, Deserializer};

/// One line of a catalog (song metadata) file.
#[allow(dead_code)] // mirrors the source layout, not every field is loaded
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SongRecord {
    pub num_songs: Option<i64>,
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

/// One line of an event (user activity) file.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub item_in_session: Option<i64>,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<Level>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: Option<String>,
    pub registration: Option<f64>,
    pub session_id: Option<i64>,
    pub song: Option<String>,
    pub status: Option<i64>,
    pub ts: Option<i64>,
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "user_id_from_string_or_number")]
    pub user_id: Option<String>,
}

impl LogRecord {
    pub const NEXT_SONG: &'static str = "NextSong";

    pub fn is_song_play(&self) -> bool {
        self.page.as_deref() == Some(Self::NEXT_SONG)
    }
}

/// Subscription tier of a user at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Free,
    Paid,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Free => "free",
            Level::Paid => "paid",
        }
    }
}

// Logged-out events carry `"userId": ""`, some exports write the id as a number.
fn user_id_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) if s.trim().is_empty() => None,
        Some(RawId::Text(s)) => Some(s),
        Some(RawId::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_record_normalizes_user_id() {
        let numeric: LogRecord = serde_json::from_str(r#"{"userId": 32, "page": "NextSong"}"#).unwrap();
        assert_eq!(numeric.user_id.as_deref(), Some("32"));
        assert!(numeric.is_song_play());

        let logged_out: LogRecord = serde_json::from_str(r#"{"userId": "", "page": "Home"}"#).unwrap();
        assert_eq!(logged_out.user_id, None);
        assert!(!logged_out.is_song_play());

        let missing: LogRecord = serde_json::from_str(r#"{"userId": null}"#).unwrap();
        assert_eq!(missing.user_id, None);
    }

    #[test]
    fn song_record_keeps_zero_apart_from_null() {
        let zero: SongRecord = serde_json::from_str(r#"{"song_id": "S1", "year": 0, "artist_location": ""}"#).unwrap();
        assert_eq!(zero.year, Some(0));
        assert_eq!(zero.artist_location.as_deref(), Some(""));

        let null: SongRecord = serde_json::from_str(r#"{"song_id": "S1", "year": null, "artist_location": null}"#).unwrap();
        assert_eq!(null.year, None);
        assert_eq!(null.artist_location, None);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let result = serde_json::from_str::<LogRecord>(r#"{"level": "gold"}"#);
        assert!(result.is_err());
    }
}
