//! Event file transformation.
//!
//! Only `NextSong` events describe a play. Each one yields a time row, a user
//! row and a songplay row; the three groups are emitted in that order so the
//! songplay references are written after what they point at.

use chrono::{DateTime, Datelike, Timelike};

use crate::database::repo::{Row, SongMatch, SongplayRow, TimeRow, UserRow};
use crate::error::{EtlError, Result};
use crate::ingest::records::LogRecord;

/// Resolves a play's `(title, artist, duration)` to catalog identifiers.
pub trait SongLookup {
    fn resolve(&self, title: &str, artist_name: &str, duration: f64) -> Result<Option<SongMatch>>;
}

#[derive(Debug, Default, PartialEq)]
pub struct EventRows {
    pub times: Vec<TimeRow>,
    pub users: Vec<UserRow>,
    pub songplays: Vec<SongplayRow>,
}

impl EventRows {
    pub fn into_rows(self) -> Vec<Row> {
        let mut rows = Vec::with_capacity(self.times.len() + self.users.len() + self.songplays.len());
        rows.extend(self.times.into_iter().map(Row::Time));
        rows.extend(self.users.into_iter().map(Row::User));
        rows.extend(self.songplays.into_iter().map(Row::Songplay));
        rows
    }
}

/// Decomposes an epoch-millisecond timestamp in UTC. Weekday counts from Monday = 0.
pub fn derive_time(ts_ms: i64) -> Result<TimeRow> {
    let instant = DateTime::from_timestamp_millis(ts_ms).ok_or(EtlError::InvalidTimestamp(ts_ms))?;
    Ok(TimeRow {
        start_time: instant.naive_utc(),
        hour: instant.hour(),
        day: instant.day(),
        week: instant.iso_week().week(),
        month: instant.month(),
        year: instant.year(),
        weekday: instant.weekday().num_days_from_monday(),
    })
}

fn resolve_song<L: SongLookup + ?Sized>(record: &LogRecord, lookup: &L) -> Result<Option<SongMatch>> {
    match (record.song.as_deref(), record.artist.as_deref(), record.length) {
        (Some(title), Some(artist), Some(duration)) => lookup.resolve(title, artist, duration),
        _ => Ok(None),
    }
}

pub fn transform_log_records<L: SongLookup + ?Sized>(
    records: Vec<LogRecord>,
    lookup: &L,
) -> Result<EventRows> {
    let mut out = EventRows::default();

    for (i, record) in records.into_iter().enumerate() {
        if !record.is_song_play() {
            continue;
        }
        let index = i + 1;
        let missing = |field| EtlError::MissingField { index, field };

        let ts = record.ts.ok_or_else(|| missing("ts"))?;
        let user_id = record.user_id.clone().ok_or_else(|| missing("userId"))?;
        let level = record.level.ok_or_else(|| missing("level"))?;

        let time = derive_time(ts)?;
        let song = resolve_song(&record, lookup)?;

        out.songplays.push(SongplayRow {
            start_time: time.start_time,
            user_id: user_id.clone(),
            level,
            song,
            session_id: record.session_id,
            location: record.location,
            user_agent: record.user_agent,
        });
        out.users.push(UserRow {
            user_id,
            first_name: record.first_name,
            last_name: record.last_name,
            gender: record.gender,
            level,
        });
        out.times.push(time);
    }

    Ok(out)
}
