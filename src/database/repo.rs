use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

use crate::database::{lookup, schema};
use crate::error::{EtlError, Result};
use crate::ingest::records::Level;
use crate::transform::event::SongLookup;

#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: String,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Level,
}

/// Catalog identifiers of a resolved play. Both ids are present or the whole match is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SongMatch {
    pub song_id: String,
    pub artist_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    pub start_time: NaiveDateTime,
    pub user_id: String,
    pub level: Level,
    pub song: Option<SongMatch>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Song(SongRow),
    Artist(ArtistRow),
    Time(TimeRow),
    User(UserRow),
    Songplay(SongplayRow),
}

impl ToSql for Level {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

const SONG_UPSERT: &str = "
    INSERT INTO songs (song_id, title, artist_id, year, duration)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(song_id) DO UPDATE SET
        title = excluded.title,
        artist_id = excluded.artist_id,
        year = excluded.year,
        duration = excluded.duration";

const ARTIST_UPSERT: &str = "
    INSERT INTO artists (artist_id, name, location, latitude, longitude)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(artist_id) DO UPDATE SET
        name = excluded.name,
        location = excluded.location,
        latitude = excluded.latitude,
        longitude = excluded.longitude";

const TIME_UPSERT: &str = "
    INSERT INTO time (start_time, hour, day, week, month, year, weekday)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(start_time) DO UPDATE SET
        hour = excluded.hour,
        day = excluded.day,
        week = excluded.week,
        month = excluded.month,
        year = excluded.year,
        weekday = excluded.weekday";

const USER_UPSERT: &str = "
    INSERT INTO users (user_id, first_name, last_name, gender, level)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(user_id) DO UPDATE SET
        first_name = excluded.first_name,
        last_name = excluded.last_name,
        gender = excluded.gender,
        level = excluded.level";

// Songplays have no natural key, replaying a log file appends duplicates.
const SONGPLAY_INSERT: &str = "
    INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Queues rows per file and writes them in one transaction on `commit`.
///
/// The loader owns the single store connection of a run; dropping it closes
/// the connection on every exit path.
pub struct Loader {
    conn: Connection,
    queue: Vec<Row>,
}

impl Loader {
    /// Connects to an already provisioned store.
    pub fn connect(path: &Path) -> Result<Self> {
        let conn = schema::open_provisioned(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            queue: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Queues one row. Nothing reaches the store before `commit`.
    pub fn submit(&mut self, row: Row) {
        self.queue.push(row);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn discard(&mut self) {
        self.queue.clear();
    }

    /// Writes every queued row in submission order and commits.
    ///
    /// The queue is emptied whatever the outcome. If the store rejects any
    /// row the transaction rolls back and none of the queued rows persist.
    pub fn commit(&mut self) -> Result<usize> {
        let rows = std::mem::take(&mut self.queue);
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction().map_err(EtlError::StoreWrite)?;

        {
            let mut stmt_song = tx.prepare(SONG_UPSERT).map_err(EtlError::StoreWrite)?;
            let mut stmt_artist = tx.prepare(ARTIST_UPSERT).map_err(EtlError::StoreWrite)?;
            let mut stmt_time = tx.prepare(TIME_UPSERT).map_err(EtlError::StoreWrite)?;
            let mut stmt_user = tx.prepare(USER_UPSERT).map_err(EtlError::StoreWrite)?;
            let mut stmt_songplay = tx.prepare(SONGPLAY_INSERT).map_err(EtlError::StoreWrite)?;

            for row in &rows {
                let written = match row {
                    Row::Song(song) => stmt_song.execute(params![
                        song.song_id,
                        song.title,
                        song.artist_id,
                        song.year,
                        song.duration
                    ]),
                    Row::Artist(artist) => stmt_artist.execute(params![
                        artist.artist_id,
                        artist.name,
                        artist.location,
                        artist.latitude,
                        artist.longitude
                    ]),
                    Row::Time(time) => stmt_time.execute(params![
                        time.start_time,
                        time.hour,
                        time.day,
                        time.week,
                        time.month,
                        time.year,
                        time.weekday
                    ]),
                    Row::User(user) => stmt_user.execute(params![
                        user.user_id,
                        user.first_name,
                        user.last_name,
                        user.gender,
                        user.level
                    ]),
                    Row::Songplay(play) => stmt_songplay.execute(params![
                        play.start_time,
                        play.user_id,
                        play.level,
                        play.song.as_ref().map(|m| m.song_id.as_str()),
                        play.song.as_ref().map(|m| m.artist_id.as_str()),
                        play.session_id,
                        play.location,
                        play.user_agent
                    ]),
                };
                written.map_err(EtlError::StoreWrite)?;
            }
        }

        tx.commit().map_err(EtlError::StoreWrite)?;
        debug!("Committed {} rows", rows.len());
        Ok(rows.len())
    }
}

impl SongLookup for Loader {
    fn resolve(&self, title: &str, artist_name: &str, duration: f64) -> Result<Option<SongMatch>> {
        lookup::find_song(&self.conn, title, artist_name, duration).map_err(EtlError::Lookup)
    }
}
