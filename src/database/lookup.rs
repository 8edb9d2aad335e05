//! Catalog lookup for play events.
//!
//! Matching is an exact equality on title, artist name and duration. There is
//! no tolerance on `duration`, so a catalog entry of 269.58s will not match an
//! event reporting 269.59s.

use rusqlite::{params, Connection, OptionalExtension};

use super::repo::SongMatch;

const SONG_SELECT: &str = "
    SELECT songs.song_id, artists.artist_id
    FROM songs
    JOIN artists ON songs.artist_id = artists.artist_id
    WHERE songs.title = ?1 AND artists.name = ?2 AND songs.duration = ?3
    LIMIT 1";

/// Returns the first catalog entry matching the triple, or `None` on a miss.
pub fn find_song(
    conn: &Connection,
    title: &str,
    artist_name: &str,
    duration: f64,
) -> rusqlite::Result<Option<SongMatch>> {
    let mut stmt = conn.prepare_cached(SONG_SELECT)?;
    stmt.query_row(params![title, artist_name, duration], |row| {
        Ok(SongMatch {
            song_id: row.get(0)?,
            artist_id: row.get(1)?,
        })
    })
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO artists (artist_id, name) VALUES ('AR5KOSW1187FB35FF4', 'Elena');
             INSERT INTO songs (song_id, title, artist_id, year, duration)
                VALUES ('SOZCTXZ12AB0182364', 'Setanta matins', 'AR5KOSW1187FB35FF4', 0, 269.58);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn exact_triple_resolves_both_ids() {
        let conn = catalog();
        let found = find_song(&conn, "Setanta matins", "Elena", 269.58).unwrap();
        assert_eq!(
            found,
            Some(SongMatch {
                song_id: "SOZCTXZ12AB0182364".to_string(),
                artist_id: "AR5KOSW1187FB35FF4".to_string(),
            })
        );
    }

    #[test]
    fn near_duration_is_a_miss() {
        let conn = catalog();
        assert_eq!(find_song(&conn, "Setanta matins", "Elena", 269.59).unwrap(), None);
        assert_eq!(find_song(&conn, "Setanta Matins", "Elena", 269.58).unwrap(), None);
        assert_eq!(find_song(&conn, "Setanta matins", "Elena ", 269.58).unwrap(), None);
    }
}
