use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

use crate::error::{EtlError, Result};

pub struct Table {
    pub name: &'static str,
    pub schema: &'static str,
}

pub const SONGPLAYS: Table = Table {
    name: "songplays",
    schema: "CREATE TABLE IF NOT EXISTS songplays (
        songplay_id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time TEXT NOT NULL REFERENCES time(start_time),
        user_id TEXT NOT NULL REFERENCES users(user_id),
        level TEXT NOT NULL CHECK (level IN ('free', 'paid')),
        song_id TEXT REFERENCES songs(song_id),
        artist_id TEXT REFERENCES artists(artist_id),
        session_id INTEGER,
        location TEXT,
        user_agent TEXT
    );",
};

pub const USERS: Table = Table {
    name: "users",
    schema: "CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        first_name TEXT,
        last_name TEXT,
        gender TEXT,
        level TEXT NOT NULL CHECK (level IN ('free', 'paid'))
    );",
};

pub const SONGS: Table = Table {
    name: "songs",
    schema: "CREATE TABLE IF NOT EXISTS songs (
        song_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        artist_id TEXT NOT NULL REFERENCES artists(artist_id),
        year INTEGER,
        duration REAL
    );",
};

pub const ARTISTS: Table = Table {
    name: "artists",
    schema: "CREATE TABLE IF NOT EXISTS artists (
        artist_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        location TEXT,
        latitude REAL,
        longitude REAL
    );",
};

pub const TIME: Table = Table {
    name: "time",
    schema: "CREATE TABLE IF NOT EXISTS time (
        start_time TEXT PRIMARY KEY,
        hour INTEGER NOT NULL,
        day INTEGER NOT NULL,
        week INTEGER NOT NULL,
        month INTEGER NOT NULL,
        year INTEGER NOT NULL,
        weekday INTEGER NOT NULL
    );",
};

pub const TABLES: &[Table] = &[SONGPLAYS, USERS, SONGS, ARTISTS, TIME];

/// Opens (creating if needed) the database file used by the provisioning step.
pub fn open_for_provisioning(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(|source| EtlError::Connection {
        path: path.to_path_buf(),
        source,
    })
}

pub fn drop_tables(conn: &Connection) -> Result<()> {
    for table in TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table.name))
            .map_err(EtlError::StoreWrite)?;
    }
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    for table in TABLES {
        conn.execute_batch(table.schema)
            .map_err(EtlError::StoreWrite)?;
    }
    Ok(())
}

/// Opens an existing store for loading. Never creates the file.
///
/// Foreign keys are switched on for the connection, so parents must be
/// written before the rows that reference them.
pub fn open_provisioned(path: &Path) -> Result<Connection> {
    let connection_error = |source: rusqlite::Error| EtlError::Connection {
        path: path.to_path_buf(),
        source,
    };
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(connection_error)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(connection_error)?;

    if let Some(table) = missing_table(&conn).map_err(connection_error)? {
        return Err(EtlError::NotProvisioned(table));
    }
    Ok(conn)
}

pub fn missing_table(conn: &Connection) -> rusqlite::Result<Option<&'static str>> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    for table in TABLES {
        let count: i64 = stmt.query_row(params![table.name], |row| row.get(0))?;
        if count == 0 {
            return Ok(Some(table.name));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn provisioning_leaves_five_empty_tables() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sparkify.db");

        let conn = open_for_provisioning(&path)?;
        create_tables(&conn)?;
        conn.execute(
            "INSERT INTO artists (artist_id, name) VALUES ('AR1', 'Elena')",
            [],
        )?;

        // a second provisioning run starts from scratch
        drop_tables(&conn)?;
        create_tables(&conn)?;
        assert_eq!(missing_table(&conn)?, None);
        for table in TABLES {
            let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |row| row.get(0))?;
            assert_eq!(count, 0, "{} should be empty", table.name);
        }
        drop(conn);

        assert!(open_provisioned(&path).is_ok());
        Ok(())
    }

    #[test]
    fn open_provisioned_refuses_missing_or_bare_store() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("absent.db");

        let err = open_provisioned(&path).unwrap_err();
        assert!(matches!(err, EtlError::Connection { .. }));
        assert!(!path.exists());

        let conn = open_for_provisioning(&path)?;
        conn.execute_batch(SONGS.schema)?;
        drop(conn);

        let err = open_provisioned(&path).unwrap_err();
        assert!(matches!(err, EtlError::NotProvisioned("songplays")));
        Ok(())
    }
}
