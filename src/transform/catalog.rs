use tracing::warn;

use crate::database::repo::{ArtistRow, Row, SongRow};
use crate::error::{EtlError, Result};
use crate::ingest::records::SongRecord;

/// Splits a catalog record into its song and artist rows.
pub fn project(record: SongRecord, index: usize) -> Result<(SongRow, ArtistRow)> {
    let song_id = record
        .song_id
        .ok_or(EtlError::MissingField { index, field: "song_id" })?;
    let artist_id = record
        .artist_id
        .ok_or(EtlError::MissingField { index, field: "artist_id" })?;

    let song = SongRow {
        song_id,
        title: record.title,
        artist_id: artist_id.clone(),
        year: record.year,
        duration: record.duration,
    };
    let artist = ArtistRow {
        artist_id,
        name: record.artist_name,
        location: record.artist_location,
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    };
    Ok((song, artist))
}

/// Rows for one catalog file: an artist row then its song row per record.
pub fn transform_song_records(records: Vec<SongRecord>) -> Result<Vec<Row>> {
    if records.len() != 1 {
        warn!("Catalog file holds {} records, expected exactly one", records.len());
    }

    let mut rows = Vec::with_capacity(records.len() * 2);
    for (i, record) in records.into_iter().enumerate() {
        let (song, artist) = project(record, i + 1)?;
        rows.push(Row::Artist(artist));
        rows.push(Row::Song(song));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SongRecord {
        serde_json::from_str(
            r#"{"num_songs": 1, "artist_id": "AR5KOSW1187FB35FF4", "artist_latitude": 49.80388,
                "artist_longitude": 15.47491, "artist_location": "Dubai UAE", "artist_name": "Elena",
                "song_id": "SOZCTXZ12AB0182364", "title": "Setanta matins", "duration": 269.58, "year": 0}"#,
        )
        .unwrap()
    }

    #[test]
    fn projects_artist_before_its_song() {
        let rows = transform_song_records(vec![record()]).unwrap();
        assert_eq!(
            rows,
            vec![
                Row::Artist(ArtistRow {
                    artist_id: "AR5KOSW1187FB35FF4".to_string(),
                    name: Some("Elena".to_string()),
                    location: Some("Dubai UAE".to_string()),
                    latitude: Some(49.80388),
                    longitude: Some(15.47491),
                }),
                Row::Song(SongRow {
                    song_id: "SOZCTXZ12AB0182364".to_string(),
                    title: Some("Setanta matins".to_string()),
                    artist_id: "AR5KOSW1187FB35FF4".to_string(),
                    year: Some(0),
                    duration: Some(269.58),
                }),
            ]
        );
    }

    #[test]
    fn nulls_stay_absent() {
        let mut rec = record();
        rec.year = None;
        rec.artist_latitude = None;
        rec.artist_longitude = None;
        rec.artist_location = None;

        let (song, artist) = project(rec, 1).unwrap();
        assert_eq!(song.year, None);
        assert_eq!(artist.location, None);
        assert_eq!(artist.latitude, None);
        assert_eq!(artist.longitude, None);
    }

    #[test]
    fn missing_key_fails_the_file() {
        let mut rec = record();
        rec.artist_id = None;
        let err = transform_song_records(vec![rec]).unwrap_err();
        assert!(matches!(err, EtlError::MissingField { index: 1, field: "artist_id" }));
    }

    #[test]
    fn empty_file_yields_no_rows() {
        assert!(transform_song_records(Vec::new()).unwrap().is_empty());
    }
}
