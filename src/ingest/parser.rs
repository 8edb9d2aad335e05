use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::{EtlError, Result};

/// Lazily yields one record per non-blank line of a line-delimited JSON file.
///
/// The sequence is finite and can be restarted by opening the path again.
pub struct RecordReader<T> {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> RecordReader<T> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| EtlError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for RecordReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(EtlError::Unreadable {
                        path: self.path.clone(),
                        source,
                    }))
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str(&line).map_err(|source| {
                EtlError::MalformedJson {
                    path: self.path.clone(),
                    line: self.line_no,
                    source,
                }
            }));
        }
    }
}

/// Reads a whole file, failing on the first unreadable or malformed line.
pub fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    RecordReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::records::{LogRecord, SongRecord};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parses_one_record_per_line_and_skips_blank_lines() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            concat!(
                r#"{"page": "NextSong", "userId": "39", "ts": 1541121934796, "length": null}"#,
                "\n\n",
                r#"{"page": "Home", "userId": "", "ts": 1541121934800}"#,
                "\n",
            ),
        )?;

        let records: Vec<LogRecord> = parse_file(&path)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id.as_deref(), Some("39"));
        assert_eq!(records[0].length, None);
        assert_eq!(records[1].page.as_deref(), Some("Home"));
        Ok(())
    }

    #[test]
    fn malformed_line_reports_path_and_line() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"song_id\": \"S1\"}\n{\"song_id\": \n")?;

        let err = parse_file::<SongRecord>(&path).unwrap_err();
        assert!(err.is_parse_error());
        match err {
            EtlError::MalformedJson { path: p, line, .. } => {
                assert_eq!(p, path);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = parse_file::<SongRecord>(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, EtlError::Unreadable { .. }));
    }

    #[test]
    fn reader_is_lazy() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("songs.json");
        fs::write(&path, "{\"song_id\": \"S1\"}\nnot json\n")?;

        let mut reader = RecordReader::<SongRecord>::open(&path)?;
        let first = reader.next().unwrap()?;
        assert_eq!(first.song_id.as_deref(), Some("S1"));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
        Ok(())
    }
}
