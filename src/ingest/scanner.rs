use std::path::{Path, PathBuf};
use tracing::error;
use walkdir::{DirEntry, WalkDir};

use crate::error::{EtlError, Result};

pub const JSON_EXTENSION: &str = "json";

/// Recursively collects every `*.json` file under `root`, sorted by path.
///
/// Only an unreadable `root` is an error. Entries below it that cannot be
/// read (permissions, broken links, link loops) are logged and skipped.
pub fn scan_directory(root: &Path) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root).follow_links(true).into_iter();
    let mut files = Vec::new();

    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(EtlError::Walk {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(e) => {
                let path = e.path().unwrap_or(root).display().to_string();
                error!("Skipping {}: {}", path, e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_json_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }

    // walkdir yields directory order, which is filesystem dependent.
    files.sort();
    Ok(files)
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(JSON_EXTENSION))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    // depth 0 is the root itself, which may legitimately be `.` or `./data`
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}
