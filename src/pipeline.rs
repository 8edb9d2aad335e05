use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::database::repo::{Loader, Row};
use crate::error::{EtlError, Result};
use crate::ingest::parser::parse_file;
use crate::ingest::records::{LogRecord, SongRecord};
use crate::ingest::scanner::scan_directory;
use crate::transform::event::SongLookup;
use crate::transform::{catalog, event};

/// Turns the parsed records of one file into rows for the loader.
pub trait FilePipeline {
    type Record: DeserializeOwned;

    fn name(&self) -> &'static str;

    fn transform(&self, records: Vec<Self::Record>, lookup: &dyn SongLookup) -> Result<Vec<Row>>;
}

pub struct SongFiles;

impl FilePipeline for SongFiles {
    type Record = SongRecord;

    fn name(&self) -> &'static str {
        "song_data"
    }

    fn transform(&self, records: Vec<SongRecord>, _lookup: &dyn SongLookup) -> Result<Vec<Row>> {
        catalog::transform_song_records(records)
    }
}

pub struct LogFiles;

impl FilePipeline for LogFiles {
    type Record = LogRecord;

    fn name(&self) -> &'static str {
        "log_data"
    }

    fn transform(&self, records: Vec<LogRecord>, lookup: &dyn SongLookup) -> Result<Vec<Row>> {
        Ok(event::transform_log_records(records, lookup)?.into_rows())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Discovered,
    Parsing,
    Transforming,
    Loading,
    Committed,
    Failed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Discovered => "discovered",
            FileState::Parsing => "parsing",
            FileState::Transforming => "transforming",
            FileState::Loading => "loading",
            FileState::Committed => "committed",
            FileState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    /// Stage the file was in when it failed.
    pub state: FileState,
    pub error: EtlError,
}

/// Outcome of one `process_data` call.
#[derive(Debug)]
pub struct RunReport {
    pub pipeline: &'static str,
    pub root: PathBuf,
    pub files_found: usize,
    pub files_committed: usize,
    pub rows_written: usize,
    pub failures: Vec<FileFailure>,
}

/// State carried through a run instead of globals.
pub struct RunContext {
    show_progress: bool,
    reports: Vec<RunReport>,
}

impl RunContext {
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            reports: Vec::new(),
        }
    }

    pub fn reports(&self) -> &[RunReport] {
        &self.reports
    }

    pub fn files_committed(&self) -> usize {
        self.reports.iter().map(|r| r.files_committed).sum()
    }

    pub fn rows_written(&self) -> usize {
        self.reports.iter().map(|r| r.rows_written).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.reports.iter().flat_map(|r| r.failures.iter())
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {msg:10} {bar:40.cyan/blue} {pos}/{len} files [{elapsed_precise}]",
        ) {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

fn process_file<P: FilePipeline>(
    path: &Path,
    pipeline: &P,
    loader: &mut Loader,
) -> std::result::Result<usize, (FileState, EtlError)> {
    debug!("{}: {}", FileState::Parsing, path.display());
    let records = parse_file::<P::Record>(path).map_err(|e| (FileState::Parsing, e))?;

    debug!("{}: {} records", FileState::Transforming, records.len());
    let rows = pipeline
        .transform(records, &*loader)
        .map_err(|e| (FileState::Transforming, e))?;

    for row in rows {
        loader.submit(row);
    }
    debug!("{}: {} rows queued", FileState::Loading, loader.pending());
    loader.commit().map_err(|e| (FileState::Loading, e))
}

/// Processes every json file under `root`, committing once per file.
///
/// A failing file is logged and recorded in the report; the remaining files are
/// still processed. Only a failure to walk `root` itself is returned as an error.
pub fn process_data<P: FilePipeline>(
    ctx: &mut RunContext,
    loader: &mut Loader,
    root: &Path,
    pipeline: &P,
) -> Result<()> {
    let files = scan_directory(root)?;
    let total = files.len();
    info!("{} files found in {}", total, root.display());

    let mut report = RunReport {
        pipeline: pipeline.name(),
        root: root.to_path_buf(),
        files_found: total,
        files_committed: 0,
        rows_written: 0,
        failures: Vec::new(),
    };

    let pb = ctx.progress_bar(total);
    pb.set_message(pipeline.name());

    for (i, path) in files.into_iter().enumerate() {
        debug!("{}: {}", FileState::Discovered, path.display());
        match process_file(&path, pipeline, loader) {
            Ok(rows) => {
                debug!("{}: {}", FileState::Committed, path.display());
                report.files_committed += 1;
                report.rows_written += rows;
                pb.suspend(|| info!("{}/{} files processed.", i + 1, total));
            }
            Err((state, e)) => {
                loader.discard();
                pb.suspend(|| {
                    error!("{} {} during {}: {}", path.display(), FileState::Failed, state, e)
                });
                report.failures.push(FileFailure {
                    path,
                    state,
                    error: e,
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !report.failures.is_empty() {
        error!(
            "{}: {} of {} files under {} failed",
            report.pipeline,
            report.failures.len(),
            total,
            report.root.display()
        );
    }
    ctx.reports.push(report);
    Ok(())
}
