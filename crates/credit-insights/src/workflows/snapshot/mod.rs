//! Offline loading of record store exports (`applications.csv`,
//! `score_events.csv`, and optionally `borrowers.csv`) into an in-memory
//! store the dashboard service can read from.

mod parser;
mod store;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use store::{SnapshotCounts, SnapshotStore};

use parser::{APPLICATIONS_FILE, BORROWERS_FILE, SCORE_EVENTS_FILE};

#[derive(Debug)]
pub enum SnapshotImportError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Csv {
        file: &'static str,
        source: csv::Error,
    },
    InvalidTimestamp {
        file: &'static str,
        line: usize,
        value: String,
    },
    MissingId {
        file: &'static str,
        line: usize,
    },
}

impl SnapshotImportError {
    fn csv(file: &'static str, source: csv::Error) -> Self {
        Self::Csv { file, source }
    }
}

impl std::fmt::Display for SnapshotImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotImportError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            SnapshotImportError::Csv { file, source } => {
                write!(f, "invalid CSV data in {}: {}", file, source)
            }
            SnapshotImportError::InvalidTimestamp { file, line, value } => write!(
                f,
                "{} line {}: '{}' is not a recognised timestamp",
                file, line, value
            ),
            SnapshotImportError::MissingId { file, line } => {
                write!(f, "{} line {}: record id is missing", file, line)
            }
        }
    }
}

impl std::error::Error for SnapshotImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotImportError::Io { source, .. } => Some(source),
            SnapshotImportError::Csv { source, .. } => Some(source),
            SnapshotImportError::InvalidTimestamp { .. }
            | SnapshotImportError::MissingId { .. } => None,
        }
    }
}

pub struct SnapshotImporter;

impl SnapshotImporter {
    /// Reads a snapshot directory. A missing `borrowers.csv` loads as an
    /// empty borrower table.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<SnapshotStore, SnapshotImportError> {
        let dir = dir.as_ref();
        let applications = open(&dir.join(APPLICATIONS_FILE))?;
        let score_events = open(&dir.join(SCORE_EVENTS_FILE))?;

        let borrowers_path = dir.join(BORROWERS_FILE);
        let borrowers = if borrowers_path.exists() {
            Some(open(&borrowers_path)?)
        } else {
            None
        };

        Self::from_readers(applications, score_events, borrowers)
    }

    pub fn from_readers<A, E, B>(
        applications: A,
        score_events: E,
        borrowers: Option<B>,
    ) -> Result<SnapshotStore, SnapshotImportError>
    where
        A: Read,
        E: Read,
        B: Read,
    {
        let applications = parser::parse_applications(applications)?;
        let score_events = parser::parse_score_events(score_events)?;
        let borrowers = match borrowers {
            Some(reader) => parser::parse_borrowers(reader)?,
            None => Vec::new(),
        };

        tracing::debug!(
            applications = applications.len(),
            score_events = score_events.len(),
            borrowers = borrowers.len(),
            "snapshot loaded"
        );

        Ok(SnapshotStore::from_rows(applications, score_events, borrowers))
    }
}

fn open(path: &Path) -> Result<File, SnapshotImportError> {
    File::open(path).map_err(|source| SnapshotImportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
