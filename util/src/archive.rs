//! Struct archiving functionality
//!
//! Archives are CSV files with one row per serialised record, the header row
//! being taken from the record's field names in declaration order.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    writer: Writer<Box<dyn Write + Send>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot open the archive file {0:?}: {1}")]
    OpenError(PathBuf, std::io::Error),

    #[error("Cannot serialise the record: {0}")]
    SerialiseError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    ///
    /// Missing parent directories are created and any existing file is
    /// truncated.
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, ArchiveError> {
        let session_path = session.arch_root.join(path);

        if let Some(parent) = session_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArchiveError::OpenError(session_path.clone(), e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&session_path)
            .map_err(|e| ArchiveError::OpenError(session_path.clone(), e))?;

        Ok(Self::from_writer(file))
    }

    /// Create a new archiver writing into any writer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        let boxed: Box<dyn Write + Send> = Box::new(writer);

        Self {
            writer: WriterBuilder::new().has_headers(true).from_writer(boxed),
        }
    }

    /// Serialise a record into the archive.
    ///
    /// The header is written before the first record.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer
            .serialize(record)
            .map_err(ArchiveError::SerialiseError)?;
        self.flush()
    }

    /// Flush any buffered records to the underlying writer.
    pub fn flush(&mut self) -> Result<(), ArchiveError> {
        self.writer.flush().map_err(ArchiveError::FlushError)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
