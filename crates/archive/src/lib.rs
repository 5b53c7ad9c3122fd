//! Reading plugin archives.
//!
//! [`Inspector`] turns one archive on disk into a [`model::Candidate`],
//! [`NestedExtractor`] copies archives declared inside other archives into a
//! content-addressed cache, and [`EntryInspector`] is the seam through which
//! individual entries are described.

pub mod buffer;
pub mod entry;
pub mod extract;
pub mod inspect;
pub mod manifest;

pub use buffer::ContentBuffer;
pub use entry::{ClassHeaderInspector, EntryError, EntryInspector};
pub use extract::{ExtractionStats, NestedExtractor};
pub use inspect::{InspectOptions, Inspector, InspectorSettings, ScanPass, ScannedCandidate};
pub use manifest::{attr, Manifest, MANIFEST_PATH};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to inspect a single archive.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a readable archive: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("corrupt entry {entry} in {}: {reason}", .path.display())]
    CorruptEntry {
        path: PathBuf,
        entry: String,
        reason: String,
    },
}

impl InspectError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            InspectError::Io { path, .. }
            | InspectError::Archive { path, .. }
            | InspectError::CorruptEntry { path, .. } => path,
        }
    }
}
