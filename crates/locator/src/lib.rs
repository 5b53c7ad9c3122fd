//! Search-location providers.
//!
//! Providers hand raw archive paths to a [`CandidateSink`]. They never open
//! archives themselves.

pub mod classpath;
pub mod directory;
pub mod libraries;
pub mod path;

pub use classpath::ClasspathFinder;
pub use directory::DirectoryFinder;
pub use libraries::{is_default_library, DEFAULT_LIBRARY_PREFIXES};
pub use path::PathNormalizer;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Where a batch of paths came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceFlags {
    /// Archives that the host has to relocate before activation.
    pub requires_relocation: bool,
    pub is_host_runtime: bool,
    pub is_classpath_source: bool,
}

/// Receives the paths found by a provider.
pub trait CandidateSink {
    fn accept(&mut self, paths: Vec<PathBuf>, flags: SourceFlags);
}

impl CandidateSink for Vec<(PathBuf, SourceFlags)> {
    fn accept(&mut self, paths: Vec<PathBuf>, flags: SourceFlags) {
        self.extend(paths.into_iter().map(|p| (p, flags)));
    }
}

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("search location {} is not a directory", .path.display())]
    NotADirectory { path: PathBuf },
    #[error("{} looks like an extracted archive; install the archive file instead", .path.display())]
    ExtractedArchiveDirectory { path: PathBuf },
    #[error("I/O error while searching {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A source of candidate archive paths.
pub trait CandidateFinder {
    fn find_candidates(&self, sink: &mut dyn CandidateSink) -> Result<(), LocatorError>;
}

/// The provider variants discovery knows about.
#[derive(Debug, Clone)]
pub enum Finder {
    Classpath(ClasspathFinder),
    Directory(DirectoryFinder),
}

impl CandidateFinder for Finder {
    fn find_candidates(&self, sink: &mut dyn CandidateSink) -> Result<(), LocatorError> {
        match self {
            Finder::Classpath(f) => f.find_candidates(sink),
            Finder::Directory(f) => f.find_candidates(sink),
        }
    }
}

impl From<ClasspathFinder> for Finder {
    fn from(f: ClasspathFinder) -> Self {
        Finder::Classpath(f)
    }
}

impl From<DirectoryFinder> for Finder {
    fn from(f: DirectoryFinder) -> Self {
        Finder::Directory(f)
    }
}
