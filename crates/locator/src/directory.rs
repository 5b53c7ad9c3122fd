use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use model::Registries;

use crate::libraries::has_extension;
use crate::{CandidateFinder, CandidateSink, LocatorError, SourceFlags};

/// Walks one plugin directory, one level deep.
///
/// Also searches the `<dir>/<host_version>` sub-directory when present and a
/// fixed list of additional archives. Links are followed; hidden files,
/// files without the archive extension and files disabled by the bootstrap
/// pass are skipped.
#[derive(Debug, Clone)]
pub struct DirectoryFinder {
    dir: PathBuf,
    host_version: Option<String>,
    additional: Vec<PathBuf>,
    extension: String,
    registries: Arc<Registries>,
}

impl DirectoryFinder {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            dir: dir.into(),
            host_version: None,
            additional: Vec::new(),
            extension: extension.into(),
            registries,
        }
    }

    pub fn with_host_version(mut self, version: Option<String>) -> Self {
        self.host_version = version.filter(|v| !v.is_empty());
        self
    }

    pub fn with_additional(mut self, mut archives: Vec<PathBuf>) -> Self {
        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        self.additional = archives;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directories searched, the version sub-directory included when it
    /// exists. Creates the main directory when missing; returns an empty list
    /// in that case.
    fn search_dirs(&self) -> Result<Vec<PathBuf>, LocatorError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|source| LocatorError::Io {
                path: self.dir.clone(),
                source,
            })?;
            info!(path = %self.dir.display(), "Created plugin directory");
            return Ok(Vec::new());
        }
        if !self.dir.is_dir() {
            return Err(LocatorError::NotADirectory {
                path: self.dir.clone(),
            });
        }
        let mut dirs = vec![self.dir.clone()];
        if let Some(version) = &self.host_version {
            let sub = self.dir.join(version);
            if sub.is_dir() {
                info!(path = %sub.display(), "Also searching version directory");
                dirs.push(sub);
            }
        }
        Ok(dirs)
    }

    fn is_valid_file(&self, path: &Path) -> bool {
        // fs::metadata follows links.
        match fs::metadata(path) {
            Ok(m) if m.is_file() => {}
            _ => return false,
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return false;
        };
        if name.starts_with('.') {
            debug!(path = %path.display(), "Hidden file skipped");
            return false;
        }
        if !has_extension(&name, &self.extension) {
            return false;
        }
        if self.registries.is_disabled(&name) {
            debug!(path = %path.display(), "Disabled file skipped");
            return false;
        }
        true
    }

    /// Archives found in the search directories and additional list, in
    /// directory order then file name order.
    pub fn archives(&self) -> Result<Vec<PathBuf>, LocatorError> {
        let mut found = Vec::new();
        for dir in self.search_dirs()? {
            let mut in_dir: Vec<PathBuf> = read_dir_sorted(&dir)?
                .into_iter()
                .filter(|p| self.is_valid_file(p))
                .collect();
            found.append(&mut in_dir);
        }
        for extra in &self.additional {
            if self.is_valid_file(extra) {
                found.push(extra.clone());
            } else {
                warn!(path = %extra.display(), "Additional archive is not a usable file");
            }
        }
        Ok(found)
    }

    /// Same listing as [`DirectoryFinder::archives`], after checking the
    /// search directories for badly installed archives.
    ///
    /// Files named `*.<ext>.zip` are reported. A directory containing
    /// `META-INF` is an unpacked archive and aborts discovery.
    pub fn checked_archives(&self) -> Result<Vec<PathBuf>, LocatorError> {
        let zipped_suffix = format!(".{}.zip", self.extension.to_ascii_lowercase());
        for dir in self.search_dirs()? {
            for path in read_dir_sorted(&dir)? {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                if name.ends_with(&zipped_suffix) {
                    warn!(path = %path.display(), "Archive was renamed to .zip while downloading; rename it back to load it");
                } else if path.is_dir() && path.join("META-INF").exists() {
                    return Err(LocatorError::ExtractedArchiveDirectory { path });
                }
            }
        }
        self.archives()
    }
}

impl CandidateFinder for DirectoryFinder {
    fn find_candidates(&self, sink: &mut dyn CandidateSink) -> Result<(), LocatorError> {
        info!(path = %self.dir.display(), "Searching for plugins");
        let found = self.archives()?;
        debug!(path = %self.dir.display(), count = found.len(), "Directory search finished");
        sink.accept(
            found,
            SourceFlags {
                requires_relocation: true,
                is_host_runtime: false,
                is_classpath_source: false,
            },
        );
        Ok(())
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, LocatorError> {
    let io_err = |source: io::Error| LocatorError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        match entry {
            Ok(e) => paths.push(e.path()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %dir.display(), "Permission denied");
            }
            Err(e) => return Err(io_err(e)),
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}
