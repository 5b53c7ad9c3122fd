use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, error, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use model::{ContentHash, NestedArchiveRef};

use crate::buffer::ContentBuffer;

type MemoKey = (PathBuf, String);
type MemoCell = Arc<OnceLock<Option<NestedArchiveRef>>>;

/// Counters describing extractor activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Files written to the cache directory.
    pub written: usize,
    /// Extractions skipped because the content-addressed target existed.
    pub already_present: usize,
    /// Requests answered from the (parent, entry) memo.
    pub memo_hits: usize,
}

/// Copies nested archives into a content-addressed cache directory.
///
/// Each (parent archive, declared entry) pair is extracted at most once per
/// extractor; concurrent requests for the same pair wait for the first one.
/// Targets are named `<stem>-<hash>.<ext>` and written under one global lock
/// only when missing, so identical bytes declared by different parents end up
/// in a single file.
pub struct NestedExtractor {
    target_dir: PathBuf,
    write_lock: Mutex<()>,
    memo: Mutex<HashMap<MemoKey, MemoCell>>,
    written: AtomicUsize,
    already_present: AtomicUsize,
    memo_hits: AtomicUsize,
}

impl NestedExtractor {
    pub fn new(target_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let target_dir = target_dir.into();
        fs::create_dir_all(&target_dir)?;
        Ok(Self {
            target_dir,
            write_lock: Mutex::new(()),
            memo: Mutex::new(HashMap::new()),
            written: AtomicUsize::new(0),
            already_present: AtomicUsize::new(0),
            memo_hits: AtomicUsize::new(0),
        })
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats {
            written: self.written.load(Ordering::Relaxed),
            already_present: self.already_present.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
        }
    }

    /// Extracts `declared` from `archive`, the opened form of `parent`.
    ///
    /// Returns `None` when the entry is missing or cannot be copied; the
    /// parent archive stays usable either way.
    pub fn extract<R: Read + Seek>(
        &self,
        parent: &Path,
        archive: &mut ZipArchive<R>,
        declared: &str,
    ) -> Option<NestedArchiveRef> {
        let cell = {
            let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            match memo.entry((parent.to_path_buf(), declared.to_string())) {
                Entry::Occupied(e) => {
                    self.memo_hits.fetch_add(1, Ordering::Relaxed);
                    Arc::clone(e.get())
                }
                Entry::Vacant(v) => Arc::clone(v.insert(Arc::new(OnceLock::new()))),
            }
        };
        cell.get_or_init(|| self.extract_uncached(parent, archive, declared))
            .clone()
    }

    fn extract_uncached<R: Read + Seek>(
        &self,
        parent: &Path,
        archive: &mut ZipArchive<R>,
        declared: &str,
    ) -> Option<NestedArchiveRef> {
        let mut entry = match archive.by_name(declared) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                warn!(archive = %parent.display(), entry = declared, "Declared nested archive not found");
                return None;
            }
            Err(e) => {
                error!(archive = %parent.display(), entry = declared, error = %e, "Failed to open nested archive");
                return None;
            }
        };
        let size = entry.size();
        let mut buffer = match ContentBuffer::read_from(&mut entry, Some(size)) {
            Ok(buffer) => buffer,
            Err(e) => {
                error!(archive = %parent.display(), entry = declared, error = %e, "Failed to read nested archive");
                return None;
            }
        };
        let content_hash = buffer.content_hash();
        let source_filename = declared.rsplit('/').next().unwrap_or(declared).to_string();
        let target = self.target_dir.join(target_name(&source_filename, &content_hash));
        if let Err(e) = self.persist(&mut buffer, &target) {
            error!(path = %target.display(), error = %e, "Failed to write nested archive");
            return None;
        }
        Some(NestedArchiveRef {
            file: target,
            declared_path: declared.to_string(),
            source_filename,
            content_hash,
        })
    }

    fn persist(&self, buffer: &mut ContentBuffer, target: &Path) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if target.exists() {
            self.already_present.fetch_add(1, Ordering::Relaxed);
            debug!(path = %target.display(), "Nested archive already extracted");
            return Ok(());
        }
        // Renamed into place so an interrupted write never looks complete.
        let partial = target.with_extension("partial");
        let mut file = fs::File::create(&partial)?;
        buffer.copy_to(&mut file)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&partial, target)?;
        self.written.fetch_add(1, Ordering::Relaxed);
        info!(path = %target.display(), bytes = buffer.len(), "Extracted nested archive");
        Ok(())
    }
}

fn target_name(source_filename: &str, hash: &ContentHash) -> String {
    let path = Path::new(source_filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_filename.to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jar".to_string());
    format!("{stem}-{hash}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::zip_bytes;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn open(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn identical_content_is_written_once() {
        let tmp = TempDir::new().unwrap();
        let ex = NestedExtractor::new(tmp.path().join("nested")).unwrap();
        let inner = zip_bytes(&[("a.txt", b"shared")]);
        let mut first = open(zip_bytes(&[("META-INF/libs/lib-1.0.jar", &inner)]));
        let mut second = open(zip_bytes(&[("libs/lib-1.0.jar", &inner)]));

        let a = ex
            .extract(Path::new("first.jar"), &mut first, "META-INF/libs/lib-1.0.jar")
            .unwrap();
        let b = ex
            .extract(Path::new("second.jar"), &mut second, "libs/lib-1.0.jar")
            .unwrap();

        assert_eq!(a.file, b.file);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.source_filename, "lib-1.0.jar");
        assert_eq!(fs::read(&a.file).unwrap(), inner);
        assert_eq!(fs::read_dir(ex.target_dir()).unwrap().count(), 1);
        let stats = ex.stats();
        assert_eq!((stats.written, stats.already_present), (1, 1));
        let name = a.file.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("lib-1.0-{}.jar", a.content_hash));
    }

    #[test]
    fn repeated_requests_hit_the_memo() {
        let tmp = TempDir::new().unwrap();
        let ex = NestedExtractor::new(tmp.path()).unwrap();
        let inner = zip_bytes(&[("x", b"1")]);
        let mut parent = open(zip_bytes(&[("in.jar", &inner)]));
        let p = Path::new("parent.jar");
        let a = ex.extract(p, &mut parent, "in.jar");
        let b = ex.extract(p, &mut parent, "in.jar");
        assert_eq!(a, b);
        assert_eq!(ex.stats().memo_hits, 1);
        assert_eq!(ex.stats().written, 1);
    }

    #[test]
    fn missing_entry_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let ex = NestedExtractor::new(tmp.path()).unwrap();
        let mut parent = open(zip_bytes(&[("present.txt", b"x")]));
        assert!(ex
            .extract(Path::new("p.jar"), &mut parent, "absent.jar")
            .is_none());
        assert_eq!(ex.stats(), ExtractionStats::default());
    }
}
