use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use model::Registries;

use crate::libraries::{is_default_library, DEFAULT_LIBRARY_PREFIXES};
use crate::{CandidateFinder, CandidateSink, LocatorError, SourceFlags};

/// Submits the host's own classpath roots.
#[derive(Debug, Clone)]
pub struct ClasspathFinder {
    roots: Vec<PathBuf>,
    library_prefixes: Vec<String>,
    runtime_home: Option<PathBuf>,
    extension: String,
    registries: Arc<Registries>,
}

impl ClasspathFinder {
    pub fn new(roots: Vec<PathBuf>, extension: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            roots,
            library_prefixes: DEFAULT_LIBRARY_PREFIXES.iter().map(|s| s.to_string()).collect(),
            runtime_home: None,
            extension: extension.into(),
            registries,
        }
    }

    /// Replaces the default library prefixes.
    pub fn with_library_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.library_prefixes = prefixes;
        self
    }

    /// Installation directory of the host runtime. Everything below it is a
    /// runtime library.
    pub fn with_runtime_home(mut self, home: Option<PathBuf>) -> Self {
        self.runtime_home = home;
        self
    }

    fn is_known_library(&self, path: &Path) -> bool {
        let examined = path
            .file_name()
            .is_some_and(|n| self.registries.is_examined(&n.to_string_lossy()));
        examined
            || is_default_library(
                path,
                self.runtime_home.as_deref(),
                self.library_prefixes.as_slice(),
                &self.extension,
            )
    }
}

impl CandidateFinder for ClasspathFinder {
    fn find_candidates(&self, sink: &mut dyn CandidateSink) -> Result<(), LocatorError> {
        info!(roots = self.roots.len(), "Searching classpath for plugins");
        if let [only] = self.roots.as_slice() {
            if only.is_file() {
                debug!(path = %only.display(), "Single classpath file is the host runtime");
                sink.accept(
                    vec![only.clone()],
                    SourceFlags {
                        requires_relocation: false,
                        is_host_runtime: true,
                        is_classpath_source: true,
                    },
                );
                return Ok(());
            }
        }
        for (index, root) in self.roots.iter().enumerate() {
            if root.is_dir() {
                debug!(path = %root.display(), "Classpath directory ignored");
                continue;
            }
            if !root.is_file() {
                continue;
            }
            if self.is_known_library(root) {
                debug!(path = %root.display(), "Skipping known library");
                continue;
            }
            debug!(path = %root.display(), "Examining classpath file");
            sink.accept(
                vec![root.clone()],
                SourceFlags {
                    requires_relocation: false,
                    is_host_runtime: index == 0,
                    is_classpath_source: true,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, b"PK").unwrap();
        p
    }

    fn run(finder: &ClasspathFinder) -> Vec<(PathBuf, SourceFlags)> {
        let mut sink: Vec<(PathBuf, SourceFlags)> = Vec::new();
        finder.find_candidates(&mut sink).unwrap();
        sink
    }

    #[test]
    fn single_file_is_the_host_runtime() {
        let tmp = TempDir::new().unwrap();
        let host = touch(tmp.path(), "guava-17.0.jar");
        let found = run(&ClasspathFinder::new(vec![host.clone()], "jar", Arc::new(Registries::new())));
        assert_eq!(found.len(), 1);
        assert!(found[0].1.is_host_runtime);
        assert!(found[0].1.is_classpath_source);
    }

    #[test]
    fn skips_libraries_directories_and_examined_files() {
        let tmp = TempDir::new().unwrap();
        let host = touch(tmp.path(), "host.jar");
        let lib = touch(tmp.path(), "gson-2.2.4.jar");
        let seen = touch(tmp.path(), "early.jar");
        let plugin = touch(tmp.path(), "plugin.jar");
        let home = tmp.path().join("runtime");
        fs::create_dir_all(&home).unwrap();
        let rt = touch(&home, "rt.jar");

        let reg = Arc::new(Registries::new());
        reg.mark_examined("early.jar");
        let finder = ClasspathFinder::new(
            vec![host.clone(), home.clone(), lib, seen, rt, plugin.clone()],
            "jar",
            reg,
        )
        .with_runtime_home(Some(home));

        let found = run(&finder);
        let paths: Vec<_> = found.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(paths, vec![host, plugin]);
        assert!(found[0].1.is_host_runtime);
        assert!(!found[1].1.is_host_runtime);
    }
}
