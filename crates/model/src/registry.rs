use std::collections::{BTreeSet, HashSet};
use std::sync::RwLock;

/// Shared bookkeeping between the bootstrap pass, the providers and the full
/// discovery pass.
///
/// `disabled_files` holds archive file names that lost a duplicate conflict;
/// the directory provider skips them. `examined` holds file names the
/// bootstrap pass already looked at and rejected or loaded, which the
/// classpath provider skips.
#[derive(Debug, Default)]
pub struct Registries {
    disabled_files: RwLock<HashSet<String>>,
    examined: RwLock<HashSet<String>>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disabled(&self, file_name: &str) -> bool {
        self.disabled_files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(file_name)
    }

    pub fn disable_all<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = self.disabled_files.write().unwrap_or_else(|e| e.into_inner());
        set.extend(names.into_iter().map(Into::into));
    }

    pub fn disabled_files(&self) -> BTreeSet<String> {
        self.disabled_files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Records `file_name` as examined. Returns `false` when it already was.
    pub fn mark_examined(&self, file_name: impl Into<String>) -> bool {
        self.examined
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(file_name.into())
    }

    pub fn is_examined(&self, file_name: &str) -> bool {
        self.examined
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(file_name)
    }

    pub fn examined(&self) -> BTreeSet<String> {
        self.examined
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
