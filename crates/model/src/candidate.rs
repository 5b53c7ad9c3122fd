use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::hash::ContentHash;
use crate::metadata::MetadataCollection;
use crate::version::{self, Version};

/// Stable index of a [`Candidate`] inside a [`crate::CandidateGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub usize);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Archive extracted from the entries of a parent archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedArchiveRef {
    /// Location of the extracted copy in the nested cache directory.
    pub file: PathBuf,
    /// Entry path declared by the parent, e.g. `META-INF/libs/core-1.0.jar`.
    pub declared_path: String,
    /// Logical file name of the declared entry, used for identifier fallback.
    pub source_filename: String,
    pub content_hash: ContentHash,
}

/// Structural description of one archive entry produced by an entry inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// One discovered archive considered as a potential plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Identifier used for duplicate detection.
    pub id: String,
    pub version: Version,
    /// Backing archive. For nested candidates this is the extracted copy.
    pub file: PathBuf,
    /// Declared file name inside the parent archive, for nested candidates.
    #[serde(default)]
    pub source_filename: Option<String>,
    /// Digest of the archive bytes. Only nested candidates carry one.
    #[serde(default)]
    pub content_hash: Option<ContentHash>,
    #[serde(default)]
    pub nested_archives: Vec<NestedArchiveRef>,
    #[serde(default)]
    pub tweaker: Option<String>,
    /// Tiebreak used when ordering candidates for activation.
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub core_plugin: Option<String>,
    #[serde(default)]
    pub contains_primary_artifact: bool,
    #[serde(default)]
    pub is_host_runtime: bool,
    #[serde(default)]
    pub is_classpath_source: bool,
    /// Access lists keyed by `<archive>!META-INF/<name>`.
    #[serde(default)]
    pub access_lists: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Option<MetadataCollection>,
    #[serde(default)]
    pub entries: Vec<EntryDescriptor>,
    nest_level: u32,
    parents: BTreeSet<crate::CandidateId>,
    children: Vec<crate::CandidateId>,
}

impl Candidate {
    /// Creates a top-level candidate for `file` with the file name as
    /// identifier and version `0.0.0`.
    pub fn new(file: PathBuf) -> Self {
        let id = file_name(&file);
        Self {
            id,
            version: version::zero(),
            file,
            source_filename: None,
            content_hash: None,
            nested_archives: Vec::new(),
            tweaker: None,
            sort_order: 0,
            core_plugin: None,
            contains_primary_artifact: false,
            is_host_runtime: false,
            is_classpath_source: false,
            access_lists: BTreeMap::new(),
            metadata: None,
            entries: Vec::new(),
            nest_level: 0,
            parents: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    /// Recomputes [`Candidate::id`] from a declared identifier, falling back
    /// to the declared source file name and then the archive file name.
    pub fn assign_id(&mut self, declared: Option<&str>) {
        self.id = declared
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .or_else(|| self.source_filename.clone())
            .unwrap_or_else(|| file_name(&self.file));
    }

    /// Name used for the disabled-files registry and for ordering.
    pub fn filename(&self) -> String {
        self.source_filename
            .clone()
            .unwrap_or_else(|| file_name(&self.file))
    }

    pub fn has_tweaker(&self) -> bool {
        self.tweaker.is_some()
    }

    pub fn has_core_plugin(&self) -> bool {
        self.core_plugin.is_some()
    }

    pub fn has_nested_archives(&self) -> bool {
        !self.nested_archives.is_empty()
    }

    pub fn nest_level(&self) -> u32 {
        self.nest_level
    }

    pub fn is_nested(&self) -> bool {
        self.nest_level > 0
    }

    pub fn parents(&self) -> &BTreeSet<CandidateId> {
        &self.parents
    }

    pub fn children(&self) -> &[CandidateId] {
        &self.children
    }

    /// A scanned archive without inspectable entries that is not part of the
    /// host classpath. Hosts add these as plain libraries.
    pub fn is_library(&self) -> bool {
        self.entries.is_empty() && !self.is_classpath_source
    }

    pub(crate) fn reset_edges(&mut self) {
        self.nest_level = 0;
        self.parents.clear();
        self.children.clear();
    }

    pub(crate) fn set_nest_level(&mut self, level: u32) {
        self.nest_level = level;
    }

    pub(crate) fn add_parent(&mut self, parent: CandidateId) -> bool {
        self.parents.insert(parent)
    }

    pub(crate) fn add_child(&mut self, child: CandidateId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
