use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use model::metadata::METADATA_ENTRY;
use model::{
    guess_version, Candidate, ContentHash, MetadataCollection, NestedArchiveRef, Registries, Side,
};

use crate::entry::{EntryError, EntryInspector};
use crate::extract::NestedExtractor;
use crate::manifest::{attr, Manifest, MANIFEST_PATH};
use crate::InspectError;

/// Type every plugin archive is assumed to have when none is declared.
pub const DEFAULT_PLUGIN_TYPE: &str = "PLUGIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPass {
    /// Early pass over core plugins and tweakers. Nested archives are
    /// resolved inline and entries are not inspected.
    Bootstrap,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    pub pass: ScanPass,
    pub is_host_runtime: bool,
    pub is_classpath_source: bool,
}

impl InspectOptions {
    pub fn full() -> Self {
        Self {
            pass: ScanPass::Full,
            is_host_runtime: false,
            is_classpath_source: false,
        }
    }

    pub fn bootstrap() -> Self {
        Self {
            pass: ScanPass::Bootstrap,
            ..Self::full()
        }
    }

    fn nested(self) -> Self {
        Self {
            pass: self.pass,
            is_host_runtime: false,
            is_classpath_source: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorSettings {
    pub side: Side,
    pub plugin_type: String,
}

impl Default for InspectorSettings {
    fn default() -> Self {
        Self {
            side: Side::default(),
            plugin_type: DEFAULT_PLUGIN_TYPE.to_string(),
        }
    }
}

/// A candidate together with the nested candidates resolved inline during
/// the bootstrap pass. Always empty for full-pass results.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedCandidate {
    pub candidate: Candidate,
    pub nested: Vec<ScannedCandidate>,
}

/// Opens single archives and builds candidates from them.
pub struct Inspector {
    settings: InspectorSettings,
    extractor: Arc<NestedExtractor>,
    entries: Arc<dyn EntryInspector>,
    registries: Arc<Registries>,
    inspected: AtomicUsize,
}

impl Inspector {
    pub fn new(
        settings: InspectorSettings,
        extractor: Arc<NestedExtractor>,
        entries: Arc<dyn EntryInspector>,
        registries: Arc<Registries>,
    ) -> Self {
        Self {
            settings,
            extractor,
            entries,
            registries,
            inspected: AtomicUsize::new(0),
        }
    }

    pub fn extractor(&self) -> &Arc<NestedExtractor> {
        &self.extractor
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// Number of archives opened so far, nested ones included.
    pub fn inspected(&self) -> usize {
        self.inspected.load(Ordering::Relaxed)
    }

    /// Inspects the archive at `path`.
    ///
    /// `origin` describes where a nested archive was extracted from. `None`
    /// is returned for archives filtered out by type or side, and for
    /// archives without a manifest during the bootstrap pass.
    pub fn inspect(
        &self,
        path: &Path,
        origin: Option<&NestedArchiveRef>,
        options: InspectOptions,
    ) -> Result<Option<ScannedCandidate>, InspectError> {
        let mut visited = HashSet::new();
        if let Some(origin) = origin {
            visited.insert(origin.content_hash.clone());
        }
        self.inspect_inner(path, origin, options, &mut visited)
    }

    fn inspect_inner(
        &self,
        path: &Path,
        origin: Option<&NestedArchiveRef>,
        options: InspectOptions,
        visited: &mut HashSet<ContentHash>,
    ) -> Result<Option<ScannedCandidate>, InspectError> {
        self.inspected.fetch_add(1, Ordering::Relaxed);
        debug!(path = %path.display(), pass = ?options.pass, "Inspecting archive");
        let file = File::open(path).map_err(|source| InspectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| archive_error(path, source))?;

        let manifest = match read_text(&mut archive, MANIFEST_PATH, path)? {
            Some(text) => Manifest::parse(&text),
            None if options.pass == ScanPass::Bootstrap => {
                debug!(path = %path.display(), "No manifest, skipping");
                return Ok(None);
            }
            None => Manifest::default(),
        };

        let mut candidate = Candidate::new(path.to_path_buf());
        if let Some(origin) = origin {
            candidate.source_filename = Some(origin.source_filename.clone());
            candidate.content_hash = Some(origin.content_hash.clone());
        }
        candidate.is_host_runtime = options.is_host_runtime;
        candidate.is_classpath_source = options.is_classpath_source;
        candidate.tweaker = manifest.get(attr::TWEAK_CLASS).map(str::to_string);
        candidate.core_plugin = manifest.get(attr::CORE_PLUGIN).map(str::to_string);

        if !self.passes_filters(&manifest, &candidate, options.pass) {
            return Ok(None);
        }

        candidate.sort_order = manifest
            .get(attr::TWEAK_ORDER)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let force_load = manifest.contains(attr::FORCE_LOAD);
        candidate.contains_primary_artifact = manifest.contains(attr::CONTAINS_PLUGIN) || force_load;

        candidate.metadata = match read_text(&mut archive, METADATA_ENTRY, path)? {
            Some(text) => match MetadataCollection::from_json(text.as_bytes()) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable plugin metadata");
                    None
                }
            },
            None => None,
        };
        let declared_versions = manifest
            .get(attr::PLUGIN_VERSION)
            .into_iter()
            .chain(candidate.metadata.iter().flat_map(|m| m.declared_versions()));
        candidate.version = guess_version(declared_versions, &candidate.filename());

        let declared_id = manifest
            .get(attr::PLUGIN_ID)
            .or(candidate.core_plugin.as_deref())
            .map(str::to_string);
        candidate.assign_id(declared_id.as_deref());

        // A tweaker only loaded for its tweak class brings nothing else along.
        if options.pass == ScanPass::Full && candidate.has_tweaker() && !force_load {
            debug!(path = %path.display(), "Tweak-only archive");
            return Ok(Some(ScannedCandidate {
                candidate,
                nested: Vec::new(),
            }));
        }

        for declared in manifest.list(attr::NESTED_ARCHIVES) {
            if let Some(nested) = self.extractor.extract(path, &mut archive, &declared) {
                candidate.nested_archives.push(nested);
            }
        }

        let mut nested = Vec::new();
        match options.pass {
            ScanPass::Bootstrap => {
                self.collect_access_lists(&mut archive, &manifest, &mut candidate, path)?;
                for reference in candidate.nested_archives.clone() {
                    if !visited.insert(reference.content_hash.clone()) {
                        continue;
                    }
                    match self.inspect_inner(&reference.file, Some(&reference), options.nested(), visited) {
                        Ok(Some(child)) => nested.push(child),
                        Ok(None) => {}
                        Err(e) => {
                            error!(archive = %path.display(), nested = %reference.source_filename, error = %e, "Skipping unreadable nested archive");
                        }
                    }
                }
            }
            ScanPass::Full => self.inspect_entries(&mut archive, &mut candidate, path)?,
        }

        Ok(Some(ScannedCandidate { candidate, nested }))
    }

    fn passes_filters(&self, manifest: &Manifest, candidate: &Candidate, pass: ScanPass) -> bool {
        let types = manifest.list(attr::TYPES);
        if !types.is_empty()
            && !types.iter().any(|t| t == &self.settings.plugin_type)
            && (!candidate.has_tweaker() || pass != ScanPass::Bootstrap)
        {
            debug!(path = %candidate.file.display(), types = ?types, "Archive does not declare the plugin type");
            self.reject(candidate, pass);
            return false;
        }
        if let Some(side) = manifest.get(attr::SIDE) {
            if !self.settings.side.accepts(side) {
                debug!(path = %candidate.file.display(), side, running = %self.settings.side, "Archive is for another side");
                self.reject(candidate, pass);
                return false;
            }
        }
        true
    }

    fn reject(&self, candidate: &Candidate, pass: ScanPass) {
        if pass == ScanPass::Bootstrap {
            self.registries.mark_examined(candidate.filename());
        }
    }

    fn collect_access_lists<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        manifest: &Manifest,
        candidate: &mut Candidate,
        path: &Path,
    ) -> Result<(), InspectError> {
        for name in manifest.list(attr::ACCESS_LIST) {
            let entry = format!("META-INF/{name}");
            match read_text(archive, &entry, path)? {
                Some(text) => {
                    let key = format!("{}!{}", candidate.filename(), entry);
                    candidate.access_lists.insert(key, text);
                }
                None => {
                    warn!(path = %path.display(), entry = %entry, "Declared access list not found");
                }
            }
        }
        Ok(())
    }

    fn inspect_entries<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        candidate: &mut Candidate,
        path: &Path,
    ) -> Result<(), InspectError> {
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|source| archive_error(path, source))?;
            let name = entry.name().to_string();
            if entry.is_dir() || name.starts_with("__MACOSX") || !self.entries.accepts(&name) {
                continue;
            }
            let size = entry.size();
            match self.entries.inspect(&name, size, &mut entry) {
                Ok(descriptor) => candidate.entries.push(descriptor),
                Err(EntryError::Corrupt { name, reason }) => {
                    return Err(InspectError::CorruptEntry {
                        path: path.to_path_buf(),
                        entry: name,
                        reason,
                    })
                }
                Err(EntryError::Io { source, .. }) => {
                    return Err(InspectError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}

fn archive_error(path: &Path, source: ZipError) -> InspectError {
    match source {
        ZipError::Io(source) => InspectError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => InspectError::Archive {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// Reads a text entry, `None` when the archive has no such entry.
fn read_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    path: &Path,
) -> Result<Option<String>, InspectError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(source) => return Err(archive_error(path, source)),
    };
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|source| InspectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}
