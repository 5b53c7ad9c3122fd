use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use archive::{ClassHeaderInspector, EntryInspector, Inspector, InspectorSettings, NestedExtractor};
use locator::{ClasspathFinder, DirectoryFinder, Finder};
use model::{Candidate, Registries};

use crate::bootstrap::{BootstrapOutcome, BootstrapPass};
use crate::config::DiscoveryConfig;
use crate::discover::{Discoverer, Discovery};
use crate::error::DiscoveryError;
use crate::ordering::OrderingPolicy;
use crate::sorter::DuplicateSorter;

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub bootstrap: BootstrapOutcome,
    pub discovery: Discovery,
    /// Conflict-free candidates handed to the host, ordered by identifier.
    pub activation: Vec<Candidate>,
    /// Files disabled by either pass.
    pub disabled_files: BTreeSet<String>,
    /// Activated archives without inspectable entries.
    pub libraries: Vec<PathBuf>,
}

/// Bootstrap pass, full discovery and duplicate resolution wired together
/// from one [`DiscoveryConfig`].
pub struct Pipeline {
    config: DiscoveryConfig,
    registries: Arc<Registries>,
    inspector: Arc<Inspector>,
}

impl Pipeline {
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Self::with_entry_inspector(config, Arc::new(ClassHeaderInspector))
    }

    pub fn with_entry_inspector(
        config: DiscoveryConfig,
        entries: Arc<dyn EntryInspector>,
    ) -> Result<Self, DiscoveryError> {
        let nested_dir = config.nested_dir();
        let extractor = NestedExtractor::new(&nested_dir).map_err(|source| DiscoveryError::Io {
            path: nested_dir.clone(),
            source,
        })?;
        let registries = Arc::new(Registries::new());
        let settings = InspectorSettings {
            side: config.side,
            plugin_type: config.plugin_type.clone(),
        };
        let inspector = Arc::new(Inspector::new(
            settings,
            Arc::new(extractor),
            entries,
            Arc::clone(&registries),
        ));
        Ok(Self {
            config,
            registries,
            inspector,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    fn directory_finder(&self) -> DirectoryFinder {
        DirectoryFinder::new(
            &self.config.plugin_dir,
            self.config.archive_extension.clone(),
            Arc::clone(&self.registries),
        )
        .with_host_version(self.config.host_version.clone())
        .with_additional(self.config.additional_archives.clone())
    }

    fn finders(&self) -> Vec<Finder> {
        let mut finders = Vec::new();
        if !self.config.classpath.is_empty() {
            let mut classpath = ClasspathFinder::new(
                self.config.classpath.clone(),
                self.config.archive_extension.clone(),
                Arc::clone(&self.registries),
            )
            .with_runtime_home(self.config.runtime_home.clone());
            if let Some(prefixes) = &self.config.default_library_prefixes {
                classpath = classpath.with_library_prefixes(prefixes.clone());
            }
            finders.push(Finder::Classpath(classpath));
        }
        finders.push(Finder::Directory(self.directory_finder()));
        finders
    }

    pub fn bootstrap(&self) -> Result<BootstrapOutcome, DiscoveryError> {
        BootstrapPass::new(
            Arc::clone(&self.inspector),
            self.config.preloaded_core_plugins.iter().cloned(),
            self.config.conflict_policy,
        )
        .run(&self.directory_finder())
    }

    /// Runs full discovery without a bootstrap pass.
    pub fn discover(&self) -> Result<Discovery, DiscoveryError> {
        Discoverer::new(
            Arc::clone(&self.inspector),
            self.config.thread_count(),
            self.config.timeout(),
        )
        .discover(&self.finders())
    }

    pub fn run(&self) -> Result<PipelineOutcome, DiscoveryError> {
        let bootstrap = self.bootstrap()?;
        let discovery = self.discover()?;
        let candidates: Vec<Candidate> = discovery.candidates().cloned().collect();
        let resolution = DuplicateSorter::new(self.config.conflict_policy)
            .resolve(candidates, OrderingPolicy::Full)?;

        let libraries = resolution
            .survivors
            .iter()
            .filter(|c| c.is_library())
            .map(|c| c.file.clone())
            .collect();
        let mut disabled_files = bootstrap.disabled_files.clone();
        disabled_files.extend(resolution.disabled_files.iter().cloned());
        info!(
            activated = resolution.survivors.len(),
            disabled = disabled_files.len(),
            "Plugin resolution finished"
        );
        Ok(PipelineOutcome {
            bootstrap,
            discovery,
            activation: resolution.survivors,
            disabled_files,
            libraries,
        })
    }
}
