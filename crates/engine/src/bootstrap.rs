use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use archive::{InspectOptions, Inspector, ScannedCandidate};
use locator::DirectoryFinder;
use model::{Candidate, CandidateGraph, CandidateId, ContentHash};

use crate::config::ConflictPolicy;
use crate::error::DiscoveryError;
use crate::ordering::OrderingPolicy;
use crate::sorter::DuplicateSorter;

/// Result of the bootstrap pass.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapOutcome {
    /// Every candidate found, nested ones linked to their parents.
    pub graph: CandidateGraph,
    /// Surviving core plugins and tweakers in activation order.
    pub activated: Vec<Candidate>,
    pub disabled_files: BTreeSet<String>,
    /// Access lists of the surviving candidates.
    pub access_lists: BTreeMap<String, String>,
}

/// Early pass over the plugin directory that finds core plugins and
/// tweakers before full discovery runs.
pub struct BootstrapPass {
    inspector: Arc<Inspector>,
    preloaded: HashSet<String>,
    conflicts: ConflictPolicy,
}

impl BootstrapPass {
    pub fn new(inspector: Arc<Inspector>, preloaded: impl IntoIterator<Item = String>, conflicts: ConflictPolicy) -> Self {
        Self {
            inspector,
            preloaded: preloaded.into_iter().collect(),
            conflicts,
        }
    }

    /// Inspects every archive `finder` lists, resolves duplicates and marks
    /// the losers disabled so the full pass skips them.
    pub fn run(&self, finder: &DirectoryFinder) -> Result<BootstrapOutcome, DiscoveryError> {
        let mut archives = finder.checked_archives()?;
        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        info!(path = %finder.dir().display(), archives = archives.len(), "Bootstrap pass");

        let registries = self.inspector.registries();
        let mut graph = CandidateGraph::new();
        let mut by_hash = HashMap::new();
        for path in &archives {
            match self.inspector.inspect(path, None, InspectOptions::bootstrap()) {
                Ok(Some(scanned)) => {
                    if let Some(core) = scanned.candidate.core_plugin.as_deref() {
                        if self.preloaded.contains(core) {
                            info!(path = %path.display(), core_plugin = core, "Core plugin already loaded by the host");
                            registries.mark_examined(scanned.candidate.filename());
                            continue;
                        }
                    }
                    insert_tree(&mut graph, &mut by_hash, scanned, None);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Skipping unreadable archive");
                }
            }
        }

        let candidates: Vec<Candidate> = graph.iter().map(|(_, c)| c.clone()).collect();
        let resolution =
            DuplicateSorter::new(self.conflicts).resolve(candidates, OrderingPolicy::Bootstrap)?;
        registries.disable_all(resolution.disabled_files.iter().cloned());

        let mut activated = Vec::new();
        let mut access_lists = BTreeMap::new();
        for candidate in resolution.survivors {
            access_lists.extend(candidate.access_lists.clone());
            if candidate.has_core_plugin() || candidate.has_tweaker() {
                registries.mark_examined(candidate.filename());
                activated.push(candidate);
            }
        }
        info!(
            found = graph.len(),
            activated = activated.len(),
            disabled = resolution.disabled_files.len(),
            "Bootstrap pass finished"
        );
        Ok(BootstrapOutcome {
            graph,
            activated,
            disabled_files: resolution.disabled_files,
            access_lists,
        })
    }
}

/// Adds a bootstrap tree to `graph`. Nested candidates with a content hash
/// already in the graph are linked instead of inserted again.
fn insert_tree(
    graph: &mut CandidateGraph,
    by_hash: &mut HashMap<ContentHash, CandidateId>,
    scanned: ScannedCandidate,
    parent: Option<CandidateId>,
) {
    let ScannedCandidate { candidate, nested } = scanned;
    let existing = candidate
        .content_hash
        .as_ref()
        .and_then(|h| by_hash.get(h).copied());
    let (id, fresh) = match existing {
        Some(id) => (id, false),
        None => {
            let hash = candidate.content_hash.clone();
            let id = graph.insert(candidate);
            if let Some(hash) = hash {
                by_hash.insert(hash, id);
            }
            (id, true)
        }
    };
    if let Some(parent) = parent {
        graph.link(parent, id);
    }
    if fresh {
        for child in nested {
            insert_tree(graph, by_hash, child, Some(id));
        }
    }
}
