use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::config::ConflictPolicy;
use crate::error::DiscoveryError;
use crate::ordering::{OrderingPolicy, SortableCandidate};

/// Outcome of duplicate resolution.
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    /// One candidate per identifier, in policy order.
    pub survivors: Vec<T>,
    /// Losers of a conflict, in policy order.
    pub disabled: Vec<T>,
    pub disabled_files: BTreeSet<String>,
}

/// Keeps the preferred version of every identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateSorter {
    policy: ConflictPolicy,
}

impl DuplicateSorter {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// Visits `candidates` in `ordering` and keeps, per identifier, the first
    /// candidate with the highest version. A later candidate replaces the
    /// current best only with a strictly greater version.
    ///
    /// Under [`ConflictPolicy::Strict`] two candidates with equal identifier
    /// and version fail the resolution unless both carry the same content
    /// hash.
    pub fn resolve<T: SortableCandidate>(
        &self,
        mut candidates: Vec<T>,
        ordering: OrderingPolicy,
    ) -> Result<Resolution<T>, DiscoveryError> {
        candidates.sort_by(|a, b| ordering.compare(a, b));
        let mut best: HashMap<&str, usize> = HashMap::new();
        let mut disabled = vec![false; candidates.len()];

        for (index, candidate) in candidates.iter().enumerate() {
            let Some(&current) = best.get(candidate.id()) else {
                best.insert(candidate.id(), index);
                continue;
            };
            let kept = &candidates[current];
            if kept.version() < candidate.version() {
                log_disable(candidate, kept);
                disabled[current] = true;
                best.insert(candidate.id(), index);
                continue;
            }
            if kept.version() == candidate.version()
                && self.policy == ConflictPolicy::Strict
                && !same_content(kept, candidate)
            {
                return Err(DiscoveryError::CriticalResolution {
                    id: candidate.id().to_string(),
                    version: candidate.version().clone(),
                    files: vec![kept.filename(), candidate.filename()],
                });
            }
            log_disable(kept, candidate);
            disabled[index] = true;
        }

        let mut survivors = Vec::new();
        let mut losers = Vec::new();
        let mut disabled_files = BTreeSet::new();
        for (candidate, off) in candidates.into_iter().zip(disabled) {
            if off {
                disabled_files.insert(candidate.filename());
                losers.push(candidate);
            } else {
                survivors.push(candidate);
            }
        }
        Ok(Resolution {
            survivors,
            disabled: losers,
            disabled_files,
        })
    }
}

fn same_content<T: SortableCandidate>(a: &T, b: &T) -> bool {
    matches!((a.content_hash(), b.content_hash()), (Some(x), Some(y)) if x == y)
}

fn log_disable<T: SortableCandidate>(kept: &T, dropped: &T) {
    warn!(
        id = kept.id(),
        kept_version = %kept.version(),
        kept_file = %kept.filename(),
        disabled_version = %dropped.version(),
        disabled_file = %dropped.filename(),
        "Disabling duplicate plugin"
    );
}
