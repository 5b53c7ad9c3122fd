//! Discovery engine: scans plugin archives in parallel, builds the candidate
//! graph and resolves duplicate identifiers into one activation list.

pub mod bootstrap;
pub mod config;
pub mod discover;
pub mod error;
pub mod ordering;
pub mod pipeline;
pub mod sorter;
mod task;

pub use bootstrap::{BootstrapOutcome, BootstrapPass};
pub use config::{ConflictPolicy, DiscoveryConfig, DEBUG_TIMEOUT_SECS, THREADS_ENV};
pub use discover::{Discoverer, Discovery, DiscoveryStats, PathFilter};
pub use error::{DiscoveryError, TaskFailure, TIMEOUT_ENV, TIMEOUT_KNOB};
pub use ordering::{OrderingPolicy, SortableCandidate};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use sorter::{DuplicateSorter, Resolution};
