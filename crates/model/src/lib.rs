//! Main types describing discovered plugin archives.
//!
//! A [`Candidate`] is one archive that may be activated by a host. Candidates
//! live in a [`CandidateGraph`] arena and refer to each other through
//! [`CandidateId`] indices, so an archive nested in several parents is stored
//! once and carries one parent edge per owner.

pub mod candidate;
pub mod graph;
pub mod hash;
pub mod metadata;
pub mod registry;
pub mod version;

pub use candidate::{Candidate, CandidateId, EntryDescriptor, NestedArchiveRef};
pub use graph::CandidateGraph;
pub use hash::ContentHash;
pub use metadata::{DeclaredPlugin, MetadataCollection};
pub use registry::Registries;
pub use version::{guess_version, parse_lenient, version_from_filename, Version};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of the host process a candidate is meant for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Client,
    Server,
}

impl Side {
    /// Value used by the side attribute of an archive manifest.
    pub fn as_attribute(&self) -> &'static str {
        match self {
            Side::Client => "CLIENT",
            Side::Server => "SERVER",
        }
    }

    /// Whether a declared side attribute allows loading on this side.
    /// `BOTH` matches every side.
    pub fn accepts(&self, declared: &str) -> bool {
        declared == "BOTH" || declared == self.as_attribute()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_attribute())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            other => Err(format!("unknown side: {other}")),
        }
    }
}
