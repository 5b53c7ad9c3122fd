use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use model::Side;

use crate::error::TIMEOUT_ENV;

/// Environment variable overriding [`DiscoveryConfig::threads`].
pub const THREADS_ENV: &str = "NESTLOADER_THREADS";

/// Timeout applied by debug runs that did not configure one.
pub const DEBUG_TIMEOUT_SECS: i64 = 60;

/// How equal-version conflicts between duplicates are settled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the candidate seen first and warn.
    #[default]
    Lenient,
    /// Fail when two candidates share identifier and version but are not
    /// known to be byte-identical.
    Strict,
}

/// Settings for one discovery run, usually read from `nestloader.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory holding installed plugin archives.
    pub plugin_dir: PathBuf,
    /// Scan pool size. `None` or 0 uses the available parallelism.
    pub threads: Option<usize>,
    /// Overall bound on the discovery wait. Values `<= 0` disable it.
    pub discovery_timeout_secs: Option<i64>,
    pub side: Side,
    /// Type an archive must declare when it declares any types at all.
    pub plugin_type: String,
    pub archive_extension: String,
    /// Cache for extracted nested archives. Defaults to
    /// `<plugin_dir>/.nested`.
    pub nested_dir: Option<PathBuf>,
    /// Name of the version-specific sub-directory of `plugin_dir`.
    pub host_version: Option<String>,
    pub additional_archives: Vec<PathBuf>,
    /// Classpath roots of the host process.
    pub classpath: Vec<PathBuf>,
    /// Installation directory of the host runtime; its files are libraries.
    pub runtime_home: Option<PathBuf>,
    /// Replaces the built-in library prefix list when set.
    pub default_library_prefixes: Option<Vec<String>>,
    pub conflict_policy: ConflictPolicy,
    /// Core plugin classes the host already loaded itself.
    pub preloaded_core_plugins: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("plugins"),
            threads: None,
            discovery_timeout_secs: None,
            side: Side::default(),
            plugin_type: archive::inspect::DEFAULT_PLUGIN_TYPE.to_string(),
            archive_extension: "jar".to_string(),
            nested_dir: None,
            host_version: None,
            additional_archives: Vec::new(),
            classpath: Vec::new(),
            runtime_home: None,
            default_library_prefixes: None,
            conflict_policy: ConflictPolicy::default(),
            preloaded_core_plugins: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Applies [`TIMEOUT_ENV`] and [`THREADS_ENV`] from the process
    /// environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Same as [`DiscoveryConfig::apply_env`] with an explicit lookup.
    /// Unparseable values are reported and ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<i64>() {
                Ok(secs) => self.discovery_timeout_secs = Some(secs),
                Err(e) => warn!(variable = TIMEOUT_ENV, value = %raw, error = %e, "Ignoring invalid timeout"),
            }
        }
        if let Some(raw) = lookup(THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.threads = Some(n),
                Err(e) => warn!(variable = THREADS_ENV, value = %raw, error = %e, "Ignoring invalid thread count"),
            }
        }
    }

    /// The discovery bound, `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        match self.discovery_timeout_secs {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs as u64)),
            _ => None,
        }
    }

    pub fn thread_count(&self) -> usize {
        match self.threads {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn nested_dir(&self) -> PathBuf {
        self.nested_dir
            .clone()
            .unwrap_or_else(|| self.plugin_dir.join(".nested"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn non_positive_timeouts_are_unbounded() {
        let mut cfg = DiscoveryConfig::default();
        assert_eq!(cfg.timeout(), None);
        cfg.discovery_timeout_secs = Some(0);
        assert_eq!(cfg.timeout(), None);
        cfg.discovery_timeout_secs = Some(-3);
        assert_eq!(cfg.timeout(), None);
        cfg.discovery_timeout_secs = Some(5);
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> =
            [(TIMEOUT_ENV, "12"), (THREADS_ENV, "not-a-number")].into_iter().collect();
        let mut cfg = DiscoveryConfig {
            threads: Some(3),
            ..Default::default()
        };
        cfg.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.discovery_timeout_secs, Some(12));
        assert_eq!(cfg.threads, Some(3));
        assert_eq!(cfg.thread_count(), 3);
    }

    #[test]
    fn zero_threads_means_available_parallelism() {
        let cfg = DiscoveryConfig {
            threads: Some(0),
            ..Default::default()
        };
        assert!(cfg.thread_count() >= 1);
        assert_eq!(cfg.nested_dir(), PathBuf::from("plugins/.nested"));
    }
}
