use anyhow::{bail, Context, Result};
use std::{fs, path::Path, path::PathBuf};

use engine::{ConflictPolicy, DiscoveryConfig, DEBUG_TIMEOUT_SECS};

use crate::args::ScanArgs;

#[cfg(windows)]
pub fn config_dir() -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("nestloader")
}

#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".config")
        .join("nestloader")
}

fn config_file_path() -> PathBuf {
    config_dir().join("nestloader.toml")
}

fn read_config(path: &Path) -> Result<DiscoveryConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Loads the explicit configuration file, or the user one when present.
pub fn load_config(explicit: Option<&Path>) -> Result<DiscoveryConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        return read_config(path);
    }
    let path = config_file_path();
    if path.exists() {
        read_config(&path)
    } else {
        Ok(DiscoveryConfig::default())
    }
}

/// File values, then environment, then command-line flags.
pub fn resolve_config(args: &ScanArgs) -> Result<DiscoveryConfig> {
    let mut cfg = load_config(args.config.as_deref())?;
    cfg.apply_env();
    apply_args(&mut cfg, args);
    Ok(cfg)
}

fn apply_args(cfg: &mut DiscoveryConfig, args: &ScanArgs) {
    cfg.plugin_dir = args.dir.clone();
    if let Some(dir) = &args.nested_dir {
        cfg.nested_dir = Some(dir.clone());
    }
    if !args.classpath.is_empty() {
        cfg.classpath = args.classpath.clone();
    }
    if let Some(threads) = args.threads {
        cfg.threads = Some(threads);
    }
    if let Some(secs) = args.timeout {
        cfg.discovery_timeout_secs = Some(secs);
    }
    if let Some(side) = args.side {
        cfg.side = side;
    }
    if args.strict {
        cfg.conflict_policy = ConflictPolicy::Strict;
    }
    if args.debug && cfg.discovery_timeout_secs.is_none() {
        cfg.discovery_timeout_secs = Some(DEBUG_TIMEOUT_SECS);
    }
}
