use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use locator::LocatorError;
use model::Version;

/// Configuration key bounding the discovery wait.
pub const TIMEOUT_KNOB: &str = "discovery_timeout_secs";
/// Environment variable overriding [`TIMEOUT_KNOB`].
pub const TIMEOUT_ENV: &str = "NESTLOADER_DISCOVERY_TIMEOUT";

/// One scan task that ended in an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}", timeout_message(.timeout, .unfinished))]
    Timeout {
        timeout: Duration,
        unfinished: Vec<PathBuf>,
    },
    #[error("waiting for discovery tasks failed: {reason}")]
    Interrupted { reason: String },
    #[error("cannot choose between {} for {id} {version}: equal versions with different content", .files.join(", "))]
    CriticalResolution {
        id: String,
        version: Version,
        files: Vec<String>,
    },
    #[error("{} discovery task(s) failed: {}", .0.len(), failure_list(.0))]
    TaskFailures(Vec<TaskFailure>),
    #[error("{} is an extracted archive; put the archive file in the plugin directory instead", .path.display())]
    ExtractedArchiveDirectory { path: PathBuf },
    #[error("search location {} is not a directory", .path.display())]
    InvalidSearchLocation { path: PathBuf },
    #[error("failed to build the scan pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl DiscoveryError {
    /// Path of the archive or location responsible, when there is one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            DiscoveryError::Io { path, .. }
            | DiscoveryError::ExtractedArchiveDirectory { path }
            | DiscoveryError::InvalidSearchLocation { path } => Some(path),
            DiscoveryError::Timeout { unfinished, .. } => unfinished.first().map(PathBuf::as_path),
            DiscoveryError::TaskFailures(failures) => failures.first().map(|f| f.path.as_path()),
            _ => None,
        }
    }
}

fn timeout_message(timeout: &Duration, unfinished: &[PathBuf]) -> String {
    let mut msg = format!(
        "plugin discovery did not finish within {}s",
        timeout.as_secs_f64()
    );
    if let Some(first) = unfinished.first() {
        msg.push_str(&format!(
            "; {} archive(s) still scanning, starting with {}",
            unfinished.len(),
            first.display()
        ));
    }
    msg.push_str(&format!(
        ". Raise `{TIMEOUT_KNOB}` (or {TIMEOUT_ENV}), or set it to 0 to wait without a bound"
    ));
    msg
}

fn failure_list(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<LocatorError> for DiscoveryError {
    fn from(e: LocatorError) -> Self {
        match e {
            LocatorError::NotADirectory { path } => DiscoveryError::InvalidSearchLocation { path },
            LocatorError::ExtractedArchiveDirectory { path } => {
                DiscoveryError::ExtractedArchiveDirectory { path }
            }
            LocatorError::Io { path, source } => DiscoveryError::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_the_knob_and_path() {
        let err = DiscoveryError::Timeout {
            timeout: Duration::from_secs(1),
            unfinished: vec![PathBuf::from("plugins/slow.jar")],
        };
        let msg = err.to_string();
        assert!(msg.contains("1s"));
        assert!(msg.contains("plugins/slow.jar"));
        assert!(msg.contains(TIMEOUT_KNOB));
        assert_eq!(err.path(), Some(std::path::Path::new("plugins/slow.jar")));
    }

    #[test]
    fn aggregates_failures() {
        let err = DiscoveryError::TaskFailures(vec![
            TaskFailure {
                path: "a.jar".into(),
                reason: "boom".into(),
            },
            TaskFailure {
                path: "b.jar".into(),
                reason: "bang".into(),
            },
        ]);
        assert_eq!(err.to_string(), "2 discovery task(s) failed: a.jar: boom; b.jar: bang");
    }
}
