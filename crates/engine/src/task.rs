use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, error};

use archive::{InspectOptions, ScanPass};
use locator::SourceFlags;
use model::{Candidate, ContentHash, NestedArchiveRef};

use crate::discover::ScanContext;
use crate::error::TaskFailure;

/// Work item of one scan task.
#[derive(Debug, Clone)]
pub(crate) struct ScanUnit {
    pub path: PathBuf,
    /// Set for nested archives; the hash the extracted file was stored under.
    pub expected_hash: Option<ContentHash>,
    pub origin: Option<NestedArchiveRef>,
    pub flags: SourceFlags,
    /// Archives this unit was reached through, outermost first.
    pub breadcrumbs: Vec<PathBuf>,
}

impl ScanUnit {
    pub fn root(path: PathBuf, flags: SourceFlags) -> Self {
        Self {
            path,
            expected_hash: None,
            origin: None,
            flags,
            breadcrumbs: Vec::new(),
        }
    }

    fn nested(parent: &ScanUnit, origin: &NestedArchiveRef) -> Self {
        let mut breadcrumbs = parent.breadcrumbs.clone();
        breadcrumbs.push(parent.path.clone());
        Self {
            path: origin.file.clone(),
            expected_hash: Some(origin.content_hash.clone()),
            origin: Some(origin.clone()),
            flags: SourceFlags::default(),
            breadcrumbs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Pending,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

#[derive(Debug)]
enum TaskOutcome {
    Completed(Option<Candidate>),
    Failed(TaskFailure),
}

/// Scans one archive and schedules scans for the archives nested in it.
///
/// State moves `Pending -> Running -> Completed | Failed` exactly once.
/// The outcome and the nested task list are read by the orchestrator only
/// after every task finished.
#[derive(Debug)]
pub(crate) struct ScanTask {
    unit: ScanUnit,
    state: AtomicU8,
    outcome: OnceLock<TaskOutcome>,
    nested: Mutex<Vec<Arc<ScanTask>>>,
}

impl ScanTask {
    pub fn new(unit: ScanUnit) -> Arc<Self> {
        Arc::new(Self {
            unit,
            state: AtomicU8::new(TaskState::Pending as u8),
            outcome: OnceLock::new(),
            nested: Mutex::new(Vec::new()),
        })
    }

    pub fn nested_for(parent: &ScanUnit, origin: &NestedArchiveRef) -> Arc<Self> {
        Self::new(ScanUnit::nested(parent, origin))
    }

    pub fn path(&self) -> &PathBuf {
        &self.unit.path
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        match self.outcome.get() {
            Some(TaskOutcome::Completed(c)) => c.as_ref(),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self.outcome.get() {
            Some(TaskOutcome::Failed(f)) => Some(f),
            _ => None,
        }
    }

    pub fn nested_tasks(&self) -> Vec<Arc<ScanTask>> {
        self.nested.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Runs the task on the current thread and reports completion to `ctx`.
    /// Does nothing when the task already left `Pending`.
    pub fn run(self: &Arc<Self>, ctx: &Arc<ScanContext>) {
        if self
            .state
            .compare_exchange(
                TaskState::Pending as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.scan(ctx)));
        let (state, outcome) = match result {
            Ok(Ok(candidate)) => (TaskState::Completed, TaskOutcome::Completed(candidate)),
            Ok(Err(failure)) => (TaskState::Failed, TaskOutcome::Failed(failure)),
            Err(payload) => {
                let failure = TaskFailure {
                    path: self.unit.path.clone(),
                    reason: format!("scan panicked: {}", panic_message(&*payload)),
                };
                (TaskState::Failed, TaskOutcome::Failed(failure))
            }
        };
        let _ = self.outcome.set(outcome);
        self.state.store(state as u8, Ordering::Release);
        ctx.task_finished();
    }

    fn scan(&self, ctx: &Arc<ScanContext>) -> Result<Option<Candidate>, TaskFailure> {
        let path = &self.unit.path;
        if path.is_dir() {
            debug!(path = %path.display(), "Directory source, nothing to inspect");
            return Ok(None);
        }
        let options = InspectOptions {
            pass: ScanPass::Full,
            is_host_runtime: self.unit.flags.is_host_runtime,
            is_classpath_source: self.unit.flags.is_classpath_source,
        };
        let scanned = match ctx.inspector().inspect(path, self.unit.origin.as_ref(), options) {
            Ok(Some(scanned)) => scanned,
            Ok(None) => return Ok(None),
            // One unreadable archive only removes its own candidate.
            Err(e) => {
                error!(path = %path.display(), via = ?self.unit.breadcrumbs, error = %e, "Dropping unreadable archive");
                return Ok(None);
            }
        };
        let candidate = scanned.candidate;
        if let Some(expected) = &self.unit.expected_hash {
            debug!(path = %path.display(), hash = expected.short(), depth = self.unit.breadcrumbs.len(), "Scanned nested archive");
        }

        let mut fresh = Vec::new();
        for reference in &candidate.nested_archives {
            let (task, created) = ctx.task_for(&self.unit, reference);
            self.nested
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Arc::clone(&task));
            if created {
                fresh.push(task);
            }
        }
        let mut fresh = fresh.into_iter();
        if let Some(first) = fresh.next() {
            for task in fresh {
                ctx.fork(task);
            }
            first.run(ctx);
        }
        Ok(Some(candidate))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
