//! Parallel discovery of plugin archives.
//!
//! Providers feed root paths through a [`PathFilter`]; every accepted path
//! becomes a scan task on a bounded rayon pool. Tasks schedule nested scans
//! through a map keyed by content hash, so identical nested archives are
//! scanned once no matter how many parents declare them. The orchestrator
//! waits for the pool to drain under one overall deadline and then builds the
//! [`CandidateGraph`] from the finished tasks on its own thread.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::{debug, info};

use archive::Inspector;
use locator::{CandidateFinder, CandidateSink, Finder, PathNormalizer, SourceFlags};
use model::{Candidate, CandidateGraph, CandidateId, ContentHash, NestedArchiveRef};

use crate::error::{DiscoveryError, TaskFailure};
use crate::task::{ScanTask, ScanUnit};

/// Shared set of normalized paths already submitted.
///
/// Two providers naming the same real file, through a symlink or a relative
/// spelling, yield one scan task.
#[derive(Debug, Default)]
pub struct PathFilter {
    normalizer: PathNormalizer,
    seen: Mutex<HashSet<PathBuf>>,
}

impl PathFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the normalized path when it was not seen before.
    pub fn admit(&self, path: &std::path::Path) -> Option<PathBuf> {
        let normalized = self.normalizer.normalize(path);
        let fresh = self
            .seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(normalized.clone());
        fresh.then_some(normalized)
    }
}

enum TaskEvent {
    /// A running task created this many nested tasks.
    Spawned(usize),
    Finished,
}

/// State shared by every task of one discovery run.
pub(crate) struct ScanContext {
    inspector: Arc<Inspector>,
    nested_tasks: Mutex<HashMap<ContentHash, Arc<ScanTask>>>,
    all_tasks: Mutex<Vec<Arc<ScanTask>>>,
    events: Mutex<Sender<TaskEvent>>,
    pool: Arc<rayon::ThreadPool>,
    nested_created: AtomicUsize,
    nested_reused: AtomicUsize,
}

impl ScanContext {
    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    fn send(&self, event: TaskEvent) {
        let _ = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(event);
    }

    fn register(&self, task: &Arc<ScanTask>) {
        self.all_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(task));
    }

    pub fn task_finished(&self) {
        self.send(TaskEvent::Finished);
    }

    /// Looks up or creates the task scanning the archive `origin` refers to.
    /// Returns `true` alongside a task created by this call; the caller is
    /// then responsible for running or forking it.
    pub fn task_for(&self, parent: &ScanUnit, origin: &NestedArchiveRef) -> (Arc<ScanTask>, bool) {
        let mut map = self.nested_tasks.lock().unwrap_or_else(|e| e.into_inner());
        match map.entry(origin.content_hash.clone()) {
            Entry::Occupied(e) => {
                self.nested_reused.fetch_add(1, Ordering::Relaxed);
                debug!(nested = %origin.source_filename, parent = %parent.path.display(), "Reusing nested scan");
                (Arc::clone(e.get()), false)
            }
            Entry::Vacant(v) => {
                let task = ScanTask::nested_for(parent, origin);
                v.insert(Arc::clone(&task));
                drop(map);
                self.nested_created.fetch_add(1, Ordering::Relaxed);
                self.register(&task);
                self.send(TaskEvent::Spawned(1));
                (task, true)
            }
        }
    }

    /// Schedules `task` on the scan pool.
    pub fn fork(self: &Arc<Self>, task: Arc<ScanTask>) {
        let ctx = Arc::clone(self);
        self.pool.spawn(move || task.run(&ctx));
    }
}

/// Counters describing one discovery run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub roots_submitted: usize,
    pub duplicate_paths: usize,
    pub archives_inspected: usize,
    pub nested_tasks_created: usize,
    pub nested_tasks_reused: usize,
    pub extractions_written: usize,
    pub elapsed_ms: u128,
}

/// Result of a discovery run.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub graph: CandidateGraph,
    /// Graph ids sorted by case-insensitive identifier.
    pub order: Vec<CandidateId>,
    pub stats: DiscoveryStats,
}

impl Discovery {
    /// Candidates in final order.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.order.iter().map(|&id| &self.graph[id])
    }
}

struct RootSubmitter<'a> {
    filter: &'a PathFilter,
    ctx: &'a Arc<ScanContext>,
    roots: Vec<Arc<ScanTask>>,
    duplicates: usize,
}

impl CandidateSink for RootSubmitter<'_> {
    fn accept(&mut self, paths: Vec<PathBuf>, flags: SourceFlags) {
        for path in paths {
            let Some(normalized) = self.filter.admit(&path) else {
                debug!(path = %path.display(), "Already submitted");
                self.duplicates += 1;
                continue;
            };
            let task = ScanTask::new(ScanUnit::root(normalized, flags));
            self.ctx.register(&task);
            self.roots.push(Arc::clone(&task));
            self.ctx.fork(task);
        }
    }
}

/// Runs full discovery passes.
pub struct Discoverer {
    inspector: Arc<Inspector>,
    threads: usize,
    timeout: Option<Duration>,
}

impl Discoverer {
    pub fn new(inspector: Arc<Inspector>, threads: usize, timeout: Option<Duration>) -> Self {
        Self {
            inspector,
            threads: threads.max(1),
            timeout,
        }
    }

    /// Scans everything the `finders` report and assembles the graph.
    ///
    /// Fails on a provider error, on the deadline, or when any task failed;
    /// no partial result is returned in those cases.
    pub fn discover(&self, finders: &[Finder]) -> Result<Discovery, DiscoveryError> {
        let start = Instant::now();
        let deadline = self.timeout.and_then(|t| start.checked_add(t));
        let inspected_before = self.inspector.inspected();
        let written_before = self.inspector.extractor().stats().written;
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .thread_name(|i| format!("nestloader-scan-{i}"))
                .build()?,
        );
        let (tx, rx) = mpsc::channel();
        let ctx = Arc::new(ScanContext {
            inspector: Arc::clone(&self.inspector),
            nested_tasks: Mutex::new(HashMap::new()),
            all_tasks: Mutex::new(Vec::new()),
            events: Mutex::new(tx),
            pool: Arc::clone(&pool),
            nested_created: AtomicUsize::new(0),
            nested_reused: AtomicUsize::new(0),
        });
        info!(threads = self.threads, timeout_secs = ?self.timeout.map(|t| t.as_secs()), "Starting plugin discovery");

        let filter = PathFilter::new();
        let mut submitter = RootSubmitter {
            filter: &filter,
            ctx: &ctx,
            roots: Vec::new(),
            duplicates: 0,
        };
        for finder in finders {
            finder.find_candidates(&mut submitter)?;
        }
        let RootSubmitter {
            roots, duplicates, ..
        } = submitter;

        wait_for_tasks(&rx, roots.len(), deadline, self.timeout, &ctx)?;

        let failures: Vec<TaskFailure> = ctx
            .all_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|t| t.failure().cloned())
            .collect();
        if !failures.is_empty() {
            return Err(DiscoveryError::TaskFailures(failures));
        }

        let graph = assemble(&roots);
        let order = graph.sorted_by_id();
        let stats = DiscoveryStats {
            roots_submitted: roots.len(),
            duplicate_paths: duplicates,
            archives_inspected: self.inspector.inspected() - inspected_before,
            nested_tasks_created: ctx.nested_created.load(Ordering::Relaxed),
            nested_tasks_reused: ctx.nested_reused.load(Ordering::Relaxed),
            extractions_written: self.inspector.extractor().stats().written - written_before,
            elapsed_ms: start.elapsed().as_millis(),
        };
        info!(
            candidates = graph.len(),
            roots = stats.roots_submitted,
            nested = stats.nested_tasks_created,
            elapsed_ms = stats.elapsed_ms,
            "Plugin discovery finished"
        );
        Ok(Discovery {
            graph,
            order,
            stats,
        })
    }
}

/// Blocks until every task reported completion.
///
/// Root tasks are counted up front; nested tasks announce themselves from
/// the parent before the parent finishes, so the count reaches zero only
/// once the whole tree drained.
fn wait_for_tasks(
    rx: &Receiver<TaskEvent>,
    roots: usize,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    ctx: &ScanContext,
) -> Result<(), DiscoveryError> {
    let mut outstanding = roots;
    while outstanding > 0 {
        let event = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                rx.recv_timeout(remaining)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match event {
            Ok(TaskEvent::Spawned(n)) => outstanding += n,
            Ok(TaskEvent::Finished) => outstanding -= 1,
            Err(RecvTimeoutError::Timeout) => {
                let unfinished: Vec<PathBuf> = ctx
                    .all_tasks
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .filter(|t| !t.state().is_terminal())
                    .map(|t| t.path().clone())
                    .collect();
                return Err(DiscoveryError::Timeout {
                    timeout: timeout.unwrap_or_default(),
                    unfinished,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DiscoveryError::Interrupted {
                    reason: "task event channel closed".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Converts finished tasks into a graph, breadth first from the roots.
///
/// Tasks are identified by address, so a nested task reached from several
/// parents becomes one candidate with one parent edge per parent.
fn assemble(roots: &[Arc<ScanTask>]) -> CandidateGraph {
    let mut graph = CandidateGraph::new();
    let mut ids: HashMap<*const ScanTask, CandidateId> = HashMap::new();
    let mut queue: VecDeque<(Arc<ScanTask>, CandidateId)> = VecDeque::new();

    for root in roots {
        if let Some(candidate) = root.candidate() {
            let id = graph.insert(candidate.clone());
            ids.insert(Arc::as_ptr(root), id);
            queue.push_back((Arc::clone(root), id));
        }
    }
    while let Some((task, parent)) = queue.pop_front() {
        for child in task.nested_tasks() {
            let Some(candidate) = child.candidate() else {
                continue;
            };
            let key = Arc::as_ptr(&child);
            let (child_id, fresh) = match ids.get(&key) {
                Some(&id) => (id, false),
                None => {
                    let id = graph.insert(candidate.clone());
                    ids.insert(key, id);
                    (id, true)
                }
            };
            graph.link(parent, child_id);
            if fresh {
                queue.push_back((child, child_id));
            }
        }
    }
    graph
}
