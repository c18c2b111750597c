//! Search index population seam.
//!
//! Importers announce what should be (re)indexed and move on; nothing in the
//! import path waits for indexing. [`BackgroundIndexer`] hands tasks to a
//! dedicated worker thread over a bounded `crossbeam-channel` and drops them
//! (counting the drop) instead of blocking when the queue is full.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::EntityId;

/// A searchable entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// User accounts.
    Users,
    /// Organizations.
    Orgs,
    /// Sources.
    Sources,
    /// Collections.
    Collections,
    /// Concepts.
    Concepts,
    /// Mappings.
    Mappings,
}

/// A unit of indexing work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexTask {
    /// Rebuild whole indexes.
    Populate(Vec<IndexKind>),
    /// Reindex specific rows.
    Reindex {
        /// Index to update.
        kind: IndexKind,
        /// Rows to refresh.
        ids: Vec<EntityId>,
    },
}

/// Search collaborator.
pub trait SearchIndexer: Send + Sync {
    /// Queues a task. Must not block on the indexing itself.
    fn submit(&self, task: IndexTask);

    /// Rebuilds the given indexes.
    fn populate(&self, kinds: &[IndexKind]) {
        if !kinds.is_empty() {
            self.submit(IndexTask::Populate(kinds.to_vec()));
        }
    }

    /// Reindexes the given rows.
    fn reindex(&self, kind: IndexKind, ids: Vec<EntityId>) {
        if !ids.is_empty() {
            self.submit(IndexTask::Reindex { kind, ids });
        }
    }
}

/// Records tasks in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryIndexer {
    tasks: Mutex<Vec<IndexTask>>,
}

impl MemoryIndexer {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks submitted so far.
    #[must_use]
    pub fn tasks(&self) -> Vec<IndexTask> {
        self.tasks.lock().clone()
    }

    /// Ids reindexed for `kind`, across all tasks.
    #[must_use]
    pub fn reindexed(&self, kind: IndexKind) -> Vec<EntityId> {
        self.tasks
            .lock()
            .iter()
            .filter_map(|task| match task {
                IndexTask::Reindex { kind: k, ids } if *k == kind => Some(ids.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl SearchIndexer for MemoryIndexer {
    fn submit(&self, task: IndexTask) {
        self.tasks.lock().push(task);
    }
}

/// Handler run by the worker thread for each task.
pub type IndexHandler = Box<dyn FnMut(IndexTask) + Send>;

/// Default worker queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Runs index tasks on a dedicated thread.
#[derive(Debug)]
pub struct BackgroundIndexer {
    sender: Option<Sender<IndexTask>>,
    worker: Option<JoinHandle<u64>>,
    dropped: Arc<AtomicU64>,
}

impl BackgroundIndexer {
    /// Spawns a worker that logs every task it receives.
    pub fn spawn() -> std::io::Result<Self> {
        Self::with_handler(
            DEFAULT_QUEUE_CAPACITY,
            Box::new(|task| match task {
                IndexTask::Populate(kinds) => info!(?kinds, "Index population requested"),
                IndexTask::Reindex { kind, ids } => {
                    info!(?kind, count = ids.len(), "Reindex requested");
                }
            }),
        )
    }

    /// Spawns a worker running `handler` for each task.
    pub fn with_handler(capacity: usize, mut handler: IndexHandler) -> std::io::Result<Self> {
        let (sender, receiver) = bounded::<IndexTask>(capacity.max(1));
        let worker = thread::Builder::new()
            .name("termbase-indexer".to_string())
            .spawn(move || {
                let mut handled = 0u64;
                for task in receiver {
                    handler(task);
                    handled += 1;
                }
                handled
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Number of tasks dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Closes the queue and waits for queued tasks to finish.
    ///
    /// Returns the number of tasks handled.
    pub fn shutdown(mut self) -> u64 {
        self.sender.take();
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(handled)) => handled,
            Some(Err(_)) => {
                warn!("Indexer worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl SearchIndexer for BackgroundIndexer {
    fn submit(&self, task: IndexTask) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(?task, "Index queue full, task dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Indexer worker stopped, task dropped");
            }
        }
    }
}

impl Drop for BackgroundIndexer {
    fn drop(&mut self) {
        // Closing the channel lets the detached worker drain and exit.
        self.sender.take();
    }
}
