//! Bounded-concurrency work runner.
//!
//! [`ConcurrencyManager`] runs an async task per work item with at most
//! `limit` tasks in flight. It keeps pulling from its queue until the queue
//! is empty *and* nothing is running, then settles once. Items can be added
//! while it runs, from the owner or from inside a task via a
//! [`QueueHandle`].
//!
//! A failing or panicking task is logged and counted; it never stops the
//! run. Progress goes to a [`ProgressObserver`] after every task.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notevec::concurrency::{ConcurrencyManager, ProgressEvent};
//!
//! let observer = Arc::new(|event: ProgressEvent| println!("{:?}", event));
//! let manager = ConcurrencyManager::start(2, vec![1, 2, 3], |n| async move {
//!     do_work(n).await
//! }, observer);
//!
//! let summary = manager.done().await?;
//! assert_eq!(summary.completed, 3);
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Progress notification from a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// One more task settled. `completed` counts successes and failures
    /// and rises by one with each event.
    Completed {
        /// Tasks settled so far.
        completed: usize,
    },

    /// The run is over. Sent exactly once, after the last `Completed`.
    Finished {
        /// Tasks settled in total.
        completed: usize,
        /// How many of those failed.
        failed: usize,
    },
}

/// Receives progress events.
///
/// Implemented for closures taking a [`ProgressEvent`], for
/// `crossbeam_channel::Sender<ProgressEvent>`, and by [`NoopObserver`].
/// Called from the runner's driver task; keep it cheap.
pub trait ProgressObserver: Send + Sync {
    /// Handles one event.
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressObserver for crossbeam_channel::Sender<ProgressEvent> {
    fn on_progress(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is watching
        let _ = self.send(event);
    }
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Outcome of a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks settled, successful or not.
    pub completed: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
}

impl RunSummary {
    /// Tasks that finished without error.
    pub fn succeeded(&self) -> usize {
        self.completed - self.failed
    }
}

/// Cloneable handle for adding work to a running manager.
#[derive(Debug)]
pub struct QueueHandle<I> {
    tx: mpsc::UnboundedSender<I>,
}

impl<I> Clone for QueueHandle<I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<I> QueueHandle<I> {
    /// Queues `item`. Returns false if the run has already settled.
    pub fn push(&self, item: I) -> bool {
        self.tx.send(item).is_ok()
    }
}

/// Runs queued work items with bounded parallelism.
///
/// Each run gets a fresh manager. Dropping the manager does not cancel
/// anything: tasks already started run to completion and their results are
/// discarded.
#[derive(Debug)]
pub struct ConcurrencyManager<I> {
    queue: QueueHandle<I>,
    driver: JoinHandle<RunSummary>,
}

impl<I: Send + 'static> ConcurrencyManager<I> {
    /// Starts a run over `items`.
    ///
    /// `limit` is the number of tasks allowed in flight; 0 is treated as 1.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(
        limit: usize,
        items: impl IntoIterator<Item = I>,
        task: F,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending: VecDeque<I> = items.into_iter().collect();
        let limit = limit.max(1);

        debug!(limit, queued = pending.len(), "Starting run");
        let driver = tokio::spawn(drive(limit, pending, rx, task, observer));

        Self {
            queue: QueueHandle { tx },
            driver,
        }
    }

    /// Queues another item. Returns false if the run has already settled.
    pub fn push(&self, item: I) -> bool {
        self.queue.push(item)
    }

    /// Returns a handle tasks can use to queue follow-up work.
    pub fn handle(&self) -> QueueHandle<I> {
        self.queue.clone()
    }

    /// Waits for the run to settle.
    ///
    /// Resolves once the queue is empty and no task is running, including
    /// items added after the run started.
    ///
    /// # Errors
    ///
    /// Returns an `Interrupted` I/O error if the runtime shut down before
    /// the run settled.
    pub async fn done(self) -> Result<RunSummary> {
        drop(self.queue);
        match self.driver.await {
            Ok(summary) => Ok(summary),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "run was cancelled before it settled",
            )
            .into()),
        }
    }
}

fn drain<I>(rx: &mut mpsc::UnboundedReceiver<I>, pending: &mut VecDeque<I>) {
    while let Ok(item) = rx.try_recv() {
        pending.push_back(item);
    }
}

async fn drive<I, F, Fut>(
    limit: usize,
    mut pending: VecDeque<I>,
    mut rx: mpsc::UnboundedReceiver<I>,
    task: F,
    observer: Arc<dyn ProgressObserver>,
) -> RunSummary
where
    I: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut running: JoinSet<Result<()>> = JoinSet::new();
    let mut summary = RunSummary::default();
    let mut open = true;

    loop {
        while running.len() < limit {
            match pending.pop_front() {
                Some(item) => {
                    running.spawn(task(item));
                }
                None => break,
            }
        }

        if running.is_empty() {
            drain(&mut rx, &mut pending);
            if pending.is_empty() {
                rx.close();
                // Catch anything sent before the close landed
                drain(&mut rx, &mut pending);
                if pending.is_empty() {
                    break;
                }
            }
            continue;
        }

        tokio::select! {
            item = rx.recv(), if open => match item {
                Some(item) => pending.push_back(item),
                None => open = false,
            },
            Some(joined) = running.join_next() => {
                summary.completed += 1;
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        summary.failed += 1;
                        warn!(error = %err, "Task failed");
                    }
                    Err(err) if err.is_panic() => {
                        summary.failed += 1;
                        error!("Task panicked");
                    }
                    Err(_) => {
                        summary.failed += 1;
                        warn!("Task was cancelled");
                    }
                }
                observer.on_progress(ProgressEvent::Completed {
                    completed: summary.completed,
                });
            }
        }
    }

    info!(
        completed = summary.completed,
        failed = summary.failed,
        "Run finished"
    );
    observer.on_progress(ProgressEvent::Finished {
        completed: summary.completed,
        failed: summary.failed,
    });
    summary
}
