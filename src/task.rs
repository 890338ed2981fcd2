//! Cancellable background tasks on a rayon pool.
//!
//! [`spawn`] runs a closure on a worker thread and returns a [`TaskHandle`]
//! the host can poll, wait on, or cancel. Work observes cancellation through
//! the [`TaskContext`] it is handed and returns [`TaskError::Cancelled`];
//! the handle then yields that error and no partial result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use crate::error::{LogicResult, TaskError};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self, title: &str) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled {
                title: title.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Units of work done out of a (possibly growing) total.
#[derive(Debug, Default)]
pub struct TaskProgress {
    done: AtomicU64,
    total: AtomicU64,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_total(&self, units: u64) {
        self.total.fetch_add(units, Ordering::Relaxed);
    }

    pub fn advance(&self, units: u64) {
        self.done.fetch_add(units, Ordering::Relaxed);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Completed fraction in `0.0..=1.0`; zero while the total is unknown.
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.done().min(total) as f64) / total as f64
        }
    }
}

/// What a running task sees of its own handle.
#[derive(Debug, Clone)]
pub struct TaskContext {
    title: Arc<str>,
    token: CancellationToken,
    progress: Arc<TaskProgress>,
}

impl TaskContext {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn progress(&self) -> &TaskProgress {
        &self.progress
    }

    /// Return early with `Cancelled` if the host asked to stop.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        self.token.check(&self.title)
    }
}

/// Host-side handle to a running task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    context: TaskContext,
    receiver: mpsc::Receiver<LogicResult<T>>,
}

impl<T> TaskHandle<T> {
    pub fn title(&self) -> &str {
        self.context.title()
    }

    /// Request cancellation. The task stops at its next checkpoint.
    pub fn cancel(&self) {
        tracing::debug!(task = %self.context.title, "cancellation requested");
        self.context.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.context.token.is_cancelled()
    }

    pub fn progress(&self) -> &TaskProgress {
        &self.context.progress
    }

    /// Non-blocking: `Some` once the task has finished.
    ///
    /// A result is delivered exactly once; later polls return
    /// [`TaskError::Abandoned`].
    pub fn poll(&mut self) -> Option<LogicResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(self.abandoned())),
        }
    }

    /// Block until the task finishes.
    pub fn wait(self) -> LogicResult<T> {
        self.receiver.recv().unwrap_or_else(|_| Err(self.abandoned()))
    }

    /// Block for at most `timeout`; `None` if the task is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<LogicResult<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(self.abandoned())),
        }
    }

    fn abandoned(&self) -> crate::error::LogicError {
        TaskError::Abandoned {
            title: self.context.title.to_string(),
        }
        .into()
    }
}

/// Run `work` on `pool`, returning a handle to its eventual result.
pub fn spawn<T, F>(pool: &rayon::ThreadPool, title: impl Into<String>, work: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&TaskContext) -> LogicResult<T> + Send + 'static,
{
    let title: String = title.into();
    let context = TaskContext {
        title: Arc::from(title.as_str()),
        token: CancellationToken::new(),
        progress: Arc::new(TaskProgress::new()),
    };
    let (sender, receiver) = mpsc::channel();
    let worker_context = context.clone();

    pool.spawn(move || {
        let ctx = worker_context;
        tracing::info!(task = %ctx.title, "task started");
        let result = match ctx.checkpoint() {
            Ok(()) => work(&ctx),
            Err(e) => Err(e.into()),
        };
        match &result {
            Ok(_) => tracing::info!(task = %ctx.title, "task finished"),
            Err(e) if e.is_cancelled() => tracing::warn!(task = %ctx.title, "task cancelled"),
            Err(e) => tracing::warn!(task = %ctx.title, error = %e, "task failed"),
        }
        // The host may have dropped the handle; nobody to tell then.
        let _ = sender.send(result);
    });

    TaskHandle { context, receiver }
}
