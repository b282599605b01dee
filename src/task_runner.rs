//! Supervisor for long-lived cooperative workers.
//!
//! Lowered onto `std::thread` + `std::sync::mpsc::sync_channel`, matching
//! the pattern the filesystem watcher uses for its own dedicated event
//! thread: no async runtime, one OS thread per worker, a bounded inbox.

use std::collections::HashMap;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::SyncError;

/// Handle to a running task. Dropping it does not stop the task; call
/// [`TaskRunner::stop_task`] for that.
struct TaskHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// Supervises a set of named workers, each on its own OS thread.
///
/// A worker's `logic` closure receives a stop flag it must poll
/// cooperatively and returns `Result<(), anyhow::Error>`. If it returns
/// `Err`, or if it panics, `on_failure` fires exactly once and the task is
/// marked stopped -- there is no panic-based control flow surfaced to
/// callers, only `Result`.
#[derive(Default)]
pub struct TaskRunner {
    tasks: HashMap<String, TaskHandle>,
}

impl TaskRunner {
    pub fn new() -> Self {
        TaskRunner {
            tasks: HashMap::new(),
        }
    }

    /// Start a named worker on its own stop flag. `logic` runs on a
    /// dedicated thread until it returns or `stop` is observed set.
    pub fn run_task<F, H>(&mut self, name: impl Into<String>, logic: F, on_failure: H)
    where
        F: FnOnce(Arc<AtomicBool>) -> anyhow::Result<()> + Send + 'static,
        H: FnOnce(&str, anyhow::Error) + Send + 'static,
    {
        self.run_task_with_stop(name, Arc::new(AtomicBool::new(false)), logic, on_failure)
    }

    /// Like [`Self::run_task`], but the caller supplies the stop flag --
    /// useful when several workers must all honor one shared shutdown
    /// signal (as `SessionCoordinator` does).
    pub fn run_task_with_stop<F, H>(
        &mut self,
        name: impl Into<String>,
        stop: Arc<AtomicBool>,
        logic: F,
        on_failure: H,
    ) where
        F: FnOnce(Arc<AtomicBool>) -> anyhow::Result<()> + Send + 'static,
        H: FnOnce(&str, anyhow::Error) + Send + 'static,
    {
        let name = name.into();
        let stop_for_thread = stop.clone();
        let thread_name = name.clone();

        let join = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                    logic(stop_for_thread)
                }));
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => on_failure(&thread_name, e),
                    Err(payload) => {
                        let message = panic_message(&payload);
                        on_failure(&thread_name, anyhow::anyhow!("worker panicked: {message}"));
                    }
                }
            })
            .expect("failed to spawn worker thread");

        self.tasks.insert(
            name,
            TaskHandle {
                stop,
                join: Some(join),
            },
        );
    }

    /// Idempotent stop by name: flips the stop flag and joins the thread.
    /// Fails with [`SyncError::NoSuchTask`] if `name` was never started.
    pub fn stop_task(&mut self, name: &str) -> Result<(), SyncError> {
        let handle = self
            .tasks
            .get_mut(name)
            .ok_or_else(|| SyncError::NoSuchTask {
                name: name.to_string(),
            })?;
        handle.stop.store(true, Ordering::SeqCst);
        if let Some(join) = handle.join.take() {
            let _ = join.join();
        }
        Ok(())
    }

    /// Stop every running task. Errors from already-stopped tasks are
    /// ignored -- this is the `on_failure` teardown path, which must not
    /// itself fail loudly.
    pub fn stop_all(&mut self) {
        let names: Vec<String> = self.tasks.keys().cloned().collect();
        for name in names {
            let _ = self.stop_task(&name);
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Build a bounded FIFO channel sized for one worker's inbox.
pub fn bounded_channel<T>(capacity: usize) -> (SyncSender<T>, Receiver<T>) {
    mpsc::sync_channel(capacity)
}

/// An unbounded sender alias, used where a worker fans out to multiple
/// consumers that must never block the producer.
pub type UnboundedSender<T> = Sender<T>;
