//! Background thread plumbing shared by the fetch and search workers

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use remreg_core::{Error, Result, UiNotifier};
use tracing::error;

static NEXT_WORKER: AtomicUsize = AtomicUsize::new(0);

/// Message shown to the user when a worker fails
pub fn failure_message(reason: impl std::fmt::Display) -> String {
    format!("Failure in the secondary thread: {}.", reason)
}

/// A running worker thread
pub struct WorkerHandle<T> {
    name: String,
    inner: JoinHandle<T>,
}

impl<T> WorkerHandle<T> {
    /// Thread name, e.g. `remreg-fetch-3`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker has returned
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the worker to return
    pub fn join(self) -> Result<T> {
        self.inner
            .join()
            .map_err(|_| Error::InvalidOperation(format!("worker {} panicked", self.name)))
    }
}

/// Spawn `body` on a named thread.
///
/// A panic inside `body` is caught, logged and reported to `notifier` like
/// any other failure; the thread then returns `None`.
pub(crate) fn spawn_worker<T, F>(
    kind: &str,
    notifier: std::sync::Arc<dyn UiNotifier>,
    body: F,
) -> Result<WorkerHandle<Option<T>>>
where
    T: Send + 'static,
    F: FnOnce(&dyn UiNotifier) -> Option<T> + Send + 'static,
{
    let name = format!("remreg-{}-{}", kind, NEXT_WORKER.fetch_add(1, Ordering::Relaxed));
    let thread_name = name.clone();
    let inner = std::thread::Builder::new().name(name.clone()).spawn(move || {
        match panic::catch_unwind(AssertUnwindSafe(|| body(notifier.as_ref()))) {
            Ok(out) => out,
            Err(e) => {
                let reason = e
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| e.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("(non-string panic)");
                error!(target: "remreg::worker", worker = %thread_name, reason, "Worker panicked");
                notifier.report_error(&failure_message(reason));
                None
            }
        }
    })?;
    Ok(WorkerHandle { name, inner })
}
