//! Single-key fetch
//!
//! Lists one key and hands its children and values to the UI. Runs on its
//! own thread; any number of fetches may be in flight, serialized per call
//! by the session lock.

use std::sync::Arc;

use remreg_core::{KeyRef, Result, UiNotifier};
use remreg_session::{KeyListing, ListOptions, SessionManager};
use tracing::{debug, error};

use crate::handle::{failure_message, spawn_worker, WorkerHandle};

/// List `key` with progress and deliver the result to `notifier`
pub fn fetch_key(session: &SessionManager, key: &KeyRef, notifier: &dyn UiNotifier) -> Result<KeyListing> {
    let listing = session.list_key_with(key, Some(notifier), ListOptions::default())?;
    notifier.report_children(key, &listing.children);
    notifier.report_values(&listing.values);
    Ok(listing)
}

/// Background fetch of one key
pub struct FetchWorker;

impl FetchWorker {
    /// Start fetching `key` on a new thread.
    ///
    /// Failures are logged and reported to `notifier` as
    /// "Failure in the secondary thread: ...". The handle yields the listing
    /// on success.
    pub fn spawn(
        session: Arc<SessionManager>,
        key: KeyRef,
        notifier: Arc<dyn UiNotifier>,
    ) -> Result<WorkerHandle<Option<KeyListing>>> {
        spawn_worker("fetch", notifier, move |notifier| {
            match fetch_key(&session, &key, notifier) {
                Ok(listing) => {
                    debug!(
                        target: "remreg::worker",
                        path = %key.absolute_path(),
                        children = listing.children.len(),
                        "Fetch finished"
                    );
                    Some(listing)
                }
                Err(e) => {
                    error!(target: "remreg::worker", path = %key.absolute_path(), error = %e, "Fetch failed");
                    let message = failure_message(&e);
                    notifier.report_status(&message);
                    notifier.report_error(&message);
                    None
                }
            }
        })
    }
}
