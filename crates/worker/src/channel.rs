//! Worker → UI event delivery
//!
//! Workers never touch presentation state. Each one gets a
//! [`ChannelNotifier`] that turns [`UiNotifier`] calls into [`Envelope`]s on
//! a channel; the UI thread owns the [`EventQueue`] and applies them with
//! [`EventQueue::drain_into`].
//!
//! Every notifier is tagged with a fresh request id. When the user starts a
//! new fetch before the previous one finished, the older fetch's children and
//! values are dropped on drain so they cannot overwrite the newer listing.
//! Search results are treated the same way against newer searches.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use remreg_core::{KeyRef, UiNotifier, Value};
use tracing::trace;

/// Identifies one worker run
pub type RequestId = u64;

/// Kind of worker that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Single-key listing
    Fetch,
    /// Whole-tree search
    Search,
}

/// One [`UiNotifier`] call, captured
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// `report_progress`
    Progress(f64),
    /// `report_status`
    Status(String),
    /// `report_children`
    Children {
        /// Listed key
        parent: KeyRef,
        /// Its subkeys
        children: Vec<KeyRef>,
    },
    /// `report_values`
    Values(Vec<Value>),
    /// `report_error`
    Error(String),
    /// `report_search_hit`
    SearchHit {
        /// Matching key, or the key holding the matching value
        key: KeyRef,
        /// Matching value, if the hit was on a value
        value: Option<Value>,
    },
    /// `report_search_miss`
    SearchMiss,
}

impl UiEvent {
    /// Replay this event on `notifier`
    pub fn dispatch(&self, notifier: &dyn UiNotifier) {
        match self {
            UiEvent::Progress(fraction) => notifier.report_progress(*fraction),
            UiEvent::Status(message) => notifier.report_status(message),
            UiEvent::Children { parent, children } => notifier.report_children(parent, children),
            UiEvent::Values(values) => notifier.report_values(values),
            UiEvent::Error(message) => notifier.report_error(message),
            UiEvent::SearchHit { key, value } => notifier.report_search_hit(key, value.as_ref()),
            UiEvent::SearchMiss => notifier.report_search_miss(),
        }
    }

    /// Whether this event carries a result that a newer request replaces
    fn is_result(&self) -> bool {
        matches!(
            self,
            UiEvent::Children { .. }
                | UiEvent::Values(_)
                | UiEvent::SearchHit { .. }
                | UiEvent::SearchMiss
        )
    }
}

/// An event with the request that produced it
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Producing request
    pub request: RequestId,
    /// Kind of producing worker
    pub origin: Origin,
    /// The event itself
    pub event: UiEvent,
}

/// [`UiNotifier`] that forwards every call over the event channel
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: Sender<Envelope>,
    request: RequestId,
    origin: Origin,
}

impl ChannelNotifier {
    /// Request this notifier reports for
    pub fn request(&self) -> RequestId {
        self.request
    }

    /// Kind of worker this notifier was made for
    pub fn origin(&self) -> Origin {
        self.origin
    }

    fn send(&self, event: UiEvent) {
        let envelope = Envelope {
            request: self.request,
            origin: self.origin,
            event,
        };
        if self.tx.send(envelope).is_err() {
            trace!(target: "remreg::worker", request = self.request, "Event queue gone, dropping event");
        }
    }
}

impl UiNotifier for ChannelNotifier {
    fn report_progress(&self, fraction: f64) {
        self.send(UiEvent::Progress(fraction));
    }

    fn report_status(&self, message: &str) {
        self.send(UiEvent::Status(message.to_string()));
    }

    fn report_children(&self, parent: &KeyRef, children: &[KeyRef]) {
        self.send(UiEvent::Children {
            parent: KeyRef::clone(parent),
            children: children.to_vec(),
        });
    }

    fn report_values(&self, values: &[Value]) {
        self.send(UiEvent::Values(values.to_vec()));
    }

    fn report_error(&self, message: &str) {
        self.send(UiEvent::Error(message.to_string()));
    }

    fn report_search_hit(&self, key: &KeyRef, value: Option<&Value>) {
        self.send(UiEvent::SearchHit {
            key: KeyRef::clone(key),
            value: value.cloned(),
        });
    }

    fn report_search_miss(&self) {
        self.send(UiEvent::SearchMiss);
    }
}

#[derive(Default)]
struct Latest {
    fetch: Option<RequestId>,
    search: Option<RequestId>,
}

impl Latest {
    fn slot(&mut self, origin: Origin) -> &mut Option<RequestId> {
        match origin {
            Origin::Fetch => &mut self.fetch,
            Origin::Search => &mut self.search,
        }
    }
}

/// Single-consumer end of the event channel, owned by the UI thread
pub struct EventQueue {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    next_request: AtomicU64,
    latest: Mutex<Latest>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    /// Empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            next_request: AtomicU64::new(1),
            latest: Mutex::new(Latest::default()),
        }
    }

    /// Notifier for a new request. It becomes the latest request of its
    /// origin, superseding any earlier one.
    pub fn notifier(&self, origin: Origin) -> ChannelNotifier {
        let request = self.next_request.fetch_add(1, Ordering::Relaxed);
        *self.latest.lock().slot(origin) = Some(request);
        ChannelNotifier {
            tx: self.tx.clone(),
            request,
            origin,
        }
    }

    /// Whether `envelope` should still be applied
    pub fn is_current(&self, envelope: &Envelope) -> bool {
        if !envelope.event.is_result() {
            return true;
        }
        let mut latest = self.latest.lock();
        *latest.slot(envelope.origin) == Some(envelope.request)
    }

    /// Apply every queued event to `ui`, skipping superseded results.
    /// Returns the number of events applied.
    pub fn drain_into(&self, ui: &dyn UiNotifier) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            if self.apply(&envelope, ui) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait up to `timeout` for one event and apply it. Returns the
    /// envelope whether or not it was current, `None` on timeout.
    pub fn recv_into(&self, ui: &dyn UiNotifier, timeout: Duration) -> Option<Envelope> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                self.apply(&envelope, ui);
                Some(envelope)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn apply(&self, envelope: &Envelope, ui: &dyn UiNotifier) -> bool {
        if self.is_current(envelope) {
            envelope.event.dispatch(ui);
            true
        } else {
            trace!(
                target: "remreg::worker",
                request = envelope.request,
                origin = ?envelope.origin,
                "Dropping superseded result"
            );
            false
        }
    }
}
