//! Background workers for remreg
//!
//! - FetchWorker: list one key and deliver its children and values
//! - SearchWorker: depth-first text search over the whole tree
//! - EventQueue / ChannelNotifier: worker → UI event delivery with
//!   superseded-result suppression
//!
//! Workers share one [`SessionManager`](remreg_session::SessionManager)
//! through an `Arc` and never notify the UI while holding its lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod fetch;
pub mod handle;
pub mod search;

pub use channel::{ChannelNotifier, Envelope, EventQueue, Origin, RequestId, UiEvent};
pub use fetch::{fetch_key, FetchWorker};
pub use handle::{failure_message, WorkerHandle};
pub use search::{search, SearchHit, SearchOutcome, SearchQuery, SearchWorker, Searcher};
