//! In-memory remote registry for remreg
//!
//! A registry server held in process memory, reachable through the same
//! [`RemoteRegistryTransport`](remreg_core::RemoteRegistryTransport) and
//! [`TransportConnector`](remreg_core::TransportConnector) traits as a real
//! RPC stub. Used as the backend for every test and for offline work.
//!
//! - MemoryRegistry: the shared tree, handle table, paging and accounting
//! - MemoryTransport: one client connection
//! - MemoryConnector: host and credential checks
//! - Fault: injected failures per operation and name

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connector;
pub mod fault;
pub mod registry;
pub mod transport;

pub use connector::MemoryConnector;
pub use fault::{Fault, Op};
pub use registry::{MemoryRegistry, MemoryStats};
pub use transport::MemoryTransport;
