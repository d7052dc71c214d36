//! Fleetops Core - Remote Execution Engine
//!
//! This crate runs shell commands across a fleet of hosts and relays
//! interactive terminals, including:
//! - Event Bus: best-effort fan-out of task and session events
//! - Orchestrator: batched, concurrency-bounded dispatch with failure policies
//! - Executor: one command on one host, recorded and streamed
//! - Sessions: live pseudo-terminal shells keyed by session id
//! - Terminal: frame codec and the bridge between a client stream and a shell
//! - Store: record persistence (SQLite or in-memory)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event_bus;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod service;
pub mod session;
pub mod store;
pub mod terminal;

/// In-process fakes for the SSH transport
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use event_bus::{Event, EventBus, EventStatus, Subscription, Topic};
pub use executor::RemoteExecutor;
pub use model::{
    aggregate_state, DispatchMode, FailurePolicy, Host, HostAuth, HostExecution, HostStatus,
    HostSummary, Task, TaskState,
};
pub use orchestrator::{plan_batches, DispatchOutcome, Orchestrator};
pub use service::{SubmitTask, TaskService, TaskStatusReport};
pub use session::{SessionInfo, SessionManager};
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use terminal::{run_bridge, BridgeEnd, ClientFrame};
