//! Records the engine works on
//!
//! - [`Task`]: a command, its dispatch mode and batch configuration
//! - [`HostExecution`]: one task's attempt on one host, with a monotonic status
//! - [`Host`]: connection details for a target machine

mod execution;
mod host;
mod task;


pub use execution::{aggregate_state, HostExecution, HostStatus, TaskState};
pub use host::{Host, HostAuth, HostSummary};
pub use task::{DispatchMode, FailurePolicy, Task};
