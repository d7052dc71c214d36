//! Fleetops SSH - transport layer
//!
//! This crate hides the SSH client behind two small traits so the execution
//! engine and the session manager can be driven by real hosts or by fakes:
//! - [`SshConnector`]: runs one command over a fresh connection, or opens a
//!   pseudo-terminal shell
//! - [`PtyProcess`]: a live remote shell with input, output and resize
//!
//! [`RusshConnector`] is the production implementation built on `russh`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod params;
pub mod transport;

pub use client::{RusshConnector, RusshPty};
pub use error::{Error, Result};
pub use params::{CommandOutput, ConnectionParams, Credential, TerminalSize};
pub use transport::{PtyProcess, SshConnector};
