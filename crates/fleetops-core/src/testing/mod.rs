//! Fakes of the SSH transport.
//!
//! [`FakeConnector`] answers `exec` from a per-address script and records
//! when each command started and finished; [`FakePty`] records everything a
//! terminal client sends and lets the test drive its output.

mod connector;
mod pty;

pub use connector::{Call, FakeConnector, Outcome};
pub use pty::{FakePty, PtyOp};

use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
