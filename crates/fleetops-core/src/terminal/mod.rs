//! Terminal relay
//!
//! [`ClientFrame`] decodes what a terminal client sends; [`run_bridge`]
//! pumps bytes between that client and a live shell until either side
//! goes away.

mod bridge;
mod frame;

pub use bridge::{run_bridge, BridgeEnd};
pub use frame::{ClientFrame, FrameError, CONTROL_TAG, INPUT_TAG};

#[cfg(test)]
mod tests;
