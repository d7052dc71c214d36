use fleetops_ssh::TerminalSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading byte of a raw input frame
pub const INPUT_TAG: u8 = 0x00;
/// Leading byte of a JSON control frame
pub const CONTROL_TAG: u8 = 0x01;

/// A decoded client-to-shell frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Bytes for the shell's input, verbatim
    Input(Vec<u8>),
    /// New terminal size
    Resize(TerminalSize),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Control {
    Resize { cols: u32, rows: u32 },
}

/// Frame decoding errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// Zero-length frame
    #[error("empty frame")]
    Empty,

    /// First byte is neither tag
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),

    /// Control payload is not a known control message
    #[error("malformed control frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Resize to zero columns or rows
    #[error("invalid terminal size {cols}x{rows}")]
    InvalidSize {
        /// Requested columns
        cols: u32,
        /// Requested rows
        rows: u32,
    },
}

impl ClientFrame {
    /// Decode one frame: the first byte picks raw input or control.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (&tag, payload) = bytes.split_first().ok_or(FrameError::Empty)?;
        match tag {
            INPUT_TAG => Ok(Self::Input(payload.to_vec())),
            CONTROL_TAG => match serde_json::from_slice::<Control>(payload)? {
                Control::Resize { cols, rows } if cols > 0 && rows > 0 => {
                    Ok(Self::Resize(TerminalSize::new(cols, rows)))
                }
                Control::Resize { cols, rows } => Err(FrameError::InvalidSize { cols, rows }),
            },
            other => Err(FrameError::UnknownTag(other)),
        }
    }

    /// Encode for the wire
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Input(data) => {
                let mut frame = Vec::with_capacity(data.len() + 1);
                frame.push(INPUT_TAG);
                frame.extend_from_slice(data);
                frame
            }
            Self::Resize(size) => {
                let control = Control::Resize {
                    cols: size.cols,
                    rows: size.rows,
                };
                let mut frame = vec![CONTROL_TAG];
                // serialising a plain struct cannot fail
                frame.extend(serde_json::to_vec(&control).unwrap_or_default());
                frame
            }
        }
    }
}
