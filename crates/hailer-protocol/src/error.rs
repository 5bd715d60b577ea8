//! Codec errors.

use thiserror::Error;

/// Error decoding or encoding a frame.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or a known packet type has bad fields.
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame is valid JSON but not an object.
    #[error("packet must be a JSON object")]
    NotAnObject,
}
