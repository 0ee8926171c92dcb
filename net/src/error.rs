use thiserror::Error;

pub type PeerResult<T> = Result<T, PeerError>;

/// Error kinds raised by the codec, framer and connection layer.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Decoding ran past the available bytes of a message payload.
    #[error("truncated message: {0}")]
    Truncated(String),

    /// Header parsed and payload length satisfied, but the double-SHA256
    /// checksum didn't match. The frame is discarded, the connection continues.
    #[error("checksum mismatch for command {command:?}")]
    BadChecksum { command: String },

    /// Header magic doesn't match any recognized network. Fatal: the byte
    /// stream is unlikely to resynchronize.
    #[error("unrecognized network magic value: {0:#x}")]
    UnknownMagic(u32),

    /// `header.length` exceeded the configured cap. Fatal for the connection.
    #[error("payload size {size} exceeds configured maximum {max}")]
    Oversize { size: u32, max: u32 },

    /// The transport reported EOF.
    #[error("remote peer disconnected")]
    Disconnected,

    /// A protocol-level violation not covered by the above (e.g. a verack
    /// received before any version was sent).
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<String> for PeerError {
    fn from(msg: String) -> Self {
        PeerError::Protocol(msg)
    }
}

impl From<&str> for PeerError {
    fn from(msg: &str) -> Self {
        PeerError::Protocol(msg.to_string())
    }
}
