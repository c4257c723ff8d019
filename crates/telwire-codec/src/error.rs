use crate::codec::WireField;

/// Errors that can occur while delimiting, authenticating, or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The integrity tag did not match the ciphertext.
    #[error("integrity tag mismatch")]
    IntegrityFailure,

    /// The ciphertext length is not a positive multiple of the cipher block size.
    #[error("malformed frame: ciphertext length {len} is not a positive multiple of 16")]
    MalformedFrame { len: usize },

    /// The decrypted payload is shorter than the fixed record size.
    #[error("truncated payload ({len} bytes, record needs 22)")]
    TruncatedPayload { len: usize },

    /// The length prefix exceeds the configured maximum.
    #[error("ciphertext too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended while a wire field was only partially read.
    #[error("connection truncated reading {field} ({got} of {expected} bytes)")]
    ConnectionTruncated {
        field: WireField,
        expected: usize,
        got: usize,
    },

    /// The stream ended cleanly at a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors constructing pre-shared key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The encryption key is not exactly 16 bytes (AES-128).
    #[error("encryption key must be 16 bytes, got {0}")]
    EncryptionKeyLength(usize),

    /// The integrity key is empty.
    #[error("integrity key must not be empty")]
    EmptyIntegrityKey,

    /// A hex-encoded key could not be decoded.
    #[error("invalid hex key: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
