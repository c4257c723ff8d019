use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::crypto::{self, KeyMaterial};
use crate::error::{FrameError, Result};
use crate::reading::SensorReading;

/// Initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// Length-prefix field size in bytes (big-endian u16).
pub const SIZE_LEN: usize = 2;

/// Integrity tag length in bytes (HMAC-SHA256).
pub const TAG_LEN: usize = 32;

/// AES block size; ciphertext length must be a positive multiple of this.
pub const BLOCK_SIZE: usize = 16;

/// Default maximum ciphertext size accepted from the wire.
///
/// The length prefix allows up to 65535 bytes; a telemetry record is two
/// blocks, so anything near the prefix ceiling is garbage or an attack.
pub const DEFAULT_MAX_CIPHERTEXT: usize = 4096;

/// One wire frame, transient, not retained after processing.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────────┬─────────────────┬────────────┐
/// │ iv (16B)   │ size        │ ciphertext       │ tag (32B)  │
/// │ raw        │ (2B BE u16) │ (size bytes)     │ HMAC-SHA256│
/// └────────────┴─────────────┴─────────────────┴────────────┘
/// ```
/// The tag covers the ciphertext only — not the IV, not the length prefix.
/// That is a protocol property, preserved exactly.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Per-frame initialization vector.
    pub iv: [u8; IV_LEN],
    /// Encrypted payload.
    pub ciphertext: Bytes,
    /// Keyed hash over the ciphertext.
    pub tag: [u8; TAG_LEN],
}

impl Frame {
    /// Create a frame from its three authenticated-wire fields.
    pub fn new(iv: [u8; IV_LEN], ciphertext: impl Into<Bytes>, tag: [u8; TAG_LEN]) -> Self {
        Self {
            iv,
            ciphertext: ciphertext.into(),
            tag,
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        IV_LEN + SIZE_LEN + self.ciphertext.len() + TAG_LEN
    }
}

/// Which wire field a read was positioned at; used for truncation reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireField {
    Iv,
    Size,
    Ciphertext,
    Tag,
}

impl fmt::Display for WireField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireField::Iv => "iv",
            WireField::Size => "size",
            WireField::Ciphertext => "ciphertext",
            WireField::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// Encode a frame into the wire format.
///
/// Does not enforce block alignment: tests and diagnostic tools may encode
/// deliberately malformed frames. Only the length-prefix range is checked.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if frame.ciphertext.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: frame.ciphertext.len(),
            max: u16::MAX as usize,
        });
    }
    dst.reserve(frame.wire_size());
    dst.put_slice(&frame.iv);
    dst.put_u16(frame.ciphertext.len() as u16);
    dst.put_slice(&frame.ciphertext);
    dst.put_slice(&frame.tag);
    Ok(())
}

/// Configuration for frame delimiting.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum ciphertext size accepted from a length prefix.
    pub max_ciphertext_len: usize,
    /// Read timeout for blocking stream reads, where the stream supports one.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking stream writes.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_ciphertext_len: DEFAULT_MAX_CIPHERTEXT,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Pure, stateless frame processing: verify, decrypt, decode.
///
/// No I/O. Holds only the immutable pre-shared keys; calling
/// [`FrameCodec::process`] twice on identical inputs yields identical
/// results.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    keys: KeyMaterial,
}

impl FrameCodec {
    pub fn new(keys: KeyMaterial) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    /// Decide authenticity and produce a decoded reading.
    ///
    /// Order is fixed: integrity verification short-circuits before
    /// decryption — unauthenticated ciphertext is never decrypted. Then the
    /// block-alignment precondition is checked, the payload decrypted, and
    /// the first 22 plaintext bytes parsed.
    pub fn process(&self, frame: &Frame) -> Result<SensorReading> {
        if !crypto::verify_tag(&frame.ciphertext, &frame.tag, self.keys.integrity_key()) {
            return Err(FrameError::IntegrityFailure);
        }
        let plaintext = crypto::decrypt(&frame.ciphertext, &frame.iv, self.keys.encryption_key())?;
        SensorReading::decode(&plaintext)
    }

    /// Encrypt and authenticate one reading into a frame (encoder side).
    pub fn seal(&self, reading: &SensorReading, iv: [u8; IV_LEN]) -> Frame {
        let ciphertext = crypto::encrypt(&reading.encode(), &iv, self.keys.encryption_key());
        let tag = crypto::compute_tag(&ciphertext, self.keys.integrity_key());
        Frame::new(iv, ciphertext, tag)
    }
}
