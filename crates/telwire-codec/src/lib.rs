//! Authenticated telemetry frame codec and stream delimiting.
//!
//! This is the core value-add layer of telwire. Every frame on the wire is:
//! - A 16-byte per-frame initialization vector
//! - A 2-byte big-endian ciphertext length prefix
//! - The AES-128-CBC ciphertext (a positive multiple of 16 bytes)
//! - A 32-byte HMAC-SHA256 tag over the ciphertext only
//!
//! Processing is verify → decrypt → decode: unauthenticated ciphertext is
//! never decrypted, and a reading exists only if its frame authenticated.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod reader;
pub mod reading;
pub mod writer;

pub use codec::{
    encode_frame, Frame, FrameCodec, FrameConfig, WireField, BLOCK_SIZE, DEFAULT_MAX_CIPHERTEXT,
    IV_LEN, SIZE_LEN, TAG_LEN,
};
pub use crypto::{KeyMaterial, ENCRYPTION_KEY_LEN};
pub use error::{FrameError, KeyError, Result};
pub use reader::FrameReader;
pub use reading::{SensorReading, RECORD_LEN};
pub use writer::FrameWriter;
