use std::io::{ErrorKind, Write};
use std::net::TcpStream;

use bytes::BytesMut;
use rand::RngCore;

use crate::codec::{encode_frame, Frame, FrameCodec, FrameConfig, IV_LEN};
use crate::crypto::KeyMaterial;
use crate::error::{FrameError, Result};

/// Writes sealed telemetry frames to any `Write` stream.
///
/// This is the sensor-side encoder boundary: serialize a reading, encrypt it
/// under a fresh IV, authenticate the ciphertext, and emit the four wire
/// fields. Exists for the simulated sensor and for end-to-end tests.
pub struct FrameWriter<T> {
    inner: T,
    codec: FrameCodec,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, keys: KeyMaterial) -> Self {
        Self::with_config(inner, keys, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, keys: KeyMaterial, config: FrameConfig) -> Self {
        Self {
            inner,
            codec: FrameCodec::new(keys),
            buf: BytesMut::with_capacity(128),
            config,
        }
    }

    /// Seal a reading under a random per-frame IV and send it.
    pub fn send(&mut self, reading: &crate::reading::SensorReading) -> Result<()> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        self.send_with_iv(reading, iv)
    }

    /// Seal a reading under a caller-supplied IV and send it.
    ///
    /// IV uniqueness is the caller's responsibility; reuse breaks CBC
    /// confidentiality for matching plaintext prefixes.
    pub fn send_with_iv(
        &mut self,
        reading: &crate::reading::SensorReading,
        iv: [u8; IV_LEN],
    ) -> Result<()> {
        let frame = self.codec.seal(reading, iv);
        self.write_frame(&frame)
    }

    /// Write an already-sealed frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<TcpStream> {
    /// Create a frame writer for a `TcpStream` and apply the write timeout
    /// from config.
    pub fn with_config_tcp(
        inner: TcpStream,
        keys: KeyMaterial,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, keys, config))
    }
}
