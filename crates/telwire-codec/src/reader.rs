use std::io::{ErrorKind, Read};
use std::net::TcpStream;

use tracing::trace;

use crate::codec::{Frame, FrameConfig, WireField, IV_LEN, SIZE_LEN, TAG_LEN};
use crate::error::{FrameError, Result};

/// Reads complete telemetry frames from any `Read` stream.
///
/// Fields are read in strict wire order — iv, size, ciphertext, tag — each
/// accumulated across partial reads until complete or the stream ends.
/// There is no resynchronization: if framing desyncs, every subsequent read
/// is garbage, and the error taxonomy reflects that by treating mid-field
/// end-of-stream as terminal.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends
    /// cleanly at a frame boundary, and `Err(FrameError::ConnectionTruncated)`
    /// when it ends with a field partially read.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut iv = [0u8; IV_LEN];
        self.read_field(&mut iv, WireField::Iv)?;

        let mut size_buf = [0u8; SIZE_LEN];
        self.read_field(&mut size_buf, WireField::Size)?;
        let size = u16::from_be_bytes(size_buf) as usize;
        if size > self.config.max_ciphertext_len {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.config.max_ciphertext_len,
            });
        }

        let mut ciphertext = vec![0u8; size];
        self.read_field(&mut ciphertext, WireField::Ciphertext)?;

        let mut tag = [0u8; TAG_LEN];
        self.read_field(&mut tag, WireField::Tag)?;

        trace!(ciphertext_len = size, "frame delimited");
        Ok(Frame::new(iv, ciphertext, tag))
    }

    fn read_field(&mut self, buf: &mut [u8], field: WireField) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                // End of stream before the first IV byte is a normal close;
                // anywhere else the peer cut a frame short.
                Ok(0) if field == WireField::Iv && filled == 0 => {
                    return Err(FrameError::ConnectionClosed)
                }
                Ok(0) => {
                    return Err(FrameError::ConnectionTruncated {
                        field,
                        expected: buf.len(),
                        got: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<TcpStream> {
    /// Create a frame reader for a `TcpStream` and apply the read timeout
    /// from config. An idle peer then fails the blocking read instead of
    /// stalling the session forever.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
