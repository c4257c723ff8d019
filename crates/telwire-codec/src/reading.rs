use bytes::{Buf, BufMut};

use crate::error::{FrameError, Result};

/// Fixed record length: `u16 | u64 | f32 | f32 | f32`, little endian.
pub const RECORD_LEN: usize = 22;

/// One decoded sensor reading.
///
/// Exists only if it was produced from a frame that passed integrity
/// verification and decryption; there is no partially-trusted variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Sensor identifier.
    pub sensor_id: u16,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Degrees Celsius by convention; unit-less at this layer.
    pub temperature: f32,
    /// Hectopascal by convention.
    pub pressure: f32,
    /// Percent relative humidity by convention.
    pub humidity: f32,
}

impl SensorReading {
    /// Parse the first 22 bytes of a decrypted payload; trailing bytes
    /// (cipher padding) are ignored.
    pub fn decode(mut payload: &[u8]) -> Result<Self> {
        if payload.len() < RECORD_LEN {
            return Err(FrameError::TruncatedPayload {
                len: payload.len(),
            });
        }
        Ok(Self {
            sensor_id: payload.get_u16_le(),
            timestamp: payload.get_u64_le(),
            temperature: payload.get_f32_le(),
            pressure: payload.get_f32_le(),
            humidity: payload.get_f32_le(),
        })
    }

    /// Serialize to the fixed 22-byte wire layout.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        let mut dst = &mut buf[..];
        dst.put_u16_le(self.sensor_id);
        dst.put_u64_le(self.timestamp);
        dst.put_f32_le(self.temperature);
        dst.put_f32_le(self.pressure);
        dst.put_f32_le(self.humidity);
        buf
    }
}
