use std::io::Read;

use telwire_codec::{FrameCodec, FrameError, FrameReader};
use tracing::{debug, error, info, warn};

use crate::sink::ReadingSink;

/// Why a session left its read loop. `PeerClosed` is the only clean exit;
/// everything else is terminal-by-failure. There are no outgoing transitions
/// from a closed session — a new connection gets a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer shut the stream down at a frame boundary.
    PeerClosed,
    /// The stream ended with a wire field partially read.
    Truncated,
    /// An authenticated frame violated a structural precondition
    /// (block alignment, record length, or an absurd length prefix).
    Malformed,
    /// A lower-level transport error (reset, I/O failure).
    Transport,
    /// The downstream sink refused a delivery.
    Sink,
}

/// Outcome of one completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Readings decoded and forwarded, in arrival order.
    pub delivered: u64,
    /// Frames dropped for integrity failure; the session survived these.
    pub rejected: u64,
    pub close: CloseReason,
}

/// Owns one accepted connection and drives its byte stream frame by frame.
///
/// Per-frame outcomes: an integrity failure drops the frame and the loop
/// continues — one corrupted or attacked frame must not take down a
/// legitimate stream. A malformed or short authenticated frame terminates
/// the session, as does any transport error. No frame is ever retried.
pub struct IngestSession<R, S> {
    reader: FrameReader<R>,
    codec: FrameCodec,
    sink: S,
    peer: String,
}

impl<R: Read, S: ReadingSink> IngestSession<R, S> {
    pub fn new(
        reader: FrameReader<R>,
        codec: FrameCodec,
        sink: S,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            codec,
            sink,
            peer: peer.into(),
        }
    }

    /// Run the receive loop to its terminal state.
    pub fn run(&mut self) -> SessionSummary {
        let mut delivered = 0u64;
        let mut rejected = 0u64;

        let close = loop {
            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(FrameError::ConnectionClosed) => {
                    debug!(peer = %self.peer, "peer closed the stream");
                    break CloseReason::PeerClosed;
                }
                Err(err @ FrameError::ConnectionTruncated { .. }) => {
                    warn!(peer = %self.peer, error = %err, "stream truncated mid-frame");
                    break CloseReason::Truncated;
                }
                Err(err @ FrameError::PayloadTooLarge { .. }) => {
                    warn!(peer = %self.peer, error = %err, "rejecting oversized frame");
                    break CloseReason::Malformed;
                }
                Err(err) => {
                    error!(peer = %self.peer, error = %err, "transport error");
                    break CloseReason::Transport;
                }
            };

            match self.codec.process(&frame) {
                Ok(reading) => {
                    if let Err(err) = self.sink.deliver(&reading) {
                        error!(peer = %self.peer, error = %err, "sink delivery failed");
                        break CloseReason::Sink;
                    }
                    delivered += 1;
                }
                Err(FrameError::IntegrityFailure) => {
                    // Recoverable: drop the frame, keep the connection.
                    rejected += 1;
                    warn!(
                        peer = %self.peer,
                        rejected,
                        "integrity tag mismatch, frame dropped"
                    );
                }
                Err(err) => {
                    error!(peer = %self.peer, error = %err, "malformed frame, closing session");
                    break CloseReason::Malformed;
                }
            }
        };

        info!(
            peer = %self.peer,
            delivered,
            rejected,
            close = ?close,
            "session closed"
        );
        SessionSummary {
            delivered,
            rejected,
            close,
        }
    }

    /// The session's peer label (used in logs).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the session and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use telwire_codec::{
        encode_frame, Frame, FrameConfig, KeyMaterial, SensorReading, FrameWriter, IV_LEN, TAG_LEN,
    };

    use super::*;
    use crate::error::SinkError;

    #[derive(Default)]
    struct VecSink {
        readings: Vec<SensorReading>,
        fail_after: Option<usize>,
    }

    impl ReadingSink for VecSink {
        fn deliver(&mut self, reading: &SensorReading) -> Result<(), SinkError> {
            if let Some(limit) = self.fail_after {
                if self.readings.len() >= limit {
                    return Err(SinkError::Io(std::io::Error::other("sink full")));
                }
            }
            self.readings.push(*reading);
            Ok(())
        }
    }

    fn keys() -> KeyMaterial {
        KeyMaterial::new(b"0123456789ABCDEF", b"HMAC_SECRET_KEY").unwrap()
    }

    fn reading(id: u16) -> SensorReading {
        SensorReading {
            sensor_id: id,
            timestamp: 1_700_000_000 + u64::from(id),
            temperature: 20.0 + f32::from(id),
            pressure: 1000.0,
            humidity: 35.0,
        }
    }

    fn session_over(wire: Vec<u8>) -> IngestSession<Cursor<Vec<u8>>, VecSink> {
        IngestSession::new(
            FrameReader::new(Cursor::new(wire)),
            FrameCodec::new(keys()),
            VecSink::default(),
            "test-peer",
        )
    }

    fn sealed_wire(readings: &[SensorReading]) -> Vec<u8> {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()), keys());
        for (i, r) in readings.iter().enumerate() {
            writer.send_with_iv(r, [i as u8 + 1; IV_LEN]).unwrap();
        }
        writer.into_inner().into_inner()
    }

    #[test]
    fn clean_close_delivers_all_frames_in_order() {
        let mut session = session_over(sealed_wire(&[reading(1), reading(2), reading(3)]));
        let summary = session.run();

        assert_eq!(summary.close, CloseReason::PeerClosed);
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.rejected, 0);

        let ids: Vec<u16> = session.sink().readings.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn tampered_middle_frame_is_dropped_and_session_continues() {
        let mut wire = sealed_wire(&[reading(1), reading(2), reading(3)]);

        // Flip one ciphertext bit in the second frame.
        let frame_len = wire.len() / 3;
        let ct_offset = frame_len + IV_LEN + 2 + 4;
        wire[ct_offset] ^= 0x01;

        let mut session = session_over(wire);
        let summary = session.run();

        assert_eq!(summary.close, CloseReason::PeerClosed);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.rejected, 1);

        let ids: Vec<u16> = session.sink().readings.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn tampered_tag_is_dropped_too() {
        let mut wire = sealed_wire(&[reading(1), reading(2)]);
        let last = wire.len() - 1; // final tag byte of frame 2
        wire[last] ^= 0x80;

        let mut session = session_over(wire);
        let summary = session.run();

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.close, CloseReason::PeerClosed);
    }

    #[test]
    fn truncated_iv_terminates_without_emitting() {
        let mut session = session_over(vec![0xAB; 10]);
        let summary = session.run();

        assert_eq!(summary.close, CloseReason::Truncated);
        assert_eq!(summary.delivered, 0);
        assert!(session.sink().readings.is_empty());
    }

    #[test]
    fn authenticated_misaligned_frame_terminates() {
        // size 17 with a valid tag over the 17 ciphertext bytes: authenticates,
        // then fails the block-alignment precondition and closes the session.
        let ct = vec![0x55u8; 17];
        let tag: [u8; TAG_LEN] =
            telwire_codec::crypto::compute_tag(&ct, keys().integrity_key());
        let frame = Frame::new([0u8; IV_LEN], ct, tag);

        let mut wire = BytesMut::new();
        encode_frame(&frame, &mut wire).unwrap();
        // A valid frame after it must never be reached.
        wire.extend_from_slice(&sealed_wire(&[reading(9)]));

        let mut session = session_over(wire.to_vec());
        let summary = session.run();

        assert_eq!(summary.close, CloseReason::Malformed);
        assert_eq!(summary.delivered, 0);
    }

    #[test]
    fn oversized_length_prefix_terminates() {
        let mut wire = vec![0u8; IV_LEN];
        wire.extend_from_slice(&u16::MAX.to_be_bytes());

        let mut session = IngestSession::new(
            FrameReader::with_config(Cursor::new(wire), FrameConfig::default()),
            FrameCodec::new(keys()),
            VecSink::default(),
            "test-peer",
        );
        let summary = session.run();
        assert_eq!(summary.close, CloseReason::Malformed);
    }

    #[test]
    fn sink_failure_terminates_session() {
        let wire = sealed_wire(&[reading(1), reading(2)]);
        let mut session = IngestSession::new(
            FrameReader::new(Cursor::new(wire)),
            FrameCodec::new(keys()),
            VecSink {
                readings: Vec::new(),
                fail_after: Some(1),
            },
            "test-peer",
        );

        let summary = session.run();
        assert_eq!(summary.close, CloseReason::Sink);
        assert_eq!(summary.delivered, 1);
    }

    #[test]
    fn transport_error_terminates_session() {
        struct ResetReader;
        impl Read for ResetReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            }
        }

        let mut session = IngestSession::new(
            FrameReader::new(ResetReader),
            FrameCodec::new(keys()),
            VecSink::default(),
            "test-peer",
        );
        let summary = session.run();
        assert_eq!(summary.close, CloseReason::Transport);
        assert_eq!(summary.delivered, 0);
    }
}
