use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use telwire_codec::{FrameCodec, FrameReader};
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::session::{IngestSession, SessionSummary};
use crate::sink::ReadingSink;

/// Accepts sensor connections and hands each one to its own session.
///
/// Sessions share nothing mutable; the pre-shared keys are immutable and
/// cloned into each session's codec. One thread per connection — the read
/// protocol is strictly ordered and blocking by design.
pub struct IngestServer {
    listener: TcpListener,
    config: IngestConfig,
}

impl IngestServer {
    /// Bind the listening socket from config.
    pub fn bind(config: IngestConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.addr).map_err(|source| IngestError::Bind {
            addr: config.addr,
            source,
        })?;
        info!(addr = %config.addr, "listening for sensor connections");
        Ok(Self { listener, config })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept the next connection and build a session around it with the
    /// given sink. The configured read deadline is applied to the stream.
    pub fn accept<S: ReadingSink>(&self, sink: S) -> Result<IngestSession<TcpStream, S>> {
        let (stream, peer) = self.listener.accept().map_err(IngestError::Accept)?;
        debug!(peer = %peer, "accepted sensor connection");

        let reader = FrameReader::with_config_tcp(stream, self.config.frame_config())?;
        Ok(IngestSession::new(
            reader,
            FrameCodec::new(self.config.keys.clone()),
            sink,
            peer.to_string(),
        ))
    }

    /// Accept connections until `running` goes false, one thread per session.
    ///
    /// `make_sink` builds a fresh sink per connection, so sessions never
    /// contend on downstream state. The flag is only observed between
    /// accepts; a blocking accept completes its current wait first. Live
    /// sessions are always joined before this returns, on the error path
    /// included.
    pub fn serve<S, F>(&self, running: &AtomicBool, make_sink: F) -> Result<()>
    where
        S: ReadingSink + Send + 'static,
        F: Fn() -> S,
    {
        let mut workers: Vec<thread::JoinHandle<SessionSummary>> = Vec::new();

        let result = loop {
            if !running.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.accept(make_sink()) {
                Ok(mut session) => {
                    workers.push(thread::spawn(move || session.run()));
                    workers.retain(|handle| !handle.is_finished());
                }
                Err(err) => break Err(err),
            }
        };

        for handle in workers {
            if handle.join().is_err() {
                warn!("session worker panicked");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpStream;

    use telwire_codec::{FrameWriter, KeyMaterial, SensorReading, IV_LEN};

    use super::*;
    use crate::error::SinkError;
    use crate::session::CloseReason;

    struct VecSink(Vec<SensorReading>);

    impl ReadingSink for VecSink {
        fn deliver(&mut self, reading: &SensorReading) -> std::result::Result<(), SinkError> {
            self.0.push(*reading);
            Ok(())
        }
    }

    fn keys() -> KeyMaterial {
        KeyMaterial::new(b"0123456789ABCDEF", b"HMAC_SECRET_KEY").unwrap()
    }

    fn bind_ephemeral() -> IngestServer {
        let config = IngestConfig::new("127.0.0.1:0".parse().unwrap(), keys());
        IngestServer::bind(config).expect("ephemeral port binds")
    }

    #[test]
    fn accept_builds_session_over_tcp() {
        let server = bind_ephemeral();
        let addr = server.local_addr().unwrap();

        let sender = std::thread::spawn(move || {
            let stream = TcpStream::connect(addr).expect("client connects");
            let mut writer = FrameWriter::new(stream, keys());
            let reading = SensorReading {
                sensor_id: 21,
                timestamp: 1_700_000_000,
                temperature: 25.0,
                pressure: 1005.0,
                humidity: 33.0,
            };
            writer.send_with_iv(&reading, [9u8; IV_LEN]).unwrap();
            // Dropping the stream closes the connection at a frame boundary.
        });

        let mut session = server.accept(VecSink(Vec::new())).expect("accept succeeds");
        let summary = session.run();
        sender.join().unwrap();

        assert_eq!(summary.close, CloseReason::PeerClosed);
        assert_eq!(summary.delivered, 1);
        assert_eq!(session.sink().0[0].sensor_id, 21);
    }

    #[test]
    fn mid_frame_disconnect_is_truncation() {
        let server = bind_ephemeral();
        let addr = server.local_addr().unwrap();

        let sender = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).expect("client connects");
            stream.write_all(&[0u8; 10]).unwrap(); // 10 of 16 IV bytes
        });

        let mut session = server.accept(VecSink(Vec::new())).expect("accept succeeds");
        let summary = session.run();
        sender.join().unwrap();

        assert_eq!(summary.close, CloseReason::Truncated);
        assert_eq!(summary.delivered, 0);
    }

    #[test]
    fn serve_joins_live_sessions_when_accept_fails() {
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        struct SharedSink(Arc<Mutex<Vec<u16>>>);
        impl ReadingSink for SharedSink {
            fn deliver(&mut self, reading: &SensorReading) -> std::result::Result<(), SinkError> {
                self.0.lock().unwrap().push(reading.sensor_id);
                Ok(())
            }
        }

        let server = bind_ephemeral();
        let addr = server.local_addr().unwrap();
        // Nonblocking listener: the accept after the first connection fails
        // with WouldBlock, sending serve down its error path while the
        // session thread is still mid-read.
        server.listener.set_nonblocking(true).unwrap();

        let sender = std::thread::spawn(move || {
            let stream = TcpStream::connect(addr).expect("client connects");
            let mut writer = FrameWriter::new(stream, keys());
            std::thread::sleep(Duration::from_millis(50));
            let reading = SensorReading {
                sensor_id: 42,
                timestamp: 1_700_000_000,
                temperature: 21.0,
                pressure: 1001.0,
                humidity: 31.0,
            };
            writer.send(&reading).unwrap();
        });

        // Let the connection land in the accept queue first.
        std::thread::sleep(Duration::from_millis(20));

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink_ref = Arc::clone(&delivered);
        let running = AtomicBool::new(true);
        let result = server.serve(&running, move || SharedSink(Arc::clone(&sink_ref)));
        sender.join().unwrap();

        assert!(result.is_err());
        // The session finished before serve returned, so its reading is
        // already visible through the shared sink.
        assert_eq!(*delivered.lock().unwrap(), vec![42]);
    }

    #[test]
    fn sessions_are_independent_across_connections() {
        let server = bind_ephemeral();
        let addr = server.local_addr().unwrap();

        for id in [1u16, 2] {
            let sender = std::thread::spawn(move || {
                let stream = TcpStream::connect(addr).expect("client connects");
                let mut writer = FrameWriter::new(stream, keys());
                let reading = SensorReading {
                    sensor_id: id,
                    timestamp: 1_700_000_000,
                    temperature: 20.0,
                    pressure: 1000.0,
                    humidity: 30.0,
                };
                writer.send(&reading).unwrap();
            });

            let mut session = server.accept(VecSink(Vec::new())).expect("accept succeeds");
            let summary = session.run();
            sender.join().unwrap();

            assert_eq!(summary.delivered, 1);
            assert_eq!(session.sink().0[0].sensor_id, id);
        }
    }
}
