use std::net::SocketAddr;
use std::time::Duration;

use telwire_codec::{FrameConfig, KeyMaterial, DEFAULT_MAX_CIPHERTEXT};

/// Default read deadline for an accepted connection.
///
/// The wire protocol has none; without one an idle peer stalls its session
/// forever.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide ingest configuration, built once at startup.
///
/// No runtime reconfiguration: the listening address and the two pre-shared
/// keys are fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Address the listener binds.
    pub addr: SocketAddr,
    /// Pre-shared encryption and integrity keys.
    pub keys: KeyMaterial,
    /// Per-connection read deadline; `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Maximum ciphertext size accepted from a length prefix.
    pub max_ciphertext_len: usize,
}

impl IngestConfig {
    pub fn new(addr: SocketAddr, keys: KeyMaterial) -> Self {
        Self {
            addr,
            keys,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            max_ciphertext_len: DEFAULT_MAX_CIPHERTEXT,
        }
    }

    /// Override the per-connection read deadline.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Override the maximum accepted ciphertext size.
    pub fn with_max_ciphertext_len(mut self, max: usize) -> Self {
        self.max_ciphertext_len = max;
        self
    }

    /// Frame delimiting configuration derived from this config.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_ciphertext_len: self.max_ciphertext_len,
            read_timeout: self.read_timeout,
            write_timeout: None,
        }
    }
}
