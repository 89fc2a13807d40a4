//! Relay behaviour parameters.
//!
//! [`RelayConfig`] groups the static parameters the dispatcher and handlers
//! read at runtime. These are application-layer concerns, not domain policy.

use std::path::PathBuf;
use std::time::Duration;

/// Apology prefixed to every user-facing error message.
pub const DEFAULT_APOLOGY: &str = "抱歉 我出错了，请再试一次";

/// Runtime behaviour of the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deadline for one request, covering every remote call it makes.
    pub request_timeout: Duration,
    /// Apology text used in error messages.
    pub apology: String,
    /// Working directory for spooled audio files.
    pub audio_dir: PathBuf,
    /// When set, generated images are also written here.
    pub image_dir: Option<PathBuf>,
    /// A session worker with no queued requests for this long exits.
    pub worker_idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            apology: DEFAULT_APOLOGY.to_string(),
            audio_dir: PathBuf::from("AudioTemp"),
            image_dir: None,
            worker_idle_timeout: Duration::from_secs(300),
        }
    }
}

impl RelayConfig {
    // ==================== Builder Methods ====================

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_apology(mut self, apology: impl Into<String>) -> Self {
        self.apology = apology.into();
        self
    }

    pub fn with_audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = dir.into();
        self
    }

    pub fn with_image_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.image_dir = dir;
        self
    }

    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout = timeout;
        self
    }
}
