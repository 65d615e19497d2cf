//! Runtime configuration

use crate::types::random_ids_enabled;
use remote_transport::{ListenerConfig, DEFAULT_MAX_FRAME_SIZE};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the host name placed in references
pub const HOSTNAME_ENV: &str = "REMOTE_OBJECT_HOSTNAME";

/// Environment variable overriding the maximum frame body size
pub const MAX_FRAME_ENV: &str = "REMOTE_OBJECT_MAX_FRAME";

/// Settings for an [`Exporter`](crate::Exporter) and the references it
/// hands out
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Pair each object with a fresh address space and a random number
    pub random_object_ids: bool,
    /// Host name clients use to reach exported objects
    pub host_name: String,
    pub max_frame_size: usize,
    pub max_connections: usize,
    /// Pause before accepting again after a failed accept
    pub accept_retry_delay: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let listener = ListenerConfig::default();
        Self {
            random_object_ids: false,
            host_name: "127.0.0.1".to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: listener.max_connections,
            accept_retry_delay: listener.accept_retry_delay,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        let mut config = Self {
            random_object_ids: random_ids_enabled(),
            ..Self::default()
        };

        if let Ok(host) = std::env::var(HOSTNAME_ENV) {
            if !host.trim().is_empty() {
                config.host_name = host.trim().to_string();
            }
        }

        if let Ok(value) = std::env::var(MAX_FRAME_ENV) {
            match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.max_frame_size = size,
                _ => warn!("Ignoring invalid {}={:?}", MAX_FRAME_ENV, value),
            }
        }

        config
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn with_random_object_ids(mut self, random: bool) -> Self {
        self.random_object_ids = random;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_accept_retry_delay(mut self, delay: Duration) -> Self {
        self.accept_retry_delay = delay;
        self
    }

    /// Settings for the listeners created on export
    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            max_frame_size: self.max_frame_size,
            max_connections: self.max_connections,
            accept_retry_delay: self.accept_retry_delay,
        }
    }
}
