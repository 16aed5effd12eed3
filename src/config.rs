//! Configuration and persisted settings.
//!
//! [`Config`] holds the tunable runtime parameters; all fields have
//! defaults and serde `default` attributes so a partial config file is
//! fine. [`Settings`] is the small persisted state (last active device)
//! written atomically to the app data directory.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_DISCOVERY_INTERVAL_SECS, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_LIMIT, DEFAULT_SILENCE_TIMEOUT_SECS, DEFAULT_VOLUME_STEP, MAX_VOLUME_STEP,
};
use crate::upnp::ssdp::SsdpConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Runtime Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for discovery and control dispatch.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Discovery
    /// Interval between discovery sweeps (seconds).
    pub discovery_interval_secs: u64,

    /// Silence timeout before an unresponsive device is evicted (seconds).
    ///
    /// Must be at least twice the discovery interval so a single dropped
    /// M-SEARCH round never evicts a healthy device.
    pub silence_timeout_secs: u64,

    /// Number of M-SEARCH packets to send per discovery round.
    pub ssdp_send_count: u64,

    /// Delay between M-SEARCH packet repeats (milliseconds).
    pub ssdp_retry_delay_ms: u64,

    /// Window during which SSDP responses are collected (seconds).
    pub ssdp_response_window_secs: u64,

    /// MX value advertised in M-SEARCH (max device response delay, seconds).
    pub ssdp_mx: u64,

    // Control
    /// Volume change per key press (0-100 scale).
    pub volume_step: u8,

    /// Timeout for SOAP and description-document HTTP requests (seconds).
    pub request_timeout_secs: u64,

    /// Number of retries after a network-level dispatch failure.
    ///
    /// Total attempts per command is `retry_limit + 1`.
    pub retry_limit: u32,

    /// Per-device command queue capacity.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_interval_secs: DEFAULT_DISCOVERY_INTERVAL_SECS,
            silence_timeout_secs: DEFAULT_SILENCE_TIMEOUT_SECS,
            ssdp_send_count: 3,
            ssdp_retry_delay_ms: 800,
            ssdp_response_window_secs: 3,
            ssdp_mx: 2,
            volume_step: DEFAULT_VOLUME_STEP,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_limit: DEFAULT_RETRY_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        if self.discovery_interval_secs == 0 {
            return Err("discovery_interval_secs must be >= 1".to_string());
        }
        if self.silence_timeout_secs < self.discovery_interval_secs * 2 {
            return Err(
                "silence_timeout_secs must be at least twice discovery_interval_secs".to_string(),
            );
        }
        if self.volume_step == 0 || self.volume_step > MAX_VOLUME_STEP {
            return Err("volume_step must be in 1..=25".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be >= 1 (mpsc::channel panics on 0)".to_string());
        }
        if self.ssdp_send_count == 0 {
            return Err("ssdp_send_count must be >= 1".to_string());
        }
        if self.ssdp_response_window_secs == 0 {
            return Err("ssdp_response_window_secs must be >= 1".to_string());
        }
        Ok(())
    }

    /// Returns the SSDP search parameters derived from this config.
    #[must_use]
    pub fn ssdp_config(&self) -> SsdpConfig {
        SsdpConfig {
            send_count: self.ssdp_send_count,
            retry_delay: Duration::from_millis(self.ssdp_retry_delay_ms),
            response_window: Duration::from_secs(self.ssdp_response_window_secs),
            mx: self.ssdp_mx,
        }
    }

    /// Returns the per-request HTTP timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the interval between discovery sweeps.
    #[must_use]
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    /// Returns the silence timeout for device eviction.
    #[must_use]
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Settings
// ─────────────────────────────────────────────────────────────────────────────

const SETTINGS_FILE: &str = "settings.json";

/// Global mutex to serialize all settings file operations.
/// Prevents race conditions from concurrent update operations.
static SETTINGS_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn settings_lock() -> &'static Mutex<()> {
    SETTINGS_LOCK.get_or_init(|| Mutex::new(()))
}

/// Persisted user settings.
///
/// The last active device is remembered across restarts so the previously
/// selected renderer is re-selected when it reappears on the network.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Device id of the most recently selected renderer.
    pub last_active_device: Option<String>,
}

impl Settings {
    /// Loads settings from the app data directory.
    ///
    /// Returns default (empty) settings if the file doesn't exist or is invalid.
    pub fn load(app_data_dir: &Path) -> Self {
        let path = app_data_dir.join(SETTINGS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Saves settings to the app data directory.
    ///
    /// Uses atomic write (temp file + rename) to prevent corruption on crash.
    /// Creates the directory if it doesn't exist.
    pub fn save(&self, app_data_dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(app_data_dir)?;
        let path = app_data_dir.join(SETTINGS_FILE);
        let temp_path = app_data_dir.join("settings.json.tmp");
        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, &path)
    }

    /// Atomically records the last active device in the settings file.
    ///
    /// Acquires a lock, loads current settings, updates the field, and saves.
    /// Idempotent - writing the current value is a no-op (skips disk write).
    pub fn set_last_active_atomic(
        app_data_dir: &Path,
        device_id: Option<String>,
    ) -> std::io::Result<()> {
        let _guard = settings_lock().lock();
        let mut settings = Self::load(app_data_dir);
        if settings.last_active_device != device_id {
            settings.last_active_device = device_id;
            settings.save(app_data_dir)?;
        }
        Ok(())
    }
}
