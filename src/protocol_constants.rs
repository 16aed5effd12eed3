//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, SSDP) and
//! changing them would break protocol compliance. Tunable values live in
//! [`crate::config::Config`]; only their defaults are collected here.

// ─────────────────────────────────────────────────────────────────────────────
// SSDP (Simple Service Discovery Protocol)
// ─────────────────────────────────────────────────────────────────────────────

/// Standard SSDP multicast address and port (protocol specification).
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// Multicast TTL recommended by the UPnP 1.0 spec.
pub const SSDP_MULTICAST_TTL: u32 = 4;

/// SSDP search target for uPNP media renderer devices.
pub const MEDIA_RENDERER_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

// ─────────────────────────────────────────────────────────────────────────────
// UPnP Volume Domain
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum volume accepted by the RenderingControl SetVolume action.
///
/// The UPnP RenderingControl service defines Master volume as 0-100.
pub const VOLUME_MAX: u8 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default interval between discovery sweeps (seconds).
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 10;

/// Default silence timeout before a device is evicted (seconds).
///
/// Three sweep intervals: a single lost M-SEARCH round never evicts.
pub const DEFAULT_SILENCE_TIMEOUT_SECS: u64 = 30;

/// Default volume change per key press.
pub const DEFAULT_VOLUME_STEP: u8 = 5;

/// Largest configurable volume step; anything bigger makes single key
/// presses jump uncomfortably loud.
pub const MAX_VOLUME_STEP: u8 = 25;

/// Default timeout for SOAP and description-document HTTP requests (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;

/// Default number of retries after a network-level dispatch failure.
pub const DEFAULT_RETRY_LIMIT: u32 = 2;

/// Default per-device command queue capacity.
///
/// Generous bound against pathological key repeat; past it commands are
/// dropped with a `QueueOverflow` signal.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Seconds a device worker sits idle before retiring itself.
///
/// Keeps the worker map from accumulating parked tasks for devices that
/// were evicted or renamed; a retired worker is respawned on the next
/// command for that device.
pub const WORKER_IDLE_TIMEOUT_SECS: u64 = 300;

/// Retry delays for network-level dispatch failures (exponential backoff).
///
/// Indexed by retry attempt; attempts past the end reuse the last delay.
pub const RETRY_BACKOFF_MS: [u64; 4] = [200, 500, 1000, 2000];

/// Returns the backoff delay in milliseconds for the given retry attempt (1-based).
#[must_use]
pub fn retry_backoff_ms(attempt: u32) -> u64 {
    let idx = (attempt.saturating_sub(1) as usize).min(RETRY_BACKOFF_MS.len() - 1);
    RETRY_BACKOFF_MS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_saturates() {
        assert_eq!(retry_backoff_ms(1), 200);
        assert_eq!(retry_backoff_ms(2), 500);
        assert_eq!(retry_backoff_ms(3), 1000);
        assert_eq!(retry_backoff_ms(4), 2000);
        assert_eq!(retry_backoff_ms(10), 2000);
    }
}
