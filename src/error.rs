//! Error types surfaced by control dispatch.
//!
//! Discovery-side failures (bad advertisements, unreachable description
//! documents) are contained inside the discovery engine and never appear
//! here; this taxonomy covers only what a caller submitting a control
//! intent can observe.

use thiserror::Error;

use crate::upnp::soap::SoapError;

/// Errors that can occur when a control intent is submitted or dispatched.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No device is currently selected as the control target.
    #[error("no active device selected")]
    NoActiveDevice,

    /// The targeted device is no longer present in the registry.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Network-level failure that persisted through all retries.
    #[error("network failure after retries: {0}")]
    Network(#[source] SoapError),

    /// The device received the request and rejected it.
    ///
    /// Never retried; a SOAP fault or error status is a deliberate answer,
    /// not a transient condition.
    #[error("device rejected request: {0}")]
    DeviceRejected(#[source] SoapError),

    /// The per-device command queue is full.
    #[error("command queue is full")]
    QueueOverflow,

    /// The command queue has shut down and accepts no further intents.
    #[error("command queue is shut down")]
    QueueShutdown,
}

/// Convenient Result alias for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

impl ControlError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveDevice => "no_active_device",
            Self::UnknownDevice(_) => "unknown_device",
            Self::Network(_) => "network_failure",
            Self::DeviceRejected(_) => "device_rejected",
            Self::QueueOverflow => "queue_overflow",
            Self::QueueShutdown => "queue_shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ControlError::NoActiveDevice.code(), "no_active_device");
        assert_eq!(ControlError::QueueOverflow.code(), "queue_overflow");
        assert_eq!(ControlError::QueueShutdown.code(), "queue_shutdown");
        assert_eq!(
            ControlError::UnknownDevice("x".into()).code(),
            "unknown_device"
        );
        assert_eq!(
            ControlError::DeviceRejected(SoapError::Parse).code(),
            "device_rejected"
        );
        assert_eq!(
            ControlError::Network(SoapError::Timeout).code(),
            "network_failure"
        );
    }
}
