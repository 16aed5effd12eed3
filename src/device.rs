//! Value types for discovered uPNP media renderers.
//!
//! A [`DeviceDescriptor`] is a plain snapshot of one renderer: its identity,
//! display name, and the two control endpoints resolved from its description
//! document. It deliberately carries no reference to any discovery library's
//! object graph.

use serde::Serialize;

/// uPNP services the dispatcher invokes on a renderer.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RendererService {
    /// Volume and mute state.
    RenderingControl,
    /// Playback transport (play, pause, stop, next, previous).
    AVTransport,
}

impl RendererService {
    /// Returns the UPnP service URN for SOAP requests.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
        }
    }

    /// Returns a human-readable name for this service.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RenderingControl => "RenderingControl",
            Self::AVTransport => "AVTransport",
        }
    }
}

/// A media renderer discovered on the local network.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescriptor {
    /// Stable identifier derived from the device's advertised UDN/USN.
    pub id: String,
    /// Friendly name from the device description document.
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    /// Absolute URL of the RenderingControl control endpoint.
    #[serde(rename = "controlEndpoint")]
    pub control_endpoint: String,
    /// Absolute URL of the AVTransport control endpoint.
    #[serde(rename = "transportEndpoint")]
    pub transport_endpoint: String,
    /// Description document URL the endpoints were resolved from.
    ///
    /// A renderer that moves to a new address keeps its UDN but advertises
    /// a new LOCATION; comparing against this detects the move.
    pub location: String,
    /// Unix milliseconds of the most recent discovery confirmation.
    #[serde(rename = "lastSeenMs")]
    pub last_seen_ms: u64,
}

impl DeviceDescriptor {
    /// Returns the control URL for the given service.
    #[must_use]
    pub fn endpoint_for(&self, service: RendererService) -> &str {
        match service {
            RendererService::RenderingControl => &self.control_endpoint,
            RendererService::AVTransport => &self.transport_endpoint,
        }
    }
}

/// Normalizes an advertised UDN/USN to a stable device id.
///
/// Handles the shapes seen in real SSDP traffic:
/// - `uuid:` prefix (from the UPnP UDN)
/// - `::urn:schemas-upnp-org:device:MediaRenderer:1` suffix (from the USN)
#[must_use]
pub fn normalize_udn(raw: &str) -> String {
    let mut udn = raw.trim().to_string();

    if let Some(stripped) = udn.strip_prefix("uuid:") {
        udn = stripped.to_string();
    }

    if let Some(idx) = udn.find("::") {
        udn.truncate(idx);
    }

    udn
}
