//! Background discovery engine.
//!
//! Runs SSDP sweeps on an interval, ingests responders into the registry,
//! and evicts devices that have gone silent. A malformed advertisement or
//! unreachable description document only skips that device for the round;
//! it never aborts the sweep or surfaces to control callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::device::{normalize_udn, DeviceDescriptor};
use crate::registry::DeviceRegistry;
use crate::upnp::description::{fetch_description, DeviceDescription};
use crate::upnp::ssdp::{self, SsdpResponse};

/// Periodic SSDP discovery feeding the device registry.
pub struct DiscoveryEngine {
    registry: Arc<DeviceRegistry>,
    client: Client,
    config: Config,
    cancel: CancellationToken,
    refresh_notify: Notify,
    started: AtomicBool,
}

impl DiscoveryEngine {
    /// Creates a discovery engine over the given registry.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, client: Client, config: Config) -> Self {
        Self {
            registry,
            client,
            config,
            cancel: CancellationToken::new(),
            refresh_notify: Notify::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Starts the background sweep loop. Subsequent calls are no-ops.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            log::debug!("[DISCOVERY] Already running, ignoring start");
            return;
        }
        log::info!(
            "[DISCOVERY] Starting (interval {}s, silence timeout {}s)",
            self.config.discovery_interval_secs,
            self.config.silence_timeout_secs
        );
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run().await });
    }

    /// Requests an immediate sweep without waiting for the interval.
    pub fn trigger_refresh(&self) {
        self.refresh_notify.notify_one();
    }

    /// Stops the sweep loop. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn run(self: Arc<Self>) {
        loop {
            self.sweep().await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.refresh_notify.notified() => {
                    log::debug!("[DISCOVERY] Manual refresh requested");
                }
                _ = tokio::time::sleep(self.config.discovery_interval()) => {}
            }
        }
        log::info!("[DISCOVERY] Stopped");
    }

    /// Runs one discovery round: search, ingest, evict.
    async fn sweep(&self) {
        let responses = match ssdp::search(&self.config.ssdp_config()).await {
            Ok(responses) => responses,
            Err(e) => {
                // A failed round proves nothing about device health, so
                // skip eviction too and try again next interval.
                log::warn!("[DISCOVERY] Sweep failed: {}", e);
                return;
            }
        };

        for response in responses {
            self.ingest(response).await;
        }

        for device in self.registry.evict_silent(self.config.silence_timeout()) {
            log::info!(
                "[DISCOVERY] Evicted {} ({}): silent past timeout",
                device.friendly_name,
                device.id
            );
        }
    }

    /// Ingests one SSDP responder.
    ///
    /// Known devices advertising their stored location just get their
    /// last-seen stamp refreshed; the description document is fetched for
    /// new ids and for known ids whose location changed (the device moved,
    /// so its stored endpoints are stale).
    async fn ingest(&self, response: SsdpResponse) {
        // The SSDP USN is the id that recurs every round, so it keys the
        // registry even when the description advertises an embedded UDN.
        let id = normalize_udn(&response.udn);

        if self.registry.refresh(&id, &response.location) {
            return;
        }

        if self.registry.get(&id).is_some() {
            log::info!(
                "[DISCOVERY] {} advertised a new location ({}), re-resolving endpoints",
                id,
                response.location
            );
        }

        let description = match fetch_description(
            &self.client,
            &response.location,
            self.config.request_timeout(),
        )
        .await
        {
            Ok(description) => description,
            Err(e) => {
                log::warn!(
                    "[DISCOVERY] Skipping {} ({}): {}",
                    id,
                    response.location,
                    e
                );
                return;
            }
        };

        match descriptor_from(id, &response.location, description) {
            Some(device) => {
                log::info!(
                    "[DISCOVERY] Found renderer {} ({})",
                    device.friendly_name,
                    device.id
                );
                self.registry.upsert(device);
            }
            None => {
                log::debug!(
                    "[DISCOVERY] Skipping {}: missing RenderingControl or AVTransport",
                    response.location
                );
            }
        }
    }
}

/// Builds a registry descriptor from a parsed description document.
///
/// Returns `None` unless the device publishes both services the
/// dispatcher needs; a renderer we can neither adjust nor transport
/// is not worth listing.
fn descriptor_from(
    id: String,
    location: &str,
    description: DeviceDescription,
) -> Option<DeviceDescriptor> {
    let control_endpoint = description.rendering_control_url?;
    let transport_endpoint = description.av_transport_url?;

    Some(DeviceDescriptor {
        id,
        friendly_name: description.friendly_name,
        control_endpoint,
        transport_endpoint,
        location: location.to_string(),
        last_seen_ms: 0, // stamped by the registry on upsert
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(rc: Option<&str>, avt: Option<&str>) -> DeviceDescription {
        DeviceDescription {
            udn: "uuid:abc-123".into(),
            friendly_name: "Den Receiver".into(),
            rendering_control_url: rc.map(String::from),
            av_transport_url: avt.map(String::from),
        }
    }

    const LOCATION: &str = "http://h/description.xml";

    #[test]
    fn descriptor_requires_both_services() {
        assert!(descriptor_from(
            "abc".into(),
            LOCATION,
            description(Some("http://h/rc"), None)
        )
        .is_none());
        assert!(descriptor_from(
            "abc".into(),
            LOCATION,
            description(None, Some("http://h/avt"))
        )
        .is_none());

        let device = descriptor_from(
            "abc".into(),
            LOCATION,
            description(Some("http://h/rc"), Some("http://h/avt")),
        )
        .expect("both services present");
        assert_eq!(device.id, "abc");
        assert_eq!(device.control_endpoint, "http://h/rc");
        assert_eq!(device.transport_endpoint, "http://h/avt");
        assert_eq!(device.location, LOCATION);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let engine = Arc::new(DiscoveryEngine::new(
            Arc::new(DeviceRegistry::new()),
            Client::new(),
            Config::default(),
        ));
        engine.stop();
        engine.stop();
        assert!(engine.cancel.is_cancelled());
    }
}
