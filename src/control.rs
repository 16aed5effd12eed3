//! Renderer control operations over SOAP.
//!
//! [`RendererControl`] is the seam between the dispatcher and the network;
//! the dispatcher depends on the trait so tests can substitute a scripted
//! renderer. [`SoapRendererControl`] is the real implementation backed by
//! the SOAP transport in `crate::upnp::soap`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::device::{DeviceDescriptor, RendererService};
use crate::intent::TransportAction;
use crate::upnp::soap::{SoapError, SoapRequestBuilder, SoapResult};
use crate::upnp::utils::extract_xml_text;

/// Trait for the control actions the dispatcher issues against a renderer.
#[async_trait]
pub trait RendererControl: Send + Sync {
    /// Gets the current Master channel volume (0-100).
    async fn get_volume(&self, device: &DeviceDescriptor) -> SoapResult<u8>;

    /// Sets the Master channel volume (0-100).
    async fn set_volume(&self, device: &DeviceDescriptor, volume: u8) -> SoapResult<()>;

    /// Gets the current Master channel mute state.
    async fn get_mute(&self, device: &DeviceDescriptor) -> SoapResult<bool>;

    /// Sets the Master channel mute state.
    async fn set_mute(&self, device: &DeviceDescriptor, mute: bool) -> SoapResult<()>;

    /// Invokes an AVTransport action verb (Play, Pause, Stop, Next, Previous).
    async fn transport(&self, device: &DeviceDescriptor, action: TransportAction)
        -> SoapResult<()>;
}

/// SOAP-backed renderer control.
#[derive(Debug, Clone)]
pub struct SoapRendererControl {
    client: Client,
    timeout: Duration,
}

impl SoapRendererControl {
    /// Creates a new SOAP control layer sharing the given HTTP client.
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl RendererControl for SoapRendererControl {
    async fn get_volume(&self, device: &DeviceDescriptor) -> SoapResult<u8> {
        let response =
            SoapRequestBuilder::new(&self.client, device.endpoint_for(RendererService::RenderingControl))
                .service(RendererService::RenderingControl)
                .action("GetVolume")
                .instance_id()
                .arg("Channel", "Master")
                .timeout(self.timeout)
                .send()
                .await?;

        extract_xml_text(&response, "CurrentVolume")
            .and_then(|v| v.trim().parse().ok())
            .ok_or(SoapError::Parse)
    }

    async fn set_volume(&self, device: &DeviceDescriptor, volume: u8) -> SoapResult<()> {
        let clamped = volume.min(crate::protocol_constants::VOLUME_MAX);

        SoapRequestBuilder::new(&self.client, device.endpoint_for(RendererService::RenderingControl))
            .service(RendererService::RenderingControl)
            .action("SetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .arg("DesiredVolume", clamped.to_string())
            .timeout(self.timeout)
            .send()
            .await?;

        Ok(())
    }

    async fn get_mute(&self, device: &DeviceDescriptor) -> SoapResult<bool> {
        let response =
            SoapRequestBuilder::new(&self.client, device.endpoint_for(RendererService::RenderingControl))
                .service(RendererService::RenderingControl)
                .action("GetMute")
                .instance_id()
                .arg("Channel", "Master")
                .timeout(self.timeout)
                .send()
                .await?;

        // Devices report booleans as "1"/"0" or "true"/"false"
        extract_xml_text(&response, "CurrentMute")
            .map(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"))
            .ok_or(SoapError::Parse)
    }

    async fn set_mute(&self, device: &DeviceDescriptor, mute: bool) -> SoapResult<()> {
        SoapRequestBuilder::new(&self.client, device.endpoint_for(RendererService::RenderingControl))
            .service(RendererService::RenderingControl)
            .action("SetMute")
            .instance_id()
            .arg("Channel", "Master")
            .arg("DesiredMute", if mute { "1" } else { "0" })
            .timeout(self.timeout)
            .send()
            .await?;

        Ok(())
    }

    async fn transport(
        &self,
        device: &DeviceDescriptor,
        action: TransportAction,
    ) -> SoapResult<()> {
        let mut builder =
            SoapRequestBuilder::new(&self.client, device.endpoint_for(RendererService::AVTransport))
                .service(RendererService::AVTransport)
                .action(action.action())
                .instance_id()
                .timeout(self.timeout);

        // Play is the only transport verb with an extra required argument
        if action == TransportAction::Play {
            builder = builder.arg("Speed", "1");
        }

        builder.send().await?;
        Ok(())
    }
}
