//! Shared test fixtures: description documents and a scripted renderer.
//!
//! These are used by multiple test modules to avoid duplication.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::control::RendererControl;
use crate::device::DeviceDescriptor;
use crate::intent::TransportAction;
use crate::upnp::soap::{SoapError, SoapResult};

/// Description document for a receiver exposing both renderer services
/// at the root device, with host-relative control URLs.
pub const DESCRIPTION_FULL_RENDERER: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Denon AVR-X1700H</friendlyName>
    <manufacturer>Denon</manufacturer>
    <modelName>AVR-X1700H</modelName>
    <UDN>uuid:5f9ec1b3-ff59-19bb-8530-0005cd1a2b3c</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <controlURL>/upnp/control/renderingcontrol1</controlURL>
        <eventSubURL>/upnp/event/renderingcontrol1</eventSubURL>
        <SCPDURL>/upnp/scpd/renderingcontrol1</SCPDURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <controlURL>/upnp/control/avtransport1</controlURL>
        <eventSubURL>/upnp/event/avtransport1</eventSubURL>
        <SCPDURL>/upnp/scpd/avtransport1</SCPDURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <controlURL>/upnp/control/connectionmanager1</controlURL>
        <eventSubURL>/upnp/event/connectionmanager1</eventSubURL>
        <SCPDURL>/upnp/scpd/connectionmanager1</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

/// Description document where the renderer services live on an embedded
/// device one level below the root, as many receivers publish them.
pub const DESCRIPTION_EMBEDDED_RENDERER: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>Living Room Receiver</friendlyName>
    <UDN>uuid:9d2f6a77-1c04-4e6b-b1de-7702aa331f55</UDN>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
        <friendlyName>Living Room Receiver (Renderer)</friendlyName>
        <UDN>uuid:9d2f6a77-1c04-4e6b-b1de-7702aa331f56</UDN>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
            <controlURL>/RenderingControl/ctrl</controlURL>
            <eventSubURL>/RenderingControl/evt</eventSubURL>
            <SCPDURL>/RenderingControl/scpd</SCPDURL>
          </service>
          <service>
            <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
            <controlURL>/AVTransport/ctrl</controlURL>
            <eventSubURL>/AVTransport/evt</eventSubURL>
            <SCPDURL>/AVTransport/scpd</SCPDURL>
          </service>
        </serviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

/// Builds a descriptor pointing at an unreachable test address.
pub fn test_descriptor(id: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        id: id.to_string(),
        friendly_name: format!("Test Renderer {}", id),
        control_endpoint: format!("http://192.0.2.10:8080/{}/rc", id),
        transport_endpoint: format!("http://192.0.2.10:8080/{}/avt", id),
        location: "http://192.0.2.10:8080/description.xml".to_string(),
        last_seen_ms: 0,
    }
}

#[derive(Default)]
struct MockInner {
    volume: Mutex<u8>,
    mute: Mutex<bool>,
    calls: Mutex<Vec<String>>,
    last_device_id: Mutex<Option<String>>,
    fail_network: AtomicU32,
    reject: AtomicU32,
    op_delay_ms: AtomicU64,
}

/// Scripted in-memory renderer for dispatcher and queue tests.
///
/// Records every SOAP-level call in order and can be primed to fail the
/// next N calls with either a network-class error or a device rejection.
/// Clones share state, so tests can keep a handle while the dispatcher
/// owns another.
#[derive(Clone, Default)]
pub struct MockRenderer {
    inner: Arc<MockInner>,
}

impl MockRenderer {
    /// Creates a mock starting at the given volume, unmuted.
    pub fn with_volume(volume: u8) -> Self {
        let mock = Self::default();
        *mock.inner.volume.lock() = volume;
        mock
    }

    /// Current volume level.
    pub fn volume(&self) -> u8 {
        *self.inner.volume.lock()
    }

    /// Current mute state.
    pub fn muted(&self) -> bool {
        *self.inner.mute.lock()
    }

    /// All calls received so far, including failed ones, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().clone()
    }

    /// Device id of the most recent call.
    pub fn last_device_id(&self) -> Option<String> {
        self.inner.last_device_id.lock().clone()
    }

    /// Fails the next `n` calls with a network-class error.
    pub fn fail_network_next(&self, n: u32) {
        self.inner.fail_network.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` calls with a device rejection (SOAP fault).
    pub fn reject_next(&self, n: u32) {
        self.inner.reject.store(n, Ordering::SeqCst);
    }

    /// Delays every call by `ms` (tokio time, so paused-clock tests stay fast).
    pub fn set_op_delay_ms(&self, ms: u64) {
        self.inner.op_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Records a call, applies the scripted delay, and returns the scripted
    /// failure if one is armed.
    async fn begin(&self, call: String, device: &DeviceDescriptor) -> SoapResult<()> {
        *self.inner.last_device_id.lock() = Some(device.id.clone());
        self.inner.calls.lock().push(call);

        let delay_ms = self.inner.op_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if take_one(&self.inner.fail_network) {
            return Err(SoapError::Timeout);
        }
        if take_one(&self.inner.reject) {
            return Err(SoapError::Fault("402 Invalid Args".to_string()));
        }
        Ok(())
    }
}

/// Decrements the counter if positive; returns whether it was.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl RendererControl for MockRenderer {
    async fn get_volume(&self, device: &DeviceDescriptor) -> SoapResult<u8> {
        self.begin("GetVolume".to_string(), device).await?;
        Ok(*self.inner.volume.lock())
    }

    async fn set_volume(&self, device: &DeviceDescriptor, volume: u8) -> SoapResult<()> {
        self.begin(format!("SetVolume({})", volume), device).await?;
        *self.inner.volume.lock() = volume;
        Ok(())
    }

    async fn get_mute(&self, device: &DeviceDescriptor) -> SoapResult<bool> {
        self.begin("GetMute".to_string(), device).await?;
        Ok(*self.inner.mute.lock())
    }

    async fn set_mute(&self, device: &DeviceDescriptor, mute: bool) -> SoapResult<()> {
        self.begin(format!("SetMute({})", mute), device).await?;
        *self.inner.mute.lock() = mute;
        Ok(())
    }

    async fn transport(
        &self,
        device: &DeviceDescriptor,
        action: TransportAction,
    ) -> SoapResult<()> {
        self.begin(action.action().to_string(), device).await?;
        Ok(())
    }
}
