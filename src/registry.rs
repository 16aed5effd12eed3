//! Registry of currently-known media renderers.
//!
//! All registry state (the device map AND the active selection) lives under
//! one `RwLock` so readers never observe a selection pointing at a device
//! that a concurrent sweep has already removed.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use crate::device::DeviceDescriptor;
use crate::error::{ControlError, ControlResult};
use crate::utils::now_millis;

#[derive(Debug, Default)]
struct RegistryInner {
    devices: HashMap<String, DeviceDescriptor>,
    active: Option<String>,
    /// Device id remembered from persisted settings; auto-selected when the
    /// device (re)appears and nothing else is active.
    preferred: Option<String>,
}

/// Shared registry of discovered renderers and the active selection.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: RwLock<RegistryInner>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that will auto-select `preferred` when it appears.
    #[must_use]
    pub fn with_preferred(preferred: Option<String>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                preferred,
                ..RegistryInner::default()
            }),
        }
    }

    /// Inserts or replaces a device descriptor.
    ///
    /// Re-announcements fully replace the stored descriptor; discovery
    /// re-resolves a device whose advertised location changed (see
    /// [`refresh`](Self::refresh)) and upserts the result here. Returns
    /// true if the device was new.
    pub fn upsert(&self, mut device: DeviceDescriptor) -> bool {
        let mut inner = self.inner.write();
        device.last_seen_ms = now_millis();

        let is_new = !inner.devices.contains_key(&device.id);
        let id = device.id.clone();
        inner.devices.insert(id.clone(), device);

        if inner.active.is_none() && inner.preferred.as_deref() == Some(id.as_str()) {
            log::info!("[REGISTRY] Re-selecting remembered device {}", id);
            inner.active = Some(id);
        }

        is_new
    }

    /// Marks a known device as seen now, if it still advertises the same
    /// description location.
    ///
    /// Returns false for unknown ids AND for known ids whose location
    /// changed (the device moved; its stored endpoints are stale). Callers
    /// fall through to a full description refetch in both cases.
    pub fn refresh(&self, device_id: &str, location: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.devices.get_mut(device_id) {
            Some(device) if device.location == location => {
                device.last_seen_ms = now_millis();
                true
            }
            _ => false,
        }
    }

    /// Removes a device. If it was the active selection, the selection is
    /// cleared rather than left dangling.
    pub fn evict(&self, device_id: &str) -> Option<DeviceDescriptor> {
        let mut inner = self.inner.write();
        let removed = inner.devices.remove(device_id);
        if removed.is_some() && inner.active.as_deref() == Some(device_id) {
            log::info!("[REGISTRY] Active device {} evicted, clearing selection", device_id);
            inner.active = None;
        }
        removed
    }

    /// Evicts every device not seen within `silence_timeout`.
    ///
    /// Returns the evicted descriptors. Clears the active selection if the
    /// active device is among them.
    pub fn evict_silent(&self, silence_timeout: Duration) -> Vec<DeviceDescriptor> {
        let cutoff = now_millis().saturating_sub(silence_timeout.as_millis() as u64);
        let mut inner = self.inner.write();

        let stale_ids: Vec<String> = inner
            .devices
            .values()
            .filter(|d| d.last_seen_ms < cutoff)
            .map(|d| d.id.clone())
            .collect();

        let mut evicted = Vec::with_capacity(stale_ids.len());
        for id in stale_ids {
            if let Some(device) = inner.devices.remove(&id) {
                if inner.active.as_deref() == Some(id.as_str()) {
                    log::info!("[REGISTRY] Active device {} went silent, clearing selection", id);
                    inner.active = None;
                }
                evicted.push(device);
            }
        }
        evicted
    }

    /// Selects a device as the control target.
    ///
    /// # Errors
    /// Returns `UnknownDevice` if no device with this id is registered.
    pub fn set_active(&self, device_id: &str) -> ControlResult<DeviceDescriptor> {
        let mut inner = self.inner.write();
        let device = inner
            .devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| ControlError::UnknownDevice(device_id.to_string()))?;
        inner.active = Some(device_id.to_string());
        inner.preferred = Some(device_id.to_string());
        Ok(device)
    }

    /// Clears the active selection.
    pub fn clear_active(&self) {
        self.inner.write().active = None;
    }

    /// Returns the active device's descriptor, if one is selected.
    #[must_use]
    pub fn get_active(&self) -> Option<DeviceDescriptor> {
        let inner = self.inner.read();
        inner
            .active
            .as_deref()
            .and_then(|id| inner.devices.get(id).cloned())
    }

    /// Returns the active device id, if one is selected.
    #[must_use]
    pub fn active_id(&self) -> Option<String> {
        self.inner.read().active.clone()
    }

    /// Looks up a device by id.
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<DeviceDescriptor> {
        self.inner.read().devices.get(device_id).cloned()
    }

    /// Returns all known devices, sorted by friendly name for stable display.
    #[must_use]
    pub fn list(&self) -> Vec<DeviceDescriptor> {
        let mut devices: Vec<DeviceDescriptor> = self.inner.read().devices.values().cloned().collect();
        devices.sort_by(|a, b| {
            a.friendly_name
                .cmp(&b.friendly_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        devices
    }

    /// Returns the number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().devices.len()
    }

    /// Returns true if no devices are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().devices.is_empty()
    }
}
