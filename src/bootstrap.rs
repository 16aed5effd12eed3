//! Service bootstrap and dependency wiring.
//!
//! The composition root: the single place where discovery, registry,
//! dispatcher, and queue are instantiated and wired together. A frontend
//! calls [`bootstrap`] once, then talks to the returned
//! [`MediakeyServices`] only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;

use crate::config::{Config, Settings};
use crate::control::SoapRendererControl;
use crate::device::DeviceDescriptor;
use crate::discovery::DiscoveryEngine;
use crate::dispatch::ControlDispatcher;
use crate::error::ControlResult;
use crate::intent::ControlIntent;
use crate::queue::CommandQueue;
use crate::registry::DeviceRegistry;

/// Container for the wired services.
///
/// This is the surface an external presentation layer uses: the device
/// list, selection, intent submission, and lifecycle control.
pub struct MediakeyServices {
    registry: Arc<DeviceRegistry>,
    discovery: Arc<DiscoveryEngine>,
    queue: Arc<CommandQueue<SoapRendererControl>>,
    app_data_dir: Option<PathBuf>,
}

impl MediakeyServices {
    /// Returns a snapshot of the currently known devices.
    #[must_use]
    pub fn list_devices(&self) -> Vec<DeviceDescriptor> {
        self.registry.list()
    }

    /// Selects the control target and persists the choice.
    ///
    /// # Errors
    /// Returns `UnknownDevice` if no device with this id is known.
    pub fn set_active(&self, device_id: &str) -> ControlResult<DeviceDescriptor> {
        let device = self.registry.set_active(device_id)?;
        if let Some(dir) = &self.app_data_dir {
            if let Err(e) = Settings::set_last_active_atomic(dir, Some(device.id.clone())) {
                log::warn!("[BOOTSTRAP] Failed to persist active device: {}", e);
            }
        }
        Ok(device)
    }

    /// Returns the active device, if one is selected.
    #[must_use]
    pub fn get_active(&self) -> Option<DeviceDescriptor> {
        self.registry.get_active()
    }

    /// Submits one intent for the active device and waits for dispatch.
    pub async fn submit(&self, intent: ControlIntent) -> ControlResult<()> {
        self.queue.submit(intent).await
    }

    /// Spawns the loop consuming intents from the external key-event source.
    pub fn start_intent_source(&self, intents: mpsc::Receiver<ControlIntent>) {
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move { queue.run_intent_source(intents).await });
    }

    /// Requests an immediate discovery sweep.
    pub fn trigger_refresh(&self) {
        self.discovery.trigger_refresh();
    }

    /// Returns the shared registry, for frontends that subscribe directly.
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Stops discovery and shuts the command queue down.
    pub fn shutdown(&self) {
        log::info!("[BOOTSTRAP] Shutting down");
        self.discovery.stop();
        self.queue.shutdown();
    }
}

/// Creates the shared HTTP client for all device communication.
///
/// One client pools connections across SOAP posts and description fetches;
/// per-request timeouts are applied at the call sites.
fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Wires all services together and starts discovery.
///
/// `app_data_dir`, when given, enables settings persistence: the last
/// active device is remembered and re-selected when it reappears.
///
/// # Errors
/// Returns the validation message if the configuration is invalid.
pub fn bootstrap(
    config: Config,
    app_data_dir: Option<PathBuf>,
) -> Result<MediakeyServices, String> {
    config.validate()?;

    let http_client = create_http_client(config.request_timeout());

    let preferred = app_data_dir
        .as_deref()
        .and_then(|dir| Settings::load(dir).last_active_device);
    let registry = Arc::new(DeviceRegistry::with_preferred(preferred));

    let dispatcher = Arc::new(ControlDispatcher::new(
        SoapRendererControl::new(http_client.clone(), config.request_timeout()),
        &config,
    ));

    let queue = Arc::new(CommandQueue::new(
        dispatcher,
        Arc::clone(&registry),
        config.queue_capacity,
    ));

    let discovery = Arc::new(DiscoveryEngine::new(
        Arc::clone(&registry),
        http_client,
        config,
    ));
    discovery.start();

    Ok(MediakeyServices {
        registry,
        discovery,
        queue,
        app_data_dir,
    })
}
