//! Mediakey Core - uPNP renderer discovery and control dispatch.
//!
//! This crate turns abstract control intents (volume up, play, pause, ...)
//! from a key-event source into SOAP actions against uPNP/DLNA media
//! renderers on the local network. It is designed to sit behind a thin
//! frontend (hotkey daemon, CLI, or desktop app) that produces
//! [`ControlIntent`] values and displays the device list.
//!
//! # Architecture
//!
//! - [`discovery`]: Background SSDP sweeps feeding the registry
//! - [`registry`]: Known devices and the active selection
//! - [`queue`]: Per-device FIFO command queues
//! - [`dispatch`]: Intent-to-SOAP translation with retry
//! - [`control`]: The [`RendererControl`](control::RendererControl) seam
//!   and its SOAP implementation
//! - [`upnp`]: Protocol plumbing (SSDP, description documents, SOAP)
//! - [`config`]: Tunables and persisted settings
//! - [`error`]: The error taxonomy control callers observe
//! - [`bootstrap`]: Composition root wiring the above together
//!
//! Discovery and dispatch never block each other: discovery owns the
//! registry writes, dispatch reads a snapshot of the target device per
//! command.

#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod control;
pub mod device;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod protocol_constants;
pub mod queue;
pub mod registry;
pub mod upnp;
pub mod utils;

#[cfg(test)]
pub mod test_fixtures;

// Re-export commonly used types at the crate root
pub use bootstrap::{bootstrap, MediakeyServices};
pub use config::{Config, Settings};
pub use control::{RendererControl, SoapRendererControl};
pub use device::{normalize_udn, DeviceDescriptor, RendererService};
pub use discovery::DiscoveryEngine;
pub use dispatch::ControlDispatcher;
pub use error::{ControlError, ControlResult};
pub use intent::{ControlIntent, TransportAction};
pub use queue::CommandQueue;
pub use registry::DeviceRegistry;
pub use upnp::description::{fetch_description, DeviceDescription};
pub use upnp::soap::{SoapError, SoapResult};
pub use upnp::ssdp::{DiscoveryError, DiscoveryResult, SsdpConfig};
pub use utils::now_millis;
