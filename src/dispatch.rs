//! Translates control intents into SOAP action sequences.
//!
//! The dispatcher owns the retry policy and the read-then-write volume
//! logic. It operates on one device at a time; ordering across commands
//! for a device is the queue's job, not the dispatcher's.

use std::time::Duration;

use crate::config::Config;
use crate::control::RendererControl;
use crate::device::DeviceDescriptor;
use crate::error::{ControlError, ControlResult};
use crate::intent::{ControlIntent, TransportAction};
use crate::protocol_constants::{retry_backoff_ms, VOLUME_MAX};
use crate::upnp::soap::SoapResult;

/// Executes control intents against renderers with retry on network failures.
pub struct ControlDispatcher<C> {
    control: C,
    volume_step: u8,
    retry_limit: u32,
}

impl<C: RendererControl> ControlDispatcher<C> {
    /// Creates a dispatcher over the given control layer.
    #[must_use]
    pub fn new(control: C, config: &Config) -> Self {
        Self {
            control,
            volume_step: config.volume_step,
            retry_limit: config.retry_limit,
        }
    }

    /// Executes one intent against a device.
    ///
    /// # Errors
    /// * `Network` if a network-level failure persisted through all retries
    /// * `DeviceRejected` if the device answered with a fault or error status
    pub async fn execute(
        &self,
        device: &DeviceDescriptor,
        intent: ControlIntent,
    ) -> ControlResult<()> {
        log::debug!("[DISPATCH] {} -> {}", intent, device.friendly_name);
        match intent {
            ControlIntent::VolumeUp => self.step_volume(device, true).await,
            ControlIntent::VolumeDown => self.step_volume(device, false).await,
            ControlIntent::MuteToggle => self.toggle_mute(device).await,
            ControlIntent::Play => self.transport(device, TransportAction::Play).await,
            ControlIntent::Pause => self.transport(device, TransportAction::Pause).await,
            ControlIntent::Stop => self.transport(device, TransportAction::Stop).await,
            ControlIntent::Next => self.transport(device, TransportAction::Next).await,
            ControlIntent::Previous => self.transport(device, TransportAction::Previous).await,
        }
    }

    /// Adjusts volume by one step, saturating at 0 and 100.
    ///
    /// Renderers expose no relative volume action, so this reads the
    /// current level and writes the adjusted one. The write always goes
    /// out, even at a boundary; the device treats it as a no-op.
    async fn step_volume(&self, device: &DeviceDescriptor, up: bool) -> ControlResult<()> {
        let current = self
            .with_retry("GetVolume", || self.control.get_volume(device))
            .await?;

        let target = if up {
            current.saturating_add(self.volume_step).min(VOLUME_MAX)
        } else {
            current.saturating_sub(self.volume_step)
        };

        log::info!(
            "[DISPATCH] Volume {} -> {} on {}",
            current,
            target,
            device.friendly_name
        );

        self.with_retry("SetVolume", || self.control.set_volume(device, target))
            .await
    }

    /// Flips the current mute state.
    async fn toggle_mute(&self, device: &DeviceDescriptor) -> ControlResult<()> {
        let muted = self
            .with_retry("GetMute", || self.control.get_mute(device))
            .await?;

        log::info!(
            "[DISPATCH] Mute {} -> {} on {}",
            muted,
            !muted,
            device.friendly_name
        );

        self.with_retry("SetMute", || self.control.set_mute(device, !muted))
            .await
    }

    /// Invokes one AVTransport verb.
    async fn transport(
        &self,
        device: &DeviceDescriptor,
        action: TransportAction,
    ) -> ControlResult<()> {
        self.with_retry(action.action(), || self.control.transport(device, action))
            .await
    }

    /// Executes a SOAP operation, retrying network-level failures.
    ///
    /// Total attempts is `retry_limit + 1`. Protocol-level rejections
    /// (faults, error statuses, unparseable responses) are returned
    /// immediately without retrying.
    async fn with_retry<T, F, Fut>(&self, action: &str, mut operation: F) -> ControlResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = SoapResult<T>>,
    {
        let mut last_error = None;
        for attempt in 0..=self.retry_limit {
            if attempt > 0 {
                let delay_ms = retry_backoff_ms(attempt);
                log::info!(
                    "[DISPATCH] Retrying {} (attempt {}/{}) after {}ms",
                    action,
                    attempt + 1,
                    self.retry_limit + 1,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match operation().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_network() => {
                    log::warn!("[DISPATCH] {} network error: {}", action, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    log::warn!("[DISPATCH] {} rejected by device: {}", action, e);
                    return Err(ControlError::DeviceRejected(e));
                }
            }
        }

        Err(ControlError::Network(
            last_error.expect("retry loop should have set last_error"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{test_descriptor, MockRenderer};

    fn dispatcher(mock: MockRenderer) -> ControlDispatcher<MockRenderer> {
        ControlDispatcher::new(mock, &Config::default())
    }

    #[tokio::test]
    async fn volume_up_steps_by_configured_amount() {
        let mock = MockRenderer::with_volume(40);
        let d = dispatcher(mock);

        d.execute(&test_descriptor("a"), ControlIntent::VolumeUp)
            .await
            .unwrap();

        assert_eq!(d.control.volume(), 45);
        assert_eq!(d.control.calls(), vec!["GetVolume", "SetVolume(45)"]);
    }

    #[tokio::test]
    async fn volume_up_clamps_at_100() {
        let mock = MockRenderer::with_volume(98);
        let d = dispatcher(mock);

        d.execute(&test_descriptor("a"), ControlIntent::VolumeUp)
            .await
            .unwrap();

        assert_eq!(d.control.volume(), 100);
    }

    #[tokio::test]
    async fn volume_down_saturates_at_0() {
        let mock = MockRenderer::with_volume(3);
        let d = dispatcher(mock);

        d.execute(&test_descriptor("a"), ControlIntent::VolumeDown)
            .await
            .unwrap();

        assert_eq!(d.control.volume(), 0);
    }

    #[tokio::test]
    async fn mute_toggle_flips_state() {
        let mock = MockRenderer::with_volume(50);
        let d = dispatcher(mock);
        let device = test_descriptor("a");

        d.execute(&device, ControlIntent::MuteToggle).await.unwrap();
        assert!(d.control.muted());

        d.execute(&device, ControlIntent::MuteToggle).await.unwrap();
        assert!(!d.control.muted());
    }

    #[tokio::test]
    async fn transport_intents_invoke_single_verb() {
        let mock = MockRenderer::with_volume(50);
        let d = dispatcher(mock);

        d.execute(&test_descriptor("a"), ControlIntent::Pause)
            .await
            .unwrap();

        assert_eq!(d.control.calls(), vec!["Pause"]);
    }

    #[tokio::test]
    async fn device_rejection_is_not_retried() {
        let mock = MockRenderer::with_volume(50);
        mock.reject_next(1);
        let d = dispatcher(mock);

        let err = d
            .execute(&test_descriptor("a"), ControlIntent::Play)
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::DeviceRejected(_)));
        assert_eq!(d.control.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_is_retried_then_terminal() {
        let mock = MockRenderer::with_volume(50);
        mock.fail_network_next(u32::MAX);
        let d = dispatcher(mock);

        let err = d
            .execute(&test_descriptor("a"), ControlIntent::Play)
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::Network(_)));
        // retry_limit retries plus the initial attempt
        assert_eq!(
            d.control.calls().len() as u32,
            Config::default().retry_limit + 1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_recovers_mid_retry() {
        let mock = MockRenderer::with_volume(50);
        mock.fail_network_next(1);
        let d = dispatcher(mock);

        d.execute(&test_descriptor("a"), ControlIntent::Stop)
            .await
            .unwrap();

        assert_eq!(d.control.calls(), vec!["Stop", "Stop"]);
    }
}
