//! User intents produced by the external key-event source.

use serde::{Deserialize, Serialize};

use crate::device::RendererService;

/// An abstract control intent, one per recognized physical key event.
///
/// Intents carry no payload; the volume step per key press is configuration
/// ([`crate::config::Config::volume_step`]), not a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlIntent {
    VolumeUp,
    VolumeDown,
    MuteToggle,
    Play,
    Pause,
    Stop,
    Next,
    Previous,
}

/// AVTransport action verbs the transport intents map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportAction {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
}

impl TransportAction {
    /// Returns the SOAP action name.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Pause => "Pause",
            Self::Stop => "Stop",
            Self::Next => "Next",
            Self::Previous => "Previous",
        }
    }
}

impl ControlIntent {
    /// Returns the service this intent is executed against.
    #[must_use]
    pub fn target_service(&self) -> RendererService {
        match self {
            Self::VolumeUp | Self::VolumeDown | Self::MuteToggle => {
                RendererService::RenderingControl
            }
            Self::Play | Self::Pause | Self::Stop | Self::Next | Self::Previous => {
                RendererService::AVTransport
            }
        }
    }

    /// Returns the transport action for transport intents, `None` for
    /// rendering-control intents (which need a read-then-write sequence
    /// rather than a single verb).
    #[must_use]
    pub fn transport_action(&self) -> Option<TransportAction> {
        match self {
            Self::Play => Some(TransportAction::Play),
            Self::Pause => Some(TransportAction::Pause),
            Self::Stop => Some(TransportAction::Stop),
            Self::Next => Some(TransportAction::Next),
            Self::Previous => Some(TransportAction::Previous),
            Self::VolumeUp | Self::VolumeDown | Self::MuteToggle => None,
        }
    }
}

impl std::fmt::Display for ControlIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::VolumeUp => "VolumeUp",
            Self::VolumeDown => "VolumeDown",
            Self::MuteToggle => "MuteToggle",
            Self::Play => "Play",
            Self::Pause => "Pause",
            Self::Stop => "Stop",
            Self::Next => "Next",
            Self::Previous => "Previous",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_intents_target_rendering_control() {
        assert_eq!(
            ControlIntent::VolumeUp.target_service(),
            RendererService::RenderingControl
        );
        assert_eq!(
            ControlIntent::MuteToggle.target_service(),
            RendererService::RenderingControl
        );
        assert!(ControlIntent::VolumeDown.transport_action().is_none());
    }

    #[test]
    fn transport_intents_map_to_action_verbs() {
        assert_eq!(
            ControlIntent::Play.transport_action(),
            Some(TransportAction::Play)
        );
        assert_eq!(
            ControlIntent::Previous
                .transport_action()
                .map(|a| a.action()),
            Some("Previous")
        );
        assert_eq!(
            ControlIntent::Stop.target_service(),
            RendererService::AVTransport
        );
    }
}
