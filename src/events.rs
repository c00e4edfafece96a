use crate::net::NetworkId;
use bevy_ecs::prelude::{Entity, Resource};
use std::fmt;

#[derive(Debug, Clone)]
pub enum FrameEvent {
    ObjectCaptured { frame: Entity, object: NetworkId },
    ObjectReleased { frame: Entity, object: NetworkId },
    CaptureSuperseded { frame: Entity, lost: NetworkId, adopted: NetworkId },
    PreviewShown { frame: Entity, object: NetworkId },
    PreviewHidden { frame: Entity },
    WatchdogClaimed { frame: Entity },
}

impl fmt::Display for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEvent::ObjectCaptured { frame, object } => {
                write!(f, "ObjectCaptured frame={} object={}", frame.index(), object)
            }
            FrameEvent::ObjectReleased { frame, object } => {
                write!(f, "ObjectReleased frame={} object={}", frame.index(), object)
            }
            FrameEvent::CaptureSuperseded { frame, lost, adopted } => {
                write!(f, "CaptureSuperseded frame={} lost={} adopted={}", frame.index(), lost, adopted)
            }
            FrameEvent::PreviewShown { frame, object } => {
                write!(f, "PreviewShown frame={} object={}", frame.index(), object)
            }
            FrameEvent::PreviewHidden { frame } => {
                write!(f, "PreviewHidden frame={}", frame.index())
            }
            FrameEvent::WatchdogClaimed { frame } => {
                write!(f, "WatchdogClaimed frame={}", frame.index())
            }
        }
    }
}

#[derive(Default, Resource)]
pub struct FrameEventBus {
    events: Vec<FrameEvent>,
}

impl FrameEventBus {
    pub fn push(&mut self, event: FrameEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<FrameEvent> {
        self.events.drain(..).collect()
    }
}
