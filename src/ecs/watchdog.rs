use super::types::{Net, Networked, Settings};
use crate::events::{FrameEvent, FrameEventBus};
use crate::net::NetworkId;
use crate::time::TickClock;
use bevy_ecs::prelude::*;

/// One-shot soft-claim deadline, armed when a frame is first seen with the
/// system/fallback owner. Lives on the frame entity so frame teardown
/// cancels it implicitly.
#[derive(Component, Clone, Copy)]
pub struct SoftClaimTimer {
    pub deadline: f64,
}

pub(crate) fn arm(world: &mut World, frame: Entity) {
    let Some(networked) = world.get::<Networked>(frame).copied() else {
        return;
    };
    if !world.resource::<Net>().0.owner_of(networked.id).is_system() {
        return;
    }
    let grace = world.resource::<Settings>().0.watchdog_grace_secs as f64;
    let deadline = world.resource::<TickClock>().seconds() + grace;
    world.entity_mut(frame).insert(SoftClaimTimer { deadline });
}

/// Fires due timers. The claim re-checks its arming condition first: if any
/// participant took the frame in the meantime the timer just disarms.
pub(crate) fn run(world: &mut World) {
    let now = world.resource::<TickClock>().seconds();
    let mut due: Vec<(Entity, NetworkId)> = Vec::new();
    let mut timers = world.query::<(Entity, &Networked, &SoftClaimTimer)>();
    for (entity, networked, timer) in timers.iter(world) {
        if now >= timer.deadline {
            due.push((entity, networked.id));
        }
    }
    for (frame, nid) in due {
        world.entity_mut(frame).remove::<SoftClaimTimer>();
        if world.resource::<Net>().0.owner_of(nid).is_system() {
            world.resource_mut::<Net>().0.force_claim(nid);
            world.resource_mut::<FrameEventBus>().push(FrameEvent::WatchdogClaimed { frame });
        }
    }
}
