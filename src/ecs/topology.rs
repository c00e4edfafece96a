use super::types::{CaptureState, Deleting, Parent, PreviewSlot};
use crate::net::NetworkId;
use bevy_ecs::prelude::{Entity, World};

/// True if `a` is a transitive parent of `b`.
pub fn is_ancestor(world: &World, a: Entity, b: Entity) -> bool {
    let mut cursor = world.get::<Parent>(b).map(|p| p.0);
    while let Some(current) = cursor {
        if current == a {
            return true;
        }
        cursor = world.get::<Parent>(current).map(|p| p.0);
    }
    false
}

/// True if the entity or any of its ancestors is marked [`Deleting`].
pub fn in_deleting_hierarchy(world: &World, entity: Entity) -> bool {
    if world.get::<Deleting>(entity).is_some() {
        return true;
    }
    is_marked_above(world, entity)
}

fn is_marked_above(world: &World, entity: Entity) -> bool {
    let mut cursor = world.get::<Parent>(entity).map(|p| p.0);
    while let Some(current) = cursor {
        if world.get::<Deleting>(current).is_some() {
            return true;
        }
        cursor = world.get::<Parent>(current).map(|p| p.0);
    }
    false
}

/// True if any frame other than `frame` already lists `nid` as captured
/// (pending or confirmed) or as its preview candidate. Best-effort local
/// guard against double capture; linear in the frame count.
pub fn in_other_frame(world: &World, roster: &[Entity], frame: Entity, nid: NetworkId) -> bool {
    for &other in roster {
        if other == frame {
            continue;
        }
        if let Some(cap) = world.get::<CaptureState>(other) {
            if cap.link.nid() == Some(nid) {
                return true;
            }
        }
        if let Some(slot) = world.get::<PreviewSlot>(other) {
            if slot.nid == Some(nid) {
                return true;
            }
        }
    }
    false
}
