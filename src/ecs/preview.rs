use super::classify::{content_bounds, media_representation};
use super::snap::snap_transform;
use super::types::*;
use super::world::set_world_transform;
use crate::events::{FrameEvent, FrameEventBus};
use bevy_ecs::prelude::{Entity, World};

/// Brings the frame's ghost in line with the desired visibility exactly once
/// per tick. A candidate change within a tick swaps the ghost (one destroy,
/// then one create); there is never more than one ghost per frame.
pub(crate) fn reconcile(
    world: &mut World,
    frame: Entity,
    candidate: Option<Entity>,
    captured: Option<Entity>,
    opacity: f32,
) {
    let held = |world: &World, e: Option<Entity>| e.is_some_and(|e| world.get::<Held>(e).is_some());
    let desired = if held(world, candidate) {
        candidate
    } else if held(world, captured) {
        captured
    } else {
        None
    };
    let slot = world.get::<PreviewSlot>(frame).copied().unwrap_or_default();
    let desired_nid = desired.and_then(|e| world.get::<Networked>(e).map(|n| n.id));
    match (desired, slot.ghost) {
        (Some(source), None) => show(world, frame, source, opacity),
        (Some(source), Some(_)) if slot.nid != desired_nid => {
            hide(world, frame);
            show(world, frame, source, opacity);
        }
        (None, Some(_)) => hide(world, frame),
        _ => {}
    }
    sync_animation(world, frame);
}

fn show(world: &mut World, frame: Entity, source: Entity, opacity: f32) {
    // Content that cannot be measured yet is not previewable; retried next tick.
    let Some(bounds) = content_bounds(world, source) else {
        return;
    };
    let Some(frame_data) = world.get::<MediaFrame>(frame).copied() else {
        return;
    };
    let Some(source_nid) = world.get::<Networked>(source).map(|n| n.id) else {
        return;
    };
    let frame_world = world.get::<WorldTransform3D>(frame).map(|w| w.0).unwrap_or_default();
    let representation = media_representation(world, source);
    let kind = match representation.and_then(|r| world.get::<MediaVideo>(r)).copied() {
        Some(video) => GhostKind::Billboard { aspect: video.aspect },
        None => {
            let animation = representation
                .and_then(|r| world.get::<LoopAnimation>(r).copied())
                .filter(|a| a.playing)
                .map(|a| a.clip);
            GhostKind::Replica { animation }
        }
    };
    let ghost = world
        .spawn((
            Ghost {
                frame,
                source,
                kind,
                opacity,
                double_sided: true,
                center_offset: -bounds.center,
            },
            Transform3D::default(),
            WorldTransform3D::default(),
        ))
        .id();
    if let GhostKind::Replica { animation: Some(clip) } = kind {
        let time = representation
            .and_then(|r| world.get::<LoopAnimation>(r))
            .map(|a| a.time)
            .unwrap_or(0.0);
        world.entity_mut(ghost).insert(LoopAnimation { clip, time, playing: true });
    }
    let snapped = snap_transform(frame_world, frame_data.bounds, bounds.extents);
    set_world_transform(world, ghost, snapped);
    if let Some(mut slot) = world.get_mut::<PreviewSlot>(frame) {
        slot.ghost = Some(ghost);
        slot.nid = Some(source_nid);
    }
    world.resource_mut::<FrameEventBus>().push(FrameEvent::PreviewShown { frame, object: source_nid });
}

/// Idempotent: hiding an already-hidden preview is a no-op. The ghost only
/// ever borrows the source's visual buffers, so despawning the entity is the
/// whole teardown.
pub(crate) fn hide(world: &mut World, frame: Entity) {
    let Some(slot) = world.get::<PreviewSlot>(frame).copied() else {
        return;
    };
    let Some(ghost) = slot.ghost else {
        return;
    };
    world.despawn(ghost);
    if let Some(mut slot) = world.get_mut::<PreviewSlot>(frame) {
        slot.ghost = None;
        slot.nid = None;
    }
    world.resource_mut::<FrameEventBus>().push(FrameEvent::PreviewHidden { frame });
}

/// Keeps a replica ghost's animation in phase with its source.
fn sync_animation(world: &mut World, frame: Entity) {
    let Some(ghost) = world.get::<PreviewSlot>(frame).and_then(|slot| slot.ghost) else {
        return;
    };
    let Some(ghost_data) = world.get::<Ghost>(ghost).copied() else {
        return;
    };
    let source_time = media_representation(world, ghost_data.source)
        .and_then(|r| world.get::<LoopAnimation>(r))
        .map(|a| a.time);
    if let Some(time) = source_time {
        if let Some(mut animation) = world.get_mut::<LoopAnimation>(ghost) {
            animation.time = time;
        }
    }
}
