use super::classify::{classify, content_bounds};
use super::physics::{BodyKey, BodyMode, SpatialQuery};
use super::preview;
use super::snap::snap_transform;
use super::topology::{in_deleting_hierarchy, in_other_frame, is_ancestor};
use super::types::*;
use super::world::{set_world_scale, set_world_transform};
use crate::events::{FrameEvent, FrameEventBus};
use crate::net::Replication;
use bevy_ecs::prelude::{Entity, Mut, World};
use glam::{Vec3, Vec4};

pub(crate) fn run_frame(world: &mut World, frame: Entity, held_mask: MediaMask) {
    world.resource_scope(|world, mut space: Mut<Space>| {
        world.resource_scope(|world, mut net: Mut<Net>| {
            frame_pass(world, space.0.as_mut(), net.0.as_mut(), frame, held_mask);
        });
    });
}

/// One arbitration pass for one frame. Clause order is the contract: the
/// first matching clause wins, and the end-of-tick reconcile is the only
/// place local state adopts confirmed state.
fn frame_pass(
    world: &mut World,
    space: &mut (dyn SpatialQuery + Send + Sync),
    net: &mut (dyn Replication + Send + Sync),
    frame: Entity,
    held_mask: MediaMask,
) {
    let Some(frame_data) = world.get::<MediaFrame>(frame).copied() else {
        return;
    };
    let Some(frame_nid) = world.get::<Networked>(frame).map(|n| n.id) else {
        return;
    };
    let frame_body = world.get::<BodyRef>(frame).map(|b| b.key);
    let mut cap = world.get::<CaptureState>(frame).copied().unwrap_or_default();
    let mut replicated = world.get::<ReplicatedFrame>(frame).copied().unwrap_or_default();

    let local_nid = cap.link.nid();
    let captured = local_nid
        .and_then(|nid| world.resource::<NidIndex>().0.get(&nid).copied())
        .filter(|&e| world.get_entity(e).is_ok());
    let captured_owned = local_nid.is_some_and(|nid| net.is_local(nid));
    let captured_held = captured.is_some_and(|e| world.get::<Held>(e).is_some());
    let frame_contacts = frame_body.map(|b| space.contacts(b)).unwrap_or_default();
    let captured_body = captured.and_then(|e| world.get::<BodyRef>(e)).map(|b| b.key);
    let touching = captured_body.is_some_and(|b| frame_contacts.contains(&b));
    let frame_deleting = in_deleting_hierarchy(world, frame);
    let frame_owned = net.is_local(frame_nid);
    let deleted = local_nid.is_some_and(|nid| world.resource::<DeletedNids>().0.contains(&nid));

    // An ownership handover can drop the contact signal for a few ticks
    // before the physics view catches up; tolerate up to the configured
    // number of consecutive misses before treating the frame as emptied.
    let grace = world.resource::<Settings>().0.eviction_grace_ticks;
    if captured.is_some() && captured_owned {
        if touching {
            cap.contact_misses = 0;
        } else {
            cap.contact_misses = cap.contact_misses.saturating_add(1);
        }
    } else {
        cap.contact_misses = 0;
    }
    let colliding = touching || (captured.is_some() && cap.contact_misses <= grace);

    let mut candidate: Option<Entity> = None;

    if captured.is_some() && captured_owned && !captured_held && !frame_deleting && colliding {
        // 1. Keep a settled object glued to the frame even if physics
        //    nudged it since last tick.
        if let Some(target) = captured {
            snap_into(world, space, frame, frame_data, target);
        }
    } else if (frame_owned && local_nid.is_some() && deleted)
        || (captured.is_some() && captured_owned && !colliding)
        || frame_deleting
    {
        // 2. The sole release path: captured object deleted, drifted out of
        //    the volume, or the frame itself is going away.
        net.claim(frame_nid);
        replicated.captured = None;
    } else if frame_owned && local_nid.is_some() && captured.is_none() {
        // 3. The captured id no longer resolves to a live entity.
        replicated.captured = None;
    } else if replicated.captured.is_none() {
        // 4. Nothing captured: try to take the first eligible contact.
        candidate = capturable_entity(world, frame, frame_data, &frame_contacts);
        if let Some(cand) = candidate {
            let cand_nid = world.get::<Networked>(cand).map(|n| n.id);
            let cand_held = world.get::<Held>(cand).is_some();
            if let Some(cand_nid) = cand_nid {
                let owner = net.owner_of(cand_nid);
                let may_claim = owner == net.local_participant() || (owner.is_system() && frame_owned);
                if may_claim && !cand_held {
                    net.claim(frame_nid);
                    net.claim(cand_nid);
                    let scale = world
                        .get::<WorldTransform3D>(cand)
                        .map(|w| w.0.to_scale_rotation_translation().0)
                        .unwrap_or(Vec3::ONE);
                    replicated.captured = Some(Captured { nid: cand_nid, scale });
                    cap.link = CaptureLink::Pending { nid: cand_nid, scale };
                    snap_into(world, space, frame, frame_data, cand);
                    world
                        .resource_mut::<FrameEventBus>()
                        .push(FrameEvent::ObjectCaptured { frame, object: cand_nid });
                    candidate = None;
                }
            }
        }
    }

    // 5. Reconcile: confirmed state is authoritative. A losing local
    //    prediction gives the object its pre-capture scale and full physics
    //    back before the pointer is overwritten.
    let local_now = cap.link.nid();
    let confirmed = replicated.captured.map(|c| c.nid);
    if confirmed != local_now {
        if let Some(target) = captured {
            if captured_owned {
                set_world_scale(world, target, cap.link.scale().unwrap_or(Vec3::ONE));
                if let Some(body) = captured_body {
                    space.set_mode(body, BodyMode::Dynamic);
                }
            }
        }
        let mut bus = world.resource_mut::<FrameEventBus>();
        match (local_now, confirmed) {
            (Some(lost), Some(adopted)) => bus.push(FrameEvent::CaptureSuperseded { frame, lost, adopted }),
            (Some(object), None) => bus.push(FrameEvent::ObjectReleased { frame, object }),
            (None, Some(object)) => bus.push(FrameEvent::ObjectCaptured { frame, object }),
            (None, None) => {}
        }
    }
    cap.link = match replicated.captured {
        None => CaptureLink::Empty,
        Some(c) => CaptureLink::Confirmed { nid: c.nid, scale: c.scale },
    };
    if cap.link.is_empty() {
        cap.contact_misses = 0;
    }
    if let Some(mut state) = world.get_mut::<CaptureState>(frame) {
        *state = cap;
    }
    if let Some(mut repl) = world.get_mut::<ReplicatedFrame>(frame) {
        *repl = replicated;
    }

    // Preview and guide feedback run against the reconciled pointer.
    let captured_now = cap
        .link
        .nid()
        .and_then(|nid| world.resource::<NidIndex>().0.get(&nid).copied())
        .filter(|&e| world.get_entity(e).is_ok());
    if candidate.is_none() && cap.link.is_empty() {
        candidate = capturable_entity(world, frame, frame_data, &frame_contacts);
    }
    let opacity = world.resource::<Settings>().0.preview_opacity;
    preview::reconcile(world, frame, candidate, captured_now, opacity);
    update_guide(world, frame_data, cap.link, candidate, captured_now, held_mask);
}

/// First contact of the frame volume that passes every eligibility test.
/// Re-evaluated every tick; grasp state, collisions, and loads all move.
fn capturable_entity(
    world: &World,
    frame: Entity,
    frame_data: MediaFrame,
    contacts: &[BodyKey],
) -> Option<Entity> {
    let roster = &world.resource::<FrameRoster>().0;
    for &key in contacts {
        let Some(&entity) = world.resource::<BodyIndex>().0.get(&key) else {
            continue;
        };
        if world.get_entity(entity).is_err() || entity == frame {
            continue;
        }
        if (classify(world, entity) & frame_data.accepts).is_empty() {
            continue;
        }
        if world.get::<MediaLoading>(entity).is_some() {
            continue;
        }
        if content_bounds(world, entity).is_none() {
            continue;
        }
        let Some(nid) = world.get::<Networked>(entity).map(|n| n.id) else {
            continue;
        };
        if in_other_frame(world, roster, frame, nid) {
            continue;
        }
        if is_ancestor(world, entity, frame) || is_ancestor(world, frame, entity) {
            continue;
        }
        return Some(entity);
    }
    None
}

fn snap_into(
    world: &mut World,
    space: &mut (dyn SpatialQuery + Send + Sync),
    frame: Entity,
    frame_data: MediaFrame,
    target: Entity,
) {
    let Some(bounds) = content_bounds(world, target) else {
        return;
    };
    let frame_world = world.get::<WorldTransform3D>(frame).map(|w| w.0).unwrap_or_default();
    let snapped = snap_transform(frame_world, frame_data.bounds, bounds.extents);
    set_world_transform(world, target, snapped);
    if let Some(body) = world.get::<BodyRef>(target).map(|b| b.key) {
        space.set_mode(body, BodyMode::Kinematic);
    }
}

fn update_guide(
    world: &mut World,
    frame_data: MediaFrame,
    link: CaptureLink,
    candidate: Option<Entity>,
    captured: Option<Entity>,
    held_mask: MediaMask,
) {
    let guide = frame_data.guide;
    let visible = !(frame_data.accepts & held_mask).is_empty();
    if let Some(mut vis) = world.get_mut::<Visible>(guide) {
        vis.0 = visible;
    }
    if !visible {
        return;
    }
    let is_held = |e: Option<Entity>| e.is_some_and(|e| world.get::<Held>(e).is_some());
    let hovering = is_held(captured) || is_held(candidate);
    let colors = world.resource::<Settings>().0.guide;
    let color = if hovering {
        colors.hovered
    } else if link.nid().is_some() {
        colors.full
    } else {
        colors.empty
    };
    if let Some(mut tint) = world.get_mut::<Tint>(guide) {
        tint.0 = Vec4::from_array(color);
    }
}
