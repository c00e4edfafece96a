use bevy_ecs::prelude::Entity;
use framelock::config::ArbiterConfig;
use framelock::ecs::classify::media_representation;
use framelock::ecs::physics::{BodyKey, SharedContacts};
use framelock::ecs::snap::snap_transform;
use framelock::ecs::{Ghost, GhostKind, LoopAnimation, MediaMask, Transform3D};
use framelock::events::FrameEvent;
use framelock::net::{ParticipantId, SessionReplication};
use framelock::{FrameDesc, FrameWorld, MediaDesc, MediaKind};
use glam::{Mat4, Vec3};

const DT: f32 = 1.0 / 60.0;
const FRAME_BOUNDS: Vec3 = Vec3::new(2.0, 2.0, 0.2);
const IMAGE_EXTENTS: Vec3 = Vec3::new(1.0, 0.5, 0.01);

fn arena() -> (FrameWorld, SharedContacts) {
    let contacts = SharedContacts::default();
    let world = FrameWorld::new(
        Box::new(contacts.clone()),
        Box::new(SessionReplication::new(ParticipantId(1))),
        ArbiterConfig::default(),
    );
    (world, contacts)
}

fn spawn_frame(world: &mut FrameWorld, contacts: &SharedContacts, accepts: MediaMask) -> (Entity, BodyKey) {
    let body = contacts.add_body();
    let frame = world
        .spawn_frame(FrameDesc { accepts, bounds: FRAME_BOUNDS, transform: Transform3D::default(), body })
        .expect("frame spawns");
    (frame, body)
}

fn spawn_media(
    world: &mut FrameWorld,
    contacts: &SharedContacts,
    kind: MediaKind,
) -> (Entity, BodyKey) {
    let body = contacts.add_body();
    let media = world.spawn_media(MediaDesc::new(kind, IMAGE_EXTENTS, body)).expect("media spawns");
    (media, body)
}

fn ghost_count(world: &mut FrameWorld) -> usize {
    let mut query = world.world.query::<&Ghost>();
    query.iter(&world.world).count()
}

#[test]
fn ghost_appears_while_candidate_is_held() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (media, media_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    world.claim_local(frame);
    world.grab(media);
    contacts.connect(frame_body, media_body);

    world.tick(DT);

    assert_eq!(world.capture_of(frame), None, "a held candidate is previewed, not captured");
    let ghost = world.ghost_of(frame).expect("ghost exists");
    let data = *world.world.get::<Ghost>(ghost).expect("ghost component");
    assert_eq!(data.opacity, 0.5);
    assert!(data.double_sided);
    assert_eq!(data.kind, GhostKind::Replica { animation: None });
    let expected = snap_transform(Mat4::IDENTITY, FRAME_BOUNDS, IMAGE_EXTENTS);
    assert_eq!(world.world_transform(ghost), Some(expected), "ghost is snapped on creation");
    assert!(world
        .drain_events()
        .iter()
        .any(|e| matches!(e, FrameEvent::PreviewShown { frame: f, .. } if *f == frame)));
}

#[test]
fn ghost_hides_on_release_and_object_stays_captured() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (media, media_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    world.claim_local(frame);
    contacts.connect(frame_body, media_body);
    world.tick(DT);
    assert!(world.capture_of(frame).is_some());

    // Grasping the captured object signals an impending release.
    world.grab(media);
    world.tick(DT);
    assert!(world.ghost_of(frame).is_some());
    assert!(world.capture_of(frame).is_some());

    // Dropped in place: the preview goes away and the capture holds.
    world.release(media);
    world.tick(DT);
    assert_eq!(world.ghost_of(frame), None);
    assert_eq!(world.capture_of(frame), world.network_id(media));
    let expected = snap_transform(Mat4::IDENTITY, FRAME_BOUNDS, IMAGE_EXTENTS);
    assert_eq!(world.world_transform(media), Some(expected));
    assert!(world
        .drain_events()
        .iter()
        .any(|e| matches!(e, FrameEvent::PreviewHidden { frame: f } if *f == frame)));
}

#[test]
fn single_ghost_swaps_when_candidate_changes() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (first, first_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    let (second, second_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    world.grab(first);
    world.grab(second);
    contacts.connect(frame_body, first_body);
    contacts.connect(frame_body, second_body);

    world.tick(DT);
    let ghost_one = world.ghost_of(frame).expect("ghost for first candidate");
    assert_eq!(ghost_count(&mut world), 1);

    // First candidate leaves the volume; the ghost must swap within one tick.
    contacts.disconnect(frame_body, first_body);
    world.drain_events();
    world.tick(DT);

    let ghost_two = world.ghost_of(frame).expect("ghost for second candidate");
    assert_ne!(ghost_one, ghost_two);
    assert!(!world.entity_exists(ghost_one));
    assert_eq!(ghost_count(&mut world), 1);
    let events = world.drain_events();
    assert!(events.iter().any(|e| matches!(e, FrameEvent::PreviewHidden { .. })));
    assert!(events.iter().any(|e| {
        matches!(e, FrameEvent::PreviewShown { object, .. } if Some(*object) == world.network_id(second))
    }));
}

#[test]
fn ghost_is_not_duplicated_across_frames() {
    let (mut world, contacts) = arena();
    let (first, first_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (second, second_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (media, media_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    world.grab(media);
    contacts.connect(first_body, media_body);
    contacts.connect(second_body, media_body);

    world.tick(DT);

    assert!(world.ghost_of(first).is_some());
    assert_eq!(world.ghost_of(second), None, "an object is previewed by at most one frame");
    assert_eq!(ghost_count(&mut world), 1);
}

#[test]
fn video_candidate_gets_billboard_ghost() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::VIDEO);
    let (media, media_body) = spawn_media(&mut world, &contacts, MediaKind::Video { aspect: 0.5625 });
    world.grab(media);
    contacts.connect(frame_body, media_body);

    world.tick(DT);

    let ghost = world.ghost_of(frame).expect("ghost exists");
    let data = world.world.get::<Ghost>(ghost).expect("ghost component");
    assert_eq!(data.kind, GhostKind::Billboard { aspect: 0.5625 });
}

#[test]
fn replica_ghost_syncs_animation_phase() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::MODEL);
    let (media, media_body) = spawn_media(&mut world, &contacts, MediaKind::Model { animated: true });
    world.grab(media);
    contacts.connect(frame_body, media_body);

    world.tick(DT);
    let ghost = world.ghost_of(frame).expect("ghost exists");
    let data = world.world.get::<Ghost>(ghost).expect("ghost component");
    assert_eq!(data.kind, GhostKind::Replica { animation: Some(0) });

    // Advance the source clip; the ghost must follow in phase.
    let representation = media_representation(&world.world, media).expect("representation");
    world.world.get_mut::<LoopAnimation>(representation).expect("source animation").time = 1.25;
    world.tick(DT);
    let ghost = world.ghost_of(frame).expect("ghost persists");
    let animation = world.world.get::<LoopAnimation>(ghost).expect("ghost animation");
    assert_eq!(animation.time, 1.25);
}

#[test]
fn ghost_centers_cloned_content() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let body = contacts.add_body();
    let mut desc = MediaDesc::new(MediaKind::Image, IMAGE_EXTENTS, body);
    desc.center = Vec3::new(0.1, 0.2, 0.0);
    let media = world.spawn_media(desc).expect("media spawns");
    world.grab(media);
    contacts.connect(frame_body, body);

    world.tick(DT);

    let ghost = world.ghost_of(frame).expect("ghost exists");
    let data = world.world.get::<Ghost>(ghost).expect("ghost component");
    assert_eq!(data.center_offset, Vec3::new(-0.1, -0.2, 0.0));
}

#[test]
fn guide_reflects_hover_and_occupancy() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (near, near_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    let (far, _far_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    world.claim_local(frame);
    let colors = ArbiterConfig::default().guide;

    // Someone is carrying an image around: the guide lights up, still empty.
    world.grab(far);
    world.tick(DT);
    let (visible, tint) = world.guide_state(frame).expect("guide state");
    assert!(visible);
    assert_eq!(tint.to_array(), colors.empty);

    // An unheld image settles into the frame: occupied color.
    contacts.connect(frame_body, near_body);
    world.tick(DT);
    let (visible, tint) = world.guide_state(frame).expect("guide state");
    assert!(visible);
    assert_eq!(tint.to_array(), colors.full);

    // Grasping the occupant hovers the guide.
    world.grab(near);
    world.tick(DT);
    let (_, tint) = world.guide_state(frame).expect("guide state");
    assert_eq!(tint.to_array(), colors.hovered);

    // Nothing held anywhere: the guide goes dark.
    world.release(near);
    world.release(far);
    world.tick(DT);
    let (visible, _) = world.guide_state(frame).expect("guide state");
    assert!(!visible);
}

#[test]
fn frame_teardown_discards_ghost() {
    let (mut world, contacts) = arena();
    let (frame, frame_body) = spawn_frame(&mut world, &contacts, MediaMask::IMAGE);
    let (media, media_body) = spawn_media(&mut world, &contacts, MediaKind::Image);
    world.grab(media);
    contacts.connect(frame_body, media_body);
    world.tick(DT);
    let ghost = world.ghost_of(frame).expect("ghost exists");

    world.despawn_frame(frame);
    assert!(!world.entity_exists(ghost));
    world.tick(DT);
    assert_eq!(ghost_count(&mut world), 0);
}
