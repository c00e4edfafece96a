use bevy_ecs::prelude::Entity;
use framelock::config::ArbiterConfig;
use framelock::ecs::physics::SharedContacts;
use framelock::ecs::{MediaMask, Transform3D};
use framelock::events::FrameEvent;
use framelock::net::{ParticipantId, SessionReplication};
use framelock::{FrameDesc, FrameWorld};
use glam::Vec3;

const LOCAL: ParticipantId = ParticipantId(1);

fn arena() -> (FrameWorld, SharedContacts) {
    let contacts = SharedContacts::default();
    let world = FrameWorld::new(
        Box::new(contacts.clone()),
        Box::new(SessionReplication::new(LOCAL)),
        ArbiterConfig::default(),
    );
    (world, contacts)
}

fn spawn_frame(world: &mut FrameWorld, contacts: &SharedContacts) -> Entity {
    let body = contacts.add_body();
    world
        .spawn_frame(FrameDesc {
            accepts: MediaMask::all(),
            bounds: Vec3::ONE,
            transform: Transform3D::default(),
            body,
        })
        .expect("frame spawns")
}

fn watchdog_claims(events: &[FrameEvent]) -> usize {
    events.iter().filter(|e| matches!(e, FrameEvent::WatchdogClaimed { .. })).count()
}

#[test]
fn fallback_frame_is_claimed_after_grace_exactly_once() {
    let (mut world, contacts) = arena();
    let frame = spawn_frame(&mut world, &contacts);
    assert_eq!(world.owner_of(frame), Some(ParticipantId::SYSTEM));

    for _ in 0..9 {
        world.tick(1.0);
    }
    assert_eq!(world.owner_of(frame), Some(ParticipantId::SYSTEM));
    assert_eq!(watchdog_claims(&world.drain_events()), 0);

    world.tick(1.0);
    assert_eq!(world.owner_of(frame), Some(LOCAL));
    assert_eq!(watchdog_claims(&world.drain_events()), 1);

    for _ in 0..20 {
        world.tick(1.0);
    }
    assert_eq!(watchdog_claims(&world.drain_events()), 0, "the timer fires at most once");
}

#[test]
fn participant_claim_preempts_watchdog() {
    let (mut world, contacts) = arena();
    let frame = spawn_frame(&mut world, &contacts);
    world.tick(1.0);
    world.apply_remote_owner(frame, ParticipantId(7));

    for _ in 0..15 {
        world.tick(1.0);
    }
    assert_eq!(world.owner_of(frame), Some(ParticipantId(7)), "a real owner is never displaced");
    assert_eq!(watchdog_claims(&world.drain_events()), 0);
}

#[test]
fn destroyed_frame_never_fires() {
    let (mut world, contacts) = arena();
    let frame = spawn_frame(&mut world, &contacts);
    world.tick(1.0);
    world.despawn_frame(frame);

    for _ in 0..15 {
        world.tick(1.0);
    }
    assert_eq!(watchdog_claims(&world.drain_events()), 0);
}

#[test]
fn custom_grace_period_is_honored() {
    let contacts = SharedContacts::default();
    let config = ArbiterConfig { watchdog_grace_secs: 2.0, ..ArbiterConfig::default() };
    let mut world =
        FrameWorld::new(Box::new(contacts.clone()), Box::new(SessionReplication::new(LOCAL)), config);
    let frame = spawn_frame(&mut world, &contacts);

    world.tick(1.0);
    assert_eq!(world.owner_of(frame), Some(ParticipantId::SYSTEM));
    world.tick(1.0);
    assert_eq!(world.owner_of(frame), Some(LOCAL));
}
