use framelock::ecs::physics::{BodyMode, RapierScene, SpatialQuery};
use glam::{Quat, Vec3};

const DT: f32 = 1.0 / 60.0;

#[test]
fn sensor_volume_reports_overlapping_bodies() {
    let mut scene = RapierScene::new(Vec3::new(0.0, -9.81, 0.0));
    let frame = scene.add_sensor_volume(Vec3::ZERO, Quat::IDENTITY, Vec3::splat(0.5));
    let inside = scene.add_dynamic_box(Vec3::new(0.0, 0.25, 0.0), Vec3::splat(0.1));
    let outside = scene.add_dynamic_box(Vec3::new(10.0, 0.0, 0.0), Vec3::splat(0.1));

    scene.step(DT);

    let touching = scene.contacts(frame);
    assert!(touching.contains(&inside));
    assert!(!touching.contains(&outside));
    assert!(scene.contacts(inside).contains(&frame), "overlap is symmetric");
}

#[test]
fn kinematic_bodies_ignore_gravity_and_keep_reporting() {
    let mut scene = RapierScene::new(Vec3::new(0.0, -9.81, 0.0));
    let frame = scene.add_sensor_volume(Vec3::ZERO, Quat::IDENTITY, Vec3::splat(1.0));
    let body = scene.add_dynamic_box(Vec3::ZERO, Vec3::splat(0.1));
    scene.step(DT);

    scene.set_mode(body, BodyMode::Kinematic);
    assert_eq!(scene.mode(body), Some(BodyMode::Kinematic));
    let before = scene.translation(body).expect("body translation");
    for _ in 0..30 {
        scene.step(DT);
    }
    let after = scene.translation(body).expect("body translation");
    assert!((after - before).length() <= 1e-5, "kinematic bodies hold their pose");
    assert!(scene.contacts(frame).contains(&body), "the sensor still sees the kinematic body");

    scene.set_mode(body, BodyMode::Dynamic);
    for _ in 0..30 {
        scene.step(DT);
    }
    let dropped = scene.translation(body).expect("body translation");
    assert!(dropped.y < after.y, "dynamic bodies fall again");
}

#[test]
fn fixed_sensors_have_no_simulation_mode() {
    let mut scene = RapierScene::new(Vec3::ZERO);
    let frame = scene.add_sensor_volume(Vec3::ZERO, Quat::IDENTITY, Vec3::splat(0.5));
    scene.step(DT);
    assert_eq!(scene.mode(frame), None);
}
