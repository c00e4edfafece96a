use glam::{Quat, Vec3};
use rapier3d::na;
use rapier3d::prelude::{
    ActiveCollisionTypes, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, DefaultBroadPhase,
    ImpulseJointSet, IntegrationParameters, IslandManager, Isometry, MultibodyJointSet, NarrowPhase,
    PhysicsPipeline, QueryPipeline, Real, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType,
    Rotation, Vector,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle of a simulated body as seen by the arbitration core. The physics
/// collaborator owns the mapping to its internal structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyKey(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Dynamic,
    Kinematic,
}

/// What the arbitration core needs from the physics collaborator: who is
/// touching a body right now, and switching a body between full simulation
/// and kinematic placement.
pub trait SpatialQuery {
    fn contacts(&self, body: BodyKey) -> Vec<BodyKey>;
    fn set_mode(&mut self, body: BodyKey, mode: BodyMode);
    fn mode(&self, body: BodyKey) -> Option<BodyMode>;
}

// ---------- Headless binding ----------

/// Deterministic in-memory contact table. Contacts are whatever the host
/// scripted; modes are plain bookkeeping. Used for headless runs and tests.
#[derive(Default)]
pub struct ContactTable {
    next: u32,
    contacts: HashMap<BodyKey, Vec<BodyKey>>,
    modes: HashMap<BodyKey, BodyMode>,
}

impl ContactTable {
    pub fn add_body(&mut self) -> BodyKey {
        self.next += 1;
        let key = BodyKey(self.next);
        self.modes.insert(key, BodyMode::Dynamic);
        key
    }

    pub fn connect(&mut self, a: BodyKey, b: BodyKey) {
        let fwd = self.contacts.entry(a).or_default();
        if !fwd.contains(&b) {
            fwd.push(b);
        }
        let rev = self.contacts.entry(b).or_default();
        if !rev.contains(&a) {
            rev.push(a);
        }
    }

    pub fn disconnect(&mut self, a: BodyKey, b: BodyKey) {
        if let Some(list) = self.contacts.get_mut(&a) {
            list.retain(|&k| k != b);
        }
        if let Some(list) = self.contacts.get_mut(&b) {
            list.retain(|&k| k != a);
        }
    }
}

impl SpatialQuery for ContactTable {
    fn contacts(&self, body: BodyKey) -> Vec<BodyKey> {
        self.contacts.get(&body).cloned().unwrap_or_default()
    }

    fn set_mode(&mut self, body: BodyKey, mode: BodyMode) {
        self.modes.insert(body, mode);
    }

    fn mode(&self, body: BodyKey) -> Option<BodyMode> {
        self.modes.get(&body).copied()
    }
}

/// Shared handle over a [`ContactTable`] so the host (or a test) can keep
/// mutating contacts after the table has been handed to the world.
#[derive(Clone, Default)]
pub struct SharedContacts(Arc<Mutex<ContactTable>>);

impl SharedContacts {
    fn table(&self) -> MutexGuard<'_, ContactTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_body(&self) -> BodyKey {
        self.table().add_body()
    }

    pub fn connect(&self, a: BodyKey, b: BodyKey) {
        self.table().connect(a, b);
    }

    pub fn disconnect(&self, a: BodyKey, b: BodyKey) {
        self.table().disconnect(a, b);
    }
}

impl SpatialQuery for SharedContacts {
    fn contacts(&self, body: BodyKey) -> Vec<BodyKey> {
        self.table().contacts(body)
    }

    fn set_mode(&mut self, body: BodyKey, mode: BodyMode) {
        self.table().set_mode(body, mode);
    }

    fn mode(&self, body: BodyKey) -> Option<BodyMode> {
        self.table().mode(body)
    }
}

// ---------- Rapier binding ----------

pub struct RapierScene {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    body_handles: HashMap<BodyKey, RigidBodyHandle>,
    collider_keys: HashMap<ColliderHandle, BodyKey>,
    next_key: u32,
}

impl RapierScene {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector::new(gravity.x, gravity.y, gravity.z),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            body_handles: HashMap::new(),
            collider_keys: HashMap::new(),
            next_key: 0,
        }
    }

    fn next_key(&mut self) -> BodyKey {
        self.next_key += 1;
        BodyKey(self.next_key)
    }

    fn isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
        let quat = na::Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z);
        Isometry::from_parts(Vector::new(position.x, position.y, position.z).into(), Rotation::from_quaternion(quat))
    }

    /// Fixed sensor volume used for frame capture zones.
    pub fn add_sensor_volume(&mut self, position: Vec3, rotation: Quat, half_extents: Vec3) -> BodyKey {
        let key = self.next_key();
        let body = RigidBodyBuilder::fixed().position(Self::isometry(position, rotation)).build();
        let body_handle = self.bodies.insert(body);
        // Captured objects are switched to kinematic and must keep reporting
        // against the fixed sensor.
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .sensor(true)
            .active_collision_types(ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED)
            .build();
        let collider_handle = self.colliders.insert_with_parent(collider, body_handle, &mut self.bodies);
        self.body_handles.insert(key, body_handle);
        self.collider_keys.insert(collider_handle, key);
        key
    }

    pub fn add_dynamic_box(&mut self, position: Vec3, half_extents: Vec3) -> BodyKey {
        let key = self.next_key();
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y, position.z))
            .build();
        let body_handle = self.bodies.insert(body);
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).build();
        let collider_handle = self.colliders.insert_with_parent(collider, body_handle, &mut self.bodies);
        self.body_handles.insert(key, body_handle);
        self.collider_keys.insert(collider_handle, key);
        key
    }

    pub fn set_translation(&mut self, key: BodyKey, position: Vec3) {
        if let Some(body) = self.body_handles.get(&key).and_then(|h| self.bodies.get_mut(*h)) {
            body.set_translation(Vector::new(position.x, position.y, position.z), true);
        }
    }

    pub fn translation(&self, key: BodyKey) -> Option<Vec3> {
        let body = self.body_handles.get(&key).and_then(|h| self.bodies.get(*h))?;
        let t = body.translation();
        Some(Vec3::new(t.x, t.y, t.z))
    }

    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        let hooks = ();
        let events = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &hooks,
            &events,
        );
        self.query_pipeline.update(&self.colliders);
    }
}

impl SpatialQuery for RapierScene {
    fn contacts(&self, body: BodyKey) -> Vec<BodyKey> {
        let mut out = Vec::new();
        let Some(rb) = self.body_handles.get(&body).and_then(|h| self.bodies.get(*h)) else {
            return out;
        };
        for &collider in rb.colliders() {
            for (c1, c2, intersecting) in self.narrow_phase.intersection_pairs_with(collider) {
                if !intersecting {
                    continue;
                }
                let other = if c1 == collider { c2 } else { c1 };
                if let Some(&key) = self.collider_keys.get(&other) {
                    if key != body && !out.contains(&key) {
                        out.push(key);
                    }
                }
            }
            for pair in self.narrow_phase.contact_pairs_with(collider) {
                if !pair.has_any_active_contact {
                    continue;
                }
                let other = if pair.collider1 == collider { pair.collider2 } else { pair.collider1 };
                if let Some(&key) = self.collider_keys.get(&other) {
                    if key != body && !out.contains(&key) {
                        out.push(key);
                    }
                }
            }
        }
        out
    }

    fn set_mode(&mut self, body: BodyKey, mode: BodyMode) {
        if let Some(rb) = self.body_handles.get(&body).and_then(|h| self.bodies.get_mut(*h)) {
            let kind = match mode {
                BodyMode::Dynamic => RigidBodyType::Dynamic,
                BodyMode::Kinematic => RigidBodyType::KinematicPositionBased,
            };
            rb.set_body_type(kind, true);
        }
    }

    fn mode(&self, body: BodyKey) -> Option<BodyMode> {
        let rb = self.body_handles.get(&body).and_then(|h| self.bodies.get(*h))?;
        match rb.body_type() {
            RigidBodyType::Dynamic => Some(BodyMode::Dynamic),
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => {
                Some(BodyMode::Kinematic)
            }
            RigidBodyType::Fixed => None,
        }
    }
}
