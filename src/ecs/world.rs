use super::arbiter;
use super::classify::classify;
use super::physics::{BodyKey, BodyMode, SpatialQuery};
use super::types::*;
use super::watchdog;
use crate::config::ArbiterConfig;
use crate::events::{FrameEvent, FrameEventBus};
use crate::net::{NetworkId, ParticipantId, Replication};
use crate::time::TickClock;
use anyhow::{bail, Result};
use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3, Vec4};
use smallvec::SmallVec;

pub struct FrameDesc {
    pub accepts: MediaMask,
    pub bounds: Vec3,
    pub transform: Transform3D,
    pub body: BodyKey,
}

pub enum MediaKind {
    Model { animated: bool },
    Video { aspect: f32 },
    Image,
    Document,
}

pub struct MediaDesc {
    pub kind: MediaKind,
    pub extents: Vec3,
    pub center: Vec3,
    pub transform: Transform3D,
    pub body: BodyKey,
    pub loading: bool,
}

impl MediaDesc {
    pub fn new(kind: MediaKind, extents: Vec3, body: BodyKey) -> Self {
        Self { kind, extents, center: Vec3::ZERO, transform: Transform3D::default(), body, loading: false }
    }
}

// ---------- World container ----------
pub struct FrameWorld {
    pub world: World,
    schedule: Schedule,
}

impl FrameWorld {
    pub fn new(
        space: Box<dyn SpatialQuery + Send + Sync>,
        replication: Box<dyn Replication + Send + Sync>,
        config: ArbiterConfig,
    ) -> Self {
        let mut world = World::new();
        world.insert_resource(TickClock::new());
        world.insert_resource(Settings(config));
        world.insert_resource(Space(space));
        world.insert_resource(Net(replication));
        world.insert_resource(FrameRoster::default());
        world.insert_resource(BodyIndex::default());
        world.insert_resource(NidIndex::default());
        world.insert_resource(DeletedNids::default());
        world.insert_resource(FrameEventBus::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(sys_propagate_world_transforms);

        Self { world, schedule }
    }

    // ---------- Registration ----------

    pub fn spawn_frame(&mut self, desc: FrameDesc) -> Result<Entity> {
        if !desc.bounds.cmpgt(Vec3::ZERO).all() {
            bail!("Frame bounds must be positive on every axis, got {:?}", desc.bounds);
        }
        if self.world.resource::<BodyIndex>().0.contains_key(&desc.body) {
            bail!("Body {:?} is already registered", desc.body);
        }
        let empty = Vec4::from_array(self.world.resource::<Settings>().0.guide.empty);
        let guide = self
            .world
            .spawn((Guide, Tint(empty), Visible(false), Transform3D::default(), WorldTransform3D::default()))
            .id();
        let nid = NetworkId::new();
        let frame = self
            .world
            .spawn((
                MediaFrame { accepts: desc.accepts, bounds: desc.bounds, guide },
                CaptureState::default(),
                ReplicatedFrame::default(),
                PreviewSlot::default(),
                Networked { id: nid },
                BodyRef { key: desc.body },
                desc.transform,
                WorldTransform3D::default(),
                Children(vec![guide]),
            ))
            .id();
        self.world.entity_mut(guide).insert(Parent(frame));
        self.world.resource_mut::<BodyIndex>().0.insert(desc.body, frame);
        self.world.resource_mut::<NidIndex>().0.insert(nid, frame);
        self.world.resource_mut::<FrameRoster>().0.push(frame);
        watchdog::arm(&mut self.world, frame);
        Ok(frame)
    }

    pub fn spawn_media(&mut self, desc: MediaDesc) -> Result<Entity> {
        if !desc.extents.cmpgt(Vec3::ZERO).all() {
            bail!("Media content extents must be positive on every axis, got {:?}", desc.extents);
        }
        if self.world.resource::<BodyIndex>().0.contains_key(&desc.body) {
            bail!("Body {:?} is already registered", desc.body);
        }
        let nid = NetworkId::new();
        let root = self
            .world
            .spawn((
                Networked { id: nid },
                BodyRef { key: desc.body },
                desc.transform,
                WorldTransform3D::default(),
                Children::default(),
            ))
            .id();
        let representation = self
            .world
            .spawn((
                MediaLoaded,
                ContentBounds { extents: desc.extents, center: desc.center },
                Transform3D::default(),
                WorldTransform3D::default(),
                Parent(root),
            ))
            .id();
        match desc.kind {
            MediaKind::Model { animated } => {
                self.world.entity_mut(representation).insert(MediaModel);
                if animated {
                    self.world
                        .entity_mut(representation)
                        .insert(LoopAnimation { clip: 0, time: 0.0, playing: true });
                }
            }
            MediaKind::Video { aspect } => {
                self.world.entity_mut(representation).insert(MediaVideo { aspect });
            }
            MediaKind::Image => {
                self.world.entity_mut(representation).insert(MediaImage);
            }
            MediaKind::Document => {
                self.world.entity_mut(representation).insert(MediaDocument);
            }
        }
        if desc.loading {
            self.world.entity_mut(root).insert(MediaLoading);
        }
        if let Some(mut children) = self.world.get_mut::<Children>(root) {
            children.0.push(representation);
        }
        self.world.resource_mut::<BodyIndex>().0.insert(desc.body, root);
        self.world.resource_mut::<NidIndex>().0.insert(nid, root);
        Ok(root)
    }

    pub fn finish_loading(&mut self, media: Entity) {
        if self.entity_exists(media) {
            self.world.entity_mut(media).remove::<MediaLoading>();
        }
    }

    pub fn despawn_media(&mut self, root: Entity) {
        if let Some(networked) = self.world.get::<Networked>(root).copied() {
            self.world.resource_mut::<NidIndex>().0.remove(&networked.id);
            self.world.resource_mut::<DeletedNids>().0.insert(networked.id);
        }
        if let Some(body) = self.world.get::<BodyRef>(root).copied() {
            self.world.resource_mut::<BodyIndex>().0.remove(&body.key);
        }
        self.despawn_recursive(root);
    }

    pub fn despawn_frame(&mut self, frame: Entity) {
        if let Some(slot) = self.world.get::<PreviewSlot>(frame).copied() {
            if let Some(ghost) = slot.ghost {
                self.world.despawn(ghost);
            }
        }
        if let Some(networked) = self.world.get::<Networked>(frame).copied() {
            self.world.resource_mut::<NidIndex>().0.remove(&networked.id);
        }
        if let Some(body) = self.world.get::<BodyRef>(frame).copied() {
            self.world.resource_mut::<BodyIndex>().0.remove(&body.key);
        }
        self.world.resource_mut::<FrameRoster>().0.retain(|&f| f != frame);
        self.despawn_recursive(frame);
    }

    fn despawn_recursive(&mut self, entity: Entity) {
        if let Some(parent) = self.world.get::<Parent>(entity).copied() {
            if let Some(mut siblings) = self.world.get_mut::<Children>(parent.0) {
                siblings.0.retain(|&child| child != entity);
            }
        }
        let child_ids = self.world.get::<Children>(entity).map(|c| c.0.clone()).unwrap_or_default();
        for child in child_ids {
            self.despawn_recursive(child);
        }
        self.world.despawn(entity);
    }

    // ---------- Host interactions ----------

    pub fn grab(&mut self, entity: Entity) {
        if self.entity_exists(entity) {
            self.world.entity_mut(entity).insert(Held);
        }
    }

    pub fn release(&mut self, entity: Entity) {
        if self.entity_exists(entity) {
            self.world.entity_mut(entity).remove::<Held>();
        }
    }

    pub fn mark_deleting(&mut self, entity: Entity) {
        if self.entity_exists(entity) {
            self.world.entity_mut(entity).insert(Deleting);
        }
    }

    /// Local participant claims ownership of an entity, e.g. on grab.
    pub fn claim_local(&mut self, entity: Entity) {
        if let Some(networked) = self.world.get::<Networked>(entity).copied() {
            self.world.resource_mut::<Net>().0.claim(networked.id);
        }
    }

    /// Authoritative ownership update arriving from the replication layer.
    pub fn apply_remote_owner(&mut self, entity: Entity, owner: ParticipantId) {
        if let Some(networked) = self.world.get::<Networked>(entity).copied() {
            self.world.resource_mut::<Net>().0.apply_owner(networked.id, owner);
        }
    }

    /// Authoritative frame state arriving from the replication layer; a
    /// remote write overwriting the local prediction lands here.
    pub fn apply_remote_frame(&mut self, frame: Entity, captured: Option<Captured>) {
        if let Some(mut replicated) = self.world.get_mut::<ReplicatedFrame>(frame) {
            replicated.captured = captured;
        }
    }

    /// A network id observed deleted by the replication layer before the
    /// local entity store caught up.
    pub fn note_remote_deletion(&mut self, nid: NetworkId) {
        self.world.resource_mut::<DeletedNids>().0.insert(nid);
    }

    pub fn set_transform(&mut self, entity: Entity, transform: Transform3D) {
        if let Some(mut t) = self.world.get_mut::<Transform3D>(entity) {
            *t = transform;
        }
    }

    // ---------- Tick ----------

    pub fn tick(&mut self, dt: f32) {
        self.world.resource_mut::<TickClock>().advance(dt);
        self.prune_dead();
        self.schedule.run(&mut self.world);
        watchdog::run(&mut self.world);
        let held = self.held_media_mask();
        let roster: Vec<Entity> = self.world.resource::<FrameRoster>().0.clone();
        for frame in roster {
            arbiter::run_frame(&mut self.world, frame, held);
        }
    }

    fn prune_dead(&mut self) {
        let mut orphaned: SmallVec<[Entity; 4]> = SmallVec::new();
        let mut ghosts = self.world.query::<(Entity, &Ghost)>();
        for (entity, ghost) in ghosts.iter(&self.world) {
            if self.world.get_entity(ghost.frame).is_err() {
                orphaned.push(entity);
            }
        }
        for entity in orphaned {
            self.world.despawn(entity);
        }
        let live: Vec<Entity> = {
            let roster = &self.world.resource::<FrameRoster>().0;
            roster.iter().copied().filter(|&f| self.world.get_entity(f).is_ok()).collect()
        };
        self.world.resource_mut::<FrameRoster>().0 = live;
    }

    fn held_media_mask(&mut self) -> MediaMask {
        let mut query = self.world.query_filtered::<Entity, With<Held>>();
        let held: SmallVec<[Entity; 8]> = query.iter(&self.world).collect();
        let mut mask = MediaMask::empty();
        for entity in held {
            mask |= classify(&self.world, entity);
        }
        mask
    }

    // ---------- Accessors ----------

    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    pub fn network_id(&self, entity: Entity) -> Option<NetworkId> {
        self.world.get::<Networked>(entity).map(|n| n.id)
    }

    pub fn entity_of_nid(&self, nid: NetworkId) -> Option<Entity> {
        self.world.resource::<NidIndex>().0.get(&nid).copied()
    }

    /// Locally observed captured id of a frame.
    pub fn capture_of(&self, frame: Entity) -> Option<NetworkId> {
        self.world.get::<CaptureState>(frame).and_then(|c| c.link.nid())
    }

    pub fn capture_link(&self, frame: Entity) -> Option<CaptureLink> {
        self.world.get::<CaptureState>(frame).map(|c| c.link)
    }

    /// Last network-confirmed capture of a frame.
    pub fn confirmed_capture_of(&self, frame: Entity) -> Option<Captured> {
        self.world.get::<ReplicatedFrame>(frame).and_then(|r| r.captured)
    }

    pub fn ghost_of(&self, frame: Entity) -> Option<Entity> {
        self.world.get::<PreviewSlot>(frame).and_then(|slot| slot.ghost)
    }

    pub fn guide_of(&self, frame: Entity) -> Option<Entity> {
        self.world.get::<MediaFrame>(frame).map(|f| f.guide)
    }

    pub fn guide_state(&self, frame: Entity) -> Option<(bool, Vec4)> {
        let guide = self.guide_of(frame)?;
        let visible = self.world.get::<Visible>(guide)?.0;
        let tint = self.world.get::<Tint>(guide)?.0;
        Some((visible, tint))
    }

    pub fn world_transform(&self, entity: Entity) -> Option<Mat4> {
        self.world.get::<WorldTransform3D>(entity).map(|w| w.0)
    }

    pub fn world_scale(&self, entity: Entity) -> Option<Vec3> {
        self.world_transform(entity).map(|m| m.to_scale_rotation_translation().0)
    }

    pub fn body_mode(&self, entity: Entity) -> Option<BodyMode> {
        let body = self.world.get::<BodyRef>(entity)?;
        self.world.resource::<Space>().0.mode(body.key)
    }

    pub fn owner_of(&self, entity: Entity) -> Option<ParticipantId> {
        let networked = self.world.get::<Networked>(entity)?;
        Some(self.world.resource::<Net>().0.owner_of(networked.id))
    }

    pub fn drain_events(&mut self) -> Vec<FrameEvent> {
        self.world.resource_mut::<FrameEventBus>().drain()
    }
}

// ---------- World transform plumbing ----------

/// Writes a world matrix onto an entity, composing with the inverse parent
/// world transform when parented, and keeps `WorldTransform3D` in sync so
/// later reads within the same tick see the exact matrix.
pub(crate) fn set_world_transform(world: &mut World, entity: Entity, target: Mat4) {
    let local = match world.get::<Parent>(entity).copied() {
        Some(parent) => {
            let parent_world =
                world.get::<WorldTransform3D>(parent.0).map(|w| w.0).unwrap_or(Mat4::IDENTITY);
            parent_world.inverse() * target
        }
        None => target,
    };
    let (scale, rotation, translation) = local.to_scale_rotation_translation();
    if let Some(mut t) = world.get_mut::<Transform3D>(entity) {
        t.translation = translation;
        t.rotation = rotation;
        t.scale = scale;
    }
    if let Some(mut wt) = world.get_mut::<WorldTransform3D>(entity) {
        wt.0 = target;
    }
}

/// Replaces an entity's world scale, keeping position and rotation. Roots
/// write straight through the local transform so the restored scale is
/// exact.
pub(crate) fn set_world_scale(world: &mut World, entity: Entity, scale: Vec3) {
    if world.get::<Parent>(entity).is_none() {
        let updated = if let Some(mut t) = world.get_mut::<Transform3D>(entity) {
            t.scale = scale;
            Some(*t)
        } else {
            None
        };
        if let Some(t) = updated {
            if let Some(mut wt) = world.get_mut::<WorldTransform3D>(entity) {
                wt.0 = Mat4::from_scale_rotation_translation(t.scale, t.rotation, t.translation);
            }
        }
        return;
    }
    let current = world.get::<WorldTransform3D>(entity).map(|w| w.0).unwrap_or_default();
    let (_, rotation, translation) = current.to_scale_rotation_translation();
    set_world_transform(world, entity, Mat4::from_scale_rotation_translation(scale, rotation, translation));
}

fn sys_propagate_world_transforms(
    mut sets: ParamSet<(
        Query<(Entity, &Transform3D, Option<&Parent>, &WorldTransform3D)>,
        Query<&mut WorldTransform3D>,
    )>,
) {
    // Two passes settle the shallow frame/media hierarchies this world uses.
    for _ in 0..2 {
        let mut updates = Vec::new();
        {
            let world_query = sets.p0();
            for (entity, transform, parent, _current) in world_query.iter() {
                let local = Mat4::from_scale_rotation_translation(
                    transform.scale,
                    transform.rotation,
                    transform.translation,
                );
                let world_mat = if let Some(parent) = parent {
                    world_query.get(parent.0).map(|(_, _, _, parent_wt)| parent_wt.0 * local).unwrap_or(local)
                } else {
                    local
                };
                updates.push((entity, world_mat));
            }
        }
        {
            let mut world_mut = sets.p1();
            for (entity, mat) in updates {
                if let Ok(mut wt) = world_mut.get_mut(entity) {
                    wt.0 = mat;
                }
            }
        }
    }
}
