use super::physics::BodyKey;
use crate::net::NetworkId;
use bevy_ecs::prelude::*;
use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3, Vec4};
use std::collections::{HashMap, HashSet};

bitflags! {
    /// Media kinds a frame can accept, and the classification of an object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MediaMask: u8 {
        const MODEL = 1 << 0;
        const VIDEO = 1 << 1;
        const IMAGE = 1 << 2;
        const DOCUMENT = 1 << 3;
    }
}

// ---------- Scene graph ----------
#[derive(Component, Clone, Copy)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}
impl Default for Transform3D {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}
#[derive(Component, Clone, Copy, Default)]
pub struct WorldTransform3D(pub Mat4);
#[derive(Component, Clone, Copy)]
pub struct Parent(pub Entity);
#[derive(Component, Default)]
pub struct Children(pub Vec<Entity>);

/// Host marks a hierarchy with this while tearing it down; frames inside it
/// release their capture instead of fighting the teardown.
#[derive(Component, Clone, Copy)]
pub struct Deleting;

// ---------- Frames ----------
#[derive(Component, Clone, Copy)]
pub struct MediaFrame {
    pub accepts: MediaMask,
    /// Full extents of the capture volume along the frame's local axes.
    pub bounds: Vec3,
    pub guide: Entity,
}

/// Locally observed capture pointer of a frame. `Pending` is a prediction
/// issued this session that the replication layer has not echoed back yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureLink {
    Empty,
    Pending { nid: NetworkId, scale: Vec3 },
    Confirmed { nid: NetworkId, scale: Vec3 },
}

impl CaptureLink {
    pub fn nid(&self) -> Option<NetworkId> {
        match *self {
            CaptureLink::Empty => None,
            CaptureLink::Pending { nid, .. } | CaptureLink::Confirmed { nid, .. } => Some(nid),
        }
    }

    pub fn scale(&self) -> Option<Vec3> {
        match *self {
            CaptureLink::Empty => None,
            CaptureLink::Pending { scale, .. } | CaptureLink::Confirmed { scale, .. } => Some(scale),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CaptureLink::Empty)
    }
}

#[derive(Component, Clone, Copy)]
pub struct CaptureState {
    pub link: CaptureLink,
    pub contact_misses: u32,
}
impl Default for CaptureState {
    fn default() -> Self {
        Self { link: CaptureLink::Empty, contact_misses: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Captured {
    pub nid: NetworkId,
    /// World scale the object had before capture, restored on release.
    pub scale: Vec3,
}

/// Last network-confirmed capture pointer. Written locally when this
/// participant mutates the frame; overwritten by the host when a remote
/// write wins. Authoritative over [`CaptureState`] at the end of every tick.
#[derive(Component, Clone, Copy, Default, PartialEq, Debug)]
pub struct ReplicatedFrame {
    pub captured: Option<Captured>,
}

#[derive(Component, Clone, Copy, Default)]
pub struct PreviewSlot {
    pub ghost: Option<Entity>,
    pub nid: Option<NetworkId>,
}

// ---------- Media objects ----------
#[derive(Component, Clone, Copy)]
pub struct Networked {
    pub id: NetworkId,
}
#[derive(Component, Clone, Copy)]
pub struct Held;
#[derive(Component, Clone, Copy)]
pub struct MediaLoading;
/// Marks the entity actually carrying the media behavior; composite objects
/// keep it on a child of the networked root.
#[derive(Component, Clone, Copy)]
pub struct MediaLoaded;

#[derive(Component, Clone, Copy)]
pub struct ContentBounds {
    /// Full extents of the visual content.
    pub extents: Vec3,
    /// Offset of the content's geometric center from the entity origin.
    pub center: Vec3,
}

#[derive(Component, Clone, Copy)]
pub struct MediaModel;
#[derive(Component, Clone, Copy)]
pub struct MediaVideo {
    pub aspect: f32,
}
#[derive(Component, Clone, Copy)]
pub struct MediaImage;
#[derive(Component, Clone, Copy)]
pub struct MediaDocument;

#[derive(Component, Clone, Copy)]
pub struct LoopAnimation {
    pub clip: usize,
    pub time: f32,
    pub playing: bool,
}

#[derive(Component, Clone, Copy)]
pub struct BodyRef {
    pub key: BodyKey,
}

// ---------- Preview ghosts ----------
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GhostKind {
    /// Functional stand-in for a cloned visual hierarchy.
    Replica { animation: Option<usize> },
    /// Flat stand-in for media whose visual cannot be cloned.
    Billboard { aspect: f32 },
}

#[derive(Component, Clone, Copy)]
pub struct Ghost {
    pub frame: Entity,
    pub source: Entity,
    pub kind: GhostKind,
    pub opacity: f32,
    pub double_sided: bool,
    /// Translation applied to the cloned visual so its bounds are centered
    /// on the ghost origin; the snap math assumes root ~= center.
    pub center_offset: Vec3,
}

// ---------- Guides ----------
#[derive(Component, Clone, Copy)]
pub struct Guide;
#[derive(Component, Clone, Copy)]
pub struct Tint(pub Vec4);
#[derive(Component, Clone, Copy)]
pub struct Visible(pub bool);

// ---------- Resources ----------
/// Frames in admission order; arbitration walks this every tick so
/// cross-frame claims resolve identically within a tick.
#[derive(Resource, Default)]
pub struct FrameRoster(pub Vec<Entity>);

#[derive(Resource, Default)]
pub struct BodyIndex(pub HashMap<BodyKey, Entity>);

#[derive(Resource, Default)]
pub struct NidIndex(pub HashMap<NetworkId, Entity>);

/// Network ids known to be gone, locally or remotely.
#[derive(Resource, Default)]
pub struct DeletedNids(pub HashSet<NetworkId>);

#[derive(Resource, Clone)]
pub struct Settings(pub crate::config::ArbiterConfig);

#[derive(Resource)]
pub struct Net(pub Box<dyn crate::net::Replication + Send + Sync>);

#[derive(Resource)]
pub struct Space(pub Box<dyn super::physics::SpatialQuery + Send + Sync>);
