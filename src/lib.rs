pub mod config;
pub mod ecs;
pub mod events;
pub mod net;
pub mod time;

pub use ecs::{FrameDesc, FrameWorld, MediaDesc, MediaKind};
