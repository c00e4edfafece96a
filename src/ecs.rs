pub mod classify;
pub mod physics;
pub mod preview;
pub mod snap;
pub mod topology;
pub mod types;
pub mod watchdog;
pub mod world;

mod arbiter;

pub use types::*;
pub use world::{FrameDesc, FrameWorld, MediaDesc, MediaKind};
