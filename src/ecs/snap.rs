use glam::{Mat4, Vec3};

/// Uniform factor scaling `item` to fit inside `container` without clipping
/// on any axis. Aspect is preserved; the tightest axis is filled exactly.
pub fn scale_for_aspect_fit(container: Vec3, item: Vec3) -> f32 {
    (container.x / item.x).min(container.y / item.y).min(container.z / item.z)
}

/// World matrix placing content of extents `content` inside a frame. Takes
/// the frame's world position and rotation unchanged and multiplies the
/// frame's own scale by the aspect-fit factor. Pure and idempotent: the same
/// inputs produce a bit-identical matrix.
pub fn snap_transform(frame_world: Mat4, frame_bounds: Vec3, content: Vec3) -> Mat4 {
    let (scale, rotation, translation) = frame_world.to_scale_rotation_translation();
    let fit = scale_for_aspect_fit(frame_bounds, content);
    Mat4::from_scale_rotation_translation(scale * fit, rotation, translation)
}
