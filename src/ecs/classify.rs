use super::types::{Children, ContentBounds, MediaDocument, MediaImage, MediaLoaded, MediaMask, MediaModel, MediaVideo};
use bevy_ecs::prelude::{Entity, World};

/// Entity actually carrying the media behavior: the entity itself, or the
/// first descendant flagged [`MediaLoaded`] for composite objects.
pub fn media_representation(world: &World, entity: Entity) -> Option<Entity> {
    if world.get::<MediaLoaded>(entity).is_some() {
        return Some(entity);
    }
    let children = world.get::<Children>(entity)?;
    for &child in &children.0 {
        if let Some(found) = media_representation(world, child) {
            return Some(found);
        }
    }
    None
}

/// Media-type mask of an entity. Unclassifiable entities get an empty mask
/// and are never capturable; there is no error path.
pub fn classify(world: &World, entity: Entity) -> MediaMask {
    let mut mask = MediaMask::empty();
    let Some(media) = media_representation(world, entity) else {
        return mask;
    };
    if world.get::<MediaModel>(media).is_some() {
        mask |= MediaMask::MODEL;
    }
    if world.get::<MediaVideo>(media).is_some() {
        mask |= MediaMask::VIDEO;
    }
    if world.get::<MediaImage>(media).is_some() {
        mask |= MediaMask::IMAGE;
    }
    if world.get::<MediaDocument>(media).is_some() {
        mask |= MediaMask::DOCUMENT;
    }
    mask
}

/// Content bounds live on the load representation, like the media markers.
pub fn content_bounds(world: &World, entity: Entity) -> Option<ContentBounds> {
    let media = media_representation(world, entity)?;
    world.get::<ContentBounds>(media).copied()
}
