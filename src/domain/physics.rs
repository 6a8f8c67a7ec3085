/// Collision engine: single source of truth for "do these two touch".
///
/// ## Architecture
///
/// Two stages per pair:
///   1. BOUNDS: cheap rect intersection; no intersection means no contact.
///   2. MASK: walk the intersection region and test opaque pixels of
///      both masks. Transparent pixels never collide.
///
/// Queries against the world are filtered by category tags. An entity
/// never collides with itself (same id), so callers may pass a world
/// slice that also contains the querying entity.
///
/// ## Blocking Specification
///
/// During player and enemy movement an entity is BLOCKED by another if:
///   - The other carries SOLID (any motion), or
///   - The other carries PLATFORM, the motion is a fall, and the mover's
///     bottom edge was at or above the platform's top before the step
///
/// BACKGROUND entities are never returned by any query.

use super::entity::{Collidable, Entity, Tags};

// ══════════════════════════════════════════════════════════════
// Pairwise overlap
// ══════════════════════════════════════════════════════════════

/// Pixel-accurate overlap of two collidables in world space.
pub fn overlaps<A, B>(a: &A, b: &B) -> bool
where
    A: Collidable + ?Sized,
    B: Collidable + ?Sized,
{
    let ra = a.bounds();
    let rb = b.bounds();
    if ra.intersection(&rb).is_none() {
        return false;
    }
    a.mask().overlaps(b.mask(), rb.x - ra.x, rb.y - ra.y)
}

// ══════════════════════════════════════════════════════════════
// Category queries
// ══════════════════════════════════════════════════════════════

/// All entities in `world` carrying any tag of `category` that overlap
/// `subject`. Excludes `subject` itself and background entities.
pub fn colliding_with<'w, C>(subject: &C, world: &'w [Entity], category: Tags) -> Vec<&'w Entity>
where
    C: Collidable + ?Sized,
{
    world
        .iter()
        .filter(|e| is_candidate(subject, e, category))
        .filter(|e| overlaps(subject, *e))
        .collect()
}

/// First overlapping entity of `category`, in world order.
pub fn first_colliding<'w, C>(subject: &C, world: &'w [Entity], category: Tags) -> Option<&'w Entity>
where
    C: Collidable + ?Sized,
{
    world
        .iter()
        .find(|e| is_candidate(subject, e, category) && overlaps(subject, *e))
}

#[inline]
fn is_candidate<C: Collidable + ?Sized>(subject: &C, other: &Entity, category: Tags) -> bool {
    other.id != subject.id()
        && other.tags.intersects(category)
        && !other.tags.contains(Tags::BACKGROUND)
}

// ══════════════════════════════════════════════════════════════
// Movement blocking
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Motion {
    Sideways,
    Rising,
    /// One pixel down; carries the mover's bottom edge before the step.
    Falling { prev_bottom: i32 },
}

/// Does `other` stop a mover performing `motion`? (tags only, no geometry)
pub fn blocks(other: &Entity, motion: Motion) -> bool {
    if other.tags.contains(Tags::SOLID) {
        return true;
    }
    match motion {
        Motion::Falling { prev_bottom } => {
            other.tags.contains(Tags::PLATFORM) && prev_bottom <= other.rect.y
        }
        _ => false,
    }
}

/// First entity blocking `subject` at its current position for `motion`.
pub fn blocker<'w, C>(subject: &C, world: &'w [Entity], motion: Motion) -> Option<&'w Entity>
where
    C: Collidable + ?Sized,
{
    world.iter().find(|e| {
        e.id != subject.id()
            && !e.tags.contains(Tags::BACKGROUND)
            && blocks(e, motion)
            && overlaps(subject, *e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{EntityKind, Sprite};
    use crate::domain::geometry::Mask;
    use std::rc::Rc;

    fn block(id: u32, x: i32, y: i32, tags: Tags) -> Entity {
        Entity::new(id, EntityKind::StaticBlock, Sprite::Ground, x, y, Rc::new(Mask::full(10, 10)), tags)
    }

    fn ring(id: u32, x: i32, y: i32) -> Entity {
        // Opaque border, transparent 6x6 hole in the middle
        let m = Mask::from_fn(10, 10, |x, y| x < 2 || x >= 8 || y < 2 || y >= 8);
        Entity::new(id, EntityKind::Decoration, Sprite::Backdrop, x, y, Rc::new(m), Tags::SOLID)
    }

    fn dot(id: u32, x: i32, y: i32) -> Entity {
        Entity::new(id, EntityKind::Collectible, Sprite::Coin, x, y, Rc::new(Mask::full(2, 2)), Tags::COLLECTIBLE)
    }

    #[test]
    fn bounds_without_pixels_do_not_overlap() {
        let r = ring(1, 0, 0);
        // Dot sits entirely inside the transparent hole
        let d = dot(2, 4, 4);
        assert!(!overlaps(&r, &d));
        let d = dot(3, 1, 4);
        assert!(overlaps(&r, &d));
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = block(1, 0, 0, Tags::SOLID);
        let b = block(2, 10, 0, Tags::SOLID);
        assert!(!overlaps(&a, &b));
        let b = block(2, 9, 9, Tags::SOLID);
        assert!(overlaps(&a, &b));
    }

    #[test]
    fn query_filters_by_category() {
        let me = block(0, 0, 0, Tags::NONE);
        let world = vec![
            block(1, 5, 0, Tags::SOLID),
            block(2, 5, 5, Tags::DANGEROUS),
            block(3, 5, 5, Tags::SOLID | Tags::DANGEROUS),
            block(4, 50, 0, Tags::SOLID),
        ];
        let solid: Vec<u32> = colliding_with(&me, &world, Tags::SOLID).iter().map(|e| e.id).collect();
        assert_eq!(solid, vec![1, 3]);
        let danger: Vec<u32> = colliding_with(&me, &world, Tags::DANGEROUS).iter().map(|e| e.id).collect();
        assert_eq!(danger, vec![2, 3]);
        assert_eq!(first_colliding(&me, &world, Tags::DANGEROUS).map(|e| e.id), Some(2));
    }

    #[test]
    fn never_collides_with_self() {
        let world = vec![block(1, 0, 0, Tags::SOLID)];
        assert!(colliding_with(&world[0], &world, Tags::SOLID).is_empty());
        assert!(blocker(&world[0], &world, Motion::Sideways).is_none());
    }

    #[test]
    fn background_is_never_hit() {
        let me = block(0, 0, 0, Tags::NONE);
        let world = vec![block(1, 0, 0, Tags::SOLID | Tags::BACKGROUND)];
        assert!(colliding_with(&me, &world, Tags::SOLID).is_empty());
        assert!(blocker(&me, &world, Motion::Sideways).is_none());
    }

    #[test]
    fn platform_blocks_only_a_fall_from_above() {
        let plank = block(1, 0, 20, Tags::PLATFORM);
        assert!(!blocks(&plank, Motion::Sideways));
        assert!(!blocks(&plank, Motion::Rising));
        assert!(blocks(&plank, Motion::Falling { prev_bottom: 20 }));
        assert!(blocks(&plank, Motion::Falling { prev_bottom: 5 }));
        // Already below the top edge: pass through
        assert!(!blocks(&plank, Motion::Falling { prev_bottom: 21 }));
    }
}
