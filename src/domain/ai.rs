/// Enemy AI: ground patrol that turns at walls and ledges.
///
/// Each frame, in order:
///   1. **Wall check**: if stepping forward would overlap SOLID, reverse.
///   2. **Ledge probe**: otherwise, test a few positions about one body
///      width ahead, shifted down by the probe depth. If any probe finds
///      nothing walkable (SOLID or PLATFORM) underneath, reverse.
///   3. **Advance**: move `enemy_step` pixels along the (new) heading.
///
/// Enemies have no gravity: they stay at their spawn height forever.

use super::entity::{Collidable, Entity, EntityId, EntityKind, Facing, Tags};
use super::geometry::{Mask, Rect};
use super::physics;
use crate::config::PhysicsConfig;

/// Collision stand-in for an enemy at a hypothetical position.
struct Probe<'a> {
    enemy: &'a Entity,
    rect: Rect,
}

impl Collidable for Probe<'_> {
    fn id(&self) -> EntityId {
        self.enemy.id
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn mask(&self) -> &Mask {
        &self.enemy.mask
    }
}

/// Would the enemy at `rect` overlap anything in `category`?
fn touches(enemy: &Entity, rect: Rect, world: &[Entity], category: Tags) -> bool {
    let probe = Probe { enemy, rect };
    physics::first_colliding(&probe, world, category).is_some()
}

/// Decide the heading for this frame: reversed at walls and ledges.
pub fn choose_heading(enemy: &Entity, heading: Facing, world: &[Entity], cfg: &PhysicsConfig) -> Facing {
    let dir = heading.sign();
    let ahead = enemy.rect.translated(dir * cfg.enemy_step, 0);
    if touches(enemy, ahead, world, Tags::SOLID) {
        return heading.reversed();
    }

    let ground = Tags::SOLID | Tags::PLATFORM;
    let ledge = (0..cfg.enemy_probe_count as i32).any(|i| {
        let offset = (enemy.rect.w - i) * dir;
        let probe = enemy.rect.translated(offset, cfg.enemy_probe_depth);
        !touches(enemy, probe, world, ground)
    });
    if ledge {
        heading.reversed()
    } else {
        heading
    }
}

/// Advance one enemy (at `idx` in `world`) by a frame.
/// Non-enemies are left untouched.
pub fn patrol(world: &mut [Entity], idx: usize, cfg: &PhysicsConfig) {
    let EntityKind::Enemy(heading) = world[idx].kind else {
        return;
    };
    let heading = choose_heading(&world[idx], heading, world, cfg);
    let enemy = &mut world[idx];
    enemy.kind = EntityKind::Enemy(heading);
    enemy.rect.x += heading.sign() * cfg.enemy_step;
}
