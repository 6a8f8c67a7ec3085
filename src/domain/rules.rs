/// Player movement resolver: discrete unit steps with revert on contact.
///
/// Pure functions over the player and an immutable world slice.
/// Horizontal motion is resolved before vertical motion every frame.
///
/// ## Horizontal
/// ┌──────────────────────────────┬────────────────────────────────┐
/// │ Condition                     │ Effect                          │
/// ├──────────────────────────────┼────────────────────────────────┤
/// │ no pending command            │ nothing                         │
/// │ grounded                      │ budget = steps                  │
/// │ airborne                      │ budget = floor(steps × factor)  │
/// │ unit step overlaps SOLID      │ revert that step, stop          │
/// │ at least one step taken       │ update facing, advance anim     │
/// └──────────────────────────────┴────────────────────────────────┘
/// The command is consumed whatever happens; input re-issues it
/// every frame the key is held.
///
/// ### Vertical
/// ┌──────────────────────────────┬────────────────────────────────┐
/// │ Condition (priority order)    │ Effect                          │
/// ├──────────────────────────────┼────────────────────────────────┤
/// │ impulse > 0, step blocked     │ revert, zero command,           │
/// │                               │ airborne = false (head bump)    │
/// │ impulse > 0, all steps clear  │ airborne, impulse -= decay      │
/// │ falling, step blocked         │ revert, airborne = false, land  │
/// │ falling, all steps clear      │ airborne                        │
/// └──────────────────────────────┴────────────────────────────────┘
/// Rising is blocked by SOLID only; falling also lands on PLATFORM
/// when approached from above (see `physics::blocks`).

use super::entity::{Entity, EntityId, Facing, HorizontalMove, Player, VerticalMove};
use super::physics::{self, Motion};
use crate::config::PhysicsConfig;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct HorizontalOutcome {
    /// Unit steps actually taken.
    pub stepped: u32,
    /// Entity that stopped the walk, if any.
    pub blocked_by: Option<EntityId>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VerticalOutcome {
    Ascending,
    HeadBump(EntityId),
    Landed(EntityId),
    Falling,
}

/// Pixel budget for a horizontal command this frame.
pub fn walk_budget(steps: u32, airborne: bool, physics: &PhysicsConfig) -> u32 {
    if airborne {
        (steps as f32 * physics.airborne_walk_factor) as u32
    } else {
        steps
    }
}

pub fn resolve_horizontal(player: &mut Player, world: &[Entity], physics: &PhysicsConfig) -> HorizontalOutcome {
    let cmd = std::mem::take(&mut player.horizontal);
    let mut outcome = HorizontalOutcome::default();
    if cmd.direction == 0 || cmd.steps == 0 {
        return outcome;
    }

    for _ in 0..walk_budget(cmd.steps, player.airborne, physics) {
        player.body.rect.x += cmd.direction;
        if let Some(hit) = physics::blocker(&player.body, world, Motion::Sideways) {
            player.body.rect.x -= cmd.direction;
            outcome.blocked_by = Some(hit.id);
            break;
        }
        outcome.stepped += 1;
    }

    if outcome.stepped > 0 {
        player.facing = if cmd.direction < 0 { Facing::Left } else { Facing::Right };
        player.walk_frame = player.walk_frame.wrapping_add(1);
    }
    outcome
}

pub fn resolve_vertical(player: &mut Player, world: &[Entity], physics: &PhysicsConfig) -> VerticalOutcome {
    if player.vertical.impulse > 0 {
        let dir = player.vertical.direction;
        for _ in 0..physics.ascent_units {
            player.body.rect.y += dir;
            if let Some(hit) = physics::blocker(&player.body, world, Motion::Rising) {
                player.body.rect.y -= dir;
                player.vertical = VerticalMove::default();
                player.airborne = false;
                return VerticalOutcome::HeadBump(hit.id);
            }
        }
        player.airborne = true;
        player.vertical.impulse -= physics.impulse_decay;
        return VerticalOutcome::Ascending;
    }

    for _ in 0..physics.fall_units {
        let prev_bottom = player.body.rect.bottom();
        player.body.rect.y += 1;
        if let Some(hit) = physics::blocker(&player.body, world, Motion::Falling { prev_bottom }) {
            player.body.rect.y -= 1;
            player.airborne = false;
            player.grounded = true;
            player.vertical = VerticalMove::default();
            return VerticalOutcome::Landed(hit.id);
        }
    }
    player.airborne = true;
    player.grounded = false;
    VerticalOutcome::Falling
}

/// Apply this frame's input as movement commands.
/// Returns true if a jump was started.
pub fn apply_input(player: &mut Player, horizontal: Option<Facing>, jump: bool, physics: &PhysicsConfig) -> bool {
    match horizontal {
        Some(facing) => player.command_walk(facing, physics.walk_steps),
        None => player.horizontal = HorizontalMove::default(),
    }
    jump && player.command_jump(physics.jump_impulse)
}
