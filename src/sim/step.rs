/// The step function: advances a session by one frame.
///
/// Processing order:
///   1. Pickups and goal (a reached goal ends the session at once)
///   2. Invulnerability countdown, or hazard overlap check
///   3. Input → movement commands
///   4. Horizontal resolution, then vertical resolution
///      (blocked contact with a dangerous solid counts as a hazard hit)
///   5. Enemy patrols
///   6. Camera follow
///
/// At most one life is lost per frame. A hit that leaves lives > 0 starts
/// the invulnerability countdown; during it hazards are ignored.

use rand::Rng;

use crate::config::{GameConfig, RulesConfig};
use crate::domain::ai;
use crate::domain::economy::coin_reward;
use crate::domain::entity::{EntityId, EntityKind, FrameInput, Tags};
use crate::domain::physics;
use crate::domain::rules::{self, VerticalOutcome};
use super::event::GameEvent;
use super::world::Session;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step<R: Rng + ?Sized>(session: &mut Session, input: FrameInput, config: &GameConfig, rng: &mut R) -> Vec<GameEvent> {
    if session.victory || session.is_lost() {
        return vec![];
    }

    let mut events: Vec<GameEvent> = Vec::new();
    session.tick += 1;
    session.player.hit_this_frame = false;

    if resolve_pickups(session, rng, &mut events) {
        return events;
    }
    resolve_hazards(session, &config.rules, &mut events);
    if !session.is_lost() {
        resolve_player_movement(session, input, config, &mut events);
    }
    resolve_enemies(session, config);
    session.camera.update(session.player.body.rect);

    events
}

// ══════════════════════════════════════════════════════════════
// Pickups and goal
// ══════════════════════════════════════════════════════════════

/// Collect every overlapped coin, then check the goal.
/// Returns true when the goal was reached.
fn resolve_pickups<R: Rng + ?Sized>(session: &mut Session, rng: &mut R, events: &mut Vec<GameEvent>) -> bool {
    let touched: Vec<(EntityId, EntityKind)> =
        physics::colliding_with(&session.player.body, &session.entities, Tags::COLLECTIBLE | Tags::GOAL)
            .into_iter()
            .map(|e| (e.id, e.kind))
            .collect();
    if touched.is_empty() {
        return false;
    }

    let mut collected = Vec::new();
    let mut goal = false;
    for (id, kind) in touched {
        match kind {
            EntityKind::Collectible => {
                let amount = coin_reward(session.level, rng);
                session.pending_coins = session.pending_coins.saturating_add(amount);
                collected.push(id);
                events.push(GameEvent::CoinCollected { id, amount });
            }
            EntityKind::Goal => goal = true,
            _ => {}
        }
    }
    session.entities.retain(|e| !collected.contains(&e.id));

    if goal {
        session.victory = true;
        events.push(GameEvent::GoalReached);
    }
    goal
}

// ══════════════════════════════════════════════════════════════
// Hazards
// ══════════════════════════════════════════════════════════════

fn resolve_hazards(session: &mut Session, rules: &RulesConfig, events: &mut Vec<GameEvent>) {
    if session.player.invulnerable > 0 {
        session.player.invulnerable -= 1;
        return;
    }
    if physics::first_colliding(&session.player.body, &session.entities, Tags::DANGEROUS).is_some() {
        take_hit(session, rules, events);
    }
}

/// Contact reported by the movement resolver. Only dangerous entities hurt.
fn resolve_contact(session: &mut Session, id: EntityId, rules: &RulesConfig, events: &mut Vec<GameEvent>) {
    let dangerous = session
        .entities
        .iter()
        .any(|e| e.id == id && e.tags.contains(Tags::DANGEROUS));
    if dangerous {
        take_hit(session, rules, events);
    }
}

fn take_hit(session: &mut Session, rules: &RulesConfig, events: &mut Vec<GameEvent>) {
    let player = &mut session.player;
    if player.invulnerable > 0 || player.hit_this_frame || session.lives == 0 {
        return;
    }
    session.lives -= 1;
    player.hit_this_frame = true;
    if session.lives > 0 {
        player.invulnerable = rules.invulnerability_frames;
    }
    events.push(GameEvent::LifeLost { remaining: session.lives });
}

// ══════════════════════════════════════════════════════════════
// Movement
// ══════════════════════════════════════════════════════════════

fn resolve_player_movement(session: &mut Session, input: FrameInput, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let physics = &config.physics;
    if rules::apply_input(&mut session.player, input.horizontal, input.jump, physics) {
        events.push(GameEvent::Jumped);
    }

    let horizontal = rules::resolve_horizontal(&mut session.player, &session.entities, physics);
    if let Some(id) = horizontal.blocked_by {
        resolve_contact(session, id, &config.rules, events);
    }

    match rules::resolve_vertical(&mut session.player, &session.entities, physics) {
        VerticalOutcome::HeadBump(id) | VerticalOutcome::Landed(id) => {
            resolve_contact(session, id, &config.rules, events);
        }
        VerticalOutcome::Ascending | VerticalOutcome::Falling => {}
    }
}

fn resolve_enemies(session: &mut Session, config: &GameConfig) {
    for idx in 0..session.entities.len() {
        ai::patrol(&mut session.entities, idx, &config.physics);
    }
}
