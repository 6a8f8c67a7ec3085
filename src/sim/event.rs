/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and notices.

use crate::domain::entity::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    CoinCollected { id: EntityId, amount: u32 },
    LifeLost { remaining: u32 },
    Jumped,
    GoalReached,
}
