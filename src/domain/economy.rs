/// Economy and progression: level unlocks, currency, cosmetics.
///
/// ## Level status lifecycle
///
///   LockedPaid(cost) ──purchase──▶ Unlocked ──complete──▶ Completed
///   LockedFree ──previous level completed──▶ Unlocked
///
/// A level can be *played* when Unlocked or Completed, and *started*
/// only when every lower-numbered level is also Completed.
///
/// ## Rewards
///
///   first completion of level k : 10k ..= 15k in steps of 5
///   replay of level k           :  2k ..=  5k in steps of 2
///   either one × lives_left / max_lives (integer)
///   coin pickup on level k      : (k+1) ..= (k+4)
///
/// Currency is unsigned and only ever reduced by a checked purchase.

use std::collections::BTreeMap;

use rand::Rng;

pub type LevelId = u32;

/// Cosmetic active on a fresh profile.
pub const DEFAULT_COSMETIC: &str = "classic_hero";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LevelStatus {
    LockedPaid(u32),
    LockedFree,
    Unlocked,
    Completed,
}

impl LevelStatus {
    pub fn is_playable(self) -> bool {
        matches!(self, LevelStatus::Unlocked | LevelStatus::Completed)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CosmeticStatus {
    ForSale(u32),
    Owned,
    Active,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StoreItem {
    Level(LevelId),
    Cosmetic(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PurchaseOutcome {
    Purchased { cost: u32 },
    InsufficientFunds { cost: u32, available: u32 },
    /// Unknown item, or not in a for-sale state.
    NotForSale,
}

/// What the win screen can offer after a completion.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NextLevel {
    Ready(LevelId),
    /// Next level exists but must be bought first.
    Locked(LevelId),
    /// That was the last level.
    Finale,
}

/// Result of one run, fed into `Progress::complete_level`.
#[derive(Clone, Copy, Debug)]
pub struct RunResult {
    pub lives_left: u32,
    pub max_lives: u32,
    /// Currency picked up during the run, not yet committed.
    pub collected: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Completion {
    pub level: LevelId,
    pub first_time: bool,
    pub reward: u32,
    pub collected: u32,
    pub next: NextLevel,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Progress {
    pub levels: BTreeMap<LevelId, LevelStatus>,
    pub currency: u32,
    pub cosmetics: BTreeMap<String, CosmeticStatus>,
    pub sound: bool,
    pub music: bool,
}

impl Default for Progress {
    /// Fresh profile: level 1 open, 2-5 unlock by play, 6-8 for sale.
    fn default() -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(1, LevelStatus::Unlocked);
        for id in 2..=5 {
            levels.insert(id, LevelStatus::LockedFree);
        }
        levels.insert(6, LevelStatus::LockedPaid(100));
        levels.insert(7, LevelStatus::LockedPaid(150));
        levels.insert(8, LevelStatus::LockedPaid(200));

        let cosmetics = [
            (DEFAULT_COSMETIC, CosmeticStatus::Active),
            ("red_hero", CosmeticStatus::ForSale(50)),
            ("blue_hero", CosmeticStatus::ForSale(50)),
            ("green_hero", CosmeticStatus::ForSale(100)),
            ("transparent_hero", CosmeticStatus::ForSale(300)),
        ]
        .into_iter()
        .map(|(name, status)| (name.to_string(), status))
        .collect();

        Progress { levels, currency: 0, cosmetics, sound: true, music: false }
    }
}

impl Progress {
    pub fn status(&self, id: LevelId) -> Option<LevelStatus> {
        self.levels.get(&id).copied()
    }

    pub fn is_playable(&self, id: LevelId) -> bool {
        self.status(id).is_some_and(LevelStatus::is_playable)
    }

    /// Playable, and every lower level is completed.
    pub fn can_start(&self, id: LevelId) -> bool {
        self.is_playable(id)
            && self.levels.range(..id).all(|(_, s)| *s == LevelStatus::Completed)
    }

    /// Mark `id` completed, unlock a free successor, and commit the run's
    /// collected currency plus the completion reward.
    pub fn complete_level<R: Rng + ?Sized>(&mut self, id: LevelId, run: RunResult, rng: &mut R) -> Completion {
        let first_time = self.status(id) != Some(LevelStatus::Completed);
        self.levels.insert(id, LevelStatus::Completed);

        let next_id = id + 1;
        let next = match self.levels.get_mut(&next_id) {
            Some(status) if *status == LevelStatus::LockedFree => {
                *status = LevelStatus::Unlocked;
                NextLevel::Ready(next_id)
            }
            Some(status) if status.is_playable() => NextLevel::Ready(next_id),
            Some(_) => NextLevel::Locked(next_id),
            None => NextLevel::Finale,
        };

        let reward = completion_reward(id, first_time, run.lives_left, run.max_lives, rng);
        self.currency = self.currency.saturating_add(run.collected).saturating_add(reward);

        Completion { level: id, first_time, reward, collected: run.collected, next }
    }

    pub fn purchase(&mut self, item: &StoreItem) -> PurchaseOutcome {
        let cost = match item {
            StoreItem::Level(id) => match self.status(*id) {
                Some(LevelStatus::LockedPaid(cost)) => cost,
                _ => return PurchaseOutcome::NotForSale,
            },
            StoreItem::Cosmetic(name) => match self.cosmetics.get(name) {
                Some(CosmeticStatus::ForSale(cost)) => *cost,
                _ => return PurchaseOutcome::NotForSale,
            },
        };

        let Some(remaining) = self.currency.checked_sub(cost) else {
            return PurchaseOutcome::InsufficientFunds { cost, available: self.currency };
        };
        self.currency = remaining;
        match item {
            StoreItem::Level(id) => {
                self.levels.insert(*id, LevelStatus::Unlocked);
            }
            StoreItem::Cosmetic(name) => {
                self.cosmetics.insert(name.clone(), CosmeticStatus::Owned);
            }
        }
        PurchaseOutcome::Purchased { cost }
    }

    /// Make an owned cosmetic the active one. Returns false if not owned.
    pub fn activate(&mut self, name: &str) -> bool {
        match self.cosmetics.get(name) {
            Some(CosmeticStatus::Owned) => {}
            Some(CosmeticStatus::Active) => return true,
            _ => return false,
        }
        for status in self.cosmetics.values_mut() {
            if *status == CosmeticStatus::Active {
                *status = CosmeticStatus::Owned;
            }
        }
        self.cosmetics.insert(name.to_string(), CosmeticStatus::Active);
        true
    }

    pub fn active_cosmetic(&self) -> Option<&str> {
        self.cosmetics
            .iter()
            .find(|(_, s)| **s == CosmeticStatus::Active)
            .map(|(name, _)| name.as_str())
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.sound = !self.sound;
        self.sound
    }

    pub fn toggle_music(&mut self) -> bool {
        self.music = !self.music;
        self.music
    }
}

/// Completion reward for level `k`, scaled by remaining lives.
pub fn completion_reward<R: Rng + ?Sized>(k: LevelId, first_time: bool, lives_left: u32, max_lives: u32, rng: &mut R) -> u32 {
    let base = if first_time {
        k * 10 + 5 * rng.gen_range(0..=k)
    } else {
        k * 2 + 2 * rng.gen_range(0..=(3 * k) / 2)
    };
    if max_lives == 0 {
        return base;
    }
    base * lives_left.min(max_lives) / max_lives
}

/// Currency for one coin picked up on level `k`.
pub fn coin_reward<R: Rng + ?Sized>(k: LevelId, rng: &mut R) -> u32 {
    rng.gen_range(k + 1..=k + 4)
}
