/// Mode flow: which screen is active and how actions move between them.
///
/// ```text
///            ┌──────────── Menu ◀──────────────┐
///   StartLevel│  NewGame│  OpenStore/Help│  Quit│
///            ▼         ▼                ▼      ▼
///        Playing   ConfirmNewGame   Store/Help  ConfirmQuit ──Yes──▶ exit
///        │  ▲ │         │Yes: reset+save           │No
///   Pause│  │ │victory  ▼                          ▼
///        ▼  │ ▼        Menu                       Menu
///      Paused  Won ──Next/Restart──▶ Playing
///              Lost ──Restart──────▶ Playing
/// ```
///
/// Persistence points:
///   - leaving Menu for Playing, Store or Help
///   - entering ConfirmQuit (once; a close request while confirming exits
///     without saving again unless a toggle changed progress meanwhile)
///   - after a confirmed new-game reset
///   - after a win commits its reward
///
/// Pending currency lives in the session and is dropped with it on
/// lose, restart or a return to the menu.

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::config::{GameConfig, SpeedConfig};
use crate::domain::economy::{
    Completion, CosmeticStatus, LevelId, LevelStatus, NextLevel, Progress, PurchaseOutcome, RunResult, StoreItem,
};
use crate::domain::entity::FrameInput;
use crate::sim::assets::SpriteBook;
use crate::sim::event::GameEvent;
use crate::sim::level::LevelLibrary;
use crate::sim::save::ProfileStore;
use crate::sim::step;
use crate::sim::world::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Menu,
    Playing,
    Paused,
    Won,
    Lost,
    Store,
    Help,
    ConfirmNewGame,
    ConfirmQuit,
}

/// What a button or hotkey asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    StartLevel(LevelId),
    NewGame,
    OpenStore,
    OpenHelp,
    Quit,
    Menu,
    Pause,
    Continue,
    Restart,
    NextLevel,
    Yes,
    No,
    Buy(StoreItem),
    Choose(String),
    ToggleSound,
    ToggleMusic,
}

/// Logical keys, after keyboard/gamepad mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hotkey {
    Pause,
    Confirm,
    Cancel,
    ToggleSound,
    ToggleMusic,
}

/// Sound effects requested by the flow. Only queued while sound is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    Transition,
    Coin,
    Hit,
    Jump,
    Win,
    Lose,
}

/// One row of the store screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEntry {
    pub label: String,
    pub offer: Offer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Offer {
    Buy(StoreItem, u32),
    Choose(String),
    Active,
}

/// Everything the flow borrows from the outside for one call.
pub struct Services<'a> {
    pub levels: &'a LevelLibrary,
    pub sprites: &'a SpriteBook,
    pub config: &'a GameConfig,
    pub store: &'a mut dyn ProfileStore,
    pub rng: &'a mut dyn RngCore,
}

pub struct Flow {
    mode: Mode,
    pub progress: Progress,
    session: Option<Session>,
    completion: Option<Completion>,
    notice: Option<String>,
    quit_persisted: bool,
    terminated: bool,
    dirty: bool,
    cues: Vec<Cue>,
    viewport: (i32, i32),
}

impl Flow {
    pub fn new(progress: Progress, viewport: (i32, i32)) -> Self {
        Flow {
            mode: Mode::Menu,
            progress,
            session: None,
            completion: None,
            notice: None,
            quit_persisted: false,
            terminated: false,
            dirty: true,
            cues: Vec::new(),
            viewport,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    // ── Accessors ──

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(text.into());
        self.dirty = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Background music wanted right now.
    pub fn wants_music(&self) -> bool {
        self.mode == Mode::Playing && self.progress.music
    }

    pub fn fps(&self, speed: &SpeedConfig) -> u32 {
        match self.mode {
            Mode::Playing => speed.play_fps,
            _ => speed.menu_fps,
        }
    }

    /// True once after any visible change.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn drain_cues(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }

    pub fn set_viewport(&mut self, w: i32, h: i32) {
        self.viewport = (w, h);
        if let Some(s) = self.session.as_mut() {
            s.set_viewport(w, h);
        }
        self.dirty = true;
    }

    /// Highest level that can be started now.
    pub fn resume_level(&self) -> Option<LevelId> {
        self.progress.levels.keys().rev().copied().find(|id| self.progress.can_start(*id))
    }

    /// Store rows: every cosmetic, then every level still for sale.
    pub fn store_entries(&self) -> Vec<StoreEntry> {
        let cosmetics = self.progress.cosmetics.iter().map(|(name, status)| StoreEntry {
            label: name.replace('_', " "),
            offer: match *status {
                CosmeticStatus::ForSale(cost) => Offer::Buy(StoreItem::Cosmetic(name.clone()), cost),
                CosmeticStatus::Owned => Offer::Choose(name.clone()),
                CosmeticStatus::Active => Offer::Active,
            },
        });
        let levels = self.progress.levels.iter().filter_map(|(id, status)| match *status {
            LevelStatus::LockedPaid(cost) => Some(StoreEntry {
                label: format!("level {id}"),
                offer: Offer::Buy(StoreItem::Level(*id), cost),
            }),
            _ => None,
        });
        cosmetics.chain(levels).collect()
    }

    // ── Input ──

    /// Map a logical key to the action it means in the current mode.
    pub fn hotkey(&self, key: Hotkey) -> Option<Action> {
        match key {
            Hotkey::ToggleSound => return Some(Action::ToggleSound),
            Hotkey::ToggleMusic => return Some(Action::ToggleMusic),
            _ => {}
        }
        match (self.mode, key) {
            (Mode::Playing, Hotkey::Pause | Hotkey::Cancel) => Some(Action::Pause),
            (Mode::Paused, Hotkey::Pause | Hotkey::Confirm) => Some(Action::Continue),
            (Mode::Menu, Hotkey::Confirm) => self.resume_level().map(Action::StartLevel),
            (Mode::Menu, Hotkey::Cancel) => Some(Action::Quit),
            (Mode::Won, Hotkey::Confirm) => match self.completion.map(|c| c.next) {
                Some(NextLevel::Ready(_)) => Some(Action::NextLevel),
                Some(NextLevel::Locked(_)) => Some(Action::Restart),
                _ => Some(Action::Menu),
            },
            (Mode::Lost, Hotkey::Confirm) => Some(Action::Restart),
            (Mode::ConfirmNewGame | Mode::ConfirmQuit, Hotkey::Confirm) => Some(Action::Yes),
            (Mode::ConfirmNewGame | Mode::ConfirmQuit, Hotkey::Cancel) => Some(Action::No),
            (Mode::Paused | Mode::Won | Mode::Lost | Mode::Store | Mode::Help, Hotkey::Cancel) => Some(Action::Menu),
            _ => None,
        }
    }

    /// Window close or Ctrl+C. Asks for confirmation first; a second
    /// request while confirming exits without saving the same progress again.
    pub fn request_close(&mut self, svc: &mut Services) {
        if self.mode == Mode::ConfirmQuit {
            self.finish_quit(svc);
            return;
        }
        self.enter_confirm_quit(svc);
    }

    pub fn dispatch(&mut self, action: Action, svc: &mut Services) {
        match action {
            Action::ToggleSound => {
                let on = self.progress.toggle_sound();
                debug!(on, "sound toggled");
                self.progress_changed();
                return;
            }
            Action::ToggleMusic => {
                let on = self.progress.toggle_music();
                debug!(on, "music toggled");
                self.progress_changed();
                return;
            }
            _ => {}
        }

        self.cue(Cue::Transition);
        match (self.mode, action) {
            // ── Menu ──
            (Mode::Menu, Action::StartLevel(id)) => {
                if self.check_startable(id) {
                    self.start_level(id, svc);
                    if self.mode == Mode::Playing {
                        self.persist(svc);
                    }
                }
            }
            (Mode::Menu, Action::NewGame) => self.set_mode(Mode::ConfirmNewGame),
            (Mode::Menu, Action::OpenStore) => {
                self.set_mode(Mode::Store);
                self.persist(svc);
            }
            (Mode::Menu, Action::OpenHelp) => {
                self.set_mode(Mode::Help);
                self.persist(svc);
            }
            (Mode::Menu, Action::Quit) => self.enter_confirm_quit(svc),

            // ── Playing / Paused ──
            (Mode::Playing, Action::Pause) => self.set_mode(Mode::Paused),
            (Mode::Paused, Action::Continue) => self.set_mode(Mode::Playing),
            (Mode::Paused | Mode::Lost, Action::Restart) => self.restart(svc),
            (Mode::Playing | Mode::Paused | Mode::Lost, Action::Menu) => self.back_to_menu(),

            // ── Won ──
            (Mode::Won, Action::NextLevel) => {
                if let Some(NextLevel::Ready(next)) = self.completion.map(|c| c.next) {
                    if self.check_startable(next) {
                        self.start_level(next, svc);
                    }
                }
            }
            (Mode::Won, Action::Restart) => self.restart(svc),
            (Mode::Won, Action::Menu) => self.back_to_menu(),

            // ── Store ──
            (Mode::Store, Action::Buy(item)) => self.buy(&item),
            (Mode::Store, Action::Choose(name)) => {
                if self.progress.activate(&name) {
                    info!(cosmetic = %name, "cosmetic chosen");
                }
                self.dirty = true;
            }
            (Mode::Store | Mode::Help, Action::Menu) => self.set_mode(Mode::Menu),

            // ── Confirmations ──
            (Mode::ConfirmNewGame, Action::Yes) => {
                self.progress = Progress::default();
                info!("progress reset");
                self.set_mode(Mode::Menu);
                self.persist(svc);
            }
            (Mode::ConfirmNewGame, Action::No | Action::Menu) => self.set_mode(Mode::Menu),
            (Mode::ConfirmQuit, Action::Yes) => {
                info!("quit confirmed");
                self.finish_quit(svc);
            }
            (Mode::ConfirmQuit, Action::No | Action::Menu) => {
                self.quit_persisted = false;
                self.set_mode(Mode::Menu);
            }

            (mode, action) => debug!(?mode, ?action, "action ignored"),
        }
    }

    /// Advance the running session by one frame.
    pub fn tick(&mut self, input: FrameInput, svc: &mut Services) {
        if self.mode != Mode::Playing {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            self.set_mode(Mode::Menu);
            return;
        };
        let events = step::step(session, input, svc.config, &mut *svc.rng);
        let (victory, lost) = (session.victory, session.is_lost());
        self.dirty = true;

        for event in &events {
            match event {
                GameEvent::CoinCollected { .. } => self.cue(Cue::Coin),
                GameEvent::LifeLost { .. } => self.cue(Cue::Hit),
                GameEvent::Jumped => self.cue(Cue::Jump),
                GameEvent::GoalReached => {}
            }
        }

        if victory {
            self.win(svc);
        } else if lost {
            self.lose();
        }
    }

    // ── Transitions ──

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "mode change");
        }
        self.mode = mode;
        self.notice = None;
        self.dirty = true;
    }

    fn cue(&mut self, cue: Cue) {
        if self.progress.sound {
            self.cues.push(cue);
        }
    }

    fn persist(&mut self, svc: &mut Services) {
        if let Err(e) = svc.store.save(&self.progress) {
            warn!(error = %e, "profile save failed");
            self.notice = Some(format!("Progress not saved: {e}"));
            self.dirty = true;
        }
    }

    fn enter_confirm_quit(&mut self, svc: &mut Services) {
        self.session = None;
        self.set_mode(Mode::ConfirmQuit);
        if !self.quit_persisted {
            self.persist(svc);
            self.quit_persisted = true;
        }
    }

    /// Exit, saving first only if progress changed since the quit save.
    fn finish_quit(&mut self, svc: &mut Services) {
        if !self.quit_persisted {
            self.persist(svc);
            self.quit_persisted = true;
        }
        self.terminated = true;
    }

    /// Progress edited outside a persistence point.
    fn progress_changed(&mut self) {
        if self.mode == Mode::ConfirmQuit {
            self.quit_persisted = false;
        }
        self.dirty = true;
    }

    fn check_startable(&mut self, id: LevelId) -> bool {
        if self.progress.can_start(id) {
            return true;
        }
        let text = match self.progress.status(id) {
            None => format!("There is no level {id}"),
            Some(LevelStatus::LockedPaid(cost)) => format!("Level {id} costs {cost} coins in the store"),
            Some(LevelStatus::LockedFree) => format!("Complete level {} first", id.saturating_sub(1)),
            Some(_) => "Complete the earlier levels first".to_string(),
        };
        self.set_notice(text);
        false
    }

    fn start_level(&mut self, id: LevelId, svc: &mut Services) {
        let map = match svc.levels.get(id) {
            Ok(map) => map,
            Err(e) => {
                warn!(level = id, error = %e, "cannot start level");
                self.set_notice(e.to_string());
                return;
            }
        };
        info!(level = id, name = %map.name, "level started");
        self.session = Some(Session::start(id, map, svc.sprites, svc.config, self.viewport));
        self.completion = None;
        self.set_mode(Mode::Playing);
    }

    fn restart(&mut self, svc: &mut Services) {
        let id = self.session.as_ref().map(|s| s.level).or(self.completion.map(|c| c.level));
        match id {
            Some(id) => self.start_level(id, svc),
            None => self.set_mode(Mode::Menu),
        }
    }

    fn back_to_menu(&mut self) {
        if let Some(s) = self.session.take() {
            debug!(level = s.level, discarded = s.pending_coins, "session abandoned");
        }
        self.set_mode(Mode::Menu);
    }

    fn win(&mut self, svc: &mut Services) {
        let Some(session) = self.session.take() else { return };
        let run = RunResult {
            lives_left: session.lives,
            max_lives: svc.config.rules.lives,
            collected: session.pending_coins,
        };
        let completion = self.progress.complete_level(session.level, run, &mut *svc.rng);
        info!(
            level = completion.level,
            first_time = completion.first_time,
            reward = completion.reward,
            collected = completion.collected,
            "level finished"
        );
        self.completion = Some(completion);
        self.set_mode(Mode::Won);
        self.cue(Cue::Win);
        self.persist(svc);
    }

    fn lose(&mut self) {
        if let Some(s) = &self.session {
            info!(level = s.level, discarded = s.pending_coins, "level lost");
        }
        self.set_mode(Mode::Lost);
        self.cue(Cue::Lose);
    }

    fn buy(&mut self, item: &StoreItem) {
        match self.progress.purchase(item) {
            PurchaseOutcome::Purchased { cost } => {
                info!(?item, cost, "purchased");
                let text = match item {
                    StoreItem::Level(id) => format!("Level {id} unlocked"),
                    StoreItem::Cosmetic(name) => format!("Bought {}", name.replace('_', " ")),
                };
                self.set_notice(text);
            }
            PurchaseOutcome::InsufficientFunds { cost, available } => {
                debug!(?item, cost, available, "purchase declined");
                self.set_notice(format!("Need {cost} coins, you have {available}"));
            }
            PurchaseOutcome::NotForSale => {
                debug!(?item, "not for sale");
                self.dirty = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Facing;
    use crate::sim::level::parse_level;
    use crate::sim::save::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Rig {
        levels: LevelLibrary,
        sprites: SpriteBook,
        config: GameConfig,
        store: MemoryStore,
        rng: StdRng,
    }

    impl Rig {
        fn new() -> Self {
            // Level 1 is won by walking right; level 2 is lost to a thorn
            let maps = vec![
                parse_level(1, "@&\n##\n").unwrap(),
                parse_level(2, "@^\n##\n").unwrap(),
                parse_level(3, "@.&\n###\n").unwrap(),
            ];
            Rig {
                levels: LevelLibrary::from_maps(maps),
                sprites: SpriteBook::built_in(),
                config: GameConfig::default(),
                store: MemoryStore::default(),
                rng: StdRng::seed_from_u64(42),
            }
        }

        fn svc(&mut self) -> Services<'_> {
            Services {
                levels: &self.levels,
                sprites: &self.sprites,
                config: &self.config,
                store: &mut self.store,
                rng: &mut self.rng,
            }
        }
    }

    fn flow() -> Flow {
        Flow::new(Progress::default(), (1000, 700))
    }

    const RIGHT: FrameInput = FrameInput { horizontal: Some(Facing::Right), jump: false };

    fn play_until_done(flow: &mut Flow, rig: &mut Rig) {
        for _ in 0..200 {
            flow.tick(RIGHT, &mut rig.svc());
            if flow.mode() != Mode::Playing {
                return;
            }
        }
        panic!("session never ended");
    }

    #[test]
    fn starts_in_menu() {
        let f = flow();
        assert_eq!(f.mode(), Mode::Menu);
        assert!(f.session().is_none());
        assert_eq!(f.resume_level(), Some(1));
    }

    #[test]
    fn locked_level_does_not_start_or_save() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::StartLevel(2), &mut rig.svc());
        assert_eq!(f.mode(), Mode::Menu);
        assert!(f.notice().is_some());
        assert_eq!(rig.store.saves, 0);
    }

    #[test]
    fn starting_a_level_persists_then_plays() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::StartLevel(1), &mut rig.svc());
        assert_eq!(f.mode(), Mode::Playing);
        assert_eq!(rig.store.saves, 1);
        assert_eq!(f.session().map(|s| s.level), Some(1));
    }

    #[test]
    fn win_commits_reward_and_offers_next() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::StartLevel(1), &mut rig.svc());
        play_until_done(&mut f, &mut rig);
        assert_eq!(f.mode(), Mode::Won);
        let c = *f.completion().unwrap();
        assert!(c.first_time);
        assert_eq!(c.next, NextLevel::Ready(2));
        assert_eq!(f.progress.status(1), Some(LevelStatus::Completed));
        assert_eq!(f.progress.currency, c.reward + c.collected);
        // Saved on leaving the menu and after the win
        assert_eq!(rig.store.saves, 2);
        assert_eq!(rig.store.stored.as_ref(), Some(&f.progress));

        assert_eq!(f.hotkey(Hotkey::Confirm), Some(Action::NextLevel));
        f.dispatch(Action::NextLevel, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Playing);
        assert_eq!(f.session().map(|s| s.level), Some(2));
    }

    #[test]
    fn lose_then_restart_and_menu() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.progress.levels.insert(1, LevelStatus::Completed);
        f.progress.levels.insert(2, LevelStatus::Unlocked);
        f.dispatch(Action::StartLevel(2), &mut rig.svc());
        play_until_done(&mut f, &mut rig);
        assert_eq!(f.mode(), Mode::Lost);
        assert_eq!(f.progress.status(2), Some(LevelStatus::Unlocked));

        f.dispatch(Action::Restart, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Playing);
        assert_eq!(f.session().map(|s| (s.level, s.lives)), Some((2, 3)));

        f.dispatch(Action::Menu, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Menu);
        assert!(f.session().is_none());
    }

    #[test]
    fn pause_and_continue() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::StartLevel(1), &mut rig.svc());
        f.dispatch(f.hotkey(Hotkey::Pause).unwrap(), &mut rig.svc());
        assert_eq!(f.mode(), Mode::Paused);
        let tick = f.session().unwrap().tick;
        f.tick(RIGHT, &mut rig.svc());
        assert_eq!(f.session().unwrap().tick, tick);
        f.dispatch(Action::Continue, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Playing);
    }

    #[test]
    fn quit_persists_exactly_once() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::Quit, &mut rig.svc());
        assert_eq!(f.mode(), Mode::ConfirmQuit);
        assert_eq!(rig.store.saves, 1);

        // Close request while already confirming
        f.request_close(&mut rig.svc());
        assert!(f.is_terminated());
        assert_eq!(rig.store.saves, 1);
    }

    #[test]
    fn confirmed_quit_does_not_save_again() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.request_close(&mut rig.svc());
        assert_eq!(f.mode(), Mode::ConfirmQuit);
        f.dispatch(Action::Yes, &mut rig.svc());
        assert!(f.is_terminated());
        assert_eq!(rig.store.saves, 1);
    }

    #[test]
    fn toggle_while_confirming_quit_is_saved_on_exit() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::Quit, &mut rig.svc());
        f.dispatch(f.hotkey(Hotkey::ToggleMusic).unwrap(), &mut rig.svc());
        assert!(f.progress.music);
        f.dispatch(Action::Yes, &mut rig.svc());
        assert!(f.is_terminated());
        assert_eq!(rig.store.stored.as_ref(), Some(&f.progress));
        assert_eq!(rig.store.saves, 2);
    }

    #[test]
    fn toggle_then_second_close_request_saves_once_more() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.request_close(&mut rig.svc());
        f.dispatch(Action::ToggleSound, &mut rig.svc());
        f.request_close(&mut rig.svc());
        assert!(f.is_terminated());
        assert_eq!(rig.store.stored.as_ref().map(|p| p.sound), Some(f.progress.sound));
        assert_eq!(rig.store.saves, 2);
    }

    #[test]
    fn cancelled_quit_rearms_persistence() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::Quit, &mut rig.svc());
        f.dispatch(Action::No, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Menu);
        assert!(!f.is_terminated());
        f.dispatch(Action::Quit, &mut rig.svc());
        assert_eq!(rig.store.saves, 2);
    }

    #[test]
    fn close_during_play_drops_pending_and_confirms() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::StartLevel(1), &mut rig.svc());
        f.request_close(&mut rig.svc());
        assert_eq!(f.mode(), Mode::ConfirmQuit);
        assert!(f.session().is_none());
        assert_eq!(rig.store.saves, 2);
    }

    #[test]
    fn cancelled_new_game_changes_nothing() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.progress.currency = 77;
        let before = f.progress.clone();
        f.dispatch(Action::NewGame, &mut rig.svc());
        assert_eq!(f.mode(), Mode::ConfirmNewGame);
        f.dispatch(Action::No, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Menu);
        assert_eq!(f.progress, before);
        assert_eq!(rig.store.saves, 0);
    }

    #[test]
    fn confirmed_new_game_resets_and_saves() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.progress.currency = 77;
        f.dispatch(Action::NewGame, &mut rig.svc());
        f.dispatch(Action::Yes, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Menu);
        assert_eq!(f.progress, Progress::default());
        assert_eq!(rig.store.stored, Some(Progress::default()));
        assert_eq!(rig.store.saves, 1);
    }

    #[test]
    fn store_purchase_and_choose() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.progress.currency = 30;
        f.dispatch(Action::OpenStore, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Store);

        let red = StoreItem::Cosmetic("red_hero".into());
        f.dispatch(Action::Buy(red.clone()), &mut rig.svc());
        assert_eq!(f.progress.currency, 30);
        assert!(f.notice().unwrap().contains("50"));

        f.progress.currency = 60;
        f.dispatch(Action::Buy(red), &mut rig.svc());
        assert_eq!(f.progress.currency, 10);
        assert!(f.store_entries().iter().any(|e| e.offer == Offer::Choose("red_hero".into())));

        f.dispatch(Action::Choose("red_hero".into()), &mut rig.svc());
        assert_eq!(f.progress.active_cosmetic(), Some("red_hero"));
    }

    #[test]
    fn store_lists_cosmetics_then_paid_levels() {
        let f = flow();
        let entries = f.store_entries();
        assert_eq!(entries.len(), 5 + 3);
        assert_eq!(entries.iter().filter(|e| e.offer == Offer::Active).count(), 1);
        assert_eq!(entries[5].offer, Offer::Buy(StoreItem::Level(6), 100));
    }

    #[test]
    fn failed_save_is_surfaced() {
        let mut rig = Rig::new();
        rig.store.fail = true;
        let mut f = flow();
        f.dispatch(Action::OpenHelp, &mut rig.svc());
        assert_eq!(f.mode(), Mode::Help);
        assert!(f.notice().is_some_and(|n| n.contains("not saved")));
    }

    #[test]
    fn toggles_work_everywhere_and_gate_cues() {
        let mut rig = Rig::new();
        let mut f = flow();
        f.dispatch(Action::ToggleSound, &mut rig.svc());
        assert!(!f.progress.sound);
        f.dispatch(Action::OpenHelp, &mut rig.svc());
        assert!(f.drain_cues().is_empty());
        f.dispatch(f.hotkey(Hotkey::ToggleMusic).unwrap(), &mut rig.svc());
        assert!(f.progress.music);
        assert!(!f.wants_music());
        f.dispatch(Action::Menu, &mut rig.svc());
        f.dispatch(Action::StartLevel(1), &mut rig.svc());
        assert!(f.wants_music());
    }

    #[test]
    fn fps_follows_mode() {
        let mut rig = Rig::new();
        let mut f = flow();
        let speed = SpeedConfig::default();
        assert_eq!(f.fps(&speed), speed.menu_fps);
        f.dispatch(Action::StartLevel(1), &mut rig.svc());
        assert_eq!(f.fps(&speed), speed.play_fps);
    }
}
