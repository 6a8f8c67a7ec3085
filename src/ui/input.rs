/// Input state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous walking and jumping while a key is held
///   - Edge-triggered menu keys (only fire on initial press)
///   - Mouse clicks on screen buttons, in terminal cells
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// Letter keys also match their position on a Russian ЙЦУКЕН layout, so
/// the game keeps working when that layout is active.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind};

use crate::domain::entity::Facing;
use crate::sim::flow::Hotkey;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A'), KeyCode::Char('ф'), KeyCode::Char('Ф')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D'), KeyCode::Char('в'), KeyCode::Char('В')];
const KEYS_JUMP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char(' '), KeyCode::Char('w'), KeyCode::Char('W'), KeyCode::Char('ц'), KeyCode::Char('Ц')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P'), KeyCode::Char('з'), KeyCode::Char('З')];
const KEYS_SOUND: &[KeyCode] = &[KeyCode::Char('i'), KeyCode::Char('I'), KeyCode::Char('ш'), KeyCode::Char('Ш')];
const KEYS_MUSIC: &[KeyCode] = &[KeyCode::Char('o'), KeyCode::Char('O'), KeyCode::Char('щ'), KeyCode::Char('Щ')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter];
const KEYS_CANCEL: &[KeyCode] = &[KeyCode::Esc];

/// A mouse press, in terminal cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Click {
    pub col: u16,
    pub row: u16,
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that transitioned from "not held" → "held" during the
    /// most recent drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for Ctrl+C detection.
    raw_events: Vec<KeyEvent>,

    clicks: Vec<Click>,
    resized: Option<(u16, u16)>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            clicks: Vec::new(),
            resized: None,
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();
        self.clicks.clear();
        self.resized = None;

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) => self.record_key(key),
                Ok(Event::Mouse(mouse)) => {
                    if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
                        self.clicks.push(Click { col: mouse.column, row: mouse.row });
                    }
                }
                Ok(Event::Resize(w, h)) => self.resized = Some((w, h)),
                _ => {}
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record_key(&mut self, key: KeyEvent) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            // Without enhancement, releases are left to the timeout
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, Instant::now());
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .is_some_and(|t| t.elapsed() < HOLD_TIMEOUT)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was any of these keys freshly pressed this frame? (edge trigger)
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.fresh_presses.contains(c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    // ── Logical queries ──

    /// Held walking direction; both or neither means stand still.
    pub fn horizontal(&self) -> Option<Facing> {
        match (self.any_held(KEYS_LEFT), self.any_held(KEYS_RIGHT)) {
            (true, false) => Some(Facing::Left),
            (false, true) => Some(Facing::Right),
            _ => None,
        }
    }

    pub fn jump_held(&self) -> bool {
        self.any_held(KEYS_JUMP)
    }

    pub fn hotkeys(&self) -> Vec<Hotkey> {
        let table: [(&[KeyCode], Hotkey); 5] = [
            (KEYS_PAUSE, Hotkey::Pause),
            (KEYS_CONFIRM, Hotkey::Confirm),
            (KEYS_CANCEL, Hotkey::Cancel),
            (KEYS_SOUND, Hotkey::ToggleSound),
            (KEYS_MUSIC, Hotkey::ToggleMusic),
        ];
        table
            .into_iter()
            .filter(|(codes, _)| self.any_pressed(codes))
            .map(|(_, key)| key)
            .collect()
    }

    /// First click this frame. Later clicks in the same frame are dropped.
    pub fn click(&self) -> Option<Click> {
        self.clicks.first().copied()
    }

    pub fn resized(&self) -> Option<(u16, u16)> {
        self.resized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputState, code: KeyCode) {
        input.record_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn held_keys_give_direction() {
        let mut input = InputState::new();
        press(&mut input, KeyCode::Char('d'));
        assert_eq!(input.horizontal(), Some(Facing::Right));
        press(&mut input, KeyCode::Left);
        assert_eq!(input.horizontal(), None);
    }

    #[test]
    fn cyrillic_layout_keys_match() {
        let mut input = InputState::new();
        press(&mut input, KeyCode::Char('ф'));
        press(&mut input, KeyCode::Char('ц'));
        assert_eq!(input.horizontal(), Some(Facing::Left));
        assert!(input.jump_held());
        press(&mut input, KeyCode::Char('щ'));
        assert_eq!(input.hotkeys(), vec![Hotkey::ToggleMusic]);
    }

    #[test]
    fn hotkeys_fire_on_fresh_press_only() {
        let mut input = InputState::new();
        press(&mut input, KeyCode::Char('p'));
        assert_eq!(input.hotkeys(), vec![Hotkey::Pause]);
        input.fresh_presses.clear();
        // Auto-repeat while held is not a new press
        press(&mut input, KeyCode::Char('p'));
        assert!(input.hotkeys().is_empty());
    }

    #[test]
    fn release_honoured_when_enhanced() {
        let mut input = InputState::new();
        input.honor_release = true;
        press(&mut input, KeyCode::Right);
        let mut release = KeyEvent::new(KeyCode::Right, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        input.record_key(release);
        assert_eq!(input.horizontal(), None);
    }

    #[test]
    fn ctrl_c_detected() {
        let mut input = InputState::new();
        input.record_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(input.ctrl_c_pressed());
    }
}
