/// Screen layout for every mode, in terminal cells.
///
/// A `Screen` is what the renderer draws on top of (or instead of) the
/// level: a title, some text lines, and the clickable buttons. The same
/// `HitRegistry` that drew the buttons answers mouse clicks, so what the
/// player sees is exactly what they can click.
///
///   row 0        HUD (Playing) or the Menu bar button (modal screens)
///   rows 2..     title, text, then buttons stacked and centred

use crate::domain::economy::{LevelStatus, NextLevel};
use crate::sim::flow::{Action, Flow, Mode, Offer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub col: u16,
    pub row: u16,
    pub w: u16,
    pub h: u16,
}

impl CellRect {
    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.col && col < self.col + self.w && row >= self.row && row < self.row + self.h
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub rect: CellRect,
    pub label: String,
    pub action: Action,
}

/// Clickable regions in draw order. The first region containing a point wins.
#[derive(Clone, Debug, Default)]
pub struct HitRegistry {
    buttons: Vec<Button>,
}

impl HitRegistry {
    pub fn push(&mut self, rect: CellRect, label: impl Into<String>, action: Action) {
        self.buttons.push(Button { rect, label: label.into(), action });
    }

    pub fn hit(&self, col: u16, row: u16) -> Option<&Action> {
        self.buttons.iter().find(|b| b.rect.contains(col, row)).map(|b| &b.action)
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }
}

/// Text placed at a fixed cell that does not react to clicks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub rect: CellRect,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct Screen {
    pub title: Option<String>,
    pub lines: Vec<String>,
    pub registry: HitRegistry,
    pub labels: Vec<Label>,
    /// Draw the level underneath (dimmed for overlays).
    pub show_world: bool,
}

const TITLE_ROW: u16 = 2;
const BUTTON_GAP: u16 = 1;

fn button_rect(label: &str, col: u16, row: u16) -> CellRect {
    CellRect { col, row, w: label.chars().count() as u16 + 4, h: 1 }
}

fn centred(label: &str, row: u16, term_w: u16) -> CellRect {
    let w = label.chars().count() as u16 + 4;
    button_rect(label, term_w.saturating_sub(w) / 2, row)
}

/// Stack buttons vertically, centred, from `row`.
fn stack(reg: &mut HitRegistry, items: Vec<(String, Action)>, mut row: u16, term_w: u16) -> u16 {
    for (label, action) in items {
        let rect = centred(&label, row, term_w);
        reg.push(rect, label, action);
        row += 1 + BUTTON_GAP;
    }
    row
}

/// Lay buttons out left to right on one row, centred as a group.
fn strip(reg: &mut HitRegistry, items: Vec<(String, Action)>, row: u16, term_w: u16) {
    let total: u16 = items.iter().map(|(l, _)| l.chars().count() as u16 + 4 + 2).sum();
    let mut col = term_w.saturating_sub(total) / 2;
    for (label, action) in items {
        let rect = button_rect(&label, col, row);
        col += rect.w + 2;
        reg.push(rect, label, action);
    }
}

/// Label for a level tile on the menu.
fn level_label(id: u32, status: LevelStatus) -> String {
    match status {
        LevelStatus::Completed => format!("{id} ok"),
        LevelStatus::Unlocked => format!("{id}"),
        LevelStatus::LockedFree => format!("{id} .."),
        LevelStatus::LockedPaid(cost) => format!("{id} ${cost}"),
    }
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

pub fn screen_for(flow: &Flow, term_w: u16, term_h: u16) -> Screen {
    let mut screen = Screen::default();
    let reg = &mut screen.registry;
    let p = &flow.progress;
    let body = TITLE_ROW + 3;

    match flow.mode() {
        Mode::Playing => {
            screen.show_world = true;
            let label = "||";
            reg.push(button_rect(label, term_w.saturating_sub(6), 0), label, Action::Pause);
            return screen;
        }
        Mode::Menu => {
            screen.title = Some("T I L E H O P".into());
            screen.lines.push(format!("Coins: {}", p.currency));
            let levels: Vec<(String, Action)> = p
                .levels
                .iter()
                .map(|(id, status)| (level_label(*id, *status), Action::StartLevel(*id)))
                .collect();
            strip(reg, levels, body + 1, term_w);
            stack(
                reg,
                vec![
                    ("New Game".into(), Action::NewGame),
                    ("Store".into(), Action::OpenStore),
                    ("Help".into(), Action::OpenHelp),
                    (format!("Sound: {}", on_off(p.sound)), Action::ToggleSound),
                    (format!("Music: {}", on_off(p.music)), Action::ToggleMusic),
                    ("Quit".into(), Action::Quit),
                ],
                body + 4,
                term_w,
            );
            return screen;
        }
        _ => {}
    }

    // Every other screen gets the Menu bar button first
    reg.push(button_rect("Menu", 0, 0), "Menu", Action::Menu);

    match flow.mode() {
        Mode::Paused => {
            screen.show_world = true;
            screen.title = Some("PAUSED".into());
            stack(
                reg,
                vec![
                    ("Restart".into(), Action::Restart),
                    ("Continue".into(), Action::Continue),
                    ("Menu".into(), Action::Menu),
                ],
                body,
                term_w,
            );
        }
        Mode::Won => {
            screen.show_world = false;
            let mut items = Vec::new();
            if let Some(c) = flow.completion() {
                screen.title = Some(format!("LEVEL {} COMPLETE", c.level));
                screen.lines.push(format!("You got {} + {} coins!", c.collected, c.reward));
                match c.next {
                    NextLevel::Ready(_) => items.push(("Next".to_string(), Action::NextLevel)),
                    NextLevel::Locked(next) => {
                        screen.lines.push(format!("Level {next} can be bought in the store"));
                    }
                    NextLevel::Finale => screen.lines.push("All levels complete!".into()),
                }
            }
            items.push(("Restart".into(), Action::Restart));
            items.push(("Menu".into(), Action::Menu));
            stack(reg, items, body + 2, term_w);
        }
        Mode::Lost => {
            screen.show_world = true;
            screen.title = Some("YOU LOST".into());
            screen.lines.push("Coins from this run are gone.".into());
            stack(
                reg,
                vec![("Restart".into(), Action::Restart), ("Menu".into(), Action::Menu)],
                body + 2,
                term_w,
            );
        }
        Mode::Store => {
            screen.title = Some("STORE".into());
            screen.lines.push(format!("Coins: {}", p.currency));
            let mut row = body + 2;
            let name_col = term_w.saturating_sub(40) / 2;
            for entry in flow.store_entries() {
                if row + 1 >= term_h {
                    break;
                }
                let (label, action) = match entry.offer {
                    Offer::Buy(item, cost) => (format!("{}  buy {cost}", entry.label), Some(Action::Buy(item))),
                    Offer::Choose(name) => (format!("{}  choose", entry.label), Some(Action::Choose(name))),
                    Offer::Active => (format!("{}  (active)", entry.label), None),
                };
                let rect = button_rect(&label, name_col, row);
                match action {
                    Some(action) => reg.push(rect, label, action),
                    None => screen.labels.push(Label { rect, text: label }),
                }
                row += 1 + BUTTON_GAP;
            }
        }
        Mode::Help => {
            screen.title = Some("HELP".into());
            screen.lines.extend(
                [
                    "Left/Right, A/D    walk",
                    "Up, W, Space       jump",
                    "P                  pause",
                    "I / O              sound / music",
                    "Enter / Esc        confirm / back",
                    "",
                    "Reach the flag. Coins pay for new levels and heroes.",
                    "Thorns and ghosts cost a life.",
                ]
                .map(String::from),
            );
        }
        Mode::ConfirmNewGame => {
            screen.title = Some("NEW GAME".into());
            screen.lines.push("All progress will be lost. Are you sure?".into());
            strip(reg, vec![("Yes".into(), Action::Yes), ("No".into(), Action::No)], body + 3, term_w);
        }
        Mode::ConfirmQuit => {
            screen.title = Some("QUIT".into());
            screen.lines.push("Leave the game?".into());
            strip(reg, vec![("Yes".into(), Action::Yes), ("No".into(), Action::No)], body + 3, term_w);
        }
        Mode::Playing | Mode::Menu => {}
    }
    screen
}
