/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The world is in pixels; one terminal cell shows a CELL_PX_W x CELL_PX_H
/// block of it. A cell is painted with an entity's glyph when any of a
/// few sample points inside the block hits an opaque pixel of its mask.
/// Entities are drawn in layer order, so later layers cover earlier ones.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{Drawable, Entity, Sprite, Tags};
use crate::domain::geometry::{Mask, Rect};
use crate::sim::flow::{Flow, Mode};
use crate::sim::world::Session;
use crate::ui::layout::Screen;

/// World pixels per terminal column / row.
pub const CELL_PX_W: i32 = 14;
pub const CELL_PX_H: i32 = 35;

/// Rows above the world view.
const HUD_ROWS: u16 = 1;

const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };
const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const PANEL_BG: Color = Color::Rgb { r: 40, g: 40, b: 40 };
const BUTTON_BG: Color = Color::Rgb { r: 50, g: 90, b: 160 };
const TITLE_FG: Color = Color::Rgb { r: 255, g: 220, b: 50 };

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: BASE_BG };

    /// Sentinel used to invalidate the back buffer; differs from any real cell.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn set_bg(&mut self, x: usize, y: usize, bg: Color) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x].bg = bg;
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i, y, Cell { ch, fg, bg });
        }
    }

    fn put_centred(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let x = self.width.saturating_sub(s.chars().count()) / 2;
        self.put_str(x, y, s, fg, bg);
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell { ch: ' ', fg: Color::White, bg });
        }
    }
}

// ── Sprite look ──

fn sprite_look(sprite: Sprite, cosmetic: Option<&str>) -> (char, Color) {
    match sprite {
        Sprite::Ground => ('█', Color::Rgb { r: 90, g: 140, b: 60 }),
        Sprite::Crate => ('▒', Color::Rgb { r: 170, g: 120, b: 60 }),
        Sprite::Stone => ('▓', Color::Rgb { r: 140, g: 140, b: 150 }),
        Sprite::Step => ('▀', Color::Rgb { r: 200, g: 170, b: 110 }),
        Sprite::Thorn => ('▲', Color::Rgb { r: 220, g: 60, b: 60 }),
        Sprite::Enemy => ('▓', Color::Rgb { r: 200, g: 200, b: 255 }),
        Sprite::Coin => ('●', Color::Rgb { r: 255, g: 210, b: 40 }),
        Sprite::Flag => ('▌', Color::Rgb { r: 255, g: 255, b: 255 }),
        Sprite::Hero => hero_look(cosmetic),
        Sprite::Backdrop => (' ', Color::Rgb { r: 30, g: 32, b: 60 }),
    }
}

fn hero_look(cosmetic: Option<&str>) -> (char, Color) {
    match cosmetic {
        Some("red_hero") => ('█', Color::Rgb { r: 230, g: 70, b: 70 }),
        Some("blue_hero") => ('█', Color::Rgb { r: 80, g: 120, b: 240 }),
        Some("green_hero") => ('█', Color::Rgb { r: 80, g: 200, b: 90 }),
        Some("transparent_hero") => ('░', Color::Rgb { r: 200, g: 200, b: 220 }),
        _ => ('█', Color::Rgb { r: 250, g: 240, b: 220 }),
    }
}

/// Does the entity's mask cover any sample point of this screen cell?
fn covers(mask: &Mask, screen: Rect, cell_px: Rect) -> bool {
    let Some(area) = screen.intersection(&cell_px) else { return false };
    let samples = [
        (area.x + area.w / 2, area.y + area.h / 2),
        (area.x + area.w / 4, area.y + area.h / 4),
        (area.x + 3 * area.w / 4, area.y + 3 * area.h / 4),
    ];
    samples
        .iter()
        .any(|&(px, py)| mask.get(px - screen.x, py - screen.y))
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_mode: Option<Mode>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_mode: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            SetBackgroundColor(BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw, th);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn term_size(&self) -> (u16, u16) {
        (self.term_w as u16, self.term_h as u16)
    }

    /// World viewport in pixels for a terminal of this size.
    pub fn viewport_px(term_w: u16, term_h: u16) -> (i32, i32) {
        (term_w as i32 * CELL_PX_W, (term_h.saturating_sub(HUD_ROWS)) as i32 * CELL_PX_H)
    }

    pub fn resize(&mut self, tw: u16, th: u16) {
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, flow: &Flow, screen: &Screen) -> io::Result<()> {
        // Mode change → clear for a clean transition
        if self.last_mode != Some(flow.mode()) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
            self.last_mode = Some(flow.mode());
        }

        self.front.clear();

        if screen.show_world {
            if let Some(session) = flow.session() {
                self.compose_world(session, flow.progress.active_cosmetic());
                self.compose_hud(session, flow);
            }
        }
        if flow.mode() != Mode::Playing {
            self.compose_panel(screen);
        }
        self.compose_buttons(screen);
        if let Some(notice) = flow.notice() {
            let row = self.front.height.saturating_sub(1);
            self.front.fill_row(row, Color::Rgb { r: 200, g: 180, b: 50 });
            self.front.put_str(1, row, notice, Color::Black, Color::Rgb { r: 200, g: 180, b: 50 });
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors; ResetColor would fall back to the terminal default
        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(BASE_BG))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_world(&mut self, session: &Session, cosmetic: Option<&str>) {
        let cam = &session.camera;
        let mut drawables: Vec<&Entity> = session.entities.iter().collect();
        if !session.player.is_blink_hidden() {
            drawables.push(&session.player.body);
        }
        drawables.sort_by_key(|d| Drawable::layer(*d));

        let rows = self.front.height.saturating_sub(HUD_ROWS as usize);
        for d in drawables {
            let tags = Drawable::tags(d);
            let screen = cam.apply(Drawable::bounds(d), tags);
            let (ch, color) = sprite_look(Drawable::sprite(d), cosmetic);
            let background = tags.contains(Tags::BACKGROUND);

            // Cells the screen rect touches, clipped to the view
            let c0 = screen.x.div_euclid(CELL_PX_W).max(0);
            let c1 = (screen.right() - 1).div_euclid(CELL_PX_W).min(self.front.width as i32 - 1);
            let r0 = screen.y.div_euclid(CELL_PX_H).max(0);
            let r1 = (screen.bottom() - 1).div_euclid(CELL_PX_H).min(rows as i32 - 1);
            for row in r0..=r1 {
                for col in c0..=c1 {
                    let cell_px = Rect::new(col * CELL_PX_W, row * CELL_PX_H, CELL_PX_W, CELL_PX_H);
                    if !covers(&d.mask, screen, cell_px) {
                        continue;
                    }
                    let (x, y) = (col as usize, row as usize + HUD_ROWS as usize);
                    if background {
                        self.front.set_bg(x, y, color);
                    } else {
                        let bg = self.front.get(x, y).bg;
                        self.front.set(x, y, Cell { ch, fg: color, bg });
                    }
                }
            }
        }
    }

    fn compose_hud(&mut self, session: &Session, flow: &Flow) {
        self.front.fill_row(0, HUD_BG);
        let hearts = "♥".repeat(session.lives as usize);
        let audio = format!(
            "snd:{} mus:{}",
            if flow.progress.sound { "on" } else { "off" },
            if flow.progress.music { "on" } else { "off" }
        );
        let hud = format!(
            " Level {}  {}  {:<5} Coins {}+{}  {}",
            session.level, session.level_name, hearts, flow.progress.currency, session.pending_coins, audio
        );
        self.front.put_str(0, 0, &hud, Color::White, HUD_BG);
    }

    fn compose_panel(&mut self, screen: &Screen) {
        let has_text = screen.title.is_some() || !screen.lines.is_empty();
        if screen.show_world && has_text {
            // Overlay box behind the text and buttons
            let bottom = screen
                .registry
                .buttons()
                .iter()
                .map(|b| (b.rect.row + b.rect.h) as usize)
                .max()
                .unwrap_or(6);
            let box_w = 44.min(self.front.width);
            let box_x = (self.front.width - box_w) / 2;
            for y in 1..(bottom + 1).min(self.front.height) {
                for x in box_x..box_x + box_w {
                    self.front.set(x, y, Cell { ch: ' ', fg: Color::White, bg: PANEL_BG });
                }
            }
        }

        let mut row = 2;
        let bg = if screen.show_world { PANEL_BG } else { BASE_BG };
        if let Some(title) = &screen.title {
            self.front.put_centred(row, title, TITLE_FG, bg);
            row += 2;
        }
        for line in &screen.lines {
            self.front.put_centred(row, line, Color::Rgb { r: 200, g: 200, b: 200 }, bg);
            row += 1;
        }
    }

    fn compose_buttons(&mut self, screen: &Screen) {
        for b in screen.registry.buttons() {
            let text = format!("[ {} ]", b.label);
            self.front.put_str(b.rect.col as usize, b.rect.row as usize, &text, Color::White, BUTTON_BG);
        }
        for l in &screen.labels {
            let text = format!("  {}  ", l.text);
            self.front.put_str(l.rect.col as usize, l.rect.row as usize, &text, TITLE_FG, PANEL_BG);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mask_covers_overlapped_cell() {
        let mask = Mask::full(70, 70);
        let screen = Rect::new(0, 0, 70, 70);
        assert!(covers(&mask, screen, Rect::new(14, 35, CELL_PX_W, CELL_PX_H)));
        assert!(!covers(&mask, screen, Rect::new(70, 0, CELL_PX_W, CELL_PX_H)));
    }

    #[test]
    fn transparent_mask_covers_nothing() {
        let mask = Mask::new(70, 70);
        assert!(!covers(&mask, Rect::new(0, 0, 70, 70), Rect::new(0, 0, CELL_PX_W, CELL_PX_H)));
    }

    #[test]
    fn partial_mask_sampled_in_screen_space() {
        // Only the right half is opaque
        let mask = Mask::from_fn(28, 35, |x, _| x >= 14);
        let screen = Rect::new(14, 0, 28, 35);
        assert!(!covers(&mask, screen, Rect::new(14, 0, CELL_PX_W, CELL_PX_H)));
        assert!(covers(&mask, screen, Rect::new(28, 0, CELL_PX_W, CELL_PX_H)));
    }

    #[test]
    fn viewport_excludes_hud_rows() {
        assert_eq!(Renderer::viewport_px(80, 21), (80 * CELL_PX_W, 20 * CELL_PX_H));
    }

    #[test]
    fn hero_colour_follows_cosmetic() {
        assert_ne!(hero_look(Some("red_hero")), hero_look(None));
        assert_eq!(hero_look(Some("classic_hero")), hero_look(None));
        assert_eq!(hero_look(Some("transparent_hero")).0, '░');
    }
}
