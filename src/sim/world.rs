/// Session state: one attempt at one level.
///
/// ## Camera
///
/// World coordinates never change because of scrolling. The camera keeps
/// an offset `(dx, dy)` chosen so that the target's centre lands on the
/// viewport centre, and the renderer maps every entity through `apply`:
///   - foreground: `screen = world + (dx, dy)`
///   - background: `screen = world + (dx / 2, 0)` (parallax, no vertical)
///
/// ## Lifetime
///
/// A session is created when a level starts and dropped when the player
/// leaves it (win, lose, restart, menu). Currency picked up during the
/// session stays in `pending_coins` until a win commits it.

use crate::config::GameConfig;
use crate::domain::economy::LevelId;
use crate::domain::entity::{Entity, Player, Tags};
use crate::domain::geometry::Rect;
use crate::sim::assets::SpriteBook;
use crate::sim::level::{self, TileMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Camera {
    pub dx: i32,
    pub dy: i32,
    /// Viewport size in pixels
    pub view_w: i32,
    pub view_h: i32,
}

impl Camera {
    pub fn new(view_w: i32, view_h: i32) -> Self {
        Camera { dx: 0, dy: 0, view_w, view_h }
    }

    /// Centre the viewport on `target`.
    pub fn update(&mut self, target: Rect) {
        let (cx, cy) = target.center();
        self.dx = self.view_w / 2 - cx;
        self.dy = self.view_h / 2 - cy;
    }

    /// Screen-space rect of an entity with the given placement and tags.
    pub fn apply(&self, rect: Rect, tags: Tags) -> Rect {
        if tags.contains(Tags::BACKGROUND) {
            rect.translated(self.dx / 2, 0)
        } else {
            rect.translated(self.dx, self.dy)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Session {
    pub level: LevelId,
    pub level_name: String,
    pub player: Player,
    pub entities: Vec<Entity>,
    pub camera: Camera,
    pub lives: u32,
    pub pending_coins: u32,
    pub victory: bool,
    /// Frames simulated so far.
    pub tick: u64,
}

impl Session {
    pub fn start(level: LevelId, map: &TileMap, sprites: &SpriteBook, config: &GameConfig, viewport: (i32, i32)) -> Self {
        let populated = level::populate(map, sprites);
        let mut camera = Camera::new(viewport.0, viewport.1);
        camera.update(populated.player.body.rect);
        Session {
            level,
            level_name: map.name.clone(),
            player: populated.player,
            entities: populated.entities,
            camera,
            lives: config.rules.lives,
            pending_coins: 0,
            victory: false,
            tick: 0,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.lives == 0
    }

    /// Resize the viewport and re-centre immediately.
    pub fn set_viewport(&mut self, w: i32, h: i32) {
        self.camera.view_w = w;
        self.camera.view_h = h;
        self.camera.update(self.player.body.rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::parse_level;

    #[test]
    fn camera_centres_target_exactly() {
        let mut cam = Camera::new(1000, 700);
        for target in [Rect::new(13, 140, 44, 70), Rect::new(-300, 9000, 44, 70), Rect::new(5, 5, 31, 17)] {
            cam.update(target);
            let screen = cam.apply(target, Tags::NONE);
            assert_eq!(screen.center(), (500, 350));
        }
    }

    #[test]
    fn background_gets_half_horizontal_and_no_vertical() {
        let mut cam = Camera::new(1000, 700);
        cam.update(Rect::new(900, 600, 44, 70));
        let panel = Rect::new(0, 0, 1750, 700);
        let screen = cam.apply(panel, Tags::BACKGROUND);
        assert_eq!(screen.x, cam.dx / 2);
        assert_eq!(screen.y, 0);
        let block = cam.apply(Rect::new(0, 0, 70, 70), Tags::SOLID);
        assert_eq!((block.x, block.y), (cam.dx, cam.dy));
    }

    #[test]
    fn session_starts_with_full_lives_and_centred_player() {
        let map = parse_level(1, "; Test\n@.&\n###\n").unwrap();
        let cfg = GameConfig::default();
        let s = Session::start(1, &map, &SpriteBook::built_in(), &cfg, (1000, 700));
        assert_eq!(s.lives, cfg.rules.lives);
        assert_eq!(s.pending_coins, 0);
        assert!(!s.victory);
        assert_eq!(s.level_name, "Test");
        let screen = s.camera.apply(s.player.body.rect, Tags::NONE);
        assert_eq!(screen.center(), (500, 350));
    }

    #[test]
    fn viewport_change_recentres() {
        let map = parse_level(1, "@.&\n###\n").unwrap();
        let mut s = Session::start(1, &map, &SpriteBook::built_in(), &GameConfig::default(), (1000, 700));
        s.set_viewport(400, 300);
        let screen = s.camera.apply(s.player.body.rect, Tags::NONE);
        assert_eq!(screen.center(), (200, 150));
    }
}
