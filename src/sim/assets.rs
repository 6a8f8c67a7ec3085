/// Sprite masks.
///
/// Each sprite is reduced to its opaque-pixel mask: the collision engine
/// needs nothing else, and the terminal renderer samples the same mask to
/// decide which cells an entity covers.
///
/// Two sources:
///   1. Built-in procedural shapes (default)
///   2. A directory of PNG files, one per sprite (`ground.png`, ...).
///      Alpha 0 = transparent, anything else opaque. Every file must be
///      present; a missing or undecodable image aborts start-up.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::info;

use crate::domain::entity::Sprite;
use crate::domain::geometry::Mask;
use crate::domain::tile::TILE_PX;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("missing sprite image {}", path.display())]
    Missing { path: PathBuf },
    #[error("cannot decode sprite image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub const HERO_SIZE: (u32, u32) = (44, 70);
pub const COIN_SIZE: (u32, u32) = (30, 30);
pub const STEP_SIZE: (u32, u32) = (70, 20);
/// One backdrop panel spans 25 x 10 cells.
pub const BACKDROP_SIZE: (u32, u32) = (1750, 700);

const ALL_SPRITES: [Sprite; 10] = [
    Sprite::Ground,
    Sprite::Crate,
    Sprite::Stone,
    Sprite::Step,
    Sprite::Thorn,
    Sprite::Enemy,
    Sprite::Coin,
    Sprite::Flag,
    Sprite::Hero,
    Sprite::Backdrop,
];

fn file_name(sprite: Sprite) -> &'static str {
    match sprite {
        Sprite::Ground => "ground.png",
        Sprite::Crate => "box.png",
        Sprite::Stone => "stones.png",
        Sprite::Step => "step.png",
        Sprite::Thorn => "thorns.png",
        Sprite::Enemy => "ghost.png",
        Sprite::Coin => "coin.png",
        Sprite::Flag => "flag.png",
        Sprite::Hero => "hero.png",
        Sprite::Backdrop => "backdrop.png",
    }
}

/// One shared mask per sprite.
#[derive(Clone, Debug)]
pub struct SpriteBook {
    ground: Rc<Mask>,
    crate_: Rc<Mask>,
    stone: Rc<Mask>,
    step: Rc<Mask>,
    thorn: Rc<Mask>,
    enemy: Rc<Mask>,
    coin: Rc<Mask>,
    flag: Rc<Mask>,
    hero: Rc<Mask>,
    backdrop: Rc<Mask>,
}

impl SpriteBook {
    /// From `assets_dir` when configured, else built-in shapes.
    pub fn load(assets_dir: Option<&Path>) -> Result<Self, AssetError> {
        match assets_dir {
            Some(dir) => {
                let book = SpriteBook::from_dir(dir)?;
                info!(dir = %dir.display(), "loaded sprite images");
                Ok(book)
            }
            None => Ok(SpriteBook::built_in()),
        }
    }

    pub fn built_in() -> Self {
        match SpriteBook::from_fn(|sprite| Ok::<_, Infallible>(built_in_mask(sprite))) {
            Ok(book) => book,
            Err(never) => match never {},
        }
    }

    pub fn from_dir(dir: &Path) -> Result<Self, AssetError> {
        SpriteBook::from_fn(|sprite| load_mask(&dir.join(file_name(sprite))))
    }

    fn from_fn<E>(mut make: impl FnMut(Sprite) -> Result<Mask, E>) -> Result<Self, E> {
        let mut next = |s| make(s).map(Rc::new);
        Ok(SpriteBook {
            ground: next(Sprite::Ground)?,
            crate_: next(Sprite::Crate)?,
            stone: next(Sprite::Stone)?,
            step: next(Sprite::Step)?,
            thorn: next(Sprite::Thorn)?,
            enemy: next(Sprite::Enemy)?,
            coin: next(Sprite::Coin)?,
            flag: next(Sprite::Flag)?,
            hero: next(Sprite::Hero)?,
            backdrop: next(Sprite::Backdrop)?,
        })
    }

    pub fn mask(&self, sprite: Sprite) -> Rc<Mask> {
        let mask = match sprite {
            Sprite::Ground => &self.ground,
            Sprite::Crate => &self.crate_,
            Sprite::Stone => &self.stone,
            Sprite::Step => &self.step,
            Sprite::Thorn => &self.thorn,
            Sprite::Enemy => &self.enemy,
            Sprite::Coin => &self.coin,
            Sprite::Flag => &self.flag,
            Sprite::Hero => &self.hero,
            Sprite::Backdrop => &self.backdrop,
        };
        Rc::clone(mask)
    }

    /// Every sprite this book covers, in a fixed order.
    pub fn sprites() -> &'static [Sprite] {
        &ALL_SPRITES
    }
}

fn load_mask(path: &Path) -> Result<Mask, AssetError> {
    if !path.is_file() {
        return Err(AssetError::Missing { path: path.to_path_buf() });
    }
    let img = image::open(path)
        .map_err(|source| AssetError::Decode { path: path.to_path_buf(), source })?
        .to_rgba8();
    let (w, h) = img.dimensions();
    Ok(Mask::from_fn(w, h, |x, y| img.get_pixel(x, y)[3] != 0))
}

// ══════════════════════════════════════════════════════════════
// Built-in shapes
// ══════════════════════════════════════════════════════════════

fn built_in_mask(sprite: Sprite) -> Mask {
    let t = TILE_PX as u32;
    match sprite {
        Sprite::Ground | Sprite::Crate => Mask::full(t, t),
        Sprite::Stone => rounded(t, t, 6),
        Sprite::Step => Mask::full(STEP_SIZE.0, STEP_SIZE.1),
        Sprite::Thorn => thorns(t, t),
        Sprite::Enemy => ghost(t, t),
        Sprite::Coin => disc(COIN_SIZE.0),
        Sprite::Flag => flag(t, t),
        Sprite::Hero => rounded(HERO_SIZE.0, HERO_SIZE.1, 8),
        Sprite::Backdrop => Mask::full(BACKDROP_SIZE.0, BACKDROP_SIZE.1),
    }
}

/// Rectangle with its four corners cut to radius `r`.
fn rounded(w: u32, h: u32, r: u32) -> Mask {
    let r = r as i64;
    Mask::from_fn(w, h, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let cx = if x < r { r } else if x >= w as i64 - r { w as i64 - r - 1 } else { x };
        let cy = if y < r { r } else if y >= h as i64 - r { h as i64 - r - 1 } else { y };
        (x - cx).pow(2) + (y - cy).pow(2) <= r * r
    })
}

fn disc(d: u32) -> Mask {
    let r = d as f32 / 2.0;
    Mask::from_fn(d, d, |x, y| {
        let dx = x as f32 + 0.5 - r;
        let dy = y as f32 + 0.5 - r;
        dx * dx + dy * dy <= r * r
    })
}

/// Three upward spikes on a solid base.
fn thorns(w: u32, h: u32) -> Mask {
    let base = h / 7;
    let spike_w = w as f32 / 3.0;
    let spike_h = (h - base) as f32;
    Mask::from_fn(w, h, |x, y| {
        if y >= h - base {
            return true;
        }
        let local = (x as f32 + 0.5) % spike_w;
        let half = (local - spike_w / 2.0).abs();
        // Height of the spike at this column, measured from the base
        let rise = spike_h * (1.0 - half / (spike_w / 2.0));
        (h - base - y) as f32 <= rise
    })
}

/// Domed top, straight sides, flat bottom.
fn ghost(w: u32, h: u32) -> Mask {
    let r = w as f32 / 2.0;
    Mask::from_fn(w, h, |x, y| {
        if (y as f32) >= r {
            return true;
        }
        let dx = x as f32 + 0.5 - r;
        let dy = y as f32 + 0.5 - r;
        dx * dx + dy * dy <= r * r
    })
}

/// Pole on the left with a pennant at the top.
fn flag(w: u32, h: u32) -> Mask {
    let pole = (w / 7, w / 7 + 6);
    let pennant_h = h / 2;
    Mask::from_fn(w, h, |x, y| {
        if x >= pole.0 && x < pole.1 {
            return true;
        }
        if x >= pole.1 && y < pennant_h {
            // Triangle narrowing to the right
            let reach = (w - pole.1) as f32 * (1.0 - (2.0 * y as f32 / pennant_h as f32 - 1.0).abs());
            return ((x - pole.1) as f32) < reach;
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_sizes() {
        let book = SpriteBook::built_in();
        let size = |s| {
            let m = book.mask(s);
            (m.width(), m.height())
        };
        assert_eq!(size(Sprite::Hero), HERO_SIZE);
        assert_eq!(size(Sprite::Coin), COIN_SIZE);
        assert_eq!(size(Sprite::Step), STEP_SIZE);
        assert_eq!(size(Sprite::Ground), (70, 70));
        assert_eq!(size(Sprite::Thorn), (70, 70));
        assert_eq!(size(Sprite::Backdrop), BACKDROP_SIZE);
    }

    #[test]
    fn shapes_have_transparent_pixels_where_expected() {
        let book = SpriteBook::built_in();
        let coin = book.mask(Sprite::Coin);
        assert!(!coin.get(0, 0));
        assert!(coin.get(15, 15));
        let thorn = book.mask(Sprite::Thorn);
        // Gap between spikes near the top, solid base
        assert!(!thorn.get(0, 5));
        assert!(thorn.get(11, 5));
        assert!(thorn.get(0, 69));
        let ghost = book.mask(Sprite::Enemy);
        assert!(!ghost.get(0, 0));
        // Full-width bottom so the ledge probe can find ground
        assert!((0..70).all(|x| ghost.get(x, 69)));
        let hero = book.mask(Sprite::Hero);
        assert!(!hero.get(0, 0));
        assert!(hero.get(22, 35));
        assert!(hero.get(0, 35));
    }

    #[test]
    fn shared_masks_are_reference_counted() {
        let book = SpriteBook::built_in();
        let a = book.mask(Sprite::Ground);
        let b = book.mask(Sprite::Ground);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn directory_requires_every_image() {
        let dir = tempfile::tempdir().unwrap();
        let err = SpriteBook::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, AssetError::Missing { ref path } if path.ends_with("ground.png")));
    }

    #[test]
    fn directory_masks_follow_alpha() {
        let dir = tempfile::tempdir().unwrap();
        for sprite in SpriteBook::sprites() {
            let mut img = image::RgbaImage::new(4, 2);
            img.put_pixel(1, 0, image::Rgba([255, 0, 0, 255]));
            img.put_pixel(3, 1, image::Rgba([0, 0, 0, 1]));
            img.save(dir.path().join(file_name(*sprite))).unwrap();
        }
        let book = SpriteBook::from_dir(dir.path()).unwrap();
        let m = book.mask(Sprite::Flag);
        assert_eq!((m.width(), m.height()), (4, 2));
        assert_eq!(m.count(), 2);
        assert!(m.get(1, 0));
        assert!(m.get(3, 1));
    }

    #[test]
    fn garbage_image_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ground.png"), b"not a png").unwrap();
        let err = SpriteBook::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}
