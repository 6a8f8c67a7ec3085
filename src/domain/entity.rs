/// Entities: everything placed in a level, plus the player's movement state.
/// Variants form a closed set; behaviour is dispatched on `EntityKind`.

use std::ops::BitOr;
use std::rc::Rc;

use super::geometry::{Mask, Rect};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// +1 for right, -1 for left.
    pub fn sign(self) -> i32 {
        match self {
            Facing::Left => -1,
            Facing::Right => 1,
        }
    }

    pub fn reversed(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Category tags used by collision queries. An entity may carry several.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Tags(u8);

impl Tags {
    pub const NONE: Tags = Tags(0);
    pub const SOLID: Tags = Tags(1);
    /// Blocks only while falling onto it from above.
    pub const PLATFORM: Tags = Tags(1 << 1);
    pub const DANGEROUS: Tags = Tags(1 << 2);
    pub const COLLECTIBLE: Tags = Tags(1 << 3);
    pub const GOAL: Tags = Tags(1 << 4);
    /// Far layer, scrolled at a reduced rate and never collided with.
    pub const BACKGROUND: Tags = Tags(1 << 5);

    /// True when every bit of `other` is set.
    pub fn contains(self, other: Tags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one bit of `other` is set.
    pub fn intersects(self, other: Tags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Tags {
    type Output = Tags;
    fn bitor(self, rhs: Tags) -> Tags {
        Tags(self.0 | rhs.0)
    }
}

/// Which image an entity is drawn with (and whose mask it collides with).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Sprite {
    Ground,
    Crate,
    Stone,
    Step,
    Thorn,
    Enemy,
    Coin,
    Flag,
    Hero,
    Backdrop,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntityKind {
    StaticBlock,
    Hazard,
    /// Patrolling enemy with its current heading.
    Enemy(Facing),
    Collectible,
    Goal,
    Decoration,
    Player,
}

impl EntityKind {
    /// Draw order: lower layers first.
    pub fn layer(self) -> u8 {
        match self {
            EntityKind::Decoration => 0,
            EntityKind::StaticBlock | EntityKind::Hazard | EntityKind::Goal => 1,
            EntityKind::Collectible => 2,
            EntityKind::Enemy(_) => 3,
            EntityKind::Player => 4,
        }
    }
}

pub type EntityId = u32;

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub sprite: Sprite,
    pub rect: Rect,
    pub mask: Rc<Mask>,
    pub tags: Tags,
}

impl Entity {
    /// Entity whose rect takes its size from the mask.
    pub fn new(id: EntityId, kind: EntityKind, sprite: Sprite, x: i32, y: i32, mask: Rc<Mask>, tags: Tags) -> Self {
        let rect = Rect::new(x, y, mask.width() as i32, mask.height() as i32);
        Entity { id, kind, sprite, rect, mask, tags }
    }
}

/// Anything the collision engine can test: a placed rect plus its mask.
pub trait Collidable {
    fn id(&self) -> EntityId;
    fn bounds(&self) -> Rect;
    fn mask(&self) -> &Mask;
}

impl Collidable for Entity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn mask(&self) -> &Mask {
        &self.mask
    }
}

/// Anything the renderer can draw.
pub trait Drawable {
    fn sprite(&self) -> Sprite;
    fn bounds(&self) -> Rect;
    fn tags(&self) -> Tags;
    fn layer(&self) -> u8;
}

impl Drawable for Entity {
    fn sprite(&self) -> Sprite {
        self.sprite
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn tags(&self) -> Tags {
        self.tags
    }

    fn layer(&self) -> u8 {
        self.kind.layer()
    }
}

/// Frame input: horizontal intent is continuous (held key), jump is
/// continuous too and re-arms whenever the player is back on the ground.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub horizontal: Option<Facing>,
    pub jump: bool,
}

/// Pending horizontal command: direction and remaining pixel steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HorizontalMove {
    pub direction: i32,
    pub steps: u32,
}

/// Pending vertical command: direction (-1 up) and impulse budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerticalMove {
    pub direction: i32,
    pub impulse: i32,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub body: Entity,
    pub horizontal: HorizontalMove,
    pub vertical: VerticalMove,
    pub airborne: bool,
    /// Set only by a landing. A head bump clears `airborne` without
    /// putting the player back on the ground.
    pub grounded: bool,
    /// Frames of invulnerability left; hazards are ignored while > 0.
    pub invulnerable: u32,
    /// At most one life is lost per frame.
    pub hit_this_frame: bool,
    pub facing: Facing,
    /// Animation counter, advanced once per frame with horizontal motion.
    pub walk_frame: u32,
}

impl Player {
    pub fn new(body: Entity) -> Self {
        Player {
            body,
            horizontal: HorizontalMove::default(),
            vertical: VerticalMove::default(),
            airborne: false,
            grounded: false,
            invulnerable: 0,
            hit_this_frame: false,
            facing: Facing::Right,
            walk_frame: 0,
        }
    }

    /// Queue a horizontal walk of `steps` pixels.
    pub fn command_walk(&mut self, facing: Facing, steps: u32) {
        self.horizontal = HorizontalMove { direction: facing.sign(), steps };
    }

    /// Start a jump. Ignored while airborne. Returns true if a jump began.
    pub fn command_jump(&mut self, impulse: i32) -> bool {
        if self.airborne || !self.grounded {
            return false;
        }
        self.vertical = VerticalMove { direction: -1, impulse };
        self.grounded = false;
        true
    }

    /// Invulnerability blink: hidden on alternating 4-frame spans.
    pub fn is_blink_hidden(&self) -> bool {
        self.invulnerable > 0 && (self.invulnerable / 4) % 2 == 1
    }
}
