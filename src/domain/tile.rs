/// Level cell codes and their properties.
/// Properties are queried via methods, not stored as flags,
/// so cell semantics are centralized here.

/// Edge length of one level cell in pixels.
pub const TILE_PX: i32 = 70;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tile {
    #[default]
    Empty,
    Ground,      // Solid block
    Crate,       // Solid block
    Stone,       // Solid block
    Step,        // One-way plank, solid from above only
    Thorn,       // Solid and dangerous
    Enemy,       // Patrolling enemy spawn
    Coin,        // Collectible
    Flag,        // Level goal
    PlayerSpawn, // Exactly one per level
}

impl Tile {
    /// Decode a level-file character. `None` for anything not in the legend.
    pub fn from_char(c: char) -> Option<Tile> {
        let tile = match c {
            '.' | ' ' => Tile::Empty,
            '#' => Tile::Ground,
            '+' => Tile::Crate,
            '%' => Tile::Stone,
            '-' => Tile::Step,
            '^' => Tile::Thorn,
            '*' => Tile::Enemy,
            '$' => Tile::Coin,
            '&' => Tile::Flag,
            '@' => Tile::PlayerSpawn,
            _ => return None,
        };
        Some(tile)
    }

    /// Blocks movement from every side.
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Ground | Tile::Crate | Tile::Stone | Tile::Thorn)
    }

    pub fn is_dangerous(self) -> bool {
        matches!(self, Tile::Thorn | Tile::Enemy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legend_decodes_every_code() {
        let decoded: Vec<Tile> = "#+%-^*$&@.".chars().filter_map(Tile::from_char).collect();
        assert_eq!(decoded.len(), 10);
        assert_eq!(decoded[4], Tile::Thorn);
        assert_eq!(Tile::from_char(' '), Some(Tile::Empty));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(Tile::from_char('X'), None);
        assert_eq!(Tile::from_char('H'), None);
    }

    #[test]
    fn thorns_are_solid_and_dangerous() {
        assert!(Tile::Thorn.is_solid());
        assert!(Tile::Thorn.is_dangerous());
        assert!(!Tile::Step.is_solid());
        assert!(Tile::Enemy.is_dangerous());
        assert!(!Tile::Coin.is_solid());
    }
}
