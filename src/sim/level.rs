/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory: `level_1.txt`, `level_2.txt`, ... up to the
///      first missing number
///   2. Built-in embedded levels
///
/// Every level of the chosen source is parsed up front. A malformed file
/// is an error for the whole library, so no partial level is ever run.
///
/// ## Single-level format (`.txt`):
///   `; Name` comment lines (the first one names the level)
///   Lines: map rows, one character per 70px cell
///
/// Short rows are right-padded with empty cells to the widest row.
/// Trailing blank lines are ignored.
///
/// ## Cell legend:
///   '#' = Ground            '+' = Crate          '%' = Stone
///   '-' = Step (one-way)    '^' = Thorn          '*' = Enemy spawn
///   '$' = Coin              '&' = Flag (goal)    '@' = Player spawn
///   '.' or ' ' = Empty

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::economy::LevelId;
use crate::domain::entity::{Entity, EntityId, EntityKind, Facing, Player, Sprite, Tags};
use crate::domain::tile::{Tile, TILE_PX};
use crate::sim::assets::SpriteBook;

#[derive(Debug, Error)]
pub enum LevelFormatError {
    #[error("level {level} has no map rows")]
    Empty { level: LevelId },
    #[error("level {level} has no player spawn '@'")]
    MissingSpawn { level: LevelId },
    #[error("level {level} has a second player spawn at row {row}, column {col}")]
    DuplicateSpawn { level: LevelId, row: usize, col: usize },
    #[error("level {level}: unknown cell code {code:?} at row {row}, column {col}")]
    UnknownCell { level: LevelId, row: usize, col: usize, code: char },
    #[error("level {level} does not exist")]
    UnknownLevel { level: LevelId },
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A parsed, rectangular level grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMap {
    pub name: String,
    pub width: usize,
    pub height: usize,
    cells: Vec<Vec<Tile>>,
    /// (column, row) of the player spawn.
    pub spawn: (usize, usize),
}

impl TileMap {
    /// Cell at (x, y); out of range is empty.
    pub fn tile_at(&self, x: usize, y: usize) -> Tile {
        self.cells.get(y).and_then(|row| row.get(x)).copied().unwrap_or_default()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.cells.iter().map(Vec::as_slice)
    }

    /// Level extent in pixels.
    pub fn pixel_size(&self) -> (i32, i32) {
        (self.width as i32 * TILE_PX, self.height as i32 * TILE_PX)
    }
}

// ══════════════════════════════════════════════════════════════
// Library
// ══════════════════════════════════════════════════════════════

/// All levels available to this run, indexed from 1.
#[derive(Clone, Debug)]
pub struct LevelLibrary {
    maps: Vec<TileMap>,
}

impl LevelLibrary {
    /// Files from `dir` when it holds `level_1.txt`, else the built-ins.
    pub fn open(dir: &Path) -> Result<Self, LevelFormatError> {
        let files = level_files(dir);
        if files.is_empty() {
            debug!(dir = %dir.display(), "no level files, using built-in levels");
            return LevelLibrary::embedded();
        }

        let mut maps = Vec::with_capacity(files.len());
        for (idx, path) in files.iter().enumerate() {
            let text = std::fs::read_to_string(path)
                .map_err(|source| LevelFormatError::Io { path: path.clone(), source })?;
            maps.push(parse_level(idx as LevelId + 1, &text)?);
        }
        info!(dir = %dir.display(), count = maps.len(), "loaded level files");
        Ok(LevelLibrary { maps })
    }

    /// The built-in levels. Level ids follow table order, so a broken
    /// entry fails the whole library instead of shifting later ids.
    pub fn embedded() -> Result<Self, LevelFormatError> {
        let maps = EMBEDDED
            .iter()
            .enumerate()
            .map(|(idx, text)| parse_level(idx as LevelId + 1, text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LevelLibrary { maps })
    }

    #[cfg(test)]
    pub(crate) fn from_maps(maps: Vec<TileMap>) -> Self {
        LevelLibrary { maps }
    }

    pub fn count(&self) -> usize {
        self.maps.len()
    }

    pub fn get(&self, level: LevelId) -> Result<&TileMap, LevelFormatError> {
        level
            .checked_sub(1)
            .and_then(|idx| self.maps.get(idx as usize))
            .ok_or(LevelFormatError::UnknownLevel { level })
    }
}

/// `level_1.txt`, `level_2.txt`, ... in `dir`, stopping at the first gap.
fn level_files(dir: &Path) -> Vec<PathBuf> {
    (1..)
        .map(|n| dir.join(format!("level_{n}.txt")))
        .take_while(|p| p.is_file())
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Parsing
// ══════════════════════════════════════════════════════════════

pub fn parse_level(level: LevelId, content: &str) -> Result<TileMap, LevelFormatError> {
    let mut name = None;
    let mut rows: Vec<&str> = vec![];

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(comment) = line.strip_prefix(';') {
            if name.is_none() {
                name = Some(comment.trim().to_string());
            }
            continue;
        }
        if rows.is_empty() && line.trim().is_empty() {
            continue;
        }
        rows.push(line);
    }
    while rows.last().is_some_and(|r| r.trim().is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(LevelFormatError::Empty { level });
    }

    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    let mut cells = Vec::with_capacity(rows.len());
    let mut spawn = None;

    for (y, row) in rows.iter().enumerate() {
        let mut line = vec![Tile::Empty; width];
        for (x, code) in row.chars().enumerate() {
            let tile = Tile::from_char(code)
                .ok_or(LevelFormatError::UnknownCell { level, row: y, col: x, code })?;
            if tile == Tile::PlayerSpawn {
                if spawn.is_some() {
                    return Err(LevelFormatError::DuplicateSpawn { level, row: y, col: x });
                }
                spawn = Some((x, y));
            }
            line[x] = tile;
        }
        cells.push(line);
    }

    let spawn = spawn.ok_or(LevelFormatError::MissingSpawn { level })?;
    Ok(TileMap {
        name: name.unwrap_or_else(|| format!("Level {level}")),
        width,
        height: cells.len(),
        cells,
        spawn,
    })
}

// ══════════════════════════════════════════════════════════════
// Instantiation
// ══════════════════════════════════════════════════════════════

/// Level contents ready for a session.
pub struct Populated {
    pub player: Player,
    /// Cell entities in row-major scan order, then backdrop panels.
    pub entities: Vec<Entity>,
}

/// Create one entity per non-empty cell, scanning rows top to bottom and
/// each row left to right. Sprites sit bottom-centred in their cell,
/// except steps which hang from the cell top.
pub fn populate(map: &TileMap, sprites: &SpriteBook) -> Populated {
    let mut entities = Vec::new();
    let mut next_id: EntityId = 1;
    let mut player = None;

    for (y, row) in map.rows().enumerate() {
        for (x, &tile) in row.iter().enumerate() {
            let Some((kind, sprite, tags)) = spawn_kind(tile) else {
                continue;
            };
            let mask = sprites.mask(sprite);
            let (w, h) = (mask.width() as i32, mask.height() as i32);
            let cell_x = x as i32 * TILE_PX;
            let cell_y = y as i32 * TILE_PX;
            let px = cell_x + (TILE_PX - w) / 2;
            let py = if tile == Tile::Step { cell_y } else { cell_y + TILE_PX - h };

            if kind == EntityKind::Player {
                let body = Entity::new(0, kind, sprite, px, py, mask, tags);
                player = Some(Player::new(body));
                continue;
            }
            entities.push(Entity::new(next_id, kind, sprite, px, py, mask, tags));
            next_id += 1;
        }
    }

    // Backdrop panels covering the level extent (plus one for parallax lag)
    let panel = sprites.mask(Sprite::Backdrop);
    let (level_w, level_h) = map.pixel_size();
    let (pw, ph) = (panel.width().max(1) as i32, panel.height().max(1) as i32);
    let cols = level_w / pw + 2;
    let rows = (level_h + ph - 1) / ph;
    for row in 0..rows.max(1) {
        for col in 0..cols {
            entities.push(Entity::new(
                next_id,
                EntityKind::Decoration,
                Sprite::Backdrop,
                col * pw,
                row * ph,
                panel.clone(),
                Tags::BACKGROUND,
            ));
            next_id += 1;
        }
    }

    // `parse_level` guarantees exactly one spawn
    let player = player.unwrap_or_else(|| {
        let (sx, sy) = map.spawn;
        let mask = sprites.mask(Sprite::Hero);
        let px = sx as i32 * TILE_PX + (TILE_PX - mask.width() as i32) / 2;
        let py = sy as i32 * TILE_PX + TILE_PX - mask.height() as i32;
        Player::new(Entity::new(0, EntityKind::Player, Sprite::Hero, px, py, mask, Tags::NONE))
    });

    Populated { player, entities }
}

fn spawn_kind(tile: Tile) -> Option<(EntityKind, Sprite, Tags)> {
    let (kind, sprite) = match tile {
        Tile::Empty => return None,
        Tile::Ground => (EntityKind::StaticBlock, Sprite::Ground),
        Tile::Crate => (EntityKind::StaticBlock, Sprite::Crate),
        Tile::Stone => (EntityKind::StaticBlock, Sprite::Stone),
        Tile::Step => (EntityKind::StaticBlock, Sprite::Step),
        Tile::Thorn => (EntityKind::Hazard, Sprite::Thorn),
        Tile::Enemy => (EntityKind::Enemy(Facing::Right), Sprite::Enemy),
        Tile::Coin => (EntityKind::Collectible, Sprite::Coin),
        Tile::Flag => (EntityKind::Goal, Sprite::Flag),
        Tile::PlayerSpawn => (EntityKind::Player, Sprite::Hero),
    };
    Some((kind, sprite, tags_for(tile)))
}

fn tags_for(tile: Tile) -> Tags {
    let mut tags = Tags::NONE;
    if tile.is_solid() {
        tags = tags | Tags::SOLID;
    }
    if tile.is_dangerous() {
        tags = tags | Tags::DANGEROUS;
    }
    match tile {
        Tile::Step => tags | Tags::PLATFORM,
        Tile::Coin => tags | Tags::COLLECTIBLE,
        Tile::Flag => tags | Tags::GOAL,
        _ => tags,
    }
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: [&str; 8] = [
    "\
; First Steps
........................................
........................................
........................................
........................................
..................$$.............$......
..........$$.....####......-----..$...&.
..@......####.........*..........######.
###########..#################^^########
###########^^###########################
",
    "\
; Crate Hill
..........................................
..........................................
..........................................
......................$...................
.............$$......+++.........$$.......
............++++....+++++..*....----....&.
..@...$....++++++..+++++++....%.......###.
########^^####################%..#########
###############################^^#########
",
    "\
; Stepping Stones
..............................................
..............................................
..................$$.................$........
.................----...............---.......
..........$...........$$......$$..........&...
.........---.........----....----........###..
..@..............................*.......###..
######....##....##...........######......#####
######^^^^##^^^^##^^^^^^^^^^^######^^^^^^#####
",
    "\
; Thorn Garden
............................................
............................................
..........................$$................
.........................####...............
...............$.....................$$...&.
..............%%%.....*.......^^....%%%%.###
..@.....^.....%%%.............##.......%.###
####################^^######################
############################################
",
    "\
; Patrol Route
..............................................
..............................................
..............................................
........$$..........$$...........$$...........
.......####........####.........####......&...
..........................................#...
..@.........*..........*...........*......#...
##############################################
##############################################
",
    "\
; Stone Stairs
................................................
................................................
..............................$$...............&
.......................$$....%%%%.............%%
.................$....%%%%...........*......%%%%
..........$$....%%%%.....................%%%%%%%
..@......%%%%..............^^.......%%%%%%%%%%%%
########################%%%%%%%%%%%%%%%%%%%%%%%%
#######^^^^^^^^^^^^^^^^^%%%%%%%%%%%%%%%%%%%%%%%%
",
    "\
; Night Market
..................................................
..................................................
....................$.$.$.........................
...................-------.............$$.........
.........$$.....................*.....----......&.
........----.......+++++....+++++++..........####
..@.......*........+++++....+++++++..^^^.....####
######..########^^#############################..
######^^########################################
",
    "\
; The Last Climb
..................................................&.
.............................................$$..###
..........................................-----.....
.................$$.................$$..............
................----......*......-------............
..........$$..........+++++++..........---.........
.........----.......................................
..@.........................^^^.....................
###################################################.
###################################################^
",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Rect;

    #[test]
    fn parses_name_padding_and_spawn() {
        let map = parse_level(3, "; Warm Up\n@..\n###\n#\n\n").unwrap();
        assert_eq!(map.name, "Warm Up");
        assert_eq!((map.width, map.height), (3, 3));
        assert_eq!(map.spawn, (0, 0));
        assert_eq!(map.tile_at(1, 2), Tile::Empty);
        assert_eq!(map.tile_at(0, 2), Tile::Ground);
        assert_eq!(map.tile_at(99, 99), Tile::Empty);
    }

    #[test]
    fn unnamed_level_gets_default_name() {
        let map = parse_level(4, "@\n#\n").unwrap();
        assert_eq!(map.name, "Level 4");
    }

    #[test]
    fn spaces_are_empty_cells() {
        let map = parse_level(1, "@ $\n###\n").unwrap();
        assert_eq!(map.tile_at(1, 0), Tile::Empty);
        assert_eq!(map.tile_at(2, 0), Tile::Coin);
    }

    #[test]
    fn single_row_places_spawn_thorn_and_flag() {
        let map = parse_level(1, "@..^...&").unwrap();
        assert_eq!((map.width, map.height), (8, 1));
        assert_eq!(map.spawn, (0, 0));
        let row: Vec<Tile> = (0..8).map(|x| map.tile_at(x, 0)).collect();
        assert_eq!(row, vec![
            Tile::PlayerSpawn,
            Tile::Empty,
            Tile::Empty,
            Tile::Thorn,
            Tile::Empty,
            Tile::Empty,
            Tile::Empty,
            Tile::Flag,
        ]);
    }

    #[test]
    fn populate_is_deterministic() {
        let map = parse_level(1, "$-.*\n@^.&\n####\n").unwrap();
        let sprites = SpriteBook::built_in();
        let summary = |pop: &Populated| -> Vec<(EntityId, EntityKind, Sprite, Rect, Tags)> {
            pop.entities.iter().map(|e| (e.id, e.kind, e.sprite, e.rect, e.tags)).collect()
        };
        let (a, b) = (populate(&map, &sprites), populate(&map, &sprites));
        assert_eq!(summary(&a), summary(&b));
        assert_eq!(a.player.body.rect, b.player.body.rect);
    }

    #[test]
    fn missing_spawn_is_an_error() {
        let err = parse_level(2, "...\n###\n").unwrap_err();
        assert!(matches!(err, LevelFormatError::MissingSpawn { level: 2 }));
    }

    #[test]
    fn duplicate_spawn_is_an_error() {
        let err = parse_level(1, "@.@\n###\n").unwrap_err();
        assert!(matches!(err, LevelFormatError::DuplicateSpawn { row: 0, col: 2, .. }));
    }

    #[test]
    fn unknown_code_is_an_error() {
        let err = parse_level(1, "@.X\n###\n").unwrap_err();
        assert!(matches!(err, LevelFormatError::UnknownCell { code: 'X', row: 0, col: 2, .. }));
        assert!(err.to_string().contains("'X'"));
    }

    #[test]
    fn comment_only_is_empty() {
        let err = parse_level(1, "; nothing here\n\n").unwrap_err();
        assert!(matches!(err, LevelFormatError::Empty { .. }));
    }

    #[test]
    fn embedded_levels_all_parse() {
        assert_eq!(LevelLibrary::embedded().unwrap().count(), EMBEDDED.len());
        for (idx, text) in EMBEDDED.iter().enumerate() {
            let map = parse_level(idx as LevelId + 1, text).unwrap();
            let flags = map.rows().flatten().filter(|t| **t == Tile::Flag).count();
            assert!(flags >= 1, "level {} has no flag", idx + 1);
        }
    }

    #[test]
    fn library_lookup_is_one_based() {
        let lib = LevelLibrary::embedded().unwrap();
        assert_eq!(lib.get(1).unwrap().name, "First Steps");
        assert!(matches!(lib.get(0), Err(LevelFormatError::UnknownLevel { level: 0 })));
        assert!(matches!(lib.get(9), Err(LevelFormatError::UnknownLevel { level: 9 })));
    }

    #[test]
    fn directory_source_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("level_1.txt"), "; One\n@&\n##\n").unwrap();
        std::fs::write(dir.path().join("level_2.txt"), "; Two\n@.&\n###\n").unwrap();
        std::fs::write(dir.path().join("level_4.txt"), "; Four\n@\n#\n").unwrap();
        let lib = LevelLibrary::open(dir.path()).unwrap();
        assert_eq!(lib.count(), 2);
        assert_eq!(lib.get(2).unwrap().name, "Two");
    }

    #[test]
    fn malformed_file_fails_the_whole_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("level_1.txt"), "@&\n##\n").unwrap();
        std::fs::write(dir.path().join("level_2.txt"), "..&\n###\n").unwrap();
        let err = LevelLibrary::open(dir.path()).unwrap_err();
        assert!(matches!(err, LevelFormatError::MissingSpawn { level: 2 }));
    }

    #[test]
    fn empty_directory_falls_back_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let lib = LevelLibrary::open(dir.path()).unwrap();
        assert_eq!(lib.count(), EMBEDDED.len());
    }

    #[test]
    fn populate_scans_row_major_with_placement() {
        let map = parse_level(1, "$-.\n@*&\n^##\n").unwrap();
        let pop = populate(&map, &SpriteBook::built_in());
        let kinds: Vec<EntityKind> = pop
            .entities
            .iter()
            .filter(|e| e.kind != EntityKind::Decoration)
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![
            EntityKind::Collectible,
            EntityKind::StaticBlock,
            EntityKind::Enemy(Facing::Right),
            EntityKind::Goal,
            EntityKind::Hazard,
            EntityKind::StaticBlock,
            EntityKind::StaticBlock,
        ]);
        // Coin 30x30 bottom-centred in cell (0,0)
        assert_eq!(pop.entities[0].rect.x, 20);
        assert_eq!(pop.entities[0].rect.y, 40);
        // Step hangs from the top of cell (1,0)
        assert_eq!(pop.entities[1].rect.y, 0);
        assert_eq!(pop.entities[1].rect.h, 20);
        // Hero 44x70 centred in cell (0,1)
        assert_eq!(pop.player.body.rect.x, 13);
        assert_eq!(pop.player.body.rect.y, 70);
        assert_eq!(pop.player.body.id, 0);
        // Thorns are solid and dangerous
        assert!(pop.entities[4].tags.contains(Tags::SOLID | Tags::DANGEROUS));
    }

    #[test]
    fn populate_assigns_unique_ids_and_backdrop_last() {
        let map = parse_level(1, "@..\n###\n").unwrap();
        let pop = populate(&map, &SpriteBook::built_in());
        let mut ids: Vec<_> = pop.entities.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), pop.entities.len());
        assert!(!ids.contains(&0));
        let first_backdrop = pop.entities.iter().position(|e| e.kind == EntityKind::Decoration).unwrap();
        assert!(pop.entities[first_backdrop..].iter().all(|e| e.tags.contains(Tags::BACKGROUND)));
    }
}
