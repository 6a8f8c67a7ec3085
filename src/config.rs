/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Problems are collected in `warnings` and logged once tracing is up,
/// since the log file location itself comes from this config.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub physics: PhysicsConfig,
    pub rules: RulesConfig,
    pub display: DisplayConfig,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
    /// Directory of PNG sprites; built-in masks are used when unset.
    pub assets_dir: Option<PathBuf>,
    pub profile_path: PathBuf,
    pub log_file: PathBuf,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Frame rate while a level is being played.
    pub play_fps: u32,
    /// Frame rate on menus and other modal screens.
    pub menu_fps: u32,
}

/// Movement constants, all in pixels or pixel steps per frame.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub walk_steps: u32,
    pub airborne_walk_factor: f32,
    pub jump_impulse: i32,
    pub impulse_decay: i32,
    pub ascent_units: u32,
    pub fall_units: u32,
    pub enemy_step: i32,
    pub enemy_probe_depth: i32,
    pub enemy_probe_count: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub lives: u32,
    pub invulnerability_frames: u32,
}

/// Nominal viewport in pixels, used until the terminal size is known.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub jump: Vec<String>,
    pub pause: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        SpeedConfig { play_fps: 50, menu_fps: 5 }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            walk_steps: 5,
            airborne_walk_factor: 1.5,
            jump_impulse: 120,
            impulse_decay: 8,
            ascent_units: 10,
            fall_units: 10,
            enemy_step: 4,
            enemy_probe_depth: 10,
            enemy_probe_count: 4,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig { lives: 3, invulnerability_frames: 50 }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig { width: 1000, height: 700 }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[PathBuf::from(".")], Vec::new())
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: SpeedConfig,
    #[serde(default)]
    physics: PhysicsConfig,
    #[serde(default)]
    rules: RulesConfig,
    #[serde(default)]
    display: DisplayConfig,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_jump")]
    jump: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    assets_dir: Option<String>,
    #[serde(default = "default_profile_path")]
    profile_path: String,
    #[serde(default = "default_log_file")]
    log_file: String,
}

// ── Defaults ──

fn default_jump() -> Vec<String> { vec!["A".into(), "B".into()] }
fn default_pause() -> Vec<String> { vec!["Start".into()] }
fn default_confirm() -> Vec<String> { vec!["A".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_levels_dir() -> String { "levels".into() }
fn default_profile_path() -> String { "profile.json".into() }
fn default_log_file() -> String { "tilehop.log".into() }

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            jump: default_jump(),
            pause: default_pause(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            assets_dir: None,
            profile_path: default_profile_path(),
            log_file: default_log_file(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut warnings = Vec::new();
        let toml_cfg = load_toml(&search_dirs, &mut warnings);
        GameConfig::from_toml(toml_cfg, &search_dirs, warnings)
    }

    /// Parse a config document directly (no directory search).
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(cfg, &[PathBuf::from(".")], Vec::new()))
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf], mut warnings: Vec<String>) -> Self {
        let general = toml_cfg.general;
        let mut speed = toml_cfg.speed;
        if speed.play_fps == 0 || speed.menu_fps == 0 {
            warnings.push("frame rates must be positive; using defaults".into());
            speed = SpeedConfig::default();
        }

        // Zero or negative values here freeze movement, never end a jump,
        // or start every session already lost.
        let mut physics = toml_cfg.physics;
        let phys_default = PhysicsConfig::default();
        require_positive(&mut physics.walk_steps, phys_default.walk_steps, "physics.walk_steps", &mut warnings);
        require_positive(
            &mut physics.airborne_walk_factor,
            phys_default.airborne_walk_factor,
            "physics.airborne_walk_factor",
            &mut warnings,
        );
        require_positive(&mut physics.jump_impulse, phys_default.jump_impulse, "physics.jump_impulse", &mut warnings);
        require_positive(&mut physics.impulse_decay, phys_default.impulse_decay, "physics.impulse_decay", &mut warnings);
        require_positive(&mut physics.ascent_units, phys_default.ascent_units, "physics.ascent_units", &mut warnings);
        require_positive(&mut physics.fall_units, phys_default.fall_units, "physics.fall_units", &mut warnings);
        let mut rules = toml_cfg.rules;
        require_positive(&mut rules.lives, RulesConfig::default().lives, "rules.lives", &mut warnings);

        GameConfig {
            speed,
            physics,
            rules,
            display: toml_cfg.display,
            gamepad: GamepadConfig {
                jump: toml_cfg.gamepad.jump,
                pause: toml_cfg.gamepad.pause,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
            },
            levels_dir: resolve_dir(&general.levels_dir, search_dirs),
            assets_dir: general.assets_dir.map(|d| resolve_dir(&d, search_dirs)),
            profile_path: PathBuf::from(general.profile_path),
            log_file: PathBuf::from(general.log_file),
            warnings,
        }
    }
}

/// Replace a value that must be above zero with its default, noting why.
fn require_positive<T>(value: &mut T, default: T, key: &str, warnings: &mut Vec<String>)
where
    T: PartialOrd + Default + Copy + std::fmt::Display,
{
    if (*value).partial_cmp(&T::default()) != Some(std::cmp::Ordering::Greater) {
        warnings.push(format!("{key} must be positive (got {value}); using {default}"));
        *value = default;
    }
}

/// Absolute paths as-is; relative ones are looked up in the candidate dirs,
/// falling back to CWD-relative.
fn resolve_dir(name: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    search_dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/tilehop)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/tilehop");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf], warnings: &mut Vec<String>) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warnings.push(format!("config.toml parse error: {e}; using default settings"));
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warnings.push(format!("could not read {}: {e}", path.display()));
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = GameConfig::parse("").unwrap();
        assert_eq!(cfg.speed.play_fps, 50);
        assert_eq!(cfg.speed.menu_fps, 5);
        assert_eq!(cfg.physics.jump_impulse, 120);
        assert_eq!(cfg.rules.lives, 3);
        assert_eq!(cfg.rules.invulnerability_frames, 50);
        assert_eq!(cfg.profile_path, PathBuf::from("profile.json"));
        assert!(cfg.assets_dir.is_none());
        assert!(cfg.warnings.is_empty());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = GameConfig::parse(
            "[physics]\nwalk_steps = 7\n\n[general]\nassets_dir = \"/opt/sprites\"\n",
        ).unwrap();
        assert_eq!(cfg.physics.walk_steps, 7);
        assert_eq!(cfg.physics.fall_units, 10);
        assert_eq!(cfg.assets_dir, Some(PathBuf::from("/opt/sprites")));
        assert_eq!(cfg.gamepad.pause, vec!["Start".to_string()]);
    }

    #[test]
    fn zero_fps_is_rejected() {
        let cfg = GameConfig::parse("[speed]\nplay_fps = 0\n").unwrap();
        assert_eq!(cfg.speed.play_fps, 50);
        assert_eq!(cfg.warnings.len(), 1);
    }

    #[test]
    fn non_positive_movement_and_lives_fall_back() {
        let cfg = GameConfig::parse(
            "[physics]\nwalk_steps = 0\nimpulse_decay = -2\nfall_units = 0\nenemy_step = 6\n[rules]\nlives = 0\n",
        )
        .unwrap();
        assert_eq!(cfg.physics.walk_steps, 5);
        assert_eq!(cfg.physics.impulse_decay, 8);
        assert_eq!(cfg.physics.fall_units, 10);
        assert_eq!(cfg.physics.enemy_step, 6);
        assert_eq!(cfg.rules.lives, 3);
        assert_eq!(cfg.warnings.len(), 4);
        assert!(cfg.warnings.iter().any(|w| w.contains("rules.lives")));
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(GameConfig::parse("[physics\nwalk_steps = ").is_err());
    }
}
