/// Profile persistence: the player's `Progress` as a JSON document.
///
/// ## File format
///
/// ```text
/// {
///   "levels":      { "1": 0, "2": -1, "6": 100, "3": "ok", ... },
///   "coins":       42,
///   "hero_colors": { "classic_hero": "ok", "red_hero": 0, "blue_hero": 50 },
///   "sound": 1,
///   "music": 0
/// }
/// ```
///
///   levels      : -1 locked-free, 0 unlocked, "ok" completed, n > 0 cost
///   hero_colors : "ok" active, 0 owned, n > 0 cost
///
/// ## Load outcomes
///
///   file missing         → `ProfileError::Absent`  (first run, use defaults)
///   unreadable           → `ProfileError::Io`
///   bad JSON / bad value → `ProfileError::Corrupt` (surfaced to the player)
///
/// Writes go to `<file>.tmp` first and are renamed over the profile, so an
/// interrupted save never leaves a half-written document behind.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::economy::{CosmeticStatus, LevelId, LevelStatus, Progress};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no profile at {}", path.display())]
    Absent { path: PathBuf },
    #[error("profile {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("cannot access profile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot encode profile: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where `Progress` lives between runs.
pub trait ProfileStore {
    fn load(&self) -> Result<Progress, ProfileError>;
    fn save(&mut self, progress: &Progress) -> Result<(), ProfileError>;
}

// ══════════════════════════════════════════════════════════════
// Paths
// ══════════════════════════════════════════════════════════════

/// Resolve the configured profile path. Relative paths land in the data dir.
pub fn profile_path(configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        data_dir().join(configured)
    }
}

fn data_dir() -> PathBuf {
    // 1. Exe directory, when writable (portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let probe = parent.join(".write_test_tilehop");
            if fs::write(&probe, "").is_ok() {
                let _ = fs::remove_file(&probe);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/tilehop");
        if fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

// ══════════════════════════════════════════════════════════════
// JSON file store
// ══════════════════════════════════════════════════════════════

pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonProfileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl Into<String>) -> ProfileError {
        ProfileError::Corrupt { path: self.path.clone(), reason: reason.into() }
    }

    fn io(&self, source: io::Error) -> ProfileError {
        ProfileError::Io { path: self.path.clone(), source }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<Progress, ProfileError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ProfileError::Absent { path: self.path.clone() });
            }
            Err(e) => return Err(self.io(e)),
        };
        let record: ProfileRecord = serde_json::from_str(&text).map_err(|e| self.corrupt(e.to_string()))?;
        record.into_progress().map_err(|reason| self.corrupt(reason))
    }

    fn save(&mut self, progress: &Progress) -> Result<(), ProfileError> {
        let text = serde_json::to_string_pretty(&ProfileRecord::from_progress(progress))?;
        write_atomic(&self.path, text.as_bytes()).map_err(|e| self.io(e))?;
        debug!(path = %self.path.display(), "profile saved");
        Ok(())
    }
}

/// Load the profile, falling back to defaults.
/// Returns a notice for the player when the fallback hid a real problem.
pub fn load_or_default(store: &dyn ProfileStore) -> (Progress, Option<String>) {
    match store.load() {
        Ok(progress) => (progress, None),
        Err(ProfileError::Absent { path }) => {
            info!(path = %path.display(), "no profile yet, starting fresh");
            (Progress::default(), None)
        }
        Err(e) => {
            warn!(error = %e, "profile unusable, starting fresh");
            (Progress::default(), Some(format!("Profile reset: {e}")))
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path_for(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("profile");
    path.with_file_name(format!("{name}.tmp"))
}

// ══════════════════════════════════════════════════════════════
// Record (on-disk shape)
// ══════════════════════════════════════════════════════════════

const COMPLETED_TAG: &str = "ok";

#[derive(Serialize, Deserialize, Debug)]
struct ProfileRecord {
    levels: BTreeMap<String, StatusCode>,
    coins: i64,
    hero_colors: BTreeMap<String, StatusCode>,
    sound: u8,
    music: u8,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
enum StatusCode {
    Number(i64),
    Tag(String),
}

impl ProfileRecord {
    fn from_progress(p: &Progress) -> Self {
        let levels = p
            .levels
            .iter()
            .map(|(id, status)| {
                let code = match *status {
                    LevelStatus::LockedPaid(cost) => StatusCode::Number(cost as i64),
                    LevelStatus::LockedFree => StatusCode::Number(-1),
                    LevelStatus::Unlocked => StatusCode::Number(0),
                    LevelStatus::Completed => StatusCode::Tag(COMPLETED_TAG.to_string()),
                };
                (id.to_string(), code)
            })
            .collect();
        let hero_colors = p
            .cosmetics
            .iter()
            .map(|(name, status)| {
                let code = match *status {
                    CosmeticStatus::ForSale(cost) => StatusCode::Number(cost as i64),
                    CosmeticStatus::Owned => StatusCode::Number(0),
                    CosmeticStatus::Active => StatusCode::Tag(COMPLETED_TAG.to_string()),
                };
                (name.clone(), code)
            })
            .collect();
        ProfileRecord {
            levels,
            coins: p.currency as i64,
            hero_colors,
            sound: p.sound as u8,
            music: p.music as u8,
        }
    }

    fn into_progress(self) -> Result<Progress, String> {
        let mut levels = BTreeMap::new();
        for (key, code) in self.levels {
            let id: LevelId = key.parse().map_err(|_| format!("level id {key:?} is not a number"))?;
            let status = match code {
                StatusCode::Number(-1) => LevelStatus::LockedFree,
                StatusCode::Number(0) => LevelStatus::Unlocked,
                StatusCode::Number(n) if n > 0 => LevelStatus::LockedPaid(cost(n)?),
                StatusCode::Tag(ref t) if t == COMPLETED_TAG => LevelStatus::Completed,
                other => return Err(format!("level {id} has invalid status {other:?}")),
            };
            levels.insert(id, status);
        }
        if levels.is_empty() {
            return Err("no levels".into());
        }

        let mut cosmetics = BTreeMap::new();
        for (name, code) in self.hero_colors {
            let status = match code {
                StatusCode::Number(0) => CosmeticStatus::Owned,
                StatusCode::Number(n) if n > 0 => CosmeticStatus::ForSale(cost(n)?),
                StatusCode::Tag(ref t) if t == COMPLETED_TAG => CosmeticStatus::Active,
                other => return Err(format!("cosmetic {name} has invalid status {other:?}")),
            };
            cosmetics.insert(name, status);
        }
        let active = cosmetics.values().filter(|s| **s == CosmeticStatus::Active).count();
        if active > 1 {
            return Err(format!("{active} cosmetics marked active"));
        }

        let currency = u32::try_from(self.coins).map_err(|_| format!("coin balance {} out of range", self.coins))?;

        Ok(Progress {
            levels,
            currency,
            cosmetics,
            sound: flag(self.sound, "sound")?,
            music: flag(self.music, "music")?,
        })
    }
}

fn cost(n: i64) -> Result<u32, String> {
    u32::try_from(n).map_err(|_| format!("cost {n} out of range"))
}

fn flag(v: u8, name: &str) -> Result<bool, String> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(format!("{name} must be 0 or 1, got {v}")),
    }
}

// ══════════════════════════════════════════════════════════════
// In-memory store (tests)
// ══════════════════════════════════════════════════════════════

/// Counts saves and can be told to fail.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub stored: Option<Progress>,
    pub saves: usize,
    pub fail: bool,
}

#[cfg(test)]
impl ProfileStore for MemoryStore {
    fn load(&self) -> Result<Progress, ProfileError> {
        self.stored
            .clone()
            .ok_or_else(|| ProfileError::Absent { path: PathBuf::from("<memory>") })
    }

    fn save(&mut self, progress: &Progress) -> Result<(), ProfileError> {
        if self.fail {
            return Err(ProfileError::Io {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.saves += 1;
        self.stored = Some(progress.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::economy::{RunResult, StoreItem};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store_in(dir: &tempfile::TempDir) -> JsonProfileStore {
        JsonProfileStore::new(dir.path().join("profile.json"))
    }

    #[test]
    fn missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(ProfileError::Absent { .. })));
        let (progress, notice) = load_or_default(&store);
        assert_eq!(progress, Progress::default());
        assert!(notice.is_none());
    }

    #[test]
    fn round_trip_reproduces_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let mut rng = StdRng::seed_from_u64(11);

        let mut progress = Progress::default();
        progress.complete_level(1, RunResult { lives_left: 3, max_lives: 3, collected: 9 }, &mut rng);
        progress.currency += 100;
        assert_eq!(
            progress.purchase(&StoreItem::Cosmetic("red_hero".into())),
            crate::domain::economy::PurchaseOutcome::Purchased { cost: 50 }
        );
        assert!(progress.activate("red_hero"));
        progress.toggle_music();

        store.save(&progress).unwrap();
        assert_eq!(store.load().unwrap(), progress);
        assert!(!dir.path().join("profile.json.tmp").exists());
    }

    #[test]
    fn default_profile_on_disk_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.save(&Progress::default()).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["levels"]["1"], 0);
        assert_eq!(json["levels"]["2"], -1);
        assert_eq!(json["levels"]["8"], 200);
        assert_eq!(json["coins"], 0);
        assert_eq!(json["hero_colors"]["classic_hero"], "ok");
        assert_eq!(json["hero_colors"]["transparent_hero"], 300);
        assert_eq!(json["sound"], 1);
        assert_eq!(json["music"], 0);
    }

    #[test]
    fn reads_hand_written_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"levels": {"1": "ok", "2": 0, "3": -1, "6": 100},
                "coins": 30,
                "hero_colors": {"classic_hero": 0, "red_hero": "ok"},
                "sound": 0, "music": 1}"#,
        )
        .unwrap();
        let p = store.load().unwrap();
        assert_eq!(p.status(1), Some(LevelStatus::Completed));
        assert_eq!(p.status(2), Some(LevelStatus::Unlocked));
        assert_eq!(p.status(3), Some(LevelStatus::LockedFree));
        assert_eq!(p.status(6), Some(LevelStatus::LockedPaid(100)));
        assert_eq!(p.currency, 30);
        assert_eq!(p.active_cosmetic(), Some("red_hero"));
        assert!(!p.sound);
        assert!(p.music);
    }

    #[test]
    fn garbage_is_corrupt_and_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(ProfileError::Corrupt { .. })));
        let (progress, notice) = load_or_default(&store);
        assert_eq!(progress, Progress::default());
        assert!(notice.is_some());
    }

    #[test]
    fn invalid_values_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let cases = [
            // two active cosmetics
            r#"{"levels":{"1":0},"coins":0,"hero_colors":{"a":"ok","b":"ok"},"sound":1,"music":0}"#,
            // negative balance
            r#"{"levels":{"1":0},"coins":-5,"hero_colors":{},"sound":1,"music":0}"#,
            // unknown level status
            r#"{"levels":{"1":-7},"coins":0,"hero_colors":{},"sound":1,"music":0}"#,
            // non-numeric level id
            r#"{"levels":{"one":0},"coins":0,"hero_colors":{},"sound":1,"music":0}"#,
            // flag out of range
            r#"{"levels":{"1":0},"coins":0,"hero_colors":{},"sound":2,"music":0}"#,
        ];
        for text in cases {
            std::fs::write(store.path(), text).unwrap();
            assert!(matches!(store.load(), Err(ProfileError::Corrupt { .. })), "accepted {text}");
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // Parent path is a regular file, so the directory cannot be created
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut store = JsonProfileStore::new(blocker.join("profile.json"));
        assert!(matches!(store.save(&Progress::default()), Err(ProfileError::Io { .. })));
    }

    #[test]
    fn absolute_profile_path_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("p.json");
        assert_eq!(profile_path(&abs), abs);
        assert!(profile_path(Path::new("profile.json")).ends_with("profile.json"));
    }
}
