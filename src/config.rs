//! Persisted tool configuration.
//!
//! Stored as JSON under the platform config directory
//! (`.../stockswap/config.json`). Every field has a default so a fresh
//! install works with only the RailWorks path filled in; command-line flags
//! override whatever the file says.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Per-family enable switches, in chain order. Rarely-owned payware
/// families default to off, everything else to on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Families {
    pub mk1: bool,
    pub mk2ac: bool,
    pub mk2df: bool,
    pub fsa: bool,
    pub haa: bool,
    pub hto: bool,
    pub htv: bool,
    pub vda: bool,
    pub ihh: bool,
    pub black5: bool,
    pub maunsell: bool,
    pub c31: bool,
    pub c37: bool,
    pub c40: bool,
    pub c47: bool,
    pub c50: bool,
    pub c56: bool,
    pub c66: bool,
    pub c67: bool,
    pub c68: bool,
    pub c86: bool,
    pub hst: bool,
    pub c91: bool,
    pub c101: bool,
    pub c156: bool,
    pub c158: bool,
    pub c465: bool,
    pub user: bool,
}

impl Default for Families {
    fn default() -> Self {
        Families {
            mk1: true,
            mk2ac: true,
            mk2df: true,
            fsa: true,
            haa: true,
            hto: true,
            htv: true,
            vda: true,
            ihh: false,
            black5: false,
            maunsell: false,
            c31: true,
            c37: true,
            c40: true,
            c47: true,
            c50: true,
            c56: true,
            c66: true,
            c67: true,
            c68: true,
            c86: true,
            hst: true,
            c91: false,
            c101: false,
            c156: false,
            c158: false,
            c465: true,
            user: false,
        }
    }
}

/// What to do with a Class 56 whose sector logo or depot plaque has no
/// equivalent in the replacement pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum C56Policy {
    /// Swap anyway, blanking the missing sector or plaque.
    #[default]
    NearestNumbered,
    /// Leave the original loco in place unless both markings match.
    RetainUnlessMatching,
}

/// How to treat a headcode-box Class 86.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum C86Headcode {
    /// Swap for the headcode-blinds variant, carrying the code across.
    #[default]
    Blinds,
    /// Swap for the plated-box variant, dropping the code.
    PlatedBox,
    /// Leave headcode-box locos alone.
    Skip,
}

/// Report verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    #[default]
    None,
    /// Processed vehicles only.
    Processed,
    /// Processed vehicles plus the original fields side by side.
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Root of the RailWorks installation (the folder holding `Assets/` and
    /// `serz.exe`).
    pub railworks_path: PathBuf,
    /// Directory holding the replacement tables. Relative paths resolve
    /// against the current directory.
    pub tables_dir: PathBuf,
    pub families: Families,
    pub c56_policy: C56Policy,
    pub c86_headcode: C86Headcode,
    pub report: ReportMode,
}

impl Config {
    /// Default on-disk location.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("no config directory on this platform")?;
        Ok(base.join("stockswap").join("config.json"))
    }

    /// Load from `path`, or defaults when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.is_file() {
            let mut config = Config::default();
            config.tables_dir = PathBuf::from("tables");
            return Ok(config);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&text)
            .with_context(|| format!("cannot parse config {}", path.display()))?;
        if config.tables_dir.as_os_str().is_empty() {
            config.tables_dir = PathBuf::from("tables");
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create config directory {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("cannot serialize config")?;
        fs::write(path, text).with_context(|| format!("cannot write config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_rare_families() {
        let families = Families::default();
        assert!(families.mk1);
        assert!(families.c47);
        assert!(!families.ihh);
        assert!(!families.black5);
        assert!(!families.c91);
        assert!(!families.c158);
        assert!(!families.user);
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.railworks_path = PathBuf::from("/opt/railworks");
        config.families.c158 = true;
        config.c86_headcode = C86Headcode::Skip;
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.railworks_path, PathBuf::from("/opt/railworks"));
        assert!(loaded.families.c158);
        assert_eq!(loaded.c86_headcode, C86Headcode::Skip);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config.tables_dir, PathBuf::from("tables"));
        assert_eq!(config.report, ReportMode::None);
    }
}
