//! # Application Configuration
//!
//! Configuration is read once at startup from a YAML file (default
//! `charly.yaml` in the working directory) and then patched from the
//! environment. Every field has a default, so an empty or missing file yields
//! a working local setup.
//!
//! ```yaml
//! storage:
//!   database_path: "charly.db"
//! remote:
//!   url: "https://example.supabase.co"
//!   anon_key: "..."
//! schedule:
//!   anchors: ["08:00", "12:00", "16:00", "20:00"]
//!   window_minutes: 120
//!   late_after_minutes: 90
//!   assignment: strict
//!   assignment_tolerance_minutes: 60
//! export:
//!   basename: "charly-export"
//! server:
//!   bind: "127.0.0.1:3000"
//! timezone_offset: "+02:00"
//! ```
//!
//! The storage mode is derived, never configured directly: remote mode is
//! active iff both `remote.url` and `remote.anon_key` are non-empty.

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use shared::{StorageMode, TimeOfDay};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::domain::clock::LocalZone;
use crate::backend::domain::slot_schedule::AssignmentPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "charly.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub schedule: ScheduleConfig,
    pub export: ExportConfig,
    pub server: ServerConfig,
    /// Fixed UTC offset such as `+02:00`; the system zone is used when absent
    pub timezone_offset: Option<String>,
}

/// Local key-value store location and the keys of each collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub feeding_key: String,
    pub toilet_key: String,
    pub diary_key: String,
    /// Older feeding keys share this prefix and get folded into `feeding_key`
    pub legacy_feeding_prefix: String,
    pub migration_marker_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("charly.db"),
            feeding_key: "dog-feedings-v1".to_string(),
            toilet_key: "dog-toilet-v1".to_string(),
            diary_key: "family-diary-v1".to_string(),
            legacy_feeding_prefix: "dog-feedings-v".to_string(),
            migration_marker_key: "dog-feedings-migrated-v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub anchors: Vec<TimeOfDay>,
    pub window_minutes: u32,
    pub late_after_minutes: u32,
    pub assignment: AssignmentPolicy,
    pub assignment_tolerance_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            anchors: [(8, 0), (12, 0), (16, 0), (20, 0)]
                .into_iter()
                .filter_map(|(h, m)| TimeOfDay::new(h, m))
                .collect(),
            window_minutes: 120,
            late_after_minutes: 90,
            assignment: AssignmentPolicy::Strict,
            assignment_tolerance_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub basename: String,
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            basename: "charly-export".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory with the web client's static assets, served as fallback
    pub static_dir: Option<PathBuf>,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            static_dir: None,
            cors_origin: "http://localhost:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from `charly.yaml` if present, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Patch values from the environment (`SUPABASE_URL`, `SUPABASE_ANON_KEY`,
    /// `CHARLY_DB_PATH`, `CHARLY_BIND`)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.remote.url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.remote.anon_key = Some(key);
        }
        if let Some(path) = lookup("CHARLY_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("CHARLY_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let anchors = &self.schedule.anchors;
        if anchors.is_empty() {
            bail!("schedule.anchors must contain at least one time of day");
        }
        for (index, anchor) in anchors.iter().enumerate() {
            if anchors[..index].contains(anchor) {
                bail!("schedule.anchors contains {} twice", anchor);
            }
        }
        if self.schedule.window_minutes == 0 {
            bail!("schedule.window_minutes must be positive");
        }
        if self.export.basename.trim().is_empty() {
            bail!("export.basename must not be empty");
        }
        self.zone()?;
        Ok(())
    }

    pub fn storage_mode(&self) -> StorageMode {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        if present(&self.remote.url) && present(&self.remote.anon_key) {
            StorageMode::Remote
        } else {
            StorageMode::Local
        }
    }

    pub fn zone(&self) -> Result<LocalZone> {
        match self.timezone_offset.as_deref() {
            Some(offset) => LocalZone::from_offset_str(offset),
            None => Ok(LocalZone::System),
        }
    }
}
