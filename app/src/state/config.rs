//! Configuration loading, resolution, and persistence.
//!
//! Handles the TOML config file (~/.config/swingsense/config.toml): engine
//! tuning sections plus type-prefixed actor sections (`[mock_sensor.<id>]`,
//! `[mock_round.<id>]`).

use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub use swingsense::SwingSenseConfig;

/// Build a global ID from a type prefix and index: `"mock_sensor.0"`, etc.
pub fn global_id(prefix: &str, index: &str) -> String {
    format!("{prefix}.{index}")
}

// ---------------------------------------------------------------------------
// Persistence I/O
// ---------------------------------------------------------------------------

/// Returns `~/.config/swingsense/config.toml`.
pub fn default_config_path() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swingsense");
    dir.join("config.toml")
}

/// Load persisted config from disk. If the file does not exist, creates it
/// with all-defaults and returns that. An unparsable file is left alone and
/// defaults are used for this run.
pub fn load(path: &Path) -> SwingSenseConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<SwingSenseConfig>(&contents) {
            Ok(config) => {
                tracing::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", path.display());
                SwingSenseConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let defaults = SwingSenseConfig::default();
            tracing::info!("no config file found, creating {}", path.display());
            save_to(path, &defaults);
            defaults
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {e}", path.display());
            SwingSenseConfig::default()
        }
    }
}

/// Write config to a specific path. Creates parent dirs if needed. Never panics.
pub fn save_to(path: &Path, config: &SwingSenseConfig) {
    if let Some(dir) = path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        tracing::warn!("failed to create config dir {}: {e}", dir.display());
        return;
    }
    match toml::to_string_pretty(config) {
        Ok(contents) => {
            if let Err(e) = std::fs::write(path, contents) {
                tracing::warn!("failed to write {}: {e}", path.display());
            }
        }
        Err(e) => {
            tracing::warn!("failed to serialize config: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Cached config
// ---------------------------------------------------------------------------

/// Cached configuration backed by a TOML file.
///
/// Reads are cheap (RwLock read guard + clone). Writes acquire the write lock,
/// mutate the cached copy, and persist to disk.
pub struct SystemConfig {
    path: PathBuf,
    inner: RwLock<SwingSenseConfig>,
}

impl SystemConfig {
    /// Load config from disk (or create defaults) and cache it.
    pub fn new(path: PathBuf) -> Self {
        let config = load(&path);
        Self {
            path,
            inner: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone the current cached config.
    pub fn snapshot(&self) -> SwingSenseConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mutate the cached config in place, then persist to disk.
    pub fn update(&self, f: impl FnOnce(&mut SwingSenseConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
        save_to(&self.path, &guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swingsense::MockSensorSection;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = load(&path);
        assert_eq!(config, SwingSenseConfig::default());
        assert!(path.exists());
        assert_eq!(load(&path), SwingSenseConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "user_id = \"alice\"\n\n[segmentation]\nsmoothing_window = 5\n\n[mock_sensor.0]\nname = \"Band\"\ninterval_secs = 10\n",
        )
        .unwrap();
        let config = load(&path);
        assert_eq!(config.user_id.as_deref(), Some("alice"));
        assert_eq!(config.segmentation.smoothing_window, 5);
        assert_eq!(config.segmentation.stability_window_ms, 300);
        assert_eq!(config.mock_sensor["0"].interval_secs, Some(10));
        assert!(!config.mock_sensor["0"].handheld);
    }

    #[test]
    fn test_unparsable_file_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "segmentation = [").unwrap();
        assert_eq!(load(&path), SwingSenseConfig::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "segmentation = [");
    }

    #[test]
    fn test_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let system = SystemConfig::new(path.clone());
        system.update(|c| {
            c.mock_sensor.insert(
                "0".into(),
                MockSensorSection {
                    name: "Band".into(),
                    interval_secs: None,
                    handheld: true,
                },
            );
        });
        assert!(system.snapshot().mock_sensor["0"].handheld);
        assert!(load(&path).mock_sensor["0"].handheld);
        assert_eq!(global_id("mock_sensor", "0"), "mock_sensor.0");
    }
}
