use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use core_types::{CardTuning, UiLanguage};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const DEFAULT_CARD_WIDTH: f32 = 320.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Card width in device-independent pixels.
    pub card_width: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            card_width: DEFAULT_CARD_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub schema_version: u32,
    pub language: UiLanguage,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub tuning: CardTuning,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            language: UiLanguage::EnUs,
            display: DisplayConfig::default(),
            tuning: CardTuning::default(),
        }
    }
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("config.json"),
        }
    }

    pub fn from_default_location() -> Result<Self> {
        let mut dir = dirs::config_dir().context("failed to resolve config_dir")?;
        dir.push("cardnote");
        Ok(Self::from_dir(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let mut config: AppConfig =
            serde_json::from_str(&raw).context("failed to parse app config json")?;
        self.migrate(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let text = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn migrate(&self, config: &mut AppConfig) {
        if config.schema_version >= CURRENT_SCHEMA_VERSION {
            return;
        }

        warn!(
            from = config.schema_version,
            to = CURRENT_SCHEMA_VERSION,
            "migrating app config schema"
        );

        // v1 stored no usable card width.
        if config.display.card_width <= 0.0 {
            config.display.card_width = DEFAULT_CARD_WIDTH;
        }
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        let config = store.load_or_init().expect("load default");
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(config.tuning.drawer.auto_dismiss_ms, 10_000);
        assert_eq!(config.tuning.animation.entry_stagger_max_ms, 200);
        assert!(store.path().exists());
    }

    #[test]
    fn migrates_v1_and_fills_missing_sections() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        fs::write(
            store.path(),
            r#"{
                "schema_version": 1,
                "language": "zh_cn",
                "display": { "card_width": 0 },
                "tuning": { "gesture": { "velocity_threshold": 0.8 } }
            }"#,
        )
        .expect("write v1");

        let config = store.load_or_init().expect("load");
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(config.language, UiLanguage::ZhCn);
        assert_eq!(config.display.card_width, DEFAULT_CARD_WIDTH);
        assert_eq!(config.tuning.gesture.velocity_threshold, 0.8);
        assert_eq!(config.tuning.gesture.progress_threshold, 0.3);
        assert_eq!(config.tuning.drawer.auto_dismiss_ms, 10_000);

        let reloaded = store.load_or_init().expect("reload");
        assert_eq!(reloaded.display.card_width, DEFAULT_CARD_WIDTH);
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        fs::write(store.path(), "{ not json").expect("write");
        let err = store.load_or_init().expect_err("must fail");
        assert!(err.to_string().contains("failed to parse"), "unexpected error: {err}");
    }
}
