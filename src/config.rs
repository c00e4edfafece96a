use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ArbiterConfig {
    #[serde(default = "ArbiterConfig::default_watchdog_grace_secs")]
    pub watchdog_grace_secs: f32,
    /// Consecutive non-colliding ticks tolerated before a locally-owned
    /// capture is evicted. Zero evicts on the first missed contact.
    #[serde(default)]
    pub eviction_grace_ticks: u32,
    #[serde(default = "ArbiterConfig::default_preview_opacity")]
    pub preview_opacity: f32,
    #[serde(default)]
    pub guide: GuideColors,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GuideColors {
    #[serde(default = "GuideColors::default_empty")]
    pub empty: [f32; 4],
    #[serde(default = "GuideColors::default_hovered")]
    pub hovered: [f32; 4],
    #[serde(default = "GuideColors::default_full")]
    pub full: [f32; 4],
}

impl ArbiterConfig {
    const fn default_watchdog_grace_secs() -> f32 {
        10.0
    }

    const fn default_preview_opacity() -> f32 {
        0.5
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            watchdog_grace_secs: Self::default_watchdog_grace_secs(),
            eviction_grace_ticks: 0,
            preview_opacity: Self::default_preview_opacity(),
            guide: GuideColors::default(),
        }
    }
}

impl GuideColors {
    const fn default_empty() -> [f32; 4] {
        [0.435, 0.753, 0.992, 1.0]
    }

    const fn default_hovered() -> [f32; 4] {
        [0.184, 0.502, 0.929, 1.0]
    }

    const fn default_full() -> [f32; 4] {
        [0.502, 0.502, 0.502, 1.0]
    }
}

impl Default for GuideColors {
    fn default() -> Self {
        Self {
            empty: Self::default_empty(),
            hovered: Self::default_hovered(),
            full: Self::default_full(),
        }
    }
}
