// SPDX-License-Identifier: CEPL-1.0
//! `oberon.toml`. Every field is optional; a missing or malformed file yields
//! the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use oberon_render::{PresentationMode, SampleCount};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub device: DeviceCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "oberon".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub samples: u32,
    pub present_mode: PresentationMode,
    pub image_count: u32,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            samples: 4,
            present_mode: PresentationMode::Fifo,
            image_count: 3,
        }
    }
}

impl RenderCfg {
    /// Non-power-of-two counts fall back to the default.
    pub fn sample_count(&self) -> SampleCount {
        SampleCount::from_count(self.samples).unwrap_or_else(|| {
            warn!("samples = {} is not a valid count", self.samples);
            SampleCount::default()
        })
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceCfg {
    /// Empty means any device.
    pub uuid: String,
    pub diagnostics: bool,
    pub pipeline_cache_dir: PathBuf,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        DeviceCfg {
            uuid: String::new(),
            diagnostics: true,
            pipeline_cache_dir: PathBuf::from("."),
        }
    }
}

impl DeviceCfg {
    pub fn uuid(&self) -> Option<&str> {
        Some(self.uuid.trim()).filter(|s| !s.is_empty())
    }
}

pub fn parse(s: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str(s)
}

pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse(&s).unwrap_or_else(|e| {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }),
        Err(e) => {
            debug!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.render.sample_count(), SampleCount::X4);
        assert_eq!(cfg.device.uuid(), None);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = parse(
            r#"
            [render]
            present_mode = "mailbox"
            samples = 8

            [device]
            uuid = " 00112233-4455-6677-8899-aabbccddeeff "
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.present_mode, PresentationMode::Mailbox);
        assert_eq!(cfg.render.sample_count(), SampleCount::X8);
        assert_eq!(cfg.render.image_count, 3);
        assert_eq!(cfg.window.title, "oberon");
        assert_eq!(
            cfg.device.uuid(),
            Some("00112233-4455-6677-8899-aabbccddeeff")
        );
        assert!(cfg.device.diagnostics);
    }

    #[test]
    fn snake_case_present_modes() {
        let cfg = parse("[render]\npresent_mode = \"fifo_relaxed\"").unwrap();
        assert_eq!(cfg.render.present_mode, PresentationMode::FifoRelaxed);
        assert!(parse("[render]\npresent_mode = \"FIFO\"").is_err());
    }

    #[test]
    fn bad_sample_count_falls_back() {
        let cfg = parse("[render]\nsamples = 3").unwrap();
        assert_eq!(cfg.render.sample_count(), SampleCount::default());
    }

    #[test]
    fn missing_file_is_defaults() {
        let cfg = load_cfg(Path::new("/nonexistent/oberon.toml"));
        assert_eq!(cfg, AppCfg::default());
    }
}
