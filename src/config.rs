use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::{EngineOptions, DEFAULT_MAX_RESULTS, DEFAULT_SCORE_THRESHOLD};
use crate::filter::{
    ResultFilter, DEFAULT_MAX_DISPLAY, DEFAULT_OTHER_THRESHOLD, DEFAULT_PRIMARY_LABEL,
    DEFAULT_PRIMARY_THRESHOLD,
};
use crate::geometry::FitPolicy;
use crate::lens::ZoomController;
use crate::pipeline::ViewGeometry;

const DEFAULT_MODEL: &str = "motion";
const DEFAULT_DISPLAY_WIDTH: u32 = 1080;
const DEFAULT_DISPLAY_HEIGHT: u32 = 1920;
const DEFAULT_SOURCE_URL: &str = "stub://rear_camera";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SOURCE_ROTATION: u32 = 90;
const DEFAULT_ZOOM_MIN: f32 = 1.0;
const DEFAULT_ZOOM_MAX: f32 = 10.0;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    model: Option<ModelConfigFile>,
    filter: Option<FilterConfigFile>,
    display: Option<DisplayConfigFile>,
    source: Option<SourceConfigFile>,
    zoom: Option<ZoomConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    name: Option<String>,
    max_results: Option<usize>,
    score_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct FilterConfigFile {
    primary_label: Option<String>,
    primary_threshold: Option<f32>,
    other_threshold: Option<f32>,
    max_display: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    fit: Option<FitPolicy>,
    mirror: Option<bool>,
    rotation_degrees: Option<u32>,
    reduced: Option<ReducedConfigFile>,
}

#[derive(Debug, Deserialize)]
struct ReducedConfigFile {
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    rotation_degrees: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ZoomConfigFile {
    ratio: Option<f32>,
    min_ratio: Option<f32>,
    max_ratio: Option<f32>,
    wide_angle_preview: Option<bool>,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub model: ModelSettings,
    pub filter: FilterSettings,
    pub display: DisplaySettings,
    pub source: SourceSettings,
    pub zoom: ZoomSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub name: String,
    pub max_results: usize,
    pub score_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub primary_label: String,
    pub primary_threshold: f32,
    pub other_threshold: f32,
    pub max_display: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
    pub fit: FitPolicy,
    pub mirror: bool,
    /// Rotation of the display surface relative to the upright raster.
    pub rotation_degrees: u32,
    /// Display extents used in reduced (picture-in-picture) mode.
    pub reduced: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Sensor rotation needed to make frames upright.
    pub rotation_degrees: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoomSettings {
    pub ratio: f32,
    pub min_ratio: f32,
    pub max_ratio: f32,
    pub wide_angle_preview: bool,
}

impl PipelineConfig {
    /// Load from the JSON file named by `LOOKOUT_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LOOKOUT_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Same as `load`, with an explicit file path instead of `LOOKOUT_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let filter = file.filter.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let zoom = file.zoom.unwrap_or_default();

        Self {
            model: ModelSettings {
                name: model.name.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_results: model.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                score_threshold: model.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
            },
            filter: FilterSettings {
                primary_label: filter
                    .primary_label
                    .unwrap_or_else(|| DEFAULT_PRIMARY_LABEL.to_string()),
                primary_threshold: filter
                    .primary_threshold
                    .unwrap_or(DEFAULT_PRIMARY_THRESHOLD),
                other_threshold: filter.other_threshold.unwrap_or(DEFAULT_OTHER_THRESHOLD),
                max_display: filter.max_display.unwrap_or(DEFAULT_MAX_DISPLAY),
            },
            display: DisplaySettings {
                width: display.width.unwrap_or(DEFAULT_DISPLAY_WIDTH),
                height: display.height.unwrap_or(DEFAULT_DISPLAY_HEIGHT),
                fit: display.fit.unwrap_or_default(),
                mirror: display.mirror.unwrap_or(false),
                rotation_degrees: display.rotation_degrees.unwrap_or(0),
                reduced: display.reduced.map(|r| (r.width, r.height)),
            },
            source: SourceSettings {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                rotation_degrees: source.rotation_degrees.unwrap_or(DEFAULT_SOURCE_ROTATION),
            },
            zoom: ZoomSettings {
                ratio: zoom.ratio.unwrap_or(1.0),
                min_ratio: zoom.min_ratio.unwrap_or(DEFAULT_ZOOM_MIN),
                max_ratio: zoom.max_ratio.unwrap_or(DEFAULT_ZOOM_MAX),
                wide_angle_preview: zoom.wide_angle_preview.unwrap_or(false),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(name) = std::env::var("LOOKOUT_MODEL") {
            if !name.trim().is_empty() {
                self.model.name = name.trim().to_string();
            }
        }
        if let Ok(label) = std::env::var("LOOKOUT_PRIMARY_LABEL") {
            if !label.trim().is_empty() {
                self.filter.primary_label = label.trim().to_string();
            }
        }
        if let Ok(max) = std::env::var("LOOKOUT_MAX_DISPLAY") {
            self.filter.max_display = max
                .trim()
                .parse()
                .map_err(|_| anyhow!("LOOKOUT_MAX_DISPLAY must be a positive integer"))?;
        }
        if let Ok(fit) = std::env::var("LOOKOUT_FIT") {
            self.display.fit = fit.parse()?;
        }
        if let Ok(mirror) = std::env::var("LOOKOUT_MIRROR") {
            self.display.mirror = parse_bool(&mirror)
                .ok_or_else(|| anyhow!("LOOKOUT_MIRROR must be true/false/1/0"))?;
        }
        if let Ok(url) = std::env::var("LOOKOUT_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_unit("model.score_threshold", self.model.score_threshold)?;
        check_unit("filter.primary_threshold", self.filter.primary_threshold)?;
        check_unit("filter.other_threshold", self.filter.other_threshold)?;
        if self.filter.other_threshold < self.filter.primary_threshold {
            return Err(anyhow!(
                "filter.other_threshold ({}) must not be below filter.primary_threshold ({})",
                self.filter.other_threshold,
                self.filter.primary_threshold
            ));
        }
        if self.filter.primary_label.trim().is_empty() {
            return Err(anyhow!("filter.primary_label must not be empty"));
        }
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must not be empty"));
        }
        if self.model.max_results == 0 {
            return Err(anyhow!("model.max_results must be at least 1"));
        }
        if self.filter.max_display == 0 {
            return Err(anyhow!("filter.max_display must be at least 1"));
        }
        check_rotation("display.rotation_degrees", self.display.rotation_degrees)?;
        check_rotation("source.rotation_degrees", self.source.rotation_degrees)?;
        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow!("display extents must be non-zero"));
        }
        if let Some((w, h)) = self.display.reduced {
            if w == 0 || h == 0 {
                return Err(anyhow!("display.reduced extents must be non-zero"));
            }
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source extents must be non-zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source.target_fps must be at least 1"));
        }
        let zoom = &self.zoom;
        if !(zoom.min_ratio.is_finite() && zoom.min_ratio > 0.0) {
            return Err(anyhow!("zoom.min_ratio must be positive"));
        }
        if !(zoom.max_ratio.is_finite() && zoom.max_ratio >= zoom.min_ratio) {
            return Err(anyhow!("zoom.max_ratio must be >= zoom.min_ratio"));
        }
        if !zoom.ratio.is_finite() {
            return Err(anyhow!("zoom.ratio must be finite"));
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_results: self.model.max_results,
            score_threshold: self.model.score_threshold,
        }
    }

    pub fn result_filter(&self) -> ResultFilter {
        ResultFilter::new(
            self.filter.primary_label.clone(),
            self.filter.primary_threshold,
            self.filter.other_threshold,
            self.filter.max_display,
        )
    }

    pub fn view_geometry(&self) -> ViewGeometry {
        ViewGeometry {
            display_width: self.display.width,
            display_height: self.display.height,
            rotation_degrees: self.display.rotation_degrees,
            mirror: self.display.mirror,
            fit: self.display.fit,
        }
    }

    pub fn zoom_controller(&self) -> ZoomController {
        let mut zoom = ZoomController::new(self.zoom.min_ratio, self.zoom.max_ratio);
        zoom.set_zoom(self.zoom.ratio);
        if self.zoom.wide_angle_preview {
            zoom.apply_wide_angle_preview();
        }
        zoom
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file(PipelineConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn check_unit(field: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", field, value));
    }
    Ok(())
}

fn check_rotation(field: &str, degrees: u32) -> Result<()> {
    if !matches!(degrees, 0 | 90 | 180 | 270 | 360) {
        return Err(anyhow!(
            "{} must be one of 0, 90, 180, 270, 360; got {}",
            field,
            degrees
        ));
    }
    Ok(())
}
