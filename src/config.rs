//! Canvas configuration: opacities, thresholds, timings.
//!
//! Values come from defaults, an optional JSON file, and a handful of
//! `SAM_CANVAS_*` environment overrides, in that order.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{CanvasError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub image_opacity: f32,
    pub prediction_opacity: f32,
    pub user_input_opacity: f32,
    pub opacity_step: f32,

    /// Click/drag threshold in display pixels.
    pub click_threshold_px: f32,
    pub point_radius_px: f32,

    /// Overlay alpha of a mask pixel at full emphasis.
    pub mask_alpha: f32,
    /// Fraction of `mask_alpha` used for layers that are not selected.
    pub faded_alpha: f32,

    pub prompt_mask_size: u32,
    pub debounce_ms: u64,
    pub resize_debounce_ms: u64,
    pub multi_box: bool,

    pub min_zoom: f32,
    pub max_zoom: f32,
    pub brush_radius: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            image_opacity: 1.0,
            prediction_opacity: 0.6,
            user_input_opacity: 0.7,
            opacity_step: 0.05,
            click_threshold_px: 5.0,
            point_radius_px: 5.0,
            mask_alpha: 0.6,
            faded_alpha: 0.3,
            prompt_mask_size: 256,
            debounce_ms: 300,
            resize_debounce_ms: 150,
            multi_box: false,
            min_zoom: 1.0,
            max_zoom: 10.0,
            brush_radius: 10.0,
        }
    }
}

impl CanvasConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: CanvasConfig = serde_json::from_str(&data)?;
        debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Apply `SAM_CANVAS_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("SAM_CANVAS_DEBOUNCE_MS") {
            self.debounce_ms = parse_env("SAM_CANVAS_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("SAM_CANVAS_MULTI_BOX") {
            self.multi_box = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = lookup("SAM_CANVAS_CLICK_THRESHOLD") {
            self.click_threshold_px = parse_env("SAM_CANVAS_CLICK_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("SAM_CANVAS_PREDICTION_OPACITY") {
            self.prediction_opacity = parse_env("SAM_CANVAS_PREDICTION_OPACITY", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("image_opacity", self.image_opacity),
            ("prediction_opacity", self.prediction_opacity),
            ("user_input_opacity", self.user_input_opacity),
            ("mask_alpha", self.mask_alpha),
            ("faded_alpha", self.faded_alpha),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CanvasError::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if !(self.opacity_step > 0.0 && self.opacity_step <= 1.0) {
            return Err(CanvasError::Config(format!(
                "opacity_step must be within (0, 1], got {}",
                self.opacity_step
            )));
        }
        if self.click_threshold_px <= 0.0 {
            return Err(CanvasError::Config("click_threshold_px must be positive".into()));
        }
        if self.prompt_mask_size == 0 {
            return Err(CanvasError::Config("prompt_mask_size must be positive".into()));
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return Err(CanvasError::Config(format!(
                "zoom range {}..{} is invalid",
                self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

/// Clamp to [0, 1] and snap to the slider step.
pub fn quantize_opacity(value: f32, step: f32) -> f32 {
    let steps = (value.clamp(0.0, 1.0) / step).round();
    (steps * step).clamp(0.0, 1.0)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CanvasError::Config(format!("{key}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = CanvasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prompt_mask_size, 256);
        assert_eq!(config.debounce(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CanvasConfig = serde_json::from_str(r#"{"multi_box": true, "debounce_ms": 120}"#).unwrap();
        assert!(config.multi_box);
        assert_eq!(config.debounce_ms, 120);
        assert_eq!(config.user_input_opacity, 0.7);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SAM_CANVAS_DEBOUNCE_MS", "50"),
            ("SAM_CANVAS_MULTI_BOX", "true"),
            ("SAM_CANVAS_PREDICTION_OPACITY", "0.25"),
        ]
        .into_iter()
        .collect();
        let config = CanvasConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert!(config.multi_box);
        assert_eq!(config.prediction_opacity, 0.25);
    }

    #[test]
    fn test_env_override_parse_error() {
        let result = CanvasConfig::default().with_overrides(|k| {
            (k == "SAM_CANVAS_DEBOUNCE_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(CanvasError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_opacity() {
        let config = CanvasConfig {
            prediction_opacity: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quantize_opacity() {
        let config = CanvasConfig::default();
        let step = config.opacity_step;
        assert!((quantize_opacity(0.42, step) - 0.40).abs() < 1e-6);
        assert!((quantize_opacity(0.43, step) - 0.45).abs() < 1e-6);
        assert_eq!(quantize_opacity(-3.0, step), 0.0);
        assert_eq!(quantize_opacity(7.0, step), 1.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = CanvasConfig::load(Path::new("/nonexistent/sam-canvas.json"));
        assert!(matches!(result, Err(CanvasError::Io(_))));
    }
}
