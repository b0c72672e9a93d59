use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Which selective blur, if any, the blur pass composites.
pub enum BlurType {
    #[default]
    None,
    Radial,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Selective blur geometry in normalized texture coordinates.
pub struct BlurGeometry {
    /// Radius (radial) or half-width (linear) of the sharp region.
    pub exclude_size: f32,
    /// Width of the smoothstep falloff between sharp and blurred.
    pub exclude_blur_size: f32,
    pub exclude_x: f32,
    pub exclude_y: f32,
    /// Line angle in radians, linear blur only.
    pub angle: f32,
}

impl Default for BlurGeometry {
    fn default() -> Self {
        Self {
            exclude_size: 0.35,
            exclude_blur_size: 0.15,
            exclude_x: 0.5,
            exclude_y: 0.5,
            angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Already-resolved tint color. The host converts theme colors before handing them over.
pub struct TintColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TintColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Builds a tint from a packed `0xAARRGGBB` value; alpha is ignored.
    pub fn from_argb(color: u32) -> Self {
        Self {
            r: (color >> 16 & 0xff) as u8,
            g: (color >> 8 & 0xff) as u8,
            b: (color & 0xff) as u8,
        }
    }

    pub fn to_unit(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
/// Snapshot of filter parameters handed to the engine on every resume.
///
/// Numeric values use the editor's slider scale: -100..=100 for two-sided
/// tools, 0..=100 for one-sided ones (enhance, fade, vignette, grain, sharpen).
pub struct FilterState {
    pub enhance: i32,
    pub exposure: i32,
    pub contrast: i32,
    pub warmth: i32,
    pub saturation: i32,
    pub fade: i32,
    pub highlights: i32,
    pub shadows: i32,
    pub vignette: i32,
    pub grain: i32,
    pub sharpen: i32,
    pub shadows_tint: Option<TintColor>,
    pub highlights_tint: Option<TintColor>,
    pub blur_type: BlurType,
    pub blur: BlurGeometry,
}

/// Converts a slider value to the -1..=1 factor scale.
pub fn factor(value: i32) -> f32 {
    value as f32 / 100.0
}

impl FilterState {
    /// Loads a filter state from the image sidecar JSON, if present and valid.
    pub fn load(image_path: &Path) -> Option<Self> {
        let sidecar = sidecar_path(image_path);
        let json = std::fs::read_to_string(sidecar).ok()?;
        serde_json::from_str(&json).ok()
    }

    /// Reads a filter state from an explicit JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("invalid filter state in {}", path.display()))
    }

    /// Saves the filter state to the image sidecar JSON.
    pub fn save(&self, image_path: &Path) -> anyhow::Result<()> {
        let sidecar = sidecar_path(image_path);
        if let Some(parent) = sidecar.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(sidecar, json)?;
        Ok(())
    }

    pub fn has_blur(&self) -> bool {
        self.blur_type != BlurType::None
    }
}

fn sidecar_path(image_path: &Path) -> std::path::PathBuf {
    let dir = image_path.parent().unwrap_or(Path::new("."));
    let filename = image_path.file_name().unwrap_or_default().to_string_lossy();
    dir.join(".filters").join(format!("{}.json", filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn sidecar_uses_filters_folder() {
        let p = sidecar_path(Path::new("/photos/IMG_001.jpg"));
        assert_eq!(p, PathBuf::from("/photos/.filters/IMG_001.jpg.json"));
    }

    #[test]
    fn tint_from_argb_drops_alpha() {
        let tint = TintColor::from_argb(0xff_12_34_56);
        assert_eq!(tint, TintColor::new(0x12, 0x34, 0x56));
        assert_eq!(TintColor::new(255, 0, 0).to_unit(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let state: FilterState =
            serde_json::from_str(r#"{"exposure": 40, "blur_type": "radial"}"#).unwrap();
        assert_eq!(state.exposure, 40);
        assert_eq!(state.contrast, 0);
        assert_eq!(state.blur_type, BlurType::Radial);
        assert_eq!(state.blur, BlurGeometry::default());
        assert!(state.has_blur());
    }

    #[test]
    fn sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("shot.png");
        let mut state = FilterState::default();
        state.vignette = 30;
        state.highlights_tint = Some(TintColor::new(10, 20, 30));
        state.save(&image).unwrap();
        assert_eq!(FilterState::load(&image), Some(state));
    }
}
