use bytemuck::{Pod, Zeroable};

use crate::state::{BlurType, FilterState, TintColor, factor};

/// Base sharpen strength applied even at a zero slider value.
pub const SHARPEN_BASE: f32 = 0.11;
const SHARPEN_RANGE: f32 = 0.6;
const GRAIN_RANGE: f32 = 0.04;
const SHADOWS_RANGE: f32 = 0.55;
const HIGHLIGHTS_RANGE: f32 = 0.75;
const CONTRAST_RANGE: f32 = 0.3;
const SATURATION_BOOST: f32 = 1.05;
const TINT_INTENSITY: f32 = 0.5;

pub fn enhance_intensity(state: &FilterState) -> f32 {
    factor(state.enhance)
}

pub fn exposure(state: &FilterState) -> f32 {
    factor(state.exposure)
}

pub fn warmth(state: &FilterState) -> f32 {
    factor(state.warmth)
}

pub fn vignette(state: &FilterState) -> f32 {
    factor(state.vignette)
}

pub fn fade(state: &FilterState) -> f32 {
    factor(state.fade)
}

pub fn sharpen(state: &FilterState) -> f32 {
    SHARPEN_BASE + factor(state.sharpen) * SHARPEN_RANGE
}

pub fn grain(state: &FilterState) -> f32 {
    factor(state.grain) * GRAIN_RANGE
}

pub fn shadows(state: &FilterState) -> f32 {
    (state.shadows as f32 * SHADOWS_RANGE + 100.0) / 100.0
}

pub fn highlights(state: &FilterState) -> f32 {
    (state.highlights as f32 * HIGHLIGHTS_RANGE + 100.0) / 100.0
}

pub fn contrast(state: &FilterState) -> f32 {
    1.0 + factor(state.contrast) * CONTRAST_RANGE
}

pub fn saturation(state: &FilterState) -> f32 {
    let mut s = factor(state.saturation);
    if s > 0.0 {
        s *= SATURATION_BOOST;
    }
    s + 1.0
}

pub fn tint_intensity(tint: Option<TintColor>) -> f32 {
    if tint.is_some() { TINT_INTENSITY } else { 0.0 }
}

/// The curve lookup pass is wired but never fed; the tone shader skips it.
pub fn curves_enabled(_state: &FilterState) -> bool {
    false
}

/// Render-buffer aspect ratio as the selective blur shaders expect it.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    height as f32 / width.max(1) as f32
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct EnhanceUniforms {
    pub intensity: f32,
    pub _pad: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SharpenUniforms {
    pub texel_width: f32,
    pub texel_height: f32,
    pub sharpen: f32,
    pub _pad: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    pub texel_width_offset: f32,
    pub texel_height_offset: f32,
    pub _pad: [f32; 2],
}

// Field order mirrors `struct Tools` in the tone shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ToolsUniforms {
    pub shadows_tint_color: [f32; 4],
    pub highlights_tint_color: [f32; 4],
    pub width: f32,
    pub height: f32,
    pub skip_tone: f32,
    pub shadows: f32,
    pub highlights: f32,
    pub contrast: f32,
    pub fade_amount: f32,
    pub saturation: f32,
    pub shadows_tint_intensity: f32,
    pub highlights_tint_intensity: f32,
    pub exposure: f32,
    pub warmth: f32,
    pub grain: f32,
    pub vignette: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SelectiveBlurUniforms {
    pub exclude_point: [f32; 2],
    pub exclude_size: f32,
    pub exclude_blur_size: f32,
    pub aspect_ratio: f32,
    pub angle: f32,
    pub _pad: [f32; 2],
}

/// Every uniform block one frame needs, resolved from a state snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameParams {
    pub enhance: EnhanceUniforms,
    pub sharpen: SharpenUniforms,
    pub tools: ToolsUniforms,
    pub blur_horizontal: BlurUniforms,
    pub blur_vertical: BlurUniforms,
    pub selective: SelectiveBlurUniforms,
    pub blur_type: BlurType,
}

impl FrameParams {
    /// Resolves uniforms for a `width`x`height` render buffer.
    ///
    /// With `show_original` every tool gets its neutral value and the blur
    /// type collapses to `None`.
    pub fn resolve(state: &FilterState, show_original: bool, width: u32, height: u32) -> Self {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;

        let tools = if show_original {
            neutral_tools(w, h)
        } else {
            ToolsUniforms {
                shadows_tint_color: tint_vec(state.shadows_tint),
                highlights_tint_color: tint_vec(state.highlights_tint),
                width: w,
                height: h,
                skip_tone: if curves_enabled(state) { 0.0 } else { 1.0 },
                shadows: shadows(state),
                highlights: highlights(state),
                contrast: contrast(state),
                fade_amount: fade(state),
                saturation: saturation(state),
                shadows_tint_intensity: tint_intensity(state.shadows_tint),
                highlights_tint_intensity: tint_intensity(state.highlights_tint),
                exposure: exposure(state),
                warmth: warmth(state),
                grain: grain(state),
                vignette: vignette(state),
                _pad: [0.0; 2],
            }
        };

        let blur = state.blur;
        Self {
            enhance: EnhanceUniforms {
                intensity: if show_original {
                    0.0
                } else {
                    enhance_intensity(state)
                },
                _pad: [0.0; 3],
            },
            sharpen: SharpenUniforms {
                texel_width: 1.0 / w,
                texel_height: 1.0 / h,
                sharpen: if show_original { 0.0 } else { sharpen(state) },
                _pad: 0.0,
            },
            tools,
            blur_horizontal: BlurUniforms {
                texel_width_offset: 1.0 / w,
                texel_height_offset: 0.0,
                _pad: [0.0; 2],
            },
            blur_vertical: BlurUniforms {
                texel_width_offset: 0.0,
                texel_height_offset: 1.0 / h,
                _pad: [0.0; 2],
            },
            selective: SelectiveBlurUniforms {
                exclude_point: [blur.exclude_x, blur.exclude_y],
                exclude_size: blur.exclude_size,
                exclude_blur_size: blur.exclude_blur_size,
                aspect_ratio: aspect_ratio(width, height),
                angle: blur.angle,
                _pad: [0.0; 2],
            },
            blur_type: if show_original {
                BlurType::None
            } else {
                state.blur_type
            },
        }
    }
}

fn neutral_tools(width: f32, height: f32) -> ToolsUniforms {
    ToolsUniforms {
        shadows_tint_color: [0.0; 4],
        highlights_tint_color: [0.0; 4],
        width,
        height,
        skip_tone: 1.0,
        shadows: 1.0,
        highlights: 1.0,
        contrast: 1.0,
        fade_amount: 0.0,
        saturation: 1.0,
        shadows_tint_intensity: 0.0,
        highlights_tint_intensity: 0.0,
        exposure: 0.0,
        warmth: 0.0,
        grain: 0.0,
        vignette: 0.0,
        _pad: [0.0; 2],
    }
}

fn tint_vec(tint: Option<TintColor>) -> [f32; 4] {
    match tint {
        Some(color) => {
            let [r, g, b] = color.to_unit();
            [r, g, b, 1.0]
        }
        None => [0.0; 4],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TintColor;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn uniform_blocks_have_std140_sizes() {
        assert_eq!(std::mem::size_of::<EnhanceUniforms>(), 16);
        assert_eq!(std::mem::size_of::<SharpenUniforms>(), 16);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 16);
        assert_eq!(std::mem::size_of::<ToolsUniforms>(), 96);
        assert_eq!(std::mem::size_of::<SelectiveBlurUniforms>(), 32);
    }

    #[test]
    fn zero_state_maps_to_identity_values() {
        let s = FilterState::default();
        assert!(approx(shadows(&s), 1.0));
        assert!(approx(highlights(&s), 1.0));
        assert!(approx(contrast(&s), 1.0));
        assert!(approx(saturation(&s), 1.0));
        assert!(approx(grain(&s), 0.0));
        assert!(approx(sharpen(&s), SHARPEN_BASE));
        assert!(approx(tint_intensity(s.shadows_tint), 0.0));
    }

    #[test]
    fn remaps_follow_affine_formulas() {
        let mut s = FilterState::default();
        s.shadows = 100;
        s.highlights = -100;
        s.contrast = 50;
        s.sharpen = 100;
        s.grain = 50;
        s.exposure = -40;
        assert!(approx(shadows(&s), 1.55));
        assert!(approx(highlights(&s), 0.25));
        assert!(approx(contrast(&s), 1.15));
        assert!(approx(sharpen(&s), 0.71));
        assert!(approx(grain(&s), 0.02));
        assert!(approx(exposure(&s), -0.4));
    }

    #[test]
    fn saturation_boost_only_applies_above_zero() {
        let mut s = FilterState::default();
        s.saturation = 100;
        assert!(approx(saturation(&s), 2.05));
        s.saturation = -100;
        assert!(approx(saturation(&s), 0.0));
        s.saturation = -50;
        assert!(approx(saturation(&s), 0.5));
    }

    #[test]
    fn show_original_uses_neutral_values() {
        let mut s = FilterState::default();
        s.enhance = 80;
        s.sharpen = 60;
        s.exposure = 30;
        s.vignette = 50;
        s.shadows_tint = Some(TintColor::new(200, 10, 10));
        s.blur_type = BlurType::Linear;
        let p = FrameParams::resolve(&s, true, 64, 32);
        assert_eq!(p.enhance.intensity, 0.0);
        assert_eq!(p.sharpen.sharpen, 0.0);
        assert_eq!(p.tools.exposure, 0.0);
        assert_eq!(p.tools.vignette, 0.0);
        assert_eq!(p.tools.shadows, 1.0);
        assert_eq!(p.tools.saturation, 1.0);
        assert_eq!(p.tools.shadows_tint_intensity, 0.0);
        assert_eq!(p.tools.skip_tone, 1.0);
        assert_eq!(p.blur_type, BlurType::None);
    }

    #[test]
    fn resolve_carries_geometry_and_tints() {
        let mut s = FilterState::default();
        s.highlights_tint = Some(TintColor::new(255, 0, 51));
        s.blur_type = BlurType::Radial;
        s.blur.exclude_x = 0.25;
        let p = FrameParams::resolve(&s, false, 200, 100);
        assert!(approx(p.selective.aspect_ratio, 0.5));
        assert_eq!(p.selective.exclude_point, [0.25, 0.5]);
        assert_eq!(p.tools.highlights_tint_intensity, 0.5);
        assert!(approx(p.tools.highlights_tint_color[2], 0.2));
        assert_eq!(p.tools.skip_tone, 1.0);
        assert!(approx(p.blur_horizontal.texel_width_offset, 1.0 / 200.0));
        assert_eq!(p.blur_horizontal.texel_height_offset, 0.0);
        assert!(approx(p.blur_vertical.texel_height_offset, 1.0 / 100.0));
        assert_eq!(p.blur_type, BlurType::Radial);
    }
}
