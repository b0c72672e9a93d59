//! WGSL sources for every render pass.
//!
//! Each fragment program is paired with the shared full-screen quad vertex
//! stage through [`program_source`]. Bindings follow one convention: the
//! sampler at 0, input textures from 1, the uniform block after the last
//! texture.

/// Full-screen quad vertex stage shared by every program.
const QUAD_VERTEX_SRC: &str = r#"
struct VertexOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> VertexOut {
    var out: VertexOut;
    out.position = vec4<f32>(position, 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

/// Joins the quad vertex stage with a fragment program.
pub fn program_source(fragment: &str) -> String {
    format!("{QUAD_VERTEX_SRC}\n{fragment}")
}

pub const PRESENT_SRC: &str = r#"
@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var source_image: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return textureSampleLevel(source_image, linear_sampler, in.uv, 0.0);
}
"#;

pub const RGB_TO_HSV_SRC: &str = r#"
@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var source_image: texture_2d<f32>;

fn rgb_to_hsv(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    let p = select(vec4<f32>(c.gb, k.xy), vec4<f32>(c.bg, k.wz), c.g < c.b);
    let q = select(vec4<f32>(c.r, p.yzx), vec4<f32>(p.xyw, c.r), c.r < p.x);
    let d = q.x - min(q.w, q.y);
    let e = 1.0e-10;
    return vec3<f32>(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let texel = textureSampleLevel(source_image, linear_sampler, in.uv, 0.0);
    return vec4<f32>(rgb_to_hsv(texel.rgb), texel.a);
}
"#;

pub const ENHANCE_SRC: &str = r#"
struct Enhance {
    intensity: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var source_image: texture_2d<f32>;
@group(0) @binding(2) var lookup_image: texture_2d<f32>;
@group(0) @binding(3) var<uniform> params: Enhance;

// Half a lookup texel horizontally, half a segment row vertically.
const LOOKUP_OFFSET: vec2<f32> = vec2<f32>(0.001953125, 0.03125);

fn segment_curve(value: f32, shifted: f32, row: f32) -> f32 {
    let c = textureSampleLevel(lookup_image, linear_sampler, vec2<f32>(shifted, row), 0.0).rgb;
    let range = c.b - c.g;
    if (abs(range) < 1.0e-5) {
        return value;
    }
    return (c.r - c.g) / range;
}

fn enhance(value: f32, uv: vec2<f32>) -> f32 {
    let shifted = value + LOOKUP_OFFSET.x;
    var coord = (clamp(uv, vec2<f32>(0.125), vec2<f32>(1.0 - 0.125001)) - 0.125) * 4.0;
    let frac = fract(coord);
    coord = floor(coord);
    let p00 = (coord.y * 4.0 + coord.x) * 0.0625 + LOOKUP_OFFSET.y;
    let p01 = (coord.y * 4.0 + coord.x + 1.0) * 0.0625 + LOOKUP_OFFSET.y;
    let p10 = ((coord.y + 1.0) * 4.0 + coord.x) * 0.0625 + LOOKUP_OFFSET.y;
    let p11 = ((coord.y + 1.0) * 4.0 + coord.x + 1.0) * 0.0625 + LOOKUP_OFFSET.y;
    let c1 = segment_curve(value, shifted, p00);
    let c2 = segment_curve(value, shifted, p01);
    let c3 = segment_curve(value, shifted, p10);
    let c4 = segment_curve(value, shifted, p11);
    let c1_2 = mix(c1, c2, frac.x);
    let c3_4 = mix(c3, c4, frac.x);
    return mix(c1_2, c3_4, frac.y);
}

fn hsv_to_rgb(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    let p = abs(fract(c.xxx + k.xyz) * 6.0 - k.www);
    return c.z * mix(k.xxx, clamp(p - k.xxx, vec3<f32>(0.0), vec3<f32>(1.0)), c.y);
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let texel = textureSampleLevel(source_image, linear_sampler, in.uv, 0.0);
    var hsv = texel.xyz;
    hsv.y = min(1.0, hsv.y * 1.2);
    hsv.z = min(1.0, enhance(hsv.z, in.uv) * 1.1);
    return vec4<f32>(hsv_to_rgb(mix(texel.xyz, hsv, params.intensity)), texel.w);
}
"#;

pub const SHARPEN_SRC: &str = r#"
struct Sharpen {
    texel_width: f32,
    texel_height: f32,
    sharpen: f32,
    _pad0: f32,
};

@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var source_image: texture_2d<f32>;
@group(0) @binding(2) var<uniform> params: Sharpen;

fn sample_rgb(uv: vec2<f32>) -> vec3<f32> {
    return textureSampleLevel(source_image, linear_sampler, uv, 0.0).rgb;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    var result = textureSampleLevel(source_image, linear_sampler, in.uv, 0.0);
    let width_step = vec2<f32>(params.texel_width, 0.0);
    let height_step = vec2<f32>(0.0, params.texel_height);
    let neighbours = sample_rgb(in.uv - width_step)
        + sample_rgb(in.uv + width_step)
        + sample_rgb(in.uv + height_step)
        + sample_rgb(in.uv - height_step);
    result = vec4<f32>(
        result.rgb * (1.0 + 4.0 * params.sharpen) - neighbours * params.sharpen,
        result.a,
    );
    return result;
}
"#;

pub const BLUR_SRC: &str = r#"
struct Blur {
    texel_width_offset: f32,
    texel_height_offset: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var source_image: texture_2d<f32>;
@group(0) @binding(2) var<uniform> params: Blur;

fn tap(uv: vec2<f32>, single_step: vec2<f32>, offset: f32) -> vec4<f32> {
    return textureSampleLevel(source_image, linear_sampler, uv + single_step * offset, 0.0)
        + textureSampleLevel(source_image, linear_sampler, uv - single_step * offset, 0.0);
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let single_step = vec2<f32>(params.texel_width_offset, params.texel_height_offset);
    var sum = textureSampleLevel(source_image, linear_sampler, in.uv, 0.0) * 0.133571;
    sum += tap(in.uv, single_step, 1.458430) * 0.233308;
    sum += tap(in.uv, single_step, 3.403985) * 0.135928;
    sum += tap(in.uv, single_step, 5.351806) * 0.051383;
    sum += tap(in.uv, single_step, 7.302940) * 0.012595;
    return sum;
}
"#;

/// Shared bindings for both selective blur programs.
const SELECTIVE_COMMON_SRC: &str = r#"
struct Selective {
    exclude_point: vec2<f32>,
    exclude_size: f32,
    exclude_blur_size: f32,
    aspect_ratio: f32,
    angle: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var sharp_image: texture_2d<f32>;
@group(0) @binding(2) var blurred_image: texture_2d<f32>;
@group(0) @binding(3) var<uniform> params: Selective;

fn aspect_coord(uv: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(uv.x, uv.y * params.aspect_ratio + 0.5 - 0.5 * params.aspect_ratio);
}

fn composite(uv: vec2<f32>, distance_from_center: f32) -> vec4<f32> {
    let sharp = textureSampleLevel(sharp_image, linear_sampler, uv, 0.0);
    let blurred = textureSampleLevel(blurred_image, linear_sampler, uv, 0.0);
    let weight = smoothstep(
        params.exclude_size - params.exclude_blur_size,
        params.exclude_size,
        distance_from_center,
    );
    return mix(sharp, blurred, weight);
}
"#;

const RADIAL_BLUR_FRAGMENT_SRC: &str = r#"
@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let coord = aspect_coord(in.uv);
    return composite(in.uv, distance(params.exclude_point, coord));
}
"#;

const LINEAR_BLUR_FRAGMENT_SRC: &str = r#"
@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let coord = aspect_coord(in.uv);
    let d = abs(
        (coord.x - params.exclude_point.x) * params.aspect_ratio * cos(params.angle)
            + (coord.y - params.exclude_point.y) * sin(params.angle),
    );
    return composite(in.uv, d);
}
"#;

pub fn radial_blur_src() -> String {
    format!("{SELECTIVE_COMMON_SRC}\n{RADIAL_BLUR_FRAGMENT_SRC}")
}

pub fn linear_blur_src() -> String {
    format!("{SELECTIVE_COMMON_SRC}\n{LINEAR_BLUR_FRAGMENT_SRC}")
}

pub const TOOLS_SRC: &str = r#"
struct Tools {
    shadows_tint_color: vec4<f32>,
    highlights_tint_color: vec4<f32>,
    width: f32,
    height: f32,
    skip_tone: f32,
    shadows: f32,
    highlights: f32,
    contrast: f32,
    fade_amount: f32,
    saturation: f32,
    shadows_tint_intensity: f32,
    highlights_tint_intensity: f32,
    exposure: f32,
    warmth: f32,
    grain: f32,
    vignette: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0) var linear_sampler: sampler;
@group(0) @binding(1) var source_image: texture_2d<f32>;
@group(0) @binding(2) var curves_image: texture_2d<f32>;
@group(0) @binding(3) var<uniform> params: Tools;

const TOOL_EPSILON: f32 = 0.005;
const HS_LUMINANCE_WEIGHTING: vec3<f32> = vec3<f32>(0.3, 0.3, 0.3);
const SAT_LUMINANCE_WEIGHTING: vec3<f32> = vec3<f32>(0.2126, 0.7152, 0.0722);
const PERM_TEX_UNIT: f32 = 1.0 / 256.0;
const PERM_TEX_UNIT_HALF: f32 = 0.5 / 256.0;
const GRAIN_SIZE: f32 = 2.3;
const CURVE_STEP: f32 = 1.0 / 200.0;

fn get_luma(rgb: vec3<f32>) -> f32 {
    return 0.299 * rgb.r + 0.587 * rgb.g + 0.114 * rgb.b;
}

fn rgb_to_hsl(color: vec3<f32>) -> vec3<f32> {
    var hsl = vec3<f32>(0.0);
    let fmin = min(min(color.r, color.g), color.b);
    let fmax = max(max(color.r, color.g), color.b);
    let delta = fmax - fmin;
    hsl.z = (fmax + fmin) / 2.0;
    if (delta == 0.0) {
        return hsl;
    }
    if (hsl.z < 0.5) {
        hsl.y = delta / (fmax + fmin);
    } else {
        hsl.y = delta / (2.0 - fmax - fmin);
    }
    let delta_r = (((fmax - color.r) / 6.0) + (delta / 2.0)) / delta;
    let delta_g = (((fmax - color.g) / 6.0) + (delta / 2.0)) / delta;
    let delta_b = (((fmax - color.b) / 6.0) + (delta / 2.0)) / delta;
    if (color.r == fmax) {
        hsl.x = delta_b - delta_g;
    } else if (color.g == fmax) {
        hsl.x = (1.0 / 3.0) + delta_r - delta_b;
    } else {
        hsl.x = (2.0 / 3.0) + delta_g - delta_r;
    }
    if (hsl.x < 0.0) {
        hsl.x += 1.0;
    } else if (hsl.x > 1.0) {
        hsl.x -= 1.0;
    }
    return hsl;
}

fn hue_to_rgb(f1: f32, f2: f32, hue_in: f32) -> f32 {
    var hue = hue_in;
    if (hue < 0.0) {
        hue += 1.0;
    } else if (hue > 1.0) {
        hue -= 1.0;
    }
    if ((6.0 * hue) < 1.0) {
        return f1 + (f2 - f1) * 6.0 * hue;
    }
    if ((2.0 * hue) < 1.0) {
        return f2;
    }
    if ((3.0 * hue) < 2.0) {
        return f1 + (f2 - f1) * ((2.0 / 3.0) - hue) * 6.0;
    }
    return f1;
}

fn hsl_to_rgb(hsl: vec3<f32>) -> vec3<f32> {
    if (hsl.y == 0.0) {
        return vec3<f32>(hsl.z);
    }
    var f2: f32;
    if (hsl.z < 0.5) {
        f2 = hsl.z * (1.0 + hsl.y);
    } else {
        f2 = (hsl.z + hsl.y) - (hsl.y * hsl.z);
    }
    let f1 = 2.0 * hsl.z - f2;
    return vec3<f32>(
        hue_to_rgb(f1, f2, hsl.x + (1.0 / 3.0)),
        hue_to_rgb(f1, f2, hsl.x),
        hue_to_rgb(f1, f2, hsl.x - (1.0 / 3.0)),
    );
}

fn rgb_to_yuv(rgb: vec3<f32>) -> vec3<f32> {
    let luma = get_luma(rgb);
    return vec3<f32>(luma, (1.0 / 1.772) * (rgb.b - luma), (1.0 / 1.402) * (rgb.r - luma));
}

fn yuv_to_rgb(yuv: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(
        1.402 * yuv.b + yuv.r,
        yuv.r - (0.299 * 1.402 / 0.587) * yuv.b - (0.114 * 1.772 / 0.587) * yuv.g,
        1.772 * yuv.g + yuv.r,
    );
}

fn ease_in_out_sigmoid(value: f32, strength: f32) -> f32 {
    if (value > 0.5) {
        return 1.0 - pow(2.0 - 2.0 * value, 1.0 / (1.0 - strength)) * 0.5;
    }
    return pow(2.0 * value, 1.0 / (1.0 - strength)) * 0.5;
}

fn curve_sample(value: f32) -> vec4<f32> {
    let index = floor(clamp(value / CURVE_STEP, 0.0, 199.0));
    return textureSampleLevel(curves_image, linear_sampler, vec2<f32>(CURVE_STEP * index, 0.0), 0.0);
}

fn apply_luminance_curve(pixel_in: vec3<f32>) -> vec3<f32> {
    var pixel = pixel_in;
    pixel.y = mix(0.0, pixel.y, smoothstep(0.0, 0.1, pixel.z) * (1.0 - smoothstep(0.8, 1.0, pixel.z)));
    pixel.z = curve_sample(pixel_in.z).a;
    return pixel;
}

fn apply_rgb_curve(pixel: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(
        curve_sample(pixel.r).r,
        clamp(curve_sample(pixel.g).g, 0.0, 1.0),
        clamp(curve_sample(pixel.b).b, 0.0, 1.0),
    );
}

fn fade_adjust(color: vec3<f32>, fade_val: f32) -> vec3<f32> {
    let cubed = color * color * color;
    let squared = color * color;
    let faded = color + (vec3<f32>(-0.9772) * cubed + vec3<f32>(1.708) * squared
        + vec3<f32>(-0.1603) * color + vec3<f32>(0.2878) - color * vec3<f32>(0.9));
    return color * (1.0 - fade_val) + faded * fade_val;
}

fn tint_raise_shadows_curve(color: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(-0.003671) * color * color * color + vec3<f32>(0.3842) * color * color
        + vec3<f32>(0.3764) * color + vec3<f32>(0.2515);
}

fn tint_shadows(texel: vec3<f32>, tint_color: vec3<f32>, amount: f32) -> vec3<f32> {
    let raised = mix(texel, tint_raise_shadows_curve(texel), tint_color);
    return clamp(mix(texel, raised, amount), vec3<f32>(0.0), vec3<f32>(1.0));
}

fn tint_highlights(texel: vec3<f32>, tint_color: vec3<f32>, amount: f32) -> vec3<f32> {
    let lowered = mix(
        texel,
        vec3<f32>(1.0) - tint_raise_shadows_curve(vec3<f32>(1.0) - texel),
        vec3<f32>(1.0) - tint_color,
    );
    return clamp(mix(texel, lowered, amount), vec3<f32>(0.0), vec3<f32>(1.0));
}

fn rnm(tc: vec2<f32>) -> vec4<f32> {
    let noise = sin(dot(tc, vec2<f32>(12.9898, 78.233))) * 43758.5453;
    return vec4<f32>(
        fract(noise),
        fract(noise * 1.2154),
        fract(noise * 1.3453),
        fract(noise * 1.3647),
    ) * 2.0 - 1.0;
}

fn fade_curve(t: f32) -> f32 {
    return t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
}

fn pnoise_3d(p: vec3<f32>) -> f32 {
    let pi = PERM_TEX_UNIT * floor(p) + PERM_TEX_UNIT_HALF;
    let pf = fract(p);
    var perm = rnm(pi.xy).a;
    let n000 = dot(rnm(vec2<f32>(perm, pi.z)).rgb * 4.0 - 1.0, pf);
    let n001 = dot(rnm(vec2<f32>(perm, pi.z + PERM_TEX_UNIT)).rgb * 4.0 - 1.0, pf - vec3<f32>(0.0, 0.0, 1.0));
    perm = rnm(pi.xy + vec2<f32>(0.0, PERM_TEX_UNIT)).a;
    let n010 = dot(rnm(vec2<f32>(perm, pi.z)).rgb * 4.0 - 1.0, pf - vec3<f32>(0.0, 1.0, 0.0));
    let n011 = dot(rnm(vec2<f32>(perm, pi.z + PERM_TEX_UNIT)).rgb * 4.0 - 1.0, pf - vec3<f32>(0.0, 1.0, 1.0));
    perm = rnm(pi.xy + vec2<f32>(PERM_TEX_UNIT, 0.0)).a;
    let n100 = dot(rnm(vec2<f32>(perm, pi.z)).rgb * 4.0 - 1.0, pf - vec3<f32>(1.0, 0.0, 0.0));
    let n101 = dot(rnm(vec2<f32>(perm, pi.z + PERM_TEX_UNIT)).rgb * 4.0 - 1.0, pf - vec3<f32>(1.0, 0.0, 1.0));
    perm = rnm(pi.xy + vec2<f32>(PERM_TEX_UNIT, PERM_TEX_UNIT)).a;
    let n110 = dot(rnm(vec2<f32>(perm, pi.z)).rgb * 4.0 - 1.0, pf - vec3<f32>(1.0, 1.0, 0.0));
    let n111 = dot(rnm(vec2<f32>(perm, pi.z + PERM_TEX_UNIT)).rgb * 4.0 - 1.0, pf - vec3<f32>(1.0, 1.0, 1.0));
    let n_x = mix(vec4<f32>(n000, n001, n010, n011), vec4<f32>(n100, n101, n110, n111), fade_curve(pf.x));
    let n_xy = mix(n_x.xy, n_x.zw, fade_curve(pf.y));
    return mix(n_xy.x, n_xy.y, fade_curve(pf.z));
}

fn coord_rot(tc: vec2<f32>, angle: f32) -> vec2<f32> {
    let c = cos(angle);
    let s = sin(angle);
    return vec2<f32>(
        ((tc.x * 2.0 - 1.0) * c - (tc.y * 2.0 - 1.0) * s) * 0.5 + 0.5,
        ((tc.y * 2.0 - 1.0) * c + (tc.x * 2.0 - 1.0) * s) * 0.5 + 0.5,
    );
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let source = textureSampleLevel(source_image, linear_sampler, in.uv, 0.0);
    var result = source;

    if (params.skip_tone < TOOL_EPSILON) {
        result = vec4<f32>(apply_rgb_curve(hsl_to_rgb(apply_luminance_curve(rgb_to_hsl(result.rgb)))), result.a);
    }

    let hs_luminance = max(dot(result.rgb, HS_LUMINANCE_WEIGHTING), 0.0);
    let shadow = clamp(
        (pow(hs_luminance, 1.0 / params.shadows) + (-0.76) * pow(hs_luminance, 2.0 / params.shadows)) - hs_luminance,
        0.0,
        1.0,
    );
    let inv_luminance = max(1.0 - hs_luminance, 0.0);
    let highlight = clamp(
        (1.0 - (pow(inv_luminance, 1.0 / (2.0 - params.highlights)) + (-0.8) * pow(inv_luminance, 2.0 / (2.0 - params.highlights)))) - hs_luminance,
        -1.0,
        0.0,
    );
    var hs_result = result.rgb;
    if (hs_luminance > 1.0e-6) {
        hs_result = (hs_luminance + shadow + highlight) * (result.rgb / hs_luminance);
    }
    let contrasted_luminance = ((hs_luminance - 0.5) * 1.5) + 0.5;
    let white_interp = contrasted_luminance * contrasted_luminance * contrasted_luminance;
    let white_target = clamp(params.highlights, 1.0, 2.0) - 1.0;
    hs_result = mix(hs_result, vec3<f32>(1.0), white_interp * white_target);
    let inv_contrasted_luminance = 1.0 - contrasted_luminance;
    let black_interp = inv_contrasted_luminance * inv_contrasted_luminance * inv_contrasted_luminance;
    let black_target = 1.0 - clamp(params.shadows, 0.0, 1.0);
    hs_result = mix(hs_result, vec3<f32>(0.0), black_interp * black_target);
    result = vec4<f32>(hs_result, result.a);

    result = vec4<f32>(
        clamp((result.rgb - vec3<f32>(0.5)) * params.contrast + vec3<f32>(0.5), vec3<f32>(0.0), vec3<f32>(1.0)),
        result.a,
    );

    if (abs(params.fade_amount) > TOOL_EPSILON) {
        result = vec4<f32>(fade_adjust(result.rgb, params.fade_amount), result.a);
    }

    let sat_luminance = dot(result.rgb, SAT_LUMINANCE_WEIGHTING);
    result = vec4<f32>(
        clamp(mix(vec3<f32>(sat_luminance), result.rgb, params.saturation), vec3<f32>(0.0), vec3<f32>(1.0)),
        result.a,
    );

    if (abs(params.shadows_tint_intensity) > TOOL_EPSILON) {
        result = vec4<f32>(
            tint_shadows(result.rgb, params.shadows_tint_color.rgb, params.shadows_tint_intensity * 2.0),
            result.a,
        );
    }
    if (abs(params.highlights_tint_intensity) > TOOL_EPSILON) {
        result = vec4<f32>(
            tint_highlights(result.rgb, params.highlights_tint_color.rgb, params.highlights_tint_intensity * 2.0),
            result.a,
        );
    }

    if (abs(params.exposure) > TOOL_EPSILON) {
        let mag = params.exposure * 1.045;
        var exp_power = 1.0 + abs(mag);
        if (mag < 0.0) {
            exp_power = 1.0 / exp_power;
        }
        let inv = max(vec3<f32>(1.0) - result.rgb, vec3<f32>(0.0));
        result = vec4<f32>(vec3<f32>(1.0) - pow(inv, vec3<f32>(exp_power)), result.a);
    }

    if (abs(params.warmth) > TOOL_EPSILON) {
        var yuv_vec: vec3<f32>;
        if (params.warmth > 0.0) {
            yuv_vec = vec3<f32>(0.1765, -0.1255, 0.0902);
        } else {
            yuv_vec = -vec3<f32>(0.0588, 0.1569, -0.1255);
        }
        var yuv_color = rgb_to_yuv(result.rgb);
        let curve_scale = sin(yuv_color.r * 3.14159);
        yuv_color += 0.375 * params.warmth * curve_scale * yuv_vec;
        result = vec4<f32>(yuv_to_rgb(yuv_color), result.a);
    }

    if (abs(params.grain) > TOOL_EPSILON) {
        let rot_coords = coord_rot(in.uv, 1.425);
        let scale = vec2<f32>(params.width / GRAIN_SIZE, params.height / GRAIN_SIZE);
        var noise = vec3<f32>(pnoise_3d(vec3<f32>(rot_coords * scale, 0.0)));
        let luminance = dot(result.rgb, vec3<f32>(0.299, 0.587, 0.114));
        let lum = (1.0 - smoothstep(0.0, 0.2, luminance)) + luminance;
        noise = mix(noise, vec3<f32>(0.0), pow(max(lum, 0.0), 4.0));
        result = vec4<f32>(result.rgb + noise * params.grain, result.a);
    }

    if (abs(params.vignette) > TOOL_EPSILON) {
        let rad_dist = length(in.uv - 0.5) / sqrt(0.5);
        let mag = ease_in_out_sigmoid(rad_dist * 0.7, 0.62) * params.vignette * 0.645;
        let lifted = pow(max(result.rgb, vec3<f32>(0.0)), vec3<f32>(1.0 / (1.0 - mag)));
        result = vec4<f32>(mix(lifted, vec3<f32>(0.0), mag * mag), result.a);
    }

    return result;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programs_share_the_quad_vertex_stage() {
        for fragment in [PRESENT_SRC, RGB_TO_HSV_SRC, ENHANCE_SRC, SHARPEN_SRC, BLUR_SRC, TOOLS_SRC] {
            let src = program_source(fragment);
            assert!(src.contains("fn vs_main"));
            assert!(src.contains("fn fs_main"));
        }
    }

    #[test]
    fn selective_blurs_use_common_bindings() {
        for src in [radial_blur_src(), linear_blur_src()] {
            assert!(src.contains("var<uniform> params: Selective"));
            assert_eq!(src.matches("fn fs_main").count(), 1);
        }
    }

    #[test]
    fn shaders_only_use_explicit_lod_sampling() {
        let all = [
            PRESENT_SRC.to_string(),
            RGB_TO_HSV_SRC.to_string(),
            ENHANCE_SRC.to_string(),
            SHARPEN_SRC.to_string(),
            BLUR_SRC.to_string(),
            TOOLS_SRC.to_string(),
            radial_blur_src(),
        ];
        for src in all {
            assert!(!src.contains("textureSample("));
        }
    }
}
