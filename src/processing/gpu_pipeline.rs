use std::sync::OnceLock;

use image::RgbaImage;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::{
    config::EngineConfig,
    engine::{Frame, FrameOutcome, RenderBackend, RenderSurface},
    error::{FrameError, SetupError},
    processing::{passes, passes::ImageResources, shaders},
};

/// Format of every intermediate texture and of the offscreen present target.
pub const WORK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// Two position floats and two texture coordinate floats per corner, drawn as
// a triangle strip. Texture v grows downward, matching image row order.
const QUAD_VERTICES: [[f32; 4]; 4] = [
    [-1.0, 1.0, 0.0, 0.0],
    [1.0, 1.0, 1.0, 0.0],
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 1.0, 1.0],
];
const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

pub(crate) struct Program {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) layout: wgpu::BindGroupLayout,
}

pub(crate) struct Programs {
    pub(crate) rgb_to_hsv: Program,
    pub(crate) enhance: Program,
    pub(crate) sharpen: Program,
    pub(crate) tools: Program,
    pub(crate) blur: Program,
    pub(crate) radial_blur: Program,
    pub(crate) linear_blur: Program,
    pub(crate) present: Program,
}

/// Where finished frames go.
pub(crate) enum PresentTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        width: u32,
        height: u32,
    },
}

/// Device, queue, surface and compiled programs for one engine session.
pub(crate) struct GpuContext {
    pub(crate) target: PresentTarget,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) programs: Programs,
    pub(crate) quad: wgpu::Buffer,
    pub(crate) sampler: wgpu::Sampler,
    instance: wgpu::Instance,
}

impl GpuContext {
    fn new(
        surface: RenderSurface,
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self, SetupError> {
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(SetupError::InvalidSurfaceSize { width, height });
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let window_surface = match surface {
            RenderSurface::Window { target, .. } => Some(instance.create_surface(target)?),
            RenderSurface::Offscreen { .. } => None,
        };

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            force_fallback_adapter: false,
            compatible_surface: window_surface.as_ref(),
        }))
        .ok_or(SetupError::NoAdapter)?;
        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = %adapter_info.backend,
            "gpu adapter selected"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("filter_engine_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        let (target, present_format) = match window_surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find(|f| {
                        matches!(
                            f,
                            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Bgra8Unorm
                        )
                    })
                    .ok_or(SetupError::UnsupportedSurface)?;
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width,
                    height,
                    present_mode: wgpu::PresentMode::AutoVsync,
                    desired_maximum_frame_latency: 2,
                    alpha_mode: caps
                        .alpha_modes
                        .first()
                        .copied()
                        .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                    view_formats: vec![],
                };
                surface.configure(&device, &config);
                (PresentTarget::Window { surface, config }, format)
            }
            None => (
                PresentTarget::Offscreen {
                    texture: create_offscreen_target(&device, width, height),
                    width,
                    height,
                },
                WORK_FORMAT,
            ),
        };

        let program = |label, src: &str, textures, uniform| {
            create_program(&device, label, src, textures, uniform, WORK_FORMAT)
        };
        let programs = Programs {
            rgb_to_hsv: program("rgb_to_hsv", shaders::RGB_TO_HSV_SRC, 1, false)?,
            enhance: program("enhance", shaders::ENHANCE_SRC, 2, true)?,
            sharpen: program("sharpen", shaders::SHARPEN_SRC, 1, true)?,
            tools: program("tools", shaders::TOOLS_SRC, 2, true)?,
            blur: program("blur", shaders::BLUR_SRC, 1, true)?,
            radial_blur: program("radial_blur", &shaders::radial_blur_src(), 2, true)?,
            linear_blur: program("linear_blur", &shaders::linear_blur_src(), 2, true)?,
            present: create_program(
                &device,
                "present",
                shaders::PRESENT_SRC,
                1,
                false,
                present_format,
            )?,
        };

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filter_engine_quad"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filter_engine_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            target,
            device,
            queue,
            programs,
            quad,
            sampler,
            instance,
        })
    }

    pub(crate) fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Matches the present target to the host's latest surface size.
    pub(crate) fn resize_target(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        match &mut self.target {
            PresentTarget::Window { surface, config } => {
                if config.width != width || config.height != height {
                    config.width = width;
                    config.height = height;
                    surface.configure(&self.device, config);
                    debug!(width, height, "surface reconfigured");
                }
            }
            PresentTarget::Offscreen {
                texture,
                width: w,
                height: h,
            } => {
                if *w != width || *h != height {
                    *texture = create_offscreen_target(&self.device, width, height);
                    *w = width;
                    *h = height;
                }
            }
        }
    }

    /// Reconfigures a window surface after it was lost or went out of date.
    pub(crate) fn recover_surface(&self) {
        if let PresentTarget::Window { surface, config } = &self.target {
            surface.configure(&self.device, config);
        }
    }

    /// Drops the surface first, then device and queue, then the instance.
    fn teardown(self) {
        let Self {
            target,
            device,
            queue,
            programs,
            quad,
            sampler,
            instance,
        } = self;
        drop(target);
        drop(programs);
        drop(quad);
        drop(sampler);
        drop(queue);
        drop(device);
        drop(instance);
    }
}

fn create_offscreen_target(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("filter_engine_offscreen_target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: WORK_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Compiles one program: the shared quad vertex stage plus `fragment_src`.
///
/// Bindings are laid out as sampler at 0, `textures` sampled textures from 1,
/// and an optional uniform block right after them. Validation errors are
/// captured instead of reaching the device's uncaptured error handler.
fn create_program(
    device: &wgpu::Device,
    label: &'static str,
    fragment_src: &str,
    textures: u32,
    uniform: bool,
    target_format: wgpu::TextureFormat,
) -> Result<Program, SetupError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }];
    for binding in 1..=textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    if uniform {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: textures + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shaders::program_source(fragment_src).into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &QUAD_ATTRIBUTES,
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(SetupError::Program {
            label,
            message: err.to_string(),
        });
    }
    Ok(Program { pipeline, layout })
}

/// Returns whether any GPU adapter can be acquired on this machine.
pub fn is_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .is_some()
    })
}

/// The wgpu implementation of [`RenderBackend`].
pub struct GpuBackend {
    power_preference: wgpu::PowerPreference,
    context: Option<GpuContext>,
    image: Option<ImageResources>,
}

impl GpuBackend {
    pub fn new(power_preference: wgpu::PowerPreference) -> Self {
        Self {
            power_preference,
            context: None,
            image: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.power_preference())
    }
}

impl RenderBackend for GpuBackend {
    fn init(&mut self, surface: RenderSurface) -> Result<(), SetupError> {
        self.release();
        self.context = Some(GpuContext::new(surface, self.power_preference)?);
        Ok(())
    }

    fn load_image(&mut self, image: &RgbaImage) -> Result<(), FrameError> {
        let ctx = self.context.as_ref().ok_or(FrameError::NotInitialized)?;
        // Free the previous pool before allocating one at the new size.
        self.image = None;
        self.image = Some(ImageResources::upload(ctx, image)?);
        Ok(())
    }

    fn render_frame(&mut self, frame: &mut Frame<'_>) -> Result<FrameOutcome, FrameError> {
        let (Some(ctx), Some(image)) = (self.context.as_mut(), self.image.as_mut()) else {
            return Err(FrameError::NotInitialized);
        };
        passes::render_frame(ctx, image, frame)
    }

    fn read_bitmap(&mut self) -> Result<Option<RgbaImage>, FrameError> {
        let (Some(ctx), Some(image)) = (self.context.as_ref(), self.image.as_ref()) else {
            return Ok(None);
        };
        passes::read_composite(ctx, image).map(Some)
    }

    fn release(&mut self) {
        self.image = None;
        if let Some(ctx) = self.context.take() {
            ctx.teardown();
            info!("gpu context released");
        }
    }
}

impl Drop for GpuBackend {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba, RgbaImage};

    use super::{GpuBackend, is_available};
    use crate::{
        engine::{Frame, FrameOutcome, ImageCache, RenderBackend, RenderSurface},
        state::{BlurType, FilterState},
    };

    fn gradient(w: u32, h: u32) -> RgbaImage {
        ImageBuffer::from_fn(w, h, |x, y| {
            Rgba([
                (40 + (x * 150) / w.max(1)) as u8,
                (60 + (y * 120) / h.max(1)) as u8,
                ((x + y) * 3 % 200 + 20) as u8,
                255,
            ])
        })
    }

    fn render(backend: &mut GpuBackend, state: &FilterState, show_original: bool) -> FrameOutcome {
        let mut cache = ImageCache::fresh();
        let mut frame = Frame {
            state,
            cache: &mut cache,
            show_original,
            surface_size: (32, 32),
        };
        backend
            .render_frame(&mut frame)
            .expect("offscreen frame should render")
    }

    fn backend_with(image: &RgbaImage) -> GpuBackend {
        let mut backend = GpuBackend::new(wgpu::PowerPreference::LowPower);
        backend
            .init(RenderSurface::offscreen(32, 32))
            .expect("offscreen init should succeed when an adapter exists");
        backend.load_image(image).expect("upload should succeed");
        backend
    }

    #[test]
    fn read_before_render_returns_source() {
        if !is_available() {
            return;
        }
        let src = gradient(24, 16);
        let mut backend = backend_with(&src);
        let out = backend.read_bitmap().unwrap().expect("image is loaded");
        assert_rgba_close(&src, &out, 0);
    }

    #[test]
    fn default_state_keeps_uniform_image() {
        if !is_available() {
            return;
        }
        let src = ImageBuffer::from_pixel(20, 20, Rgba([120, 90, 60, 255]));
        let mut backend = backend_with(&src);
        let outcome = render(&mut backend, &FilterState::default(), false);
        assert_eq!(outcome, FrameOutcome::Presented { blurred: false });
        let out = backend.read_bitmap().unwrap().unwrap();
        assert_rgba_close(&src, &out, 4);
    }

    #[test]
    fn show_original_is_close_to_source() {
        if !is_available() {
            return;
        }
        let src = gradient(32, 24);
        let mut backend = backend_with(&src);
        let mut state = FilterState::default();
        state.exposure = 80;
        state.vignette = 100;
        state.sharpen = 100;
        state.blur_type = BlurType::Radial;
        let outcome = render(&mut backend, &state, true);
        assert_eq!(outcome, FrameOutcome::Presented { blurred: false });
        let out = backend.read_bitmap().unwrap().unwrap();
        // Only the 8-bit HSV round trip separates output from input.
        assert_rgba_close(&src, &out, 6);
    }

    #[test]
    fn positive_exposure_brightens() {
        if !is_available() {
            return;
        }
        let src = ImageBuffer::from_pixel(16, 16, Rgba([100, 100, 100, 255]));
        let mut backend = backend_with(&src);
        let mut state = FilterState::default();
        state.exposure = 60;
        render(&mut backend, &state, false);
        let out = backend.read_bitmap().unwrap().unwrap();
        let px = out.get_pixel(8, 8);
        assert!(px[0] > 110, "expected brighter pixel, got {:?}", px);
    }

    #[test]
    fn blur_on_uniform_image_is_identity() {
        if !is_available() {
            return;
        }
        let src = ImageBuffer::from_pixel(32, 32, Rgba([70, 140, 210, 255]));
        let mut backend = backend_with(&src);
        let mut state = FilterState::default();
        state.blur_type = BlurType::Linear;
        let outcome = render(&mut backend, &state, false);
        assert_eq!(outcome, FrameOutcome::Presented { blurred: true });
        let out = backend.read_bitmap().unwrap().unwrap();
        assert_rgba_close(&src, &out, 4);
    }

    #[test]
    fn release_allows_reinit() {
        if !is_available() {
            return;
        }
        let src = gradient(8, 8);
        let mut backend = backend_with(&src);
        backend.release();
        assert!(backend.read_bitmap().unwrap().is_none());
        backend.init(RenderSurface::offscreen(8, 8)).unwrap();
        backend.load_image(&src).unwrap();
        assert!(backend.read_bitmap().unwrap().is_some());
    }

    fn assert_rgba_close(expected: &RgbaImage, actual: &RgbaImage, tolerance: u8) {
        assert_eq!(expected.dimensions(), actual.dimensions());
        for (e, a) in expected.pixels().zip(actual.pixels()) {
            for i in 0..4 {
                let d = e[i].abs_diff(a[i]);
                assert!(
                    d <= tolerance,
                    "channel {} differed by {} (expected={}, actual={}, tol={})",
                    i,
                    d,
                    e[i],
                    a[i],
                    tolerance
                );
            }
        }
    }
}
