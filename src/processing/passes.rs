use std::sync::mpsc;

use image::RgbaImage;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::{
    engine::{Frame, FrameOutcome},
    error::FrameError,
    processing::{
        cdt,
        gpu_pipeline::{GpuContext, PresentTarget, Program, WORK_FORMAT},
        params::FrameParams,
    },
    state::BlurType,
};

/// Width of the inactive curve lookup texture.
const CURVE_WIDTH: u32 = 200;

// Slot roles within `ImageResources::render`.
const SLOT_SCRATCH: usize = 0;
const SLOT_MAIN: usize = 1;
const SLOT_BLURRED: usize = 2;

struct PooledTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl PooledTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: WORK_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Per-image texture pool, allocated at the image size on every load.
///
/// Slot 1 starts out holding the source and afterwards holds the toned
/// result; slot 0 is scratch and the selective blur output; slot 2 keeps
/// the fully blurred copy between frames.
pub(crate) struct ImageResources {
    render: [PooledTexture; 3],
    hsv: PooledTexture,
    lookup: PooledTexture,
    curve: PooledTexture,
    width: u32,
    height: u32,
    composite_slot: usize,
}

impl ImageResources {
    pub(crate) fn upload(ctx: &GpuContext, image: &RgbaImage) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyImage);
        }
        let max = ctx.max_texture_dimension();
        if width > max || height > max {
            return Err(FrameError::ImageTooLarge { width, height, max });
        }

        let render_usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        let device = &ctx.device;
        let render = [
            PooledTexture::new(device, "filter_engine_render_0", width, height, render_usage),
            PooledTexture::new(device, "filter_engine_render_1", width, height, render_usage),
            PooledTexture::new(device, "filter_engine_render_2", width, height, render_usage),
        ];
        let hsv = PooledTexture::new(
            device,
            "filter_engine_hsv",
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );
        let lookup_usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let lookup = PooledTexture::new(
            device,
            "filter_engine_lookup",
            cdt::LOOKUP_WIDTH,
            cdt::LOOKUP_HEIGHT,
            lookup_usage,
        );
        let curve = PooledTexture::new(device, "filter_engine_curve", CURVE_WIDTH, 1, lookup_usage);

        write_rgba(&ctx.queue, &render[SLOT_MAIN].texture, image.as_raw(), width, height);
        write_rgba(
            &ctx.queue,
            &curve.texture,
            &identity_curve(),
            CURVE_WIDTH,
            1,
        );
        debug!(width, height, "texture pool allocated");

        Ok(Self {
            render,
            hsv,
            lookup,
            curve,
            width,
            height,
            composite_slot: SLOT_MAIN,
        })
    }
}

/// Runs the full pass chain for one frame and presents the result.
///
/// The histogram is rebuilt only when the cache says so. A failed lookup
/// leaves the enhance pass running against the previous (or zeroed) table.
pub(crate) fn render_frame(
    ctx: &mut GpuContext,
    res: &mut ImageResources,
    frame: &mut Frame<'_>,
) -> Result<FrameOutcome, FrameError> {
    let params = FrameParams::resolve(frame.state, frame.show_original, res.width, res.height);

    if !frame.cache.histogram_generated() {
        refresh_histogram(ctx, res, frame);
    }

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("filter_engine_frame"),
        });

    draw(
        ctx,
        &mut encoder,
        &ctx.programs.enhance,
        "enhance",
        &[&res.hsv.view, &res.lookup.view],
        Some(bytemuck::bytes_of(&params.enhance)),
        &res.render[SLOT_MAIN].view,
    );
    draw(
        ctx,
        &mut encoder,
        &ctx.programs.sharpen,
        "sharpen",
        &[&res.render[SLOT_MAIN].view],
        Some(bytemuck::bytes_of(&params.sharpen)),
        &res.render[SLOT_SCRATCH].view,
    );
    draw(
        ctx,
        &mut encoder,
        &ctx.programs.tools,
        "tools",
        &[&res.render[SLOT_SCRATCH].view, &res.curve.view],
        Some(bytemuck::bytes_of(&params.tools)),
        &res.render[SLOT_MAIN].view,
    );

    let selective = match params.blur_type {
        BlurType::None => None,
        BlurType::Radial => Some(&ctx.programs.radial_blur),
        BlurType::Linear => Some(&ctx.programs.linear_blur),
    };
    let blurred = if let Some(program) = selective {
        if frame.cache.blur_stale {
            draw(
                ctx,
                &mut encoder,
                &ctx.programs.blur,
                "blur_horizontal",
                &[&res.render[SLOT_MAIN].view],
                Some(bytemuck::bytes_of(&params.blur_horizontal)),
                &res.render[SLOT_SCRATCH].view,
            );
            draw(
                ctx,
                &mut encoder,
                &ctx.programs.blur,
                "blur_vertical",
                &[&res.render[SLOT_SCRATCH].view],
                Some(bytemuck::bytes_of(&params.blur_vertical)),
                &res.render[SLOT_BLURRED].view,
            );
            frame.cache.blur_stale = false;
        }
        draw(
            ctx,
            &mut encoder,
            program,
            "selective_blur",
            &[&res.render[SLOT_MAIN].view, &res.render[SLOT_BLURRED].view],
            Some(bytemuck::bytes_of(&params.selective)),
            &res.render[SLOT_SCRATCH].view,
        );
        true
    } else {
        false
    };
    res.composite_slot = if blurred { SLOT_SCRATCH } else { SLOT_MAIN };
    ctx.queue.submit([encoder.finish()]);

    present(ctx, res, frame.surface_size)?;
    Ok(FrameOutcome::Presented { blurred })
}

/// Reads the currently composited slot back into an image.
pub(crate) fn read_composite(
    ctx: &GpuContext,
    res: &ImageResources,
) -> Result<RgbaImage, FrameError> {
    let texture = &res.render[res.composite_slot].texture;
    let bytes = read_texture(ctx, texture, res.width, res.height)?;
    RgbaImage::from_raw(res.width, res.height, bytes).ok_or(FrameError::ReadbackAbandoned)
}

fn refresh_histogram(ctx: &GpuContext, res: &ImageResources, frame: &mut Frame<'_>) {
    if !frame.cache.hsv_ready {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter_engine_hsv"),
            });
        draw(
            ctx,
            &mut encoder,
            &ctx.programs.rgb_to_hsv,
            "rgb_to_hsv",
            &[&res.render[SLOT_MAIN].view],
            None,
            &res.hsv.view,
        );
        ctx.queue.submit([encoder.finish()]);
        frame.cache.hsv_ready = true;
    }

    let hsv = match read_texture(ctx, &res.hsv.texture, res.width, res.height) {
        Ok(hsv) => hsv,
        Err(err) => {
            warn!(error = %err, "hsv readback failed; keeping previous lookup");
            return;
        }
    };
    match cdt::compute_cdt(&hsv, res.width, res.height) {
        Ok(lookup) => {
            write_rgba(
                &ctx.queue,
                &res.lookup.texture,
                &lookup,
                cdt::LOOKUP_WIDTH,
                cdt::LOOKUP_HEIGHT,
            );
            frame.cache.lookup_ready = true;
            debug!("enhance lookup regenerated");
        }
        Err(err) => warn!(error = %err, "cdt computation failed; keeping previous lookup"),
    }
}

fn present(
    ctx: &mut GpuContext,
    res: &ImageResources,
    surface_size: (u32, u32),
) -> Result<(), FrameError> {
    ctx.resize_target(surface_size.0, surface_size.1);
    let source = &res.render[res.composite_slot].view;

    let surface_texture = match &ctx.target {
        PresentTarget::Window { surface, .. } => match surface.get_current_texture() {
            Ok(texture) => Some(texture),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                ctx.recover_surface();
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        },
        PresentTarget::Offscreen { .. } => None,
    };

    let target_view = match (&surface_texture, &ctx.target) {
        (Some(texture), _) => texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default()),
        (None, PresentTarget::Offscreen { texture, .. }) => {
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        }
        (None, PresentTarget::Window { .. }) => return Err(FrameError::NotInitialized),
    };

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("filter_engine_present"),
        });
    draw(
        ctx,
        &mut encoder,
        &ctx.programs.present,
        "present",
        &[source],
        None,
        &target_view,
    );
    ctx.queue.submit([encoder.finish()]);
    if let Some(texture) = surface_texture {
        texture.present();
    }
    Ok(())
}

/// Records one full-screen draw of `program` into `target`.
fn draw(
    ctx: &GpuContext,
    encoder: &mut wgpu::CommandEncoder,
    program: &Program,
    label: &str,
    inputs: &[&wgpu::TextureView],
    uniforms: Option<&[u8]>,
    target: &wgpu::TextureView,
) {
    let uniform_buffer = uniforms.map(|contents| {
        ctx.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
    });

    let mut entries = Vec::with_capacity(inputs.len() + 2);
    entries.push(wgpu::BindGroupEntry {
        binding: 0,
        resource: wgpu::BindingResource::Sampler(&ctx.sampler),
    });
    for (i, view) in inputs.iter().copied().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        });
    }
    if let Some(buffer) = &uniform_buffer {
        entries.push(wgpu::BindGroupEntry {
            binding: inputs.len() as u32 + 1,
            resource: buffer.as_entire_binding(),
        });
    }
    let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &program.layout,
        entries: &entries,
    });

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(&program.pipeline);
    pass.set_bind_group(0, &bind_group, &[]);
    pass.set_vertex_buffer(0, ctx.quad.slice(..));
    pass.draw(0..4, 0..1);
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8], width: u32, height: u32) {
    queue.write_texture(
        texture.as_image_copy(),
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width.saturating_mul(4)),
            rows_per_image: Some(height),
        },
        extent(width, height),
    );
}

fn identity_curve() -> Vec<u8> {
    (0..CURVE_WIDTH)
        .flat_map(|i| {
            let v = (i * 255 / (CURVE_WIDTH - 1)) as u8;
            [v, v, v, v]
        })
        .collect()
}

/// Copies a texture into a mapped buffer, stripping the row padding.
fn read_texture(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, FrameError> {
    let unpadded_bytes_per_row = width.saturating_mul(4);
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("filter_engine_readback"),
        size: padded_bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("filter_engine_readback"),
        });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        extent(width, height),
    );
    ctx.queue.submit([encoder.finish()]);

    let slice = readback.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = ctx.device.poll(wgpu::Maintain::wait());
    rx.recv().map_err(|_| FrameError::ReadbackAbandoned)??;

    let mapped = slice.get_mapped_range();
    let unpadded = unpadded_bytes_per_row as usize;
    let padded = padded_bytes_per_row as usize;
    let mut out = vec![0_u8; unpadded * height as usize];
    for row in 0..height as usize {
        let src_offset = row * padded;
        let dst_offset = row * unpadded;
        out[dst_offset..dst_offset + unpadded]
            .copy_from_slice(&mapped[src_offset..src_offset + unpadded]);
    }
    drop(mapped);
    readback.unmap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_curve_spans_full_range() {
        let curve = identity_curve();
        assert_eq!(curve.len(), CURVE_WIDTH as usize * 4);
        assert_eq!(&curve[..4], &[0, 0, 0, 0]);
        assert_eq!(&curve[curve.len() - 4..], &[255, 255, 255, 255]);
    }

    #[test]
    fn slots_are_distinct() {
        assert_ne!(SLOT_SCRATCH, SLOT_MAIN);
        assert_ne!(SLOT_MAIN, SLOT_BLURRED);
        assert_ne!(SLOT_SCRATCH, SLOT_BLURRED);
    }
}
