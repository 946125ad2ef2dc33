//! Final composite of the blurred result onto the frame.
//!
//! Every paint ends here: the blurred texture (or the raw capture when
//! blur is disabled or degraded) is drawn over the region at paint
//! opacity, optionally modulated by an externally supplied alpha mask.
//! Regions hanging past the top or left frame edge get their texture
//! windows remapped so the visible part lines up with the clipped capture.

use image::GrayImage;

use crate::config::SurfaceOrigin;
use crate::error::BlurError;
use crate::px::{Px, PxRect, PxSize};
use crate::renderer::PaintContext;
use crate::renderer::programs::ProgramCache;
use crate::renderer::targets::create_texture_checked;

// Uniform layout must match the CompositeUniforms struct in the composite
// shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    dest_rect: [f32; 4],
    content_uv: [f32; 4],
    mask_uv: [f32; 4],
    frame_size: [f32; 2],
    opacity: f32,
    _padding: f32,
}

/// Texture windows for a partially off-screen region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct UvWindows {
    /// Content window endpoints as `[u0, v0, u1, v1]`.
    pub content: [f32; 4],
    /// Mask window endpoints as `[u0, v0, u1, v1]`.
    pub mask: [f32; 4],
    /// Pixel shift applied to the draw rectangle origin.
    pub dest_offset: [f32; 2],
}

/// Computes the texture windows for `region`.
///
/// A region whose left or top edge is off-frame draws shifted to the
/// visible edge: the mask window starts at the hidden fraction and the
/// content window is shortened by it, since the clipped capture only holds
/// the visible pixels.
pub(crate) fn remap_partial_offscreen(region: PxRect) -> UvWindows {
    let mut windows = UvWindows {
        content: [0.0, 0.0, 1.0, 1.0],
        mask: [0.0, 0.0, 1.0, 1.0],
        dest_offset: [0.0, 0.0],
    };
    let width = region.width.to_f32();
    let height = region.height.to_f32();
    if width <= 0.0 || height <= 0.0 {
        return windows;
    }

    if region.x.raw() < 0 {
        let hidden = (-region.x.raw()) as f32 / width;
        windows.dest_offset[0] = hidden * width;
        windows.mask[0] = hidden;
        windows.content[2] = 1.0 - hidden;
    }
    if region.y.raw() < 0 {
        let hidden = (-region.y.raw()) as f32 / height;
        windows.dest_offset[1] = hidden * height;
        windows.mask[1] = hidden;
        windows.content[3] = 1.0 - hidden;
    }
    windows
}

/// Mirrors a `[u0, v0, u1, v1]` window vertically for bottom-left-origin
/// captures.
pub(crate) fn flip_window_v(window: [f32; 4]) -> [f32; 4] {
    [window[0], 1.0 - window[1], window[2], 1.0 - window[3]]
}

/// An uploaded alpha mask for shaped-region blur.
#[derive(Debug)]
pub(crate) struct MaskTexture {
    pub view: wgpu::TextureView,
    size: PxSize,
}

impl MaskTexture {
    pub fn size(&self) -> PxSize {
        self.size
    }
}

/// Uploads `mask` into an R8 texture. The mask is consumed here as a
/// plain alpha raster; rasterizing shapes into it is the host's business.
pub(crate) fn upload_mask(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mask: &GrayImage,
) -> Result<MaskTexture, BlurError> {
    let (width, height) = mask.dimensions();
    let texture = create_texture_checked(
        device,
        &wgpu::TextureDescriptor {
            label: Some("blur_mask_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        "mask texture",
    )?;
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        mask.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(MaskTexture {
        view,
        size: PxSize::new(Px(width as i32), Px(height as i32)),
    })
}

/// Draws the final composite into the frame.
pub(crate) struct MaskCompositor {
    uniforms: Option<wgpu::Buffer>,
}

impl MaskCompositor {
    pub fn new() -> Self {
        Self { uniforms: None }
    }

    /// Drops the compositor's GPU resources.
    pub fn release(&mut self) {
        self.uniforms = None;
    }

    /// Draws `content` over `region` at `opacity`, modulated by `mask`
    /// when one is set. The draw is scissored to the visible part of the
    /// region; a region with no visible part draws nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        ctx: &PaintContext<'_>,
        content: &wgpu::TextureView,
        mask: Option<&MaskTexture>,
        region: PxRect,
        opacity: f32,
        origin: SurfaceOrigin,
        programs: &ProgramCache,
    ) {
        let windows = remap_partial_offscreen(region);
        let content_uv = match origin {
            SurfaceOrigin::TopLeft => windows.content,
            SurfaceOrigin::BottomLeft => flip_window_v(windows.content),
        };
        let dest_rect = [
            region.x.to_f32() + windows.dest_offset[0],
            region.y.to_f32() + windows.dest_offset[1],
            region.width.to_f32(),
            region.height.to_f32(),
        ];

        let frame_rect = PxRect::new(
            Px::ZERO,
            Px::ZERO,
            ctx.frame_size.width,
            ctx.frame_size.height,
        );
        let Some(scissor) = region.intersect(&frame_rect) else {
            return;
        };

        let uniforms = self.uniforms.get_or_insert_with(|| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("blur_composite_uniforms"),
                size: std::mem::size_of::<CompositeUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let contents = CompositeUniforms {
            dest_rect,
            content_uv,
            mask_uv: windows.mask,
            frame_size: ctx.frame_size.to_f32_arr2(),
            opacity,
            _padding: 0.0,
        };
        ctx.queue
            .write_buffer(uniforms, 0, bytemuck::cast_slice(&[contents]));

        let base = programs.base(ctx.device);
        let program =
            programs.composite_program(ctx.device, ctx.frame_texture.format(), mask.is_some());

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(content),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&base.sampler),
            },
        ];
        if let Some(mask) = mask {
            entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&mask.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(&base.sampler),
            });
        }
        let layout = if mask.is_some() {
            &base.masked_layout
        } else {
            &base.composite_layout
        };
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &entries,
            label: Some("blur_composite_bind_group"),
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("blur_composite_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blur_composite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: ctx.frame_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_scissor_rect(
                scissor.x.raw() as u32,
                scissor.y.raw() as u32,
                scissor.width.raw() as u32,
                scissor.height.raw() as u32,
            );
            pass.draw(0..6, 0..1);
        }
        ctx.queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_visible_region_keeps_identity_windows() {
        let windows = remap_partial_offscreen(PxRect::new(Px(100), Px(50), Px(400), Px(300)));
        assert_eq!(windows.content, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(windows.mask, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(windows.dest_offset, [0.0, 0.0]);
    }

    #[test]
    fn left_overhang_shifts_mask_and_trims_content() {
        let windows = remap_partial_offscreen(PxRect::new(Px(-100), Px(0), Px(400), Px(300)));
        assert_eq!(windows.mask[0], 0.25);
        assert_eq!(windows.content[2], 0.75);
        assert_eq!(windows.dest_offset[0], 100.0);
        // Vertical axis untouched.
        assert_eq!(windows.mask[1], 0.0);
        assert_eq!(windows.content[3], 1.0);
    }

    #[test]
    fn top_overhang_shifts_mask_and_trims_content() {
        let windows = remap_partial_offscreen(PxRect::new(Px(0), Px(-75), Px(400), Px(300)));
        assert_eq!(windows.mask[1], 0.25);
        assert_eq!(windows.content[3], 0.75);
        assert_eq!(windows.dest_offset[1], 75.0);
    }

    #[test]
    fn both_axes_remap_independently() {
        let windows = remap_partial_offscreen(PxRect::new(Px(-200), Px(-150), Px(400), Px(300)));
        assert_eq!(windows.mask[0], 0.5);
        assert_eq!(windows.mask[1], 0.5);
        assert_eq!(windows.content[2], 0.5);
        assert_eq!(windows.content[3], 0.5);
        assert_eq!(windows.dest_offset, [200.0, 150.0]);
    }

    #[test]
    fn degenerate_region_keeps_identity_windows() {
        let windows = remap_partial_offscreen(PxRect::new(Px(-10), Px(-10), Px(0), Px(0)));
        assert_eq!(windows.content, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn vertical_flip_mirrors_window_endpoints() {
        assert_eq!(flip_window_v([0.0, 0.0, 1.0, 1.0]), [0.0, 1.0, 1.0, 0.0]);
        assert_eq!(flip_window_v([0.2, 0.25, 0.8, 0.75]), [0.2, 0.75, 0.8, 0.25]);
    }
}
