//! Frame capture: copying the composited pixels under a region.
//!
//! The capture is a copy, never a reference; the blurred result of a frame
//! must not change retroactively when later draws touch the framebuffer.
//! The copy window is clipped against the frame bounds, and on
//! bottom-left-origin backends the source row offset is mirrored so the
//! convolution passes and the final composite agree on orientation.

use tracing::trace;

use crate::config::SurfaceOrigin;
use crate::error::BlurError;
use crate::px::{Px, PxRect, PxSize};
use crate::renderer::PaintContext;
use crate::renderer::targets::create_texture_checked;

/// A copy of the on-screen pixels under the blurred region.
#[derive(Debug)]
pub(crate) struct SourceCapture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    size: PxSize,
    /// The clipped window actually copied, in framebuffer coordinates.
    pub rect: PxRect,
}

impl SourceCapture {
    /// Dimensions of the capture texture (the nominal region size).
    pub fn size(&self) -> PxSize {
        self.size
    }
}

/// Clips `region` against the frame and converts it to the framebuffer's
/// row convention. Returns `None` when the region lies entirely outside
/// the frame.
pub(crate) fn capture_source_rect(
    region: PxRect,
    frame: PxSize,
    origin: SurfaceOrigin,
) -> Option<PxRect> {
    let frame_rect = PxRect::new(Px::ZERO, Px::ZERO, frame.width, frame.height);
    let clipped = region.intersect(&frame_rect)?;
    let y = match origin {
        SurfaceOrigin::TopLeft => clipped.y,
        SurfaceOrigin::BottomLeft => frame.height - clipped.y - clipped.height,
    };
    Some(PxRect::new(clipped.x, y, clipped.width, clipped.height))
}

/// Captures the frame pixels under `region`.
///
/// `previous` is reused when its dimensions and format still match, so a
/// steady-state region re-captures without reallocating. Returns
/// `Ok(None)` for regions entirely off-frame; the caller skips all blur
/// work for that paint.
pub(crate) fn capture(
    ctx: &PaintContext<'_>,
    region: PxRect,
    origin: SurfaceOrigin,
    previous: Option<SourceCapture>,
) -> Result<Option<SourceCapture>, BlurError> {
    let Some(source_rect) = capture_source_rect(region, ctx.frame_size, origin) else {
        trace!("blur region entirely off-frame, skipping capture");
        return Ok(None);
    };

    let size = PxSize::new(region.width.max(Px(1)), region.height.max(Px(1)));
    let format = ctx.frame_texture.format();
    let capture = match previous {
        Some(existing) if existing.size == size && existing.texture.format() == format => {
            SourceCapture {
                rect: source_rect,
                ..existing
            }
        }
        _ => {
            let texture = create_texture_checked(
                ctx.device,
                &wgpu::TextureDescriptor {
                    label: Some("blur_source_capture"),
                    size: wgpu::Extent3d {
                        width: size.width.raw() as u32,
                        height: size.height.raw() as u32,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                "source capture",
            )?;
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            SourceCapture {
                texture,
                view,
                size,
                rect: source_rect,
            }
        }
    };

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blur_capture_encoder"),
        });
    encoder.copy_texture_to_texture(
        wgpu::TexelCopyTextureInfo {
            texture: ctx.frame_texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: source_rect.x.raw() as u32,
                y: source_rect.y.raw() as u32,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyTextureInfo {
            texture: &capture.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::Extent3d {
            width: source_rect.width.raw() as u32,
            height: source_rect.height.raw() as u32,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(Some(encoder.finish()));

    Ok(Some(capture))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: PxSize = PxSize::new(Px(1920), Px(1080));

    #[test]
    fn fully_visible_region_is_unchanged_top_left() {
        let region = PxRect::new(Px(100), Px(200), Px(300), Px(150));
        assert_eq!(
            capture_source_rect(region, FRAME, SurfaceOrigin::TopLeft),
            Some(region)
        );
    }

    #[test]
    fn partially_offscreen_region_is_clipped() {
        let region = PxRect::new(Px(-50), Px(-20), Px(100), Px(100));
        assert_eq!(
            capture_source_rect(region, FRAME, SurfaceOrigin::TopLeft),
            Some(PxRect::new(Px(0), Px(0), Px(50), Px(80)))
        );

        let region = PxRect::new(Px(1900), Px(1060), Px(100), Px(100));
        assert_eq!(
            capture_source_rect(region, FRAME, SurfaceOrigin::TopLeft),
            Some(PxRect::new(Px(1900), Px(1060), Px(20), Px(20)))
        );
    }

    #[test]
    fn offscreen_region_yields_none() {
        for region in [
            PxRect::new(Px(-200), Px(0), Px(100), Px(100)),
            PxRect::new(Px(0), Px(2000), Px(100), Px(100)),
            PxRect::new(Px(5000), Px(5000), Px(100), Px(100)),
        ] {
            assert_eq!(
                capture_source_rect(region, FRAME, SurfaceOrigin::TopLeft),
                None
            );
            assert_eq!(
                capture_source_rect(region, FRAME, SurfaceOrigin::BottomLeft),
                None
            );
        }
    }

    #[test]
    fn bottom_left_origin_mirrors_the_row_offset() {
        let region = PxRect::new(Px(100), Px(100), Px(200), Px(200));
        assert_eq!(
            capture_source_rect(region, FRAME, SurfaceOrigin::BottomLeft),
            Some(PxRect::new(Px(100), Px(780), Px(200), Px(200)))
        );
    }

    #[test]
    fn bottom_left_clip_stays_inside_the_frame() {
        // Hangs off the bottom edge: the flipped offset lands on row 0.
        let region = PxRect::new(Px(0), Px(1000), Px(100), Px(200));
        assert_eq!(
            capture_source_rect(region, FRAME, SurfaceOrigin::BottomLeft),
            Some(PxRect::new(Px(0), Px(0), Px(100), Px(80)))
        );
    }
}
