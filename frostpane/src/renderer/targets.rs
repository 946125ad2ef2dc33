//! Ping-pong working targets for the convolution passes.
//!
//! The two targets always share identical dimensions and are recreated
//! together; a failed allocation leaves no partial pair behind. They live
//! at the downscaled working resolution, which is both the main
//! performance lever (fewer fragments per pass) and a softening effect in
//! its own right, since upscaling the result at composite time broadens
//! the perceived kernel.

use tracing::debug;

use crate::error::BlurError;
use crate::px::{Px, PxSize};

/// Creates a texture inside OOM/validation error scopes, so an exhausted
/// or invalid allocation surfaces as [`BlurError::AllocationFailed`]
/// instead of a deferred device error.
pub(crate) fn create_texture_checked(
    device: &wgpu::Device,
    descriptor: &wgpu::TextureDescriptor<'_>,
    what: &'static str,
) -> Result<wgpu::Texture, BlurError> {
    let validation_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let oom_scope = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let texture = device.create_texture(descriptor);
    let oom = pollster::block_on(oom_scope.pop());
    let validation = pollster::block_on(validation_scope.pop());
    if let Some(error) = oom.or(validation) {
        return Err(BlurError::AllocationFailed {
            what,
            width: descriptor.size.width,
            height: descriptor.size.height,
            reason: error.to_string(),
        });
    }
    Ok(texture)
}

/// Downscaled resolution the convolution passes run at: the region size
/// right-shifted by the configured amount, floored at one pixel.
pub(crate) fn working_size(region: PxSize, downscale: u32) -> PxSize {
    let shift = downscale.min(8);
    PxSize::new(
        Px(region.width.raw() >> shift).max(Px(1)),
        Px(region.height.raw() >> shift).max(Px(1)),
    )
}

/// One offscreen render target of the ping-pong pair.
#[derive(Debug)]
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// The "A"/"B" ping-pong pair, exclusively owned by one convolution
/// pipeline.
#[derive(Debug)]
pub(crate) struct WorkingTargets {
    size: PxSize,
    pub a: RenderTarget,
    pub b: RenderTarget,
}

impl WorkingTargets {
    /// Allocates both targets at `size`. On any failure the partially
    /// created resources are dropped and nothing is returned.
    pub fn create(device: &wgpu::Device, size: PxSize) -> Result<Self, BlurError> {
        let a = create_target(device, size, "blur_working_target_a")?;
        let b = create_target(device, size, "blur_working_target_b")?;
        debug!(
            width = size.width.raw(),
            height = size.height.raw(),
            "created blur working targets"
        );
        Ok(Self { size, a, b })
    }

    /// Pixel dimensions shared by both targets.
    pub fn size(&self) -> PxSize {
        self.size
    }
}

fn create_target(
    device: &wgpu::Device,
    size: PxSize,
    label: &'static str,
) -> Result<RenderTarget, BlurError> {
    let texture = create_texture_checked(
        device,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width.raw().max(1) as u32,
                height: size.height.raw().max(1) as u32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        "working target",
    )?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(RenderTarget { texture, view })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_size_applies_shift_with_floor() {
        let region = PxSize::new(Px(1920), Px(1080));
        assert_eq!(working_size(region, 0), region);
        assert_eq!(working_size(region, 1), PxSize::new(Px(960), Px(540)));
        assert_eq!(working_size(region, 2), PxSize::new(Px(480), Px(270)));
    }

    #[test]
    fn working_size_never_collapses_to_zero() {
        let tiny = PxSize::new(Px(3), Px(1));
        assert_eq!(working_size(tiny, 2), PxSize::new(Px(1), Px(1)));
        assert_eq!(working_size(PxSize::ZERO, 2), PxSize::new(Px(1), Px(1)));
    }
}
