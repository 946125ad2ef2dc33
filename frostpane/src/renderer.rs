//! GPU side of the blur engine.
//!
//! Everything under this module speaks `wgpu` directly: program synthesis
//! and caching, the ping-pong working targets, the separable convolution
//! passes, frame capture and the final masked composite. The pure parts
//! (kernel math, dirty tracking, configuration) live outside it and carry
//! no GPU types.

use crate::px::PxSize;

pub mod capture;
pub mod composite;
pub mod convolve;
pub mod programs;
pub mod targets;

/// The host renderer surface handed to [`crate::BlurRegion::paint`] once
/// per frame.
///
/// `frame_texture` is the texture currently being composited. It must be
/// created with `COPY_SRC` (captures read from it) in addition to
/// `RENDER_ATTACHMENT` (the final composite draws into `frame_view`).
pub struct PaintContext<'a> {
    /// Device owning every resource the engine allocates.
    pub device: &'a wgpu::Device,
    /// Queue used for uniform uploads and pass submission.
    pub queue: &'a wgpu::Queue,
    /// The texture currently being composited.
    pub frame_texture: &'a wgpu::Texture,
    /// Render-attachment view of `frame_texture`.
    pub frame_view: &'a wgpu::TextureView,
    /// Pixel dimensions of the composited frame.
    pub frame_size: PxSize,
}
