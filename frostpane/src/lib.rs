//! frostpane applies real-time Gaussian blur to rectangular screen regions
//! as part of a compositor's visual-effects layer: translucent panels,
//! shaped window backgrounds, blurred wallpaper.
//!
//! # How it works
//!
//! The blur is a separable convolution run at a downscaled working
//! resolution: a truncated-binomial approximation of the Gaussian kernel
//! is derived from an integer radius ([`build_kernel`]), then applied as a
//! vertical pass followed by a horizontal pass over a pair of ping-pong
//! offscreen targets, optionally for several rounds to compound the
//! effective width. Dirty tracking keeps the expensive steps (frame
//! capture, convolution) from re-running when nothing they depend on
//! changed.
//!
//! # Usage
//!
//! Create a [`ProgramCache`] (shared between regions), a [`BlurRegion`]
//! per blurred area, and call [`BlurRegion::paint`] once per frame from
//! the compositor's paint cycle:
//!
//! ```rust,ignore
//! use frostpane::{BlurConfig, BlurRegion, PaintContext, ProgramCache, Px, PxRect, PxSize};
//!
//! let programs = ProgramCache::new();
//! let mut region = BlurRegion::new(BlurConfig::window_background(), programs.clone());
//! region.set_radius(5)?;
//! region.set_rounds(4)?;
//!
//! // Once per frame, after the content beneath the region is drawn:
//! region.paint(
//!     &PaintContext {
//!         device: &device,
//!         queue: &queue,
//!         frame_texture: &frame_texture,
//!         frame_view: &frame_view,
//!         frame_size: PxSize::new(Px(1920), Px(1080)),
//!     },
//!     PxRect::new(Px(100), Px(100), Px(640), Px(400)),
//!     1.0,
//! )?;
//! ```
//!
//! The engine is frame-synchronous and single-threaded: every operation
//! runs inside the paint cycle, and the only blocking is the explicit GPU
//! completion wait between aliasing convolution rounds.

pub mod config;
pub mod dirty;
pub mod error;
pub mod kernel;
pub mod px;
pub mod region;
pub mod renderer;

pub use config::{BlurConfig, SurfaceOrigin};
pub use dirty::{DirtyFlags, DirtyTracker};
pub use error::BlurError;
pub use kernel::{BlurKernel, KernelTap, MAX_KERNEL_RADIUS, build_kernel};
pub use px::{Px, PxPosition, PxRect, PxSize};
pub use region::{BLUR_PADDING, BlurRegion, MAX_ROUNDS, MIN_ROUNDS};
pub use renderer::PaintContext;
pub use renderer::programs::{PassDirection, ProgramCache, ProgramKey};

// Re-exported so hosts do not need to pin the same wgpu version
// themselves.
pub use wgpu;
