//! Per-region blur configuration.
//!
//! Working scale, kernel sigma, the radius cap and the tap-reduction switch
//! all vary between legitimate call sites (a full-screen desktop blur wants
//! different trade-offs than a small shaped window background), so they are
//! instance configuration rather than engine constants.

use crate::kernel::MAX_KERNEL_RADIUS;

/// Vertical orientation of the host framebuffer.
///
/// Screen-space and texture-space vertical axes are conventionally opposite
/// on GL-style backends; the capture clipper and the final composite use
/// this to agree on orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceOrigin {
    /// Framebuffer row 0 is the top of the screen. No correction needed.
    #[default]
    TopLeft,
    /// Framebuffer row 0 is the bottom of the screen (GL convention).
    BottomLeft,
}

/// Configuration for one blurred region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurConfig {
    /// Largest accepted blur radius for this region. Must not exceed
    /// [`MAX_KERNEL_RADIUS`].
    pub radius_cap: u32,
    /// Right-shift applied to the region size to obtain the working
    /// resolution. 2 blurs at quarter resolution, 0 at full resolution.
    pub downscale: u32,
    /// Pixel spacing between kernel taps before reduction.
    pub sigma: f32,
    /// Merge adjacent tap pairs into bilinear-interpolated fetches,
    /// halving the texture reads per pass.
    pub reduce_taps: bool,
    /// Vertical orientation of the composited framebuffer.
    pub surface_origin: SurfaceOrigin,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self::window_background()
    }
}

impl BlurConfig {
    /// Profile for translucent window backgrounds: quarter-resolution
    /// working targets, unit tap spacing, reduced taps.
    pub const fn window_background() -> Self {
        Self {
            radius_cap: MAX_KERNEL_RADIUS,
            downscale: 2,
            sigma: 1.0,
            reduce_taps: true,
            surface_origin: SurfaceOrigin::BottomLeft,
        }
    }

    /// Profile for whole-monitor blurred wallpaper: wider tap spacing and
    /// no tap reduction, trading fetches for smoothness on large areas.
    pub const fn desktop_background() -> Self {
        Self {
            radius_cap: MAX_KERNEL_RADIUS,
            downscale: 2,
            sigma: 1.5,
            reduce_taps: false,
            surface_origin: SurfaceOrigin::BottomLeft,
        }
    }

    /// Profile for per-actor offscreen effects: full-resolution working
    /// targets with a low radius cap and wide tap spacing.
    pub const fn offscreen_effect() -> Self {
        Self {
            radius_cap: 19,
            downscale: 0,
            sigma: 2.0,
            reduce_taps: true,
            surface_origin: SurfaceOrigin::BottomLeft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_stay_within_hard_cap() {
        for config in [
            BlurConfig::window_background(),
            BlurConfig::desktop_background(),
            BlurConfig::offscreen_effect(),
        ] {
            assert!(config.radius_cap <= MAX_KERNEL_RADIUS);
            assert!(config.sigma > 0.0);
        }
    }

    #[test]
    fn default_is_window_background() {
        assert_eq!(BlurConfig::default(), BlurConfig::window_background());
    }
}
