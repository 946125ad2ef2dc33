//! The host-facing blurred region.
//!
//! A [`BlurRegion`] is the engine's unit of work: one rectangular screen
//! area that paints a blurred copy of whatever the compositor has already
//! drawn beneath it. The host owns position, size, visibility and paint
//! opacity; it feeds geometry and damage in through the setters and calls
//! [`BlurRegion::paint`] once per frame.
//!
//! All setters are synchronous and only record invalidation flags; the
//! actual GPU work happens inside the next paint, gated by what the flags
//! imply. Allocation failures never escape a paint: the region degrades to
//! drawing the unblurred capture (or nothing) for that frame and retries
//! from scratch on the next one.

use image::GrayImage;
use tracing::{debug, warn};

use crate::config::BlurConfig;
use crate::dirty::{DirtyFlags, DirtyTracker};
use crate::error::BlurError;
use crate::kernel::{BlurKernel, MAX_KERNEL_RADIUS, build_kernel};
use crate::px::{Px, PxRect};
use crate::renderer::PaintContext;
use crate::renderer::capture::{self, SourceCapture};
use crate::renderer::composite::{MaskCompositor, MaskTexture, upload_mask};
use crate::renderer::convolve::ConvolutionPipeline;
use crate::renderer::programs::ProgramCache;
use crate::renderer::targets::working_size;

/// Smallest accepted round count.
pub const MIN_ROUNDS: u32 = 1;
/// Largest accepted round count.
pub const MAX_ROUNDS: u32 = 100;

/// Pixels the blur bleeds past the region edge; hosts should grow damage
/// and paint volumes by this much.
pub const BLUR_PADDING: Px = Px(2);

/// One blurred screen region.
pub struct BlurRegion {
    config: BlurConfig,
    programs: ProgramCache,
    tracker: DirtyTracker,
    enabled: bool,
    radius: u32,
    rounds: u32,
    kernel: BlurKernel,
    last_rect: Option<PxRect>,
    clip: Option<PxRect>,
    capture: Option<SourceCapture>,
    convolve: ConvolutionPipeline,
    compositor: MaskCompositor,
    mask: Option<MaskTexture>,
}

impl BlurRegion {
    /// Creates a region with no blur (radius 0) and a single round.
    ///
    /// `programs` may be shared between regions so that regions with equal
    /// kernels resolve to the same compiled programs.
    pub fn new(config: BlurConfig, programs: ProgramCache) -> Self {
        let mut config = config;
        if config.radius_cap > MAX_KERNEL_RADIUS {
            warn!(
                cap = config.radius_cap,
                max = MAX_KERNEL_RADIUS,
                "radius cap exceeds kernel bound, clamping"
            );
            config.radius_cap = MAX_KERNEL_RADIUS;
        }
        Self {
            config,
            programs,
            tracker: DirtyTracker::new(),
            enabled: true,
            radius: 0,
            rounds: MIN_ROUNDS,
            kernel: BlurKernel::disabled(),
            last_rect: None,
            clip: None,
            capture: None,
            convolve: ConvolutionPipeline::new(),
            compositor: MaskCompositor::new(),
            mask: None,
        }
    }

    /// The configuration this region was created with.
    pub fn config(&self) -> &BlurConfig {
        &self.config
    }

    /// The currently requested blur radius (0 when blurring is off).
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// The current round count.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Whether the region paints at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The kernel derived from the current radius.
    pub fn kernel(&self) -> &BlurKernel {
        &self.kernel
    }

    /// Sets the blur radius. 0 disables blurring while still painting the
    /// captured content; values above the configured cap are rejected
    /// without touching existing state.
    pub fn set_radius(&mut self, radius: u32) -> Result<(), BlurError> {
        if radius > self.config.radius_cap {
            return Err(BlurError::InvalidParameter {
                param: "radius",
                value: radius as i64,
                min: 0,
                max: self.config.radius_cap as i64,
            });
        }
        if radius == self.radius {
            return Ok(());
        }
        self.radius = radius;
        self.kernel = build_kernel(radius, self.config.sigma, self.config.reduce_taps);
        debug!(radius, taps = self.kernel.radius(), "rebuilt blur kernel");
        self.tracker.mark(DirtyFlags::PARAMS);
        Ok(())
    }

    /// Sets how many vertical+horizontal pass pairs each paint runs.
    pub fn set_rounds(&mut self, rounds: u32) -> Result<(), BlurError> {
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
            return Err(BlurError::InvalidParameter {
                param: "rounds",
                value: rounds as i64,
                min: MIN_ROUNDS as i64,
                max: MAX_ROUNDS as i64,
            });
        }
        if rounds != self.rounds {
            self.rounds = rounds;
            self.tracker.mark(DirtyFlags::PARAMS);
        }
        Ok(())
    }

    /// Enables or disables the region. Disabling takes effect on the next
    /// paint, which tears down the GPU resources.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.enabled = enabled;
            self.tracker.mark(DirtyFlags::ENABLED);
        }
    }

    /// Supplies (or clears) the alpha mask for shaped-region blur.
    ///
    /// A failed upload logs a warning and leaves the region unmasked
    /// rather than failing the caller.
    pub fn set_mask(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mask: Option<&GrayImage>,
    ) {
        self.mask = match mask {
            None => None,
            Some(image) if image.width() == 0 || image.height() == 0 => {
                warn!("ignoring empty blur mask");
                None
            }
            Some(image) => match upload_mask(device, queue, image) {
                Ok(texture) => {
                    debug!(
                        width = texture.size().width.raw(),
                        height = texture.size().height.raw(),
                        "uploaded blur mask"
                    );
                    Some(texture)
                }
                Err(error) => {
                    warn!(%error, "failed to upload blur mask");
                    None
                }
            },
        };
    }

    /// Sets the host-provided clip rectangle. An empty clip skips paints
    /// entirely; `None` removes the restriction.
    pub fn set_clip(&mut self, clip: Option<PxRect>) {
        self.clip = clip;
    }

    /// Records that the screen content beneath the region changed.
    pub fn mark_content_changed(&mut self) {
        self.tracker.mark(DirtyFlags::CONTENT);
    }

    /// Records a geometry change. Also called from `paint`, so hosts only
    /// need this when they want invalidation before the next frame.
    pub fn notify_geometry(&mut self, rect: PxRect) {
        if let Some(previous) = self.last_rect {
            if previous.size() != rect.size() {
                self.tracker.mark(DirtyFlags::SIZE);
            }
            if previous.x != rect.x || previous.y != rect.y {
                self.tracker.mark(DirtyFlags::POSITION);
            }
        } else {
            self.tracker.mark(DirtyFlags::SIZE | DirtyFlags::POSITION);
        }
        self.last_rect = Some(rect);
    }

    /// The rectangle a host should damage for this region: the region
    /// grown by [`BLUR_PADDING`] on every side.
    pub fn paint_extents(&self, rect: PxRect) -> PxRect {
        PxRect::new(
            rect.x - BLUR_PADDING,
            rect.y - BLUR_PADDING,
            rect.width + BLUR_PADDING * 2,
            rect.height + BLUR_PADDING * 2,
        )
    }

    /// Paints the region onto the frame.
    ///
    /// Consumes the accumulated invalidation flags exactly once and
    /// performs the work they imply: recapture on geometry or content
    /// changes, re-blur on parameter changes, teardown when the region was
    /// disabled since the last paint.
    pub fn paint(
        &mut self,
        ctx: &PaintContext<'_>,
        rect: PxRect,
        opacity: f32,
    ) -> Result<(), BlurError> {
        if self.clip.is_some_and(|clip| clip.is_empty()) {
            return Ok(());
        }
        if rect.is_empty() {
            return Ok(());
        }
        self.notify_geometry(rect);
        let flags = self.tracker.consume();

        if flags.contains(DirtyFlags::ENABLED) && !self.enabled {
            debug!("blur region disabled, releasing resources");
            self.release_gpu_resources();
        }
        if !self.enabled {
            return Ok(());
        }

        let opacity = opacity.clamp(0.0, 1.0);

        let needs_capture = self.capture.is_none()
            || flags.intersects(
                DirtyFlags::SIZE | DirtyFlags::POSITION | DirtyFlags::CONTENT | DirtyFlags::ENABLED,
            );
        let mut captured_this_paint = false;
        if needs_capture {
            let previous = self.capture.take();
            match capture::capture(ctx, rect, self.config.surface_origin, previous) {
                Ok(Some(capture)) => {
                    self.capture = Some(capture);
                    captured_this_paint = true;
                }
                Ok(None) => return Ok(()),
                Err(error) => {
                    warn!(%error, "source capture failed, skipping paint");
                    self.release_gpu_resources();
                    return Ok(());
                }
            }
        }
        let Some(capture) = self.capture.as_ref() else {
            return Ok(());
        };

        let mut blurred = None;
        if self.kernel.is_enabled() {
            let working = working_size(capture.size(), self.config.downscale);
            let needs_reblur = captured_this_paint
                || flags.intersects(DirtyFlags::PARAMS | DirtyFlags::ENABLED)
                || !self.convolve.has_targets();
            if needs_reblur {
                match self.convolve.blur(
                    ctx.device,
                    ctx.queue,
                    &capture.view,
                    &self.kernel,
                    self.rounds,
                    working,
                    &self.programs,
                ) {
                    Ok(view) => blurred = Some(view),
                    Err(error) => {
                        warn!(%error, "blur degraded to passthrough for this frame");
                    }
                }
            } else {
                blurred = self.convolve.output();
            }
        }

        let content = blurred.unwrap_or(&capture.view);
        self.compositor.draw(
            ctx,
            content,
            self.mask.as_ref(),
            rect,
            opacity,
            self.config.surface_origin,
            &self.programs,
        );
        Ok(())
    }

    fn release_gpu_resources(&mut self) {
        self.capture = None;
        self.convolve.release();
        self.compositor.release();
    }
}
