//! Multi-round separable convolution over the ping-pong targets.
//!
//! Each round runs a vertical pass into target A and a horizontal pass
//! from A into B. Round `i > 0` reads its vertical input from round
//! `i - 1`'s horizontal output instead of the original source, which is
//! how additional rounds compound effective blur width without a wider
//! kernel. Because the read/write targets alias across rounds, every pass
//! past the first round is followed by an explicit GPU completion wait;
//! the first round's two passes never alias and are submitted together.

use tracing::warn;

use crate::error::BlurError;
use crate::kernel::{BlurKernel, MAX_KERNEL_TAPS};
use crate::px::PxSize;
use crate::renderer::programs::{PassDirection, ProgramCache, ProgramKey};
use crate::renderer::targets::WorkingTargets;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PassUniforms {
    resolution: [f32; 2],
    tap_count: f32,
    _padding: f32,
    taps: [[f32; 4]; MAX_KERNEL_TAPS],
}

/// Owns the working-target pair and drives the convolution passes.
///
/// The pipeline is frame-synchronous: `blur` runs to completion within the
/// calling paint, and a later invocation never begins while prior GPU work
/// on the same targets is still pending (the completion waits see to that
/// for the aliasing rounds, queue ordering for the rest).
pub(crate) struct ConvolutionPipeline {
    targets: Option<WorkingTargets>,
    uniforms: Option<wgpu::Buffer>,
}

impl ConvolutionPipeline {
    pub fn new() -> Self {
        Self {
            targets: None,
            uniforms: None,
        }
    }

    /// Whether a valid target pair currently exists.
    pub fn has_targets(&self) -> bool {
        self.targets.is_some()
    }

    /// The most recent blur result, if any.
    pub fn output(&self) -> Option<&wgpu::TextureView> {
        self.targets.as_ref().map(|t| &t.b.view)
    }

    /// Drops every GPU resource this pipeline holds.
    pub fn release(&mut self) {
        self.targets = None;
        self.uniforms = None;
    }

    /// Runs `rounds` vertical+horizontal pass pairs of `kernel` over
    /// `source_view` and returns the blurred result (target B).
    ///
    /// The source is never written. On allocation failure every held
    /// resource is released so the caller can fall back to passing the
    /// unblurred source through.
    #[allow(clippy::too_many_arguments)]
    pub fn blur(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source_view: &wgpu::TextureView,
        kernel: &BlurKernel,
        rounds: u32,
        working: PxSize,
        programs: &ProgramCache,
    ) -> Result<&wgpu::TextureView, BlurError> {
        debug_assert!(kernel.is_enabled());
        debug_assert!(rounds >= 1);

        if let Err(error) = self.ensure_targets(device, working) {
            warn!(%error, "blur target allocation failed, releasing targets");
            self.release();
            return Err(error);
        }
        let targets = self.targets.as_ref().expect("targets ensured above");

        let uniforms = self.uniforms.get_or_insert_with(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("blur_pass_uniforms"),
                size: std::mem::size_of::<PassUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let pass_uniforms = PassUniforms {
            resolution: working.to_f32_arr2(),
            tap_count: kernel.radius() as f32,
            _padding: 0.0,
            taps: kernel.uniform_rows(),
        };
        queue.write_buffer(uniforms, 0, bytemuck::cast_slice(&[pass_uniforms]));

        let tap_count = kernel.radius();
        let vertical = programs.blur_program(
            device,
            ProgramKey {
                direction: PassDirection::Vertical,
                tap_count,
            },
        );
        let horizontal = programs.blur_program(
            device,
            ProgramKey {
                direction: PassDirection::Horizontal,
                tap_count,
            },
        );

        let base = programs.base(device);
        let bind = |input: &wgpu::TextureView, label| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &base.blur_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&base.sampler),
                    },
                ],
                label: Some(label),
            })
        };
        let from_source = bind(source_view, "blur_bind_group_source");
        let from_b = bind(&targets.b.view, "blur_bind_group_pingpong");
        let from_a = bind(&targets.a.view, "blur_bind_group_horizontal");

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blur_pass_encoder"),
        });
        for round in 0..rounds {
            let vertical_input = if round == 0 { &from_source } else { &from_b };
            encode_pass(
                &mut encoder,
                &targets.a.view,
                &vertical.pipeline,
                vertical_input,
                "blur_vertical_pass",
            );
            if round > 0 {
                flush(device, queue, &mut encoder);
            }

            encode_pass(
                &mut encoder,
                &targets.b.view,
                &horizontal.pipeline,
                &from_a,
                "blur_horizontal_pass",
            );
            if round > 0 {
                flush(device, queue, &mut encoder);
            }
        }
        queue.submit(Some(encoder.finish()));

        Ok(&targets.b.view)
    }

    fn ensure_targets(&mut self, device: &wgpu::Device, working: PxSize) -> Result<(), BlurError> {
        if self
            .targets
            .as_ref()
            .is_some_and(|targets| targets.size() == working)
        {
            return Ok(());
        }
        self.targets = None;
        self.targets = Some(WorkingTargets::create(device, working)?);
        Ok(())
    }
}

fn encode_pass(
    encoder: &mut wgpu::CommandEncoder,
    destination: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    label: &'static str,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: destination,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        ..Default::default()
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// Submits everything encoded so far and blocks until the GPU has
/// executed it, then starts a fresh encoder in place.
fn flush(device: &wgpu::Device, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder) {
    let finished = std::mem::replace(
        encoder,
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blur_pass_encoder"),
        }),
    );
    queue.submit(Some(finished.finish()));
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
}
