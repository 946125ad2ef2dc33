//! Blur program synthesis and caching.
//!
//! The convolution fragment shader is synthesized per pass direction and
//! tap count: the mirrored tap fetches are unrolled into straight-line
//! WGSL, while offsets and weights stay uniform-driven so a kernel rebuild
//! with an unchanged tap count reuses the compiled program as-is.
//!
//! Synthesized text is interned. The host-side pipeline cache keys on
//! program content and never evicts, so handing it semantically identical
//! but freshly re-synthesized programs would leak cache entries for the
//! process lifetime; identical `(direction, tap count)` requests must
//! resolve to the same source object and the same compiled program. That
//! makes the interning here a correctness requirement, not an
//! optimization.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Axis of one convolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassDirection {
    /// Sample along the y axis.
    Vertical,
    /// Sample along the x axis.
    Horizontal,
}

impl PassDirection {
    fn label(self) -> &'static str {
        match self {
            PassDirection::Vertical => "vertical",
            PassDirection::Horizontal => "horizontal",
        }
    }
}

/// Identity of one synthesized blur program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Pass axis the program samples along.
    pub direction: PassDirection,
    /// Number of kernel taps unrolled into the fragment stage.
    pub tap_count: u32,
}

/// Shared declarations and vertex stage of every blur program.
///
/// Kept as a single static so that every synthesized source embeds the
/// identical preamble text by reference. The tap array length must match
/// [`MAX_KERNEL_TAPS`].
static BLUR_PREAMBLE: &str = "\
struct BlurUniforms {
    resolution: vec2<f32>,
    tap_count: f32,
    _pad: f32,
    taps: array<vec4<f32>, 49>,
};

@group(0) @binding(0) var<uniform> uniforms: BlurUniforms;
@group(0) @binding(1) var source_texture: texture_2d<f32>;
@group(0) @binding(2) var source_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var out: VertexOutput;
    let uv = vec2<f32>(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    out.uv = uv;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    return out;
}
";

/// Final composite, unmasked: captured-or-blurred content times opacity.
const COMPOSITE_SHADER: &str = "\
struct CompositeUniforms {
    dest_rect: vec4<f32>,
    content_uv: vec4<f32>,
    mask_uv: vec4<f32>,
    frame_size: vec2<f32>,
    opacity: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> uniforms: CompositeUniforms;
@group(0) @binding(1) var content_texture: texture_2d<f32>;
@group(0) @binding(2) var content_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0), vec2<f32>(0.0, 1.0),
    );
    let corner = corners[vertex_index];
    let px = uniforms.dest_rect.xy + corner * uniforms.dest_rect.zw;
    var out: VertexOutput;
    out.position = vec4<f32>(
        px.x / uniforms.frame_size.x * 2.0 - 1.0,
        1.0 - px.y / uniforms.frame_size.y * 2.0,
        0.0,
        1.0,
    );
    out.uv = corner;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let content_uv = mix(uniforms.content_uv.xy, uniforms.content_uv.zw, in.uv);
    return textureSample(content_texture, content_sampler, content_uv) * uniforms.opacity;
}
";

/// Final composite, masked: content modulated by the mask's alpha.
const MASKED_COMPOSITE_SHADER: &str = "\
struct CompositeUniforms {
    dest_rect: vec4<f32>,
    content_uv: vec4<f32>,
    mask_uv: vec4<f32>,
    frame_size: vec2<f32>,
    opacity: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> uniforms: CompositeUniforms;
@group(0) @binding(1) var content_texture: texture_2d<f32>;
@group(0) @binding(2) var content_sampler: sampler;
@group(0) @binding(3) var mask_texture: texture_2d<f32>;
@group(0) @binding(4) var mask_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0), vec2<f32>(0.0, 1.0),
    );
    let corner = corners[vertex_index];
    let px = uniforms.dest_rect.xy + corner * uniforms.dest_rect.zw;
    var out: VertexOutput;
    out.position = vec4<f32>(
        px.x / uniforms.frame_size.x * 2.0 - 1.0,
        1.0 - px.y / uniforms.frame_size.y * 2.0,
        0.0,
        1.0,
    );
    out.uv = corner;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let content_uv = mix(uniforms.content_uv.xy, uniforms.content_uv.zw, in.uv);
    let mask_uv = mix(uniforms.mask_uv.xy, uniforms.mask_uv.zw, in.uv);
    let color = textureSample(content_texture, content_sampler, content_uv) * uniforms.opacity;
    let coverage = textureSample(mask_texture, mask_sampler, mask_uv).r;
    return color * coverage;
}
";

/// Synthesizes the full WGSL source for one blur program.
///
/// The text depends only on the key: one center fetch plus
/// `tap_count - 1` mirrored pairs, with pixel offsets converted to
/// texture-coordinate deltas through the resolution uniform.
pub(crate) fn blur_shader_source(key: ProgramKey) -> String {
    use std::fmt::Write as _;

    let mut source = String::with_capacity(BLUR_PREAMBLE.len() + 256 * key.tap_count as usize);
    source.push_str(BLUR_PREAMBLE);
    source.push_str(
        "\n@fragment\n\
         fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {\n    \
         let texel = vec2<f32>(1.0, 1.0) / uniforms.resolution;\n    \
         var acc = textureSample(source_texture, source_sampler, in.uv) * uniforms.taps[0].y;\n",
    );
    for i in 1..key.tap_count as usize {
        let delta = match key.direction {
            PassDirection::Vertical => format!("vec2<f32>(0.0, uniforms.taps[{i}].x * texel.y)"),
            PassDirection::Horizontal => format!("vec2<f32>(uniforms.taps[{i}].x * texel.x, 0.0)"),
        };
        let _ = writeln!(
            source,
            "    acc += textureSample(source_texture, source_sampler, in.uv - {delta}) * uniforms.taps[{i}].y;"
        );
        let _ = writeln!(
            source,
            "    acc += textureSample(source_texture, source_sampler, in.uv + {delta}) * uniforms.taps[{i}].y;"
        );
    }
    source.push_str("    return acc;\n}\n");
    source
}

/// Bind group layouts and samplers shared by every program of one cache.
pub(crate) struct BaseResources {
    /// Layout of the blur pass bind group (uniforms, source, sampler).
    pub blur_layout: wgpu::BindGroupLayout,
    /// Layout of the unmasked composite bind group.
    pub composite_layout: wgpu::BindGroupLayout,
    /// Layout of the masked composite bind group.
    pub masked_layout: wgpu::BindGroupLayout,
    /// Linear clamp-to-edge sampler; bilinear filtering is what makes the
    /// reduced-tap kernels work.
    pub sampler: wgpu::Sampler,
}

/// One compiled blur pass program together with its interned source.
pub struct BlurProgram {
    /// Compiled render pipeline targeting the RGBA8 working targets.
    pub pipeline: wgpu::RenderPipeline,
    /// The exact source text the pipeline was compiled from.
    pub source: Arc<str>,
}

/// One compiled composite program.
pub(crate) struct CompositeProgram {
    pub pipeline: wgpu::RenderPipeline,
}

#[derive(Default)]
struct CacheInner {
    base: Option<Arc<BaseResources>>,
    sources: FxHashMap<ProgramKey, Arc<str>>,
    programs: FxHashMap<ProgramKey, Arc<BlurProgram>>,
    composites: FxHashMap<(bool, wgpu::TextureFormat), Arc<CompositeProgram>>,
}

/// Cache of synthesized blur programs and the shared composite pipelines.
///
/// Cheap to clone; all clones share one store. Initialized lazily on first
/// use and torn down when the last region holding a handle is dropped.
/// Entries are never evicted.
#[derive(Clone, Default)]
pub struct ProgramCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl ProgramCache {
    /// Creates an empty cache. No GPU work happens until the first
    /// program request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the interned source text for `key`, synthesizing it on the
    /// first request. Repeated calls return the same allocation.
    pub(crate) fn source(&self, key: ProgramKey) -> Arc<str> {
        let mut inner = self.inner.lock();
        inner
            .sources
            .entry(key)
            .or_insert_with(|| Arc::from(blur_shader_source(key)))
            .clone()
    }

    pub(crate) fn base(&self, device: &wgpu::Device) -> Arc<BaseResources> {
        let mut inner = self.inner.lock();
        if let Some(base) = &inner.base {
            return base.clone();
        }
        let base = Arc::new(create_base_resources(device));
        inner.base = Some(base.clone());
        base
    }

    /// Returns the compiled program for `key`, compiling it on the first
    /// request. Identical keys resolve to the identical program object.
    pub(crate) fn blur_program(&self, device: &wgpu::Device, key: ProgramKey) -> Arc<BlurProgram> {
        let base = self.base(device);
        let source = self.source(key);
        let mut inner = self.inner.lock();
        inner
            .programs
            .entry(key)
            .or_insert_with(|| {
                debug!(
                    direction = key.direction.label(),
                    taps = key.tap_count,
                    "compiling blur program"
                );
                Arc::new(create_blur_program(device, &base.blur_layout, key, source))
            })
            .clone()
    }

    /// Returns the composite program for the frame format, masked or not.
    pub(crate) fn composite_program(
        &self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        masked: bool,
    ) -> Arc<CompositeProgram> {
        let base = self.base(device);
        let mut inner = self.inner.lock();
        inner
            .composites
            .entry((masked, format))
            .or_insert_with(|| {
                let layout = if masked {
                    &base.masked_layout
                } else {
                    &base.composite_layout
                };
                let source = if masked {
                    MASKED_COMPOSITE_SHADER
                } else {
                    COMPOSITE_SHADER
                };
                Arc::new(create_composite_program(device, layout, format, source, masked))
            })
            .clone()
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_base_resources(device: &wgpu::Device) -> BaseResources {
    let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        label: Some("blur_pass_bind_group_layout"),
    });

    let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        label: Some("blur_composite_bind_group_layout"),
    });

    let masked_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0),
            texture_entry(1),
            sampler_entry(2),
            texture_entry(3),
            sampler_entry(4),
        ],
        label: Some("blur_masked_composite_bind_group_layout"),
    });

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("blur_linear_sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    });

    BaseResources {
        blur_layout,
        composite_layout,
        masked_layout,
        sampler,
    }
}

fn create_blur_program(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    key: ProgramKey,
    source: Arc<str>,
) -> BlurProgram {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Blur Pass Shader"),
        source: wgpu::ShaderSource::Wgsl(source.as_ref().into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Blur Pass Pipeline Layout"),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match key.direction {
            PassDirection::Vertical => "Blur Vertical Pipeline",
            PassDirection::Horizontal => "Blur Horizontal Pipeline",
        }),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
        cache: None,
    });

    BlurProgram { pipeline, source }
}

fn create_composite_program(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    source: &str,
    masked: bool,
) -> CompositeProgram {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(if masked {
            "Blur Masked Composite Shader"
        } else {
            "Blur Composite Shader"
        }),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Blur Composite Pipeline Layout"),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if masked {
            "Blur Masked Composite Pipeline"
        } else {
            "Blur Composite Pipeline"
        }),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
        cache: None,
    });

    CompositeProgram { pipeline }
}
