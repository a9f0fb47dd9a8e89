//! WGSL sources and the shader variant manager.
//!
//! There is one sprite fragment shader. Feature flags are lowered to
//! `const ENABLE_* : bool` declarations prepended to the shared body, so
//! the GPU compiler eliminates the code of disabled effects; one linked
//! pipeline exists per sorted flag set. The manager introspects the
//! composed source (comments stripped) to verify the entry points and to
//! record which uniform fields each variant's live code references.

use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::error::RenderError;

pub(crate) const FLAG_MOSAIC: &str = "ENABLE_MOSAIC";
pub(crate) const FLAG_PIXELATE: &str = "ENABLE_PIXELATE";
pub(crate) const FLAG_WHIRL: &str = "ENABLE_WHIRL";
pub(crate) const FLAG_FISHEYE: &str = "ENABLE_FISHEYE";
pub(crate) const FLAG_GHOST: &str = "ENABLE_GHOST";
pub(crate) const FLAG_BRIGHTNESS: &str = "ENABLE_BRIGHTNESS";
pub(crate) const FLAG_COLOR: &str = "ENABLE_COLOR";

pub(crate) const KNOWN_FLAGS: &[&str] = &[
    FLAG_MOSAIC,
    FLAG_PIXELATE,
    FLAG_WHIRL,
    FLAG_FISHEYE,
    FLAG_GHOST,
    FLAG_BRIGHTNESS,
    FLAG_COLOR,
];

/// The default variant: every effect compiled in.
pub(crate) const ALL_EFFECTS: &[&str] = KNOWN_FLAGS;

/// The readback variant: effects that change shape but not color, so
/// point queries see exactly the pixels a full draw would cover.
pub(crate) const ONLY_SHAPE_FILTERS: &[&str] =
    &[FLAG_MOSAIC, FLAG_PIXELATE, FLAG_WHIRL, FLAG_FISHEYE];

/// Vertex + fragment shader for one sprite quad. Texture coordinates are
/// warped by the shape effects in the order mosaic → pixelate → whirl →
/// fisheye, the texture is sampled, fragments below 1/250 alpha are
/// discarded, then ghost, brightness and color apply in that order.
/// Discarding before ghost is deliberate: fully transparent texels never
/// stamp and never participate in shape tests.
pub(crate) const SPRITE_SHADER_BODY: &str = r#"
struct SpriteUniforms {
    transform: mat3x3<f32>,
    dimensions: vec2<f32>,
    mosaic: f32,
    pixelate: f32,
    whirl: f32,
    fisheye: f32,
    opacity: f32,
    brightness: f32,
    color_shift: f32,
};

@group(0) @binding(0) var<uniform> u: SpriteUniforms;
@group(1) @binding(0) var t_costume: texture_2d<f32>;
@group(1) @binding(1) var s_costume: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) texcoord: vec2<f32>,
};

@vertex
fn vs_main(@location(0) a_position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    let transformed = u.transform * vec3<f32>(a_position, 1.0);
    out.position = vec4<f32>(transformed.xy, 0.0, 1.0);
    out.texcoord = a_position;
    return out;
}

const MIN_VISIBLE_ALPHA: f32 = 1.0 / 250.0;

fn rgb_to_hsv(rgb: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    let p = mix(vec4<f32>(rgb.bg, k.wz), vec4<f32>(rgb.gb, k.xy), step(rgb.b, rgb.g));
    let q = mix(vec4<f32>(p.xyw, rgb.r), vec4<f32>(rgb.r, p.yzx), step(p.x, rgb.r));
    let d = q.x - min(q.w, q.y);
    let e = 1.0e-10;
    return vec3<f32>(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

fn hsv_to_rgb(hsv: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    let p = abs(fract(hsv.xxx + k.xyz) * 6.0 - k.www);
    return hsv.z * mix(vec3<f32>(1.0), clamp(p - vec3<f32>(1.0), vec3<f32>(0.0), vec3<f32>(1.0)), hsv.y);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var texcoord = in.texcoord;

    if ENABLE_MOSAIC {
        texcoord = fract(texcoord * u.mosaic);
    }
    if ENABLE_PIXELATE {
        if u.pixelate != 0.0 {
            let texel = texcoord * u.dimensions;
            texcoord = (floor(texel / u.pixelate) + 0.5) * u.pixelate / u.dimensions;
        }
    }
    if ENABLE_WHIRL {
        let offset = texcoord - 0.5;
        let magnitude = length(offset);
        let whirl_factor = max(1.0 - magnitude / 0.5, 0.0);
        let whirl_actual = u.whirl * whirl_factor * whirl_factor;
        let sin_w = sin(whirl_actual);
        let cos_w = cos(whirl_actual);
        texcoord = vec2<f32>(
            cos_w * offset.x - sin_w * offset.y,
            sin_w * offset.x + cos_w * offset.y,
        ) + 0.5;
    }
    if ENABLE_FISHEYE {
        let v = (texcoord - 0.5) / 0.5;
        let len = length(v);
        if len > 0.0 {
            let r = pow(min(len, 1.0), u.fisheye) * max(1.0, len);
            texcoord = 0.5 + 0.5 * (r * v / len);
        }
    }

    var color = textureSample(t_costume, s_costume, texcoord);
    if color.a < MIN_VISIBLE_ALPHA {
        discard;
    }

    if ENABLE_GHOST {
        color.a = color.a * u.opacity;
    }
    if ENABLE_BRIGHTNESS {
        let rgb = clamp(color.rgb + vec3<f32>(u.brightness), vec3<f32>(0.0), vec3<f32>(1.0));
        color = vec4<f32>(rgb, color.a);
    }
    if ENABLE_COLOR {
        // The value/saturation floor only applies while the effect is
        // active, so a zero shift leaves pixels untouched.
        if u.color_shift != 0.0 {
            var hsv = rgb_to_hsv(color.rgb);
            if hsv.z < 0.055 {
                hsv = vec3<f32>(0.0, 1.0, 0.055);
            } else if hsv.y < 0.09 {
                hsv = vec3<f32>(0.0, 0.09, hsv.z);
            }
            hsv.x = fract(hsv.x + u.color_shift);
            color = vec4<f32>(hsv_to_rgb(hsv), color.a);
        }
    }

    return color;
}
"#;

/// Rasterizes a pen dot: a quad around the center whose fragments outside
/// unit radius are discarded.
pub(crate) const PEN_DOT_SHADER: &str = r#"
struct PenDotUniforms {
    center: vec2<f32>,
    radius: vec2<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: PenDotUniforms;

struct DotOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) offset: vec2<f32>,
};

@vertex
fn vs_dot(@builtin(vertex_index) vertex_index: u32) -> DotOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
    );
    let corner = corners[vertex_index];
    var out: DotOutput;
    out.position = vec4<f32>(u.center + corner * u.radius, 0.0, 1.0);
    out.offset = corner;
    return out;
}

@fragment
fn fs_dot(in: DotOutput) -> @location(0) vec4<f32> {
    if length(in.offset) > 1.0 {
        discard;
    }
    return vec4<f32>(u.color.rgb * u.color.a, u.color.a);
}
"#;

/// Rasterizes a pen line as a line-list primitive in normalized device
/// coordinates; endpoints arrive already mapped via `(x/240, y/180)`.
pub(crate) const PEN_LINE_SHADER: &str = r#"
struct PenLineUniforms {
    start: vec2<f32>,
    end: vec2<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: PenLineUniforms;

@vertex
fn vs_line(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    let point = select(u.start, u.end, vertex_index == 1u);
    return vec4<f32>(point, 0.0, 1.0);
}

@fragment
fn fs_line() -> @location(0) vec4<f32> {
    return vec4<f32>(u.color.rgb * u.color.a, u.color.a);
}
"#;

/// Fullscreen-triangle pass compositing the pen texture over the stage.
pub(crate) const PEN_COMPOSITE_SHADER: &str = r#"
@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;

struct QuadOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_quad(@builtin(vertex_index) vertex_index: u32) -> QuadOutput {
    let uv = vec2<f32>(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    var out: QuadOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@fragment
fn fs_composite(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(t_input, s_input, uv);
}
"#;

/// Strips WGSL line and block comments so introspection does not match
/// text inside them.
fn strip_comments(source: &str) -> String {
    let no_blocks = regex::Regex::new(r"(?s)/\*.*?\*/")
        .unwrap()
        .replace_all(source, "");
    regex::Regex::new(r"//[^\n]*")
        .unwrap()
        .replace_all(&no_blocks, "")
        .into_owned()
}

/// Checks that `source` declares a function named `name`.
pub(crate) fn has_entry_point(source: &str, name: &str) -> bool {
    regex::Regex::new(&format!(r"fn\s+{name}\s*\("))
        .unwrap()
        .is_match(&strip_comments(source))
}

/// All `u.<field>` references in `source`.
fn uniform_references(source: &str) -> BTreeSet<String> {
    regex::Regex::new(r"\bu\.([A-Za-z_][A-Za-z0-9_]*)")
        .unwrap()
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect()
}

/// Splits the stripped body into the block guarded by `if FLAG { … }` and
/// returns the uniform fields it references. Blocks are found by matching
/// braces, which is sufficient for sources this crate owns.
fn guarded_uniforms(stripped: &str, flag: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let pattern = regex::Regex::new(&format!(r"if\s+{flag}\s*\{{")).unwrap();
    for m in pattern.find_iter(stripped) {
        let rest = &stripped[m.end()..];
        let mut depth = 1usize;
        let mut end = rest.len();
        for (i, ch) in rest.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i;
                        break;
                    }
                }
                _ => {}
            }
        }
        found.extend(uniform_references(&rest[..end]));
    }
    found
}

/// One linked pipeline for a specific set of enabled feature flags.
pub(crate) struct ShaderVariant {
    pub pipeline: wgpu::RenderPipeline,
    flags: BTreeSet<String>,
    uniforms: BTreeSet<String>,
    key: String,
}

impl ShaderVariant {
    pub(crate) fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Whether this variant's live code reads the given uniform field.
    pub(crate) fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains(name)
    }

    /// Like [`ShaderVariant::has_uniform`], but a missing name is an error:
    /// it means the caller and the variant disagree about the shader.
    pub(crate) fn expect_uniform(&self, name: &'static str) -> Result<(), RenderError> {
        if self.has_uniform(name) {
            Ok(())
        } else {
            Err(RenderError::UniformLookup {
                uniform: name,
                variant: self.key.clone(),
            })
        }
    }
}

/// Bind group layouts shared by every sprite shader variant.
pub(crate) struct SpriteLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl SpriteLayouts {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_texture_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        Self {
            uniform_layout,
            texture_layout,
            pipeline_layout,
        }
    }
}

/// Compiles and caches sprite pipelines keyed by the sorted flag set.
pub(crate) struct ShaderVariants {
    layouts: SpriteLayouts,
    format: wgpu::TextureFormat,
    variants: AHashMap<String, ShaderVariant>,
}

fn variant_key(flags: &BTreeSet<String>) -> String {
    flags.iter().cloned().collect::<Vec<_>>().join("+")
}

impl ShaderVariants {
    pub(crate) fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        Self {
            layouts: SpriteLayouts::new(device),
            format,
            variants: AHashMap::new(),
        }
    }

    pub(crate) fn layouts(&self) -> &SpriteLayouts {
        &self.layouts
    }

    /// Composes the flag preamble and the shared body into one module.
    pub(crate) fn compose_source(flags: &BTreeSet<String>) -> String {
        let mut source = String::new();
        for flag in KNOWN_FLAGS {
            source.push_str(&format!(
                "const {flag}: bool = {};\n",
                flags.contains(*flag)
            ));
        }
        source.push_str(SPRITE_SHADER_BODY);
        source
    }

    /// A variant compiled earlier with [`ShaderVariants::get_or_compile`].
    pub(crate) fn peek(&self, flags: &[&str]) -> Option<&ShaderVariant> {
        let flag_set: BTreeSet<String> = flags.iter().map(|f| f.to_string()).collect();
        self.variants.get(&variant_key(&flag_set))
    }

    pub(crate) fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        flags: &[&str],
    ) -> Result<&ShaderVariant, RenderError> {
        for flag in flags {
            if !KNOWN_FLAGS.contains(flag) {
                return Err(RenderError::UnknownShaderFlag((*flag).to_string()));
            }
        }
        let flag_set: BTreeSet<String> = flags.iter().map(|f| f.to_string()).collect();
        let key = variant_key(&flag_set);

        if !self.variants.contains_key(&key) {
            let variant = self.compile(device, flag_set, key.clone())?;
            log::debug!("compiled sprite shader variant `{key}`");
            self.variants.insert(key.clone(), variant);
        }
        Ok(&self.variants[&key])
    }

    fn compile(
        &self,
        device: &wgpu::Device,
        flags: BTreeSet<String>,
        key: String,
    ) -> Result<ShaderVariant, RenderError> {
        let source = Self::compose_source(&flags);
        if !has_entry_point(&source, "vs_main") || !has_entry_point(&source, "fs_main") {
            return Err(RenderError::ShaderCompile {
                label: "sprite",
                message: format!("variant `{key}` lost an entry point"),
            });
        }

        let stripped = strip_comments(&source);
        // Fields read unconditionally, plus the fields of each enabled
        // flag's guarded block.
        let mut uniforms = uniform_references(&stripped);
        for flag in KNOWN_FLAGS {
            let guarded = guarded_uniforms(&stripped, flag);
            if !flags.contains(*flag) {
                for name in &guarded {
                    uniforms.remove(name);
                }
            }
        }
        // A field referenced both inside a disabled block and elsewhere
        // stays live; re-add the enabled blocks' fields.
        for flag in &flags {
            uniforms.extend(guarded_uniforms(&stripped, flag));
        }

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite_pipeline"),
            layout: Some(&self.layouts.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(ShaderVariant {
            pipeline,
            flags,
            uniforms,
            key,
        })
    }
}

/// Premultiplied-alpha blending, used by the pen pipelines and the pen
/// composite pass.
pub(crate) fn premultiplied_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}
