//! Render pipeline creation for full-screen effect passes and the multisample depth resolve.
//! Effect bind group layouts are derived from the shader's uniform contract:
//!   0:       uniform block
//!   1..=N:   texture slots in contract order
//!   N+1:     linear clamp sampler (color slots)
//!   N+2:     nearest clamp sampler (depth slots)

use postfx_gpu_shared::shaders;
use postfx_gpu_shared::uniforms::{TextureKind, UniformContract};

use crate::error::PostFxError;

/// Run `create` inside a validation error scope. Shader compilation and pipeline validation
/// failures surface as [`PostFxError::Pipeline`] instead of reaching the device's uncaptured
/// error handler.
pub fn scoped<T>(device: &wgpu::Device, label: &str, create: impl FnOnce() -> T) -> Result<T, PostFxError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(PostFxError::Pipeline {
            label: label.to_string(),
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}

/// Shared fullscreen vertex state (vertex-index full-screen triangle).
fn fullscreen_vertex_state(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

fn create_fullscreen_vertex_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Fullscreen Vert"),
        source: wgpu::ShaderSource::Wgsl(shaders::FULLSCREEN_QUAD_VERT.into()),
    })
}

/// Samplers bound after the texture slots of every effect pass.
pub struct EffectSamplers {
    pub linear: wgpu::Sampler,
    pub nearest: wgpu::Sampler,
}

pub fn create_effect_samplers(device: &wgpu::Device) -> EffectSamplers {
    let linear = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Effect Linear Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    let nearest = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Effect Nearest Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    EffectSamplers { linear, nearest }
}

/// Bind group layout for a full-screen effect, derived from its contract.
pub fn create_effect_bind_group_layout(
    device: &wgpu::Device,
    contract: &UniformContract,
) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        // binding 0: params uniform
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(contract.block_size as u64),
            },
            count: None,
        },
    ];

    for (i, slot) in contract.textures.iter().enumerate() {
        let sample_type = match slot.kind {
            TextureKind::Color => wgpu::TextureSampleType::Float { filterable: true },
            TextureKind::Depth => wgpu::TextureSampleType::Depth,
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1 + i as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }

    let num_textures = contract.textures.len() as u32;
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 1 + num_textures,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 2 + num_textures,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{} BGL", contract.label)),
        entries: &entries,
    })
}

/// Generic fullscreen effect pipeline: no depth test, no blending, one color output.
pub fn create_fullscreen_effect_pipeline(
    device: &wgpu::Device,
    label: &str,
    frag_source: &str,
    bgl: &wgpu::BindGroupLayout,
    output_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let vert_module = create_fullscreen_vertex_module(device);

    let frag_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(frag_source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label} Layout")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: fullscreen_vertex_state(&vert_module),
        fragment: Some(wgpu::FragmentState {
            module: &frag_module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

// ============================================================
// Multisample depth resolve
// ============================================================

/// Depth resolve bind group layout, matching depth_resolve.wgsl:
///   0: texture_depth_multisampled_2d
pub fn create_depth_resolve_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Depth Resolve BGL"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: true,
            },
            count: None,
        }],
    })
}

/// Writes sample 0 of the multisampled depth into a single-sample depth attachment.
pub fn create_depth_resolve_pipeline(
    device: &wgpu::Device,
    bgl: &wgpu::BindGroupLayout,
    depth_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let vert_module = create_fullscreen_vertex_module(device);

    let frag_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Depth Resolve Fragment"),
        source: wgpu::ShaderSource::Wgsl(shaders::DEPTH_RESOLVE_FRAG.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Depth Resolve Pipeline Layout"),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Depth Resolve Pipeline"),
        layout: Some(&layout),
        vertex: fullscreen_vertex_state(&vert_module),
        fragment: Some(wgpu::FragmentState {
            module: &frag_module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
