#![allow(dead_code)]

use glam::Vec3;
use postfx_wgpu::{init_logging, Camera, HostSurface, LoggingConfig, OffscreenHost, RenderTarget, SurfaceSize};
use wgpu::util::DeviceExt;

/// Headless host, or `None` (test skipped) when the machine has no usable adapter.
pub fn headless_host(width: u32, height: u32) -> Option<OffscreenHost> {
    init_logging(LoggingConfig::with_filter("postfx_wgpu=debug,wgpu_core=warn,wgpu_hal=warn"));
    match OffscreenHost::new(SurfaceSize::new(width, height)) {
        Ok(host) => Some(host),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

/// Stored depth of a point `distance` units in front of `camera`.
pub fn stored_depth(camera: &Camera, distance: f32) -> f32 {
    camera.projection.project_point3(Vec3::new(0.0, 0.0, -distance)).z
}

pub fn pixel(pixels: &[[f32; 4]], width: u32, x: u32, y: u32) -> [f32; 4] {
    pixels[(y * width + x) as usize]
}

pub fn assert_color_close(a: [f32; 4], b: [f32; 4], tolerance: f32) {
    for channel in 0..4 {
        assert!(
            (a[channel] - b[channel]).abs() <= tolerance,
            "{a:?} vs {b:?} (channel {channel})"
        );
    }
}

const SCENE_WGSL: &str = r#"
struct Solid {
    color: vec4<f32>,
    // x: stored depth, y: 1.0 draws a position-dependent pattern instead of `color`
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> solid: Solid;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, solid.params.x, 1.0);
}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    if solid.params.y > 0.5 {
        return vec4<f32>(fract(frag_coord.x / 37.0), fract(frag_coord.y / 23.0), 0.5, 1.0);
    }
    return solid.color;
}
"#;

/// One screen-covering triangle at a constant depth, built for a specific target's formats.
pub struct SolidScene {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

impl SolidScene {
    pub fn new(device: &wgpu::Device, target: &RenderTarget, color: [f32; 4], depth: f32, pattern: bool) -> Self {
        let uniforms: [f32; 8] = [
            color[0],
            color[1],
            color[2],
            color[3],
            depth,
            if pattern { 1.0 } else { 0.0 },
            0.0,
            0.0,
        ];
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Solid Scene Uniforms"),
            contents: bytemuck::cast_slice(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Solid Scene BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Solid Scene BG"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Solid Scene"),
            source: wgpu::ShaderSource::Wgsl(SCENE_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Solid Scene Layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Solid Scene"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(target.color_target_state())],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(target.depth_stencil_state()),
            multisample: target.multisample_state(),
            multiview: None,
            cache: None,
        });

        Self { pipeline, bind_group }
    }

    pub fn record(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Draw `scene` into `target` in its own frame and wait for it.
pub fn draw_target(host: &OffscreenHost, target: &mut RenderTarget, scene: &SolidScene) {
    let mut frame = host.begin_frame();
    target
        .draw(host, &mut frame, |pass| scene.record(pass))
        .expect("draw");
    host.submit(frame);
    host.device().poll(wgpu::Maintain::Wait);
}
