//! One full-screen shader pass bound by name against its uniform contract.

use postfx_gpu_shared::uniforms::{UniformContract, UniformTable};

use crate::binding::Viewport;
use crate::error::PostFxError;
use crate::passes::fullscreen::render_fullscreen_effect;
use crate::pipeline::{self, EffectSamplers};

/// A compiled full-screen effect with its own uniform buffer.
///
/// Every pass owns its buffer, so several passes may be recorded into one encoder without their
/// parameters overwriting each other before submission.
pub struct EffectPass {
    label: String,
    contract: &'static UniformContract,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    output_format: wgpu::TextureFormat,
}

impl EffectPass {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        fragment_source: &str,
        contract: &'static UniformContract,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, PostFxError> {
        let (bind_group_layout, pipeline) = pipeline::scoped(device, label, || {
            let bind_group_layout = pipeline::create_effect_bind_group_layout(device, contract);
            let pipeline = pipeline::create_fullscreen_effect_pipeline(
                device,
                label,
                fragment_source,
                &bind_group_layout,
                output_format,
            );
            (bind_group_layout, pipeline)
        })?;
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Params")),
            size: contract.block_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        log::debug!("Created effect pass {label} -> {output_format:?}");

        Ok(Self {
            label: label.to_string(),
            contract,
            pipeline,
            bind_group_layout,
            params_buffer,
            output_format,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contract(&self) -> &'static UniformContract {
        self.contract
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    /// Upload `uniforms`, bind `textures` by slot name and record the pass into `destination`.
    ///
    /// Nothing is recorded when the uniforms or textures do not satisfy the contract.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        destination: &wgpu::TextureView,
        viewport: Viewport,
        uniforms: &UniformTable,
        textures: &[(&str, &wgpu::TextureView)],
        samplers: &EffectSamplers,
    ) -> Result<(), PostFxError> {
        let block = self.contract.pack(uniforms)?;
        let names: Vec<&str> = textures.iter().map(|(name, _)| *name).collect();
        let order = self.contract.texture_order(&names)?;

        queue.write_buffer(&self.params_buffer, 0, &block);

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.params_buffer.as_entire_binding(),
        }];
        for (slot, &index) in order.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + slot as u32,
                resource: wgpu::BindingResource::TextureView(textures[index].1),
            });
        }
        let num_textures = order.len() as u32;
        entries.push(wgpu::BindGroupEntry {
            binding: 1 + num_textures,
            resource: wgpu::BindingResource::Sampler(&samplers.linear),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: 2 + num_textures,
            resource: wgpu::BindingResource::Sampler(&samplers.nearest),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} BG", self.label)),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        render_fullscreen_effect(encoder, &self.label, destination, viewport, &self.pipeline, &bind_group);
        Ok(())
    }
}
