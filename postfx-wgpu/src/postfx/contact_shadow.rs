//! Contact-shadow ambient occlusion: a hemisphere-sampled occlusion estimate into an auxiliary
//! target, then a depth-gated disk denoise composited over the scene color.

use postfx_gpu_shared::shaders;
use postfx_gpu_shared::uniforms::{
    ContactShadowParams, CONTACT_SHADOW_CONTRACT, CONTACT_SHADOW_DENOISE_CONTRACT, MAX_DENOISE_SAMPLES,
    MAX_SHADOW_SAMPLES,
};

use crate::binding::Frame;
use crate::effect::EffectPass;
use crate::error::{PostFxError, WithTargetError};
use crate::host::HostSurface;
use crate::pipeline::{create_effect_samplers, EffectSamplers};
use crate::render_targets::{RenderTarget, TargetOptions};

use super::{
    aux_options, display_binding, logical_size, sync_aux, target_binding, BuildFailure, PostProcess, PrimaryTarget,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactShadowSettings {
    /// How strongly occlusion darkens the scene, 0 disables the effect.
    pub intensity: f32,
    pub samples: u32,
    /// Contrast applied to the visibility term as `visibility^(1 + exponent)`.
    pub exponent: f32,
    pub bias: f32,
    /// View-space radius of the sampling hemisphere.
    pub search_radius: f32,
    /// Denoise disk radius in pixels.
    pub blur_radius: f32,
    pub blur_samples: u32,
}

impl Default for ContactShadowSettings {
    fn default() -> Self {
        Self {
            intensity: 0.5,
            samples: 15,
            exponent: 250.0,
            bias: 1.0,
            search_radius: 100.0,
            blur_radius: 8.0,
            blur_samples: 20,
        }
    }
}

impl ContactShadowSettings {
    pub fn params<H: HostSurface + ?Sized>(&self, host: &H) -> ContactShadowParams {
        let camera = host.camera();
        let size = logical_size(host);
        ContactShadowParams {
            proj_info: camera.proj_info(size[0], size[1]).0,
            size,
            near: camera.near,
            far: camera.far,
            search_radius: self.search_radius,
            intensity: self.intensity,
            exponent: self.exponent,
            bias: self.bias,
            num_samples: self.samples.min(MAX_SHADOW_SAMPLES) as i32,
            blur_radius: self.blur_radius,
            num_blur_samples: self.blur_samples.min(MAX_DENOISE_SAMPLES) as i32,
            _pad: 0.0,
        }
    }
}

pub struct ContactShadow {
    primary: PrimaryTarget,
    occlusion: RenderTarget,
    occlusion_pass: EffectPass,
    denoise_pass: EffectPass,
    samplers: EffectSamplers,
    settings: ContactShadowSettings,
}

impl ContactShadow {
    pub fn new<H: HostSurface + ?Sized>(host: &H, options: TargetOptions) -> Result<Self, PostFxError> {
        let target = RenderTarget::new(host, options)?;
        Self::build(host, PrimaryTarget::owned(target)).map_err(BuildFailure::discard)
    }

    /// Build around a target the host keeps. On failure the target is returned in the error.
    pub fn with_target<H: HostSurface + ?Sized>(host: &H, target: RenderTarget) -> Result<Self, WithTargetError> {
        Self::build(host, PrimaryTarget::borrowed(target)).map_err(BuildFailure::hand_back)
    }

    fn build<H: HostSurface + ?Sized>(host: &H, primary: PrimaryTarget) -> Result<Self, BuildFailure> {
        let occlusion = match RenderTarget::new(host, aux_options("Contact Shadow Occlusion", &primary.target)) {
            Ok(target) => target,
            Err(e) => return Err(BuildFailure::new(e, primary)),
        };

        let device = host.device();
        let passes = EffectPass::new(
            device,
            "Contact Shadow Occlusion",
            shaders::CONTACT_SHADOW_FRAG,
            &CONTACT_SHADOW_CONTRACT,
            occlusion.color_format(),
        )
        .and_then(|occlusion_pass| {
            let denoise_pass = EffectPass::new(
                device,
                "Contact Shadow Denoise",
                shaders::CONTACT_SHADOW_DENOISE_FRAG,
                &CONTACT_SHADOW_DENOISE_CONTRACT,
                host.surface_format(),
            )?;
            Ok((occlusion_pass, denoise_pass))
        });
        let (occlusion_pass, denoise_pass) = match passes {
            Ok(passes) => passes,
            Err(e) => {
                occlusion.remove();
                return Err(BuildFailure::new(e, primary));
            }
        };
        log::info!("Created contact-shadow pipeline on {}", primary.target.label());

        Ok(Self {
            primary,
            occlusion,
            occlusion_pass,
            denoise_pass,
            samplers: create_effect_samplers(device),
            settings: ContactShadowSettings::default(),
        })
    }

    pub fn settings(&self) -> &ContactShadowSettings {
        &self.settings
    }

    pub fn set_exponent(&mut self, exponent: f32) {
        self.settings.exponent = exponent;
    }

    pub fn set_bias(&mut self, bias: f32) {
        self.settings.bias = bias;
    }

    pub fn set_search_radius(&mut self, radius: f32) {
        self.settings.search_radius = radius;
    }

    pub fn set_blur_radius(&mut self, radius: f32) {
        self.settings.blur_radius = radius;
    }

    pub fn set_blur_samples(&mut self, samples: u32) {
        self.settings.blur_samples = samples;
    }

    /// Raw (undenoised) visibility of the last draw, in the red channel.
    pub fn occlusion(&self) -> &RenderTarget {
        &self.occlusion
    }
}

impl PostProcess for ContactShadow {
    fn draw<H, F>(&mut self, host: &H, frame: &mut Frame<'_>, scene: F) -> Result<(), PostFxError>
    where
        H: HostSurface + ?Sized,
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        let primary = &mut self.primary.target;
        primary.draw(host, frame, scene)?;
        sync_aux(&mut self.occlusion, primary, host)?;

        let device = host.device();
        let queue = host.queue();
        let uniforms = self.settings.params(host).to_table();
        let depth = &primary.depth().view;

        {
            let (destination, viewport) = target_binding(&self.occlusion);
            let mut bound = frame.bind(destination, viewport);
            self.occlusion_pass.run(
                device,
                queue,
                bound.encoder(),
                &self.occlusion.color().view,
                viewport,
                &uniforms,
                &[("depth", depth)],
                &self.samplers,
            )?;
        }

        let (destination, viewport) = display_binding(host);
        let mut bound = frame.bind(destination, viewport);
        let output = bound.output();
        self.denoise_pass.run(
            device,
            queue,
            bound.encoder(),
            output,
            viewport,
            &uniforms,
            &[
                ("color", &primary.color().view),
                ("depth", depth),
                ("occlusion", &self.occlusion.color().view),
            ],
            &self.samplers,
        )
    }

    fn set_intensity(&mut self, intensity: f32) {
        self.settings.intensity = intensity;
    }

    fn set_samples(&mut self, samples: u32) {
        self.settings.samples = samples;
    }

    fn primary(&self) -> &RenderTarget {
        &self.primary.target
    }

    fn remove(self) -> Option<RenderTarget> {
        self.occlusion.remove();
        self.primary.release()
    }
}
