//! Separable Gaussian blur: a horizontal pass into an auxiliary target, then a vertical pass onto
//! the display.

use glam::Mat4;
use postfx_gpu_shared::shaders;
use postfx_gpu_shared::uniforms::GAUSSIAN_CONTRACT;

use crate::binding::Frame;
use crate::effect::EffectPass;
use crate::error::{PostFxError, WithTargetError};
use crate::host::HostSurface;
use crate::pipeline::{create_effect_samplers, EffectSamplers};
use crate::render_targets::{RenderTarget, TargetOptions};

use super::{
    aux_options, display_binding, sync_aux, target_binding, BlurSettings, BuildFailure, PostProcess, PrimaryTarget,
};

const HORIZONTAL: i32 = 0;
const VERTICAL: i32 = 1;

pub struct GaussianBlur {
    primary: PrimaryTarget,
    aux: RenderTarget,
    horizontal: EffectPass,
    vertical: EffectPass,
    samplers: EffectSamplers,
    settings: BlurSettings,
}

impl GaussianBlur {
    pub fn new<H: HostSurface + ?Sized>(host: &H, options: TargetOptions) -> Result<Self, PostFxError> {
        let target = RenderTarget::new(host, options)?;
        Self::build(host, PrimaryTarget::owned(target)).map_err(BuildFailure::discard)
    }

    /// Build around a target the host keeps. On failure the target is returned in the error.
    pub fn with_target<H: HostSurface + ?Sized>(host: &H, target: RenderTarget) -> Result<Self, WithTargetError> {
        Self::build(host, PrimaryTarget::borrowed(target)).map_err(BuildFailure::hand_back)
    }

    fn build<H: HostSurface + ?Sized>(host: &H, primary: PrimaryTarget) -> Result<Self, BuildFailure> {
        let aux = match RenderTarget::new(host, aux_options("Gaussian Blur Aux", &primary.target)) {
            Ok(aux) => aux,
            Err(e) => return Err(BuildFailure::new(e, primary)),
        };

        let device = host.device();
        let passes = EffectPass::new(
            device,
            "Gaussian Blur H",
            shaders::GAUSSIAN_BLUR_FRAG,
            &GAUSSIAN_CONTRACT,
            aux.color_format(),
        )
        .and_then(|horizontal| {
            let vertical = EffectPass::new(
                device,
                "Gaussian Blur V",
                shaders::GAUSSIAN_BLUR_FRAG,
                &GAUSSIAN_CONTRACT,
                host.surface_format(),
            )?;
            Ok((horizontal, vertical))
        });
        let (horizontal, vertical) = match passes {
            Ok(passes) => passes,
            Err(e) => {
                aux.remove();
                return Err(BuildFailure::new(e, primary));
            }
        };
        log::info!("Created Gaussian blur pipeline on {}", primary.target.label());

        Ok(Self {
            primary,
            aux,
            horizontal,
            vertical,
            samplers: create_effect_samplers(device),
            settings: BlurSettings::gaussian(),
        })
    }

    pub fn settings(&self) -> &BlurSettings {
        &self.settings
    }

    pub fn set_dof(&mut self, dof: f32) {
        self.settings.dof = dof;
    }

    pub fn set_focus(&mut self, focus: f32) {
        self.settings.focus = Some(focus);
    }

    pub fn focus_here(&mut self, model_view: Mat4) {
        self.settings.focus_here(model_view);
    }

    /// Intermediate target holding the horizontally blurred image.
    pub fn aux(&self) -> &RenderTarget {
        &self.aux
    }
}

impl PostProcess for GaussianBlur {
    fn draw<H, F>(&mut self, host: &H, frame: &mut Frame<'_>, scene: F) -> Result<(), PostFxError>
    where
        H: HostSurface + ?Sized,
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        let primary = &mut self.primary.target;
        primary.draw(host, frame, scene)?;
        sync_aux(&mut self.aux, primary, host)?;

        let device = host.device();
        let queue = host.queue();
        let depth = &primary.depth().view;

        {
            let (destination, viewport) = target_binding(&self.aux);
            let mut bound = frame.bind(destination, viewport);
            self.horizontal.run(
                device,
                queue,
                bound.encoder(),
                &self.aux.color().view,
                viewport,
                &self.settings.params(host, HORIZONTAL).to_table(),
                &[("color", &primary.color().view), ("depth", depth)],
                &self.samplers,
            )?;
        }

        let (destination, viewport) = display_binding(host);
        let mut bound = frame.bind(destination, viewport);
        let output = bound.output();
        self.vertical.run(
            device,
            queue,
            bound.encoder(),
            output,
            viewport,
            &self.settings.params(host, VERTICAL).to_table(),
            &[("color", &self.aux.color().view), ("depth", depth)],
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
        self.aux.remove();
        self.primary.release()
    }
}
