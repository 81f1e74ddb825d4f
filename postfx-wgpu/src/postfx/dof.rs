//! Depth-of-field: one jittered disk blur gated by distance from the focus plane.

use glam::{Mat4, Vec3};
use postfx_gpu_shared::shaders;
use postfx_gpu_shared::uniforms::{BlurParams, DOF_CONTRACT, MAX_BLUR_SAMPLES};

use crate::binding::Frame;
use crate::effect::EffectPass;
use crate::error::{PostFxError, WithTargetError};
use crate::host::{default_eye_distance, HostSurface};
use crate::pipeline::{create_effect_samplers, EffectSamplers};
use crate::render_targets::{RenderTarget, TargetOptions};

use super::{display_binding, logical_size, BuildFailure, PostProcess, PrimaryTarget};

/// Tunables shared by the depth-of-field and Gaussian blur pipelines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurSettings {
    pub intensity: f32,
    /// Width of the in-focus band around the focus plane.
    pub dof: f32,
    /// Linear distance of the focus plane. `None` focuses at the default camera's eye distance
    /// for the current surface height.
    pub focus: Option<f32>,
    pub samples: u32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            intensity: 0.05,
            dof: 0.0,
            focus: None,
            samples: 15,
        }
    }
}

impl BlurSettings {
    pub fn gaussian() -> Self {
        Self {
            intensity: 0.1,
            samples: 20,
            ..Self::default()
        }
    }

    /// Focus on whatever sits at the origin of the `model_view` frame.
    pub fn focus_here(&mut self, model_view: Mat4) {
        self.focus = Some(-model_view.transform_point3(Vec3::ZERO).z);
    }

    pub fn params<H: HostSurface + ?Sized>(&self, host: &H, direction: i32) -> BlurParams {
        let camera = host.camera();
        let size = logical_size(host);
        BlurParams {
            size,
            intensity: self.intensity,
            dof: self.dof,
            target_z: self.focus.unwrap_or_else(|| default_eye_distance(size[1])),
            near: camera.near,
            far: camera.far,
            num_samples: self.samples.min(MAX_BLUR_SAMPLES) as i32,
            direction,
            _pad: [0.0; 3],
        }
    }
}

pub struct DepthOfField {
    primary: PrimaryTarget,
    pass: EffectPass,
    samplers: EffectSamplers,
    settings: BlurSettings,
}

impl DepthOfField {
    pub fn new<H: HostSurface + ?Sized>(host: &H, options: TargetOptions) -> Result<Self, PostFxError> {
        let target = RenderTarget::new(host, options)?;
        Self::build(host, PrimaryTarget::owned(target)).map_err(BuildFailure::discard)
    }

    /// Build around a target the host keeps. On failure the target is returned in the error.
    pub fn with_target<H: HostSurface + ?Sized>(host: &H, target: RenderTarget) -> Result<Self, WithTargetError> {
        Self::build(host, PrimaryTarget::borrowed(target)).map_err(BuildFailure::hand_back)
    }

    fn build<H: HostSurface + ?Sized>(host: &H, primary: PrimaryTarget) -> Result<Self, BuildFailure> {
        let device = host.device();
        let pass = match EffectPass::new(
            device,
            "Depth of Field",
            shaders::DOF_FRAG,
            &DOF_CONTRACT,
            host.surface_format(),
        ) {
            Ok(pass) => pass,
            Err(e) => return Err(BuildFailure::new(e, primary)),
        };
        log::info!("Created depth-of-field pipeline on {}", primary.target.label());
        Ok(Self {
            primary,
            pass,
            samplers: create_effect_samplers(device),
            settings: BlurSettings::default(),
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
}

impl PostProcess for DepthOfField {
    fn draw<H, F>(&mut self, host: &H, frame: &mut Frame<'_>, scene: F) -> Result<(), PostFxError>
    where
        H: HostSurface + ?Sized,
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        let primary = &mut self.primary.target;
        primary.draw(host, frame, scene)?;

        let uniforms = self.settings.params(host, 0).to_table();
        let (destination, viewport) = display_binding(host);
        let mut bound = frame.bind(destination, viewport);
        let output = bound.output();
        self.pass.run(
            host.device(),
            host.queue(),
            bound.encoder(),
            output,
            viewport,
            &uniforms,
            &[("color", &primary.color().view), ("depth", &primary.depth().view)],
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
        self.primary.release()
    }
}
