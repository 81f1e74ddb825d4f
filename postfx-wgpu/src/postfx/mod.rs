//! Post-process pipelines: a primary render target drawn by the host, followed by a fixed
//! sequence of full-screen passes ending on the display surface.

pub mod contact_shadow;
pub mod dof;
pub mod gaussian;

pub use contact_shadow::{ContactShadow, ContactShadowSettings};
pub use dof::{BlurSettings, DepthOfField};
pub use gaussian::GaussianBlur;

use crate::binding::{Destination, Frame, Viewport};
use crate::caps::{FormatPreference, FLOAT_COLOR_FORMAT, FLOAT_DEPTH_FORMAT};
use crate::error::{PostFxError, WithTargetError};
use crate::host::HostSurface;
use crate::render_targets::{RenderTarget, TargetOptions, TargetSize};

/// Operations shared by every post-process pipeline.
pub trait PostProcess {
    /// Draw `scene` into the primary target, then run the pipeline's passes onto the display.
    fn draw<H, F>(&mut self, host: &H, frame: &mut Frame<'_>, scene: F) -> Result<(), PostFxError>
    where
        H: HostSurface + ?Sized,
        F: FnOnce(&mut wgpu::RenderPass<'_>);

    fn set_intensity(&mut self, intensity: f32);

    /// Sample count of the main effect pass. Values over the shader cap are truncated.
    fn set_samples(&mut self, samples: u32);

    /// Target the host scene is drawn into.
    fn primary(&self) -> &RenderTarget;

    /// Free every target the pipeline owns. A host-owned primary target is handed back.
    fn remove(self) -> Option<RenderTarget>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    DepthOfField,
    GaussianBlur,
    ContactShadow,
}

/// One of the shipped pipelines, selected at construction.
pub enum PostProcessPipeline {
    DepthOfField(DepthOfField),
    GaussianBlur(GaussianBlur),
    ContactShadow(ContactShadow),
}

impl PostProcessPipeline {
    pub fn new<H: HostSurface + ?Sized>(
        kind: EffectKind,
        host: &H,
        options: TargetOptions,
    ) -> Result<Self, PostFxError> {
        Ok(match kind {
            EffectKind::DepthOfField => Self::DepthOfField(DepthOfField::new(host, options)?),
            EffectKind::GaussianBlur => Self::GaussianBlur(GaussianBlur::new(host, options)?),
            EffectKind::ContactShadow => Self::ContactShadow(ContactShadow::new(host, options)?),
        })
    }

    /// Build around a primary target the host keeps ownership of.
    pub fn with_target<H: HostSurface + ?Sized>(
        kind: EffectKind,
        host: &H,
        target: RenderTarget,
    ) -> Result<Self, WithTargetError> {
        Ok(match kind {
            EffectKind::DepthOfField => Self::DepthOfField(DepthOfField::with_target(host, target)?),
            EffectKind::GaussianBlur => Self::GaussianBlur(GaussianBlur::with_target(host, target)?),
            EffectKind::ContactShadow => Self::ContactShadow(ContactShadow::with_target(host, target)?),
        })
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::DepthOfField(_) => EffectKind::DepthOfField,
            Self::GaussianBlur(_) => EffectKind::GaussianBlur,
            Self::ContactShadow(_) => EffectKind::ContactShadow,
        }
    }
}

impl PostProcess for PostProcessPipeline {
    fn draw<H, F>(&mut self, host: &H, frame: &mut Frame<'_>, scene: F) -> Result<(), PostFxError>
    where
        H: HostSurface + ?Sized,
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        match self {
            Self::DepthOfField(p) => p.draw(host, frame, scene),
            Self::GaussianBlur(p) => p.draw(host, frame, scene),
            Self::ContactShadow(p) => p.draw(host, frame, scene),
        }
    }

    fn set_intensity(&mut self, intensity: f32) {
        match self {
            Self::DepthOfField(p) => p.set_intensity(intensity),
            Self::GaussianBlur(p) => p.set_intensity(intensity),
            Self::ContactShadow(p) => p.set_intensity(intensity),
        }
    }

    fn set_samples(&mut self, samples: u32) {
        match self {
            Self::DepthOfField(p) => p.set_samples(samples),
            Self::GaussianBlur(p) => p.set_samples(samples),
            Self::ContactShadow(p) => p.set_samples(samples),
        }
    }

    fn primary(&self) -> &RenderTarget {
        match self {
            Self::DepthOfField(p) => p.primary(),
            Self::GaussianBlur(p) => p.primary(),
            Self::ContactShadow(p) => p.primary(),
        }
    }

    fn remove(self) -> Option<RenderTarget> {
        match self {
            Self::DepthOfField(p) => p.remove(),
            Self::GaussianBlur(p) => p.remove(),
            Self::ContactShadow(p) => p.remove(),
        }
    }
}

/// Primary target plus whether the pipeline is responsible for freeing it.
pub(crate) struct PrimaryTarget {
    pub target: RenderTarget,
    owned: bool,
}

impl PrimaryTarget {
    pub fn owned(target: RenderTarget) -> Self {
        Self { target, owned: true }
    }

    pub fn borrowed(target: RenderTarget) -> Self {
        Self { target, owned: false }
    }

    pub fn release(self) -> Option<RenderTarget> {
        if self.owned {
            self.target.remove();
            None
        } else {
            Some(self.target)
        }
    }
}

/// A pipeline's `build` failed after taking its primary target.
pub(crate) struct BuildFailure {
    pub error: PostFxError,
    pub primary: PrimaryTarget,
}

impl BuildFailure {
    pub fn new(error: PostFxError, primary: PrimaryTarget) -> Self {
        Self { error, primary }
    }

    /// Free an owned primary and keep the error.
    pub fn discard(self) -> PostFxError {
        self.primary.release();
        self.error
    }

    /// Hand a host-owned primary back with the error.
    pub fn hand_back(self) -> WithTargetError {
        WithTargetError {
            error: self.error,
            target: self.primary.target,
        }
    }
}

/// Options for an intermediate target shadowing `primary`: same formats, size and scale, never
/// multisampled.
pub(crate) fn aux_options(label: &str, primary: &RenderTarget) -> TargetOptions {
    let preference = |is_float: bool| {
        if is_float {
            FormatPreference::Float
        } else {
            FormatPreference::Default
        }
    };
    TargetOptions {
        label: label.to_string(),
        size: (!primary.tracks_host()).then(|| TargetSize {
            width: primary.width(),
            height: primary.height(),
        }),
        antialias: false,
        color_format: preference(primary.color_format() == FLOAT_COLOR_FORMAT),
        depth_format: preference(primary.depth_format() == FLOAT_DEPTH_FORMAT),
        supersample: primary.supersample(),
        pixel_density: (!primary.tracks_host_density()).then(|| primary.pixel_density()),
        clear_color: None,
    }
}

/// Keep `aux` at the primary target's size and density.
pub(crate) fn sync_aux<H: HostSurface + ?Sized>(
    aux: &mut RenderTarget,
    primary: &RenderTarget,
    host: &H,
) -> Result<(), PostFxError> {
    aux.sync_with_host(host)?;
    if !primary.tracks_host() && (aux.width(), aux.height()) != (primary.width(), primary.height()) {
        aux.resize(host.device(), primary.width(), primary.height())?;
    }
    Ok(())
}

/// Bind the whole of `target` as the destination of an intermediate pass.
pub(crate) fn target_binding(target: &RenderTarget) -> (Destination, Viewport) {
    let (width, height) = target.pixel_size();
    (Destination::Target(target.id()), Viewport::full(width, height))
}

/// Bind the whole display surface as the destination of a final pass.
pub(crate) fn display_binding<H: HostSurface + ?Sized>(host: &H) -> (Destination, Viewport) {
    let (width, height) = host.surface_size().pixel_size();
    (Destination::Surface, Viewport::full(width, height))
}

/// Logical surface size as shader `size`.
pub(crate) fn logical_size<H: HostSurface + ?Sized>(host: &H) -> [f32; 2] {
    let size = host.surface_size();
    [size.width as f32, size.height as f32]
}
