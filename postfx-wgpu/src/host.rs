//! Host surface abstraction injected into render targets and pipelines.
//!
//! The host owns the device, the display surface and the active camera. Render targets and
//! post-process pipelines read them through [`HostSurface`] on every call instead of holding
//! on to host state.

use std::f32::consts::{FRAC_PI_3, FRAC_PI_6};

use glam::{Mat4, Vec3};
use postfx_gpu_shared::depth::{DepthRange, ProjInfo};

use crate::caps::Capabilities;
use crate::render_targets::pixel_extent;

/// Logical size of the display surface plus its pixel density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub pixel_density: f32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_density: 1.0,
        }
    }

    pub fn with_density(self, pixel_density: f32) -> Self {
        Self {
            pixel_density,
            ..self
        }
    }

    /// Physical size of the surface in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        pixel_extent(self.width, self.height, self.pixel_density, 1.0)
    }
}

/// Distance of the host's default camera from the origin for a surface `height` pixels tall.
pub fn default_eye_distance(height: f32) -> f32 {
    (height / 2.0) / FRAC_PI_6.tan()
}

/// Active camera: clip planes, projection (wgpu `[0, 1]` depth) and current model-view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub near: f32,
    pub far: f32,
    pub projection: Mat4,
    pub model_view: Mat4,
}

impl Camera {
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            model_view: Mat4::IDENTITY,
        }
    }

    /// The host's default camera: 60° vertical fov, eye on +Z looking at the origin,
    /// near/far at a tenth and ten times the eye distance.
    pub fn default_for(width: u32, height: u32) -> Self {
        let eye = default_eye_distance(height as f32);
        let aspect = width as f32 / height.max(1) as f32;
        Self {
            model_view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, eye), Vec3::ZERO, Vec3::Y),
            ..Self::perspective(FRAC_PI_3, aspect, eye / 10.0, eye * 10.0)
        }
    }

    pub fn with_model_view(self, model_view: Mat4) -> Self {
        Self { model_view, ..self }
    }

    pub fn depth_range(&self) -> DepthRange {
        DepthRange::new(self.near, self.far)
    }

    pub fn proj_info(&self, width: f32, height: f32) -> ProjInfo {
        ProjInfo::from_projection(&self.projection, width, height)
    }
}

/// What render targets and pipelines need from the host.
pub trait HostSurface {
    fn device(&self) -> &wgpu::Device;
    fn queue(&self) -> &wgpu::Queue;
    fn capabilities(&self) -> &Capabilities;
    fn surface_size(&self) -> SurfaceSize;
    /// Format of the display surface the final post-process pass writes.
    fn surface_format(&self) -> wgpu::TextureFormat;
    fn camera(&self) -> &Camera;
}
