//! Error type for render-target and post-process construction.

use std::fmt;

use postfx_gpu_shared::uniforms::ContractError;
use thiserror::Error;

use crate::render_targets::RenderTarget;

#[derive(Debug, Error)]
pub enum PostFxError {
    #[error("depth textures are not supported by this adapter")]
    DepthTexturesUnsupported,

    #[error("antialiasing with {0:?} color targets is not supported by this adapter")]
    MultisampleFloatUnsupported(wgpu::TextureFormat),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("the surface reports no formats usable with this adapter")]
    IncompatibleSurface,

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("surface texture error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("failed to allocate {label}: {message}")]
    Allocation { label: String, message: String },

    #[error("failed to create {label} pipeline: {message}")]
    Pipeline { label: String, message: String },

    #[error("{label} needs {width}x{height} pixels, device limit is {limit}")]
    TargetTooLarge {
        label: String,
        width: u32,
        height: u32,
        limit: u32,
    },

    #[error("readback is not supported for {0:?}")]
    UnsupportedReadback(wgpu::TextureFormat),

    #[error("failed to map readback buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("readback buffer mapping was dropped before completing")]
    ReadbackChannelClosed,

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// A pipeline could not be built around a host-owned target. The target is handed back
/// untouched.
#[derive(Error)]
#[error("failed to build post-process pipeline on {}: {error}", .target.label())]
pub struct WithTargetError {
    #[source]
    pub error: PostFxError,
    pub target: RenderTarget,
}

impl WithTargetError {
    pub fn into_parts(self) -> (PostFxError, RenderTarget) {
        (self.error, self.target)
    }
}

impl fmt::Debug for WithTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithTargetError")
            .field("error", &self.error)
            .field("target", &self.target.label())
            .finish()
    }
}
