//! wgpu render targets and screen-space post-processing.
//!
//! A host implements [`HostSurface`] (or uses [`OffscreenHost`] / [`WindowHost`]), draws its scene
//! into a [`RenderTarget`], and a [`PostProcessPipeline`] turns the target's color and depth into
//! the final image: depth-of-field, separable Gaussian blur, or contact-shadow ambient occlusion.

pub mod binding;
pub mod caps;
pub mod effect;
pub mod error;
pub mod handle;
pub mod headless;
pub mod host;
pub mod logging;
pub mod passes;
pub mod pipeline;
pub mod postfx;
pub mod readback;
pub mod render_targets;
pub mod window;

pub use binding::{BoundDestination, Destination, Frame, Viewport};
pub use caps::{Capabilities, FormatPreference, NegotiatedFormats};
pub use effect::EffectPass;
pub use error::{PostFxError, WithTargetError};
pub use headless::OffscreenHost;
pub use host::{Camera, HostSurface, SurfaceSize};
pub use logging::{init_logging, LoggingConfig};
pub use postfx::{
    BlurSettings, ContactShadow, ContactShadowSettings, DepthOfField, EffectKind, GaussianBlur, PostProcess,
    PostProcessPipeline,
};
pub use render_targets::{AttachmentTexture, RenderTarget, TargetId, TargetOptions, TargetSize};
pub use window::{SurfaceFrame, WindowHost};

pub use postfx_gpu_shared as shared;
