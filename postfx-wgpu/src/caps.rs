//! Capability negotiation: maps requested target formats onto what the adapter supports.

use crate::error::PostFxError;

/// 8-bit color used for `FormatPreference::Default` on linear surfaces.
pub const DEFAULT_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// 8-bit color used for `FormatPreference::Default` on sRGB surfaces.
pub const DEFAULT_COLOR_FORMAT_SRGB: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Half-float color.
pub const FLOAT_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEFAULT_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
pub const FLOAT_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Upper bound on multisample count regardless of adapter support.
pub const MAX_SAMPLE_COUNT: u32 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatPreference {
    #[default]
    Default,
    Float,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatRequest {
    pub color: FormatPreference,
    pub depth: FormatPreference,
    pub antialias: bool,
}

/// What the adapter can do with the formats render targets may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Default depth format can be rendered to and sampled.
    pub depth_textures: bool,
    pub float_color: bool,
    pub float_depth: bool,
    pub color_samples: u32,
    pub float_color_samples: u32,
    pub depth_samples: u32,
    pub float_depth_samples: u32,
    /// Multisampled depth can be loaded in a fragment shader, which the depth resolve pass
    /// needs. The GL backend cannot.
    pub depth_resolve: bool,
    /// Depth textures can be copied into buffers for readback.
    pub depth_readback: bool,
}

impl Capabilities {
    pub fn query(adapter: &wgpu::Adapter) -> Self {
        let usable = |format: wgpu::TextureFormat| {
            adapter
                .get_texture_format_features(format)
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
        };
        let samples = |format: wgpu::TextureFormat, resolve: bool| {
            let flags = adapter.get_texture_format_features(format).flags;
            let resolvable = !resolve || flags.contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE);
            if resolvable && flags.sample_count_supported(MAX_SAMPLE_COUNT) {
                MAX_SAMPLE_COUNT
            } else {
                1
            }
        };
        let float_filterable = adapter
            .get_texture_format_features(FLOAT_COLOR_FORMAT)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);
        let downlevel = adapter.get_downlevel_capabilities().flags;

        let caps = Self {
            depth_textures: usable(DEFAULT_DEPTH_FORMAT),
            float_color: usable(FLOAT_COLOR_FORMAT) && float_filterable,
            float_depth: usable(FLOAT_DEPTH_FORMAT),
            color_samples: samples(DEFAULT_COLOR_FORMAT, true),
            float_color_samples: samples(FLOAT_COLOR_FORMAT, true),
            depth_samples: samples(DEFAULT_DEPTH_FORMAT, false),
            float_depth_samples: samples(FLOAT_DEPTH_FORMAT, false),
            depth_resolve: adapter.get_info().backend != wgpu::Backend::Gl,
            depth_readback: downlevel.contains(wgpu::DownlevelFlags::DEPTH_TEXTURE_AND_BUFFER_COPIES),
        };
        log::debug!("adapter capabilities: {caps:?}");
        caps
    }

    fn max_color_samples(&self, color: FormatPreference) -> u32 {
        match color {
            FormatPreference::Default => self.color_samples,
            FormatPreference::Float => self.float_color_samples,
        }
    }

    fn max_depth_samples(&self, depth: FormatPreference) -> u32 {
        match depth {
            FormatPreference::Default => self.depth_samples,
            FormatPreference::Float => self.float_depth_samples,
        }
    }
}

/// Formats a render target will actually be allocated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NegotiatedFormats {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub sample_count: u32,
    /// A float format was requested and replaced by the default.
    pub downgraded: bool,
}

impl NegotiatedFormats {
    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }
}

/// Resolve `request` against `caps`.
///
/// Missing depth-texture support and multisampled float color are fatal. Unsupported float
/// formats fall back to the defaults with a single warning. Antialiasing on a default color
/// format is dropped with a warning when the formats cannot be multisampled or the multisampled
/// depth cannot be resolved.
pub fn negotiate(
    request: &FormatRequest,
    caps: &Capabilities,
    surface_is_srgb: bool,
) -> Result<NegotiatedFormats, PostFxError> {
    if !caps.depth_textures {
        return Err(PostFxError::DepthTexturesUnsupported);
    }

    let mut color = request.color;
    let mut depth = request.depth;
    let float_supported = (color != FormatPreference::Float || caps.float_color)
        && (depth != FormatPreference::Float || caps.float_depth);
    if !float_supported {
        log::warn!("floating-point render targets are not supported by this adapter, using default formats");
        color = FormatPreference::Default;
        depth = FormatPreference::Default;
    }

    let color_format = match color {
        FormatPreference::Default if surface_is_srgb => DEFAULT_COLOR_FORMAT_SRGB,
        FormatPreference::Default => DEFAULT_COLOR_FORMAT,
        FormatPreference::Float => FLOAT_COLOR_FORMAT,
    };
    let depth_format = match depth {
        FormatPreference::Default => DEFAULT_DEPTH_FORMAT,
        FormatPreference::Float => FLOAT_DEPTH_FORMAT,
    };

    let mut sample_count = 1;
    if request.antialias {
        let supported = if caps.depth_resolve {
            caps.max_color_samples(color)
                .min(caps.max_depth_samples(depth))
                .min(MAX_SAMPLE_COUNT)
        } else {
            1
        };
        if supported > 1 {
            sample_count = supported;
        } else if color == FormatPreference::Float {
            return Err(PostFxError::MultisampleFloatUnsupported(color_format));
        } else {
            log::warn!("multisampling is not supported for {color_format:?}, antialiasing disabled");
        }
    }

    Ok(NegotiatedFormats {
        color_format,
        depth_format,
        sample_count,
        downgraded: !float_supported,
    })
}
