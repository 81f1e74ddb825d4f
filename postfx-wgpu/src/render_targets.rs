//! Offscreen render targets: a color and a depth attachment, optionally backed by multisample
//! storage that is resolved into them after every draw.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::{Destination, Frame, Viewport};
use crate::caps::{negotiate, FormatPreference, FormatRequest, NegotiatedFormats, FLOAT_DEPTH_FORMAT};
use crate::error::PostFxError;
use crate::handle::HandleStore;
use crate::host::HostSurface;
use crate::passes::resolve::render_depth_resolve;
use crate::pipeline;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a render target, used as a binding destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    pub fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Allocated pixel size for a logical size: `round(size · density · supersample)`, at least 1.
pub fn pixel_extent(width: u32, height: u32, pixel_density: f32, supersample: f32) -> (u32, u32) {
    let scale = pixel_density * supersample;
    let scaled = |v: u32| ((v as f32 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct TargetOptions {
    pub label: String,
    /// Fixed logical size. `None` tracks the host surface.
    pub size: Option<TargetSize>,
    pub antialias: bool,
    pub color_format: FormatPreference,
    pub depth_format: FormatPreference,
    pub supersample: f32,
    /// `None` follows the host surface density.
    pub pixel_density: Option<f32>,
    /// Clear color and depth before each draw. `None` keeps the previous contents.
    pub clear_color: Option<wgpu::Color>,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            label: "Render Target".to_string(),
            size: None,
            antialias: false,
            color_format: FormatPreference::Default,
            depth_format: FormatPreference::Default,
            supersample: 1.0,
            pixel_density: None,
            clear_color: Some(wgpu::Color::TRANSPARENT),
        }
    }
}

impl TargetOptions {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// One texture owned by a render target.
pub struct AttachmentTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
}

struct MsaaAttachments {
    color: u64,
    depth: u64,
    resolve_bind_group: wgpu::BindGroup,
}

/// Handles of the live attachment set.
struct Attachments {
    color: u64,
    depth: u64,
    msaa: Option<MsaaAttachments>,
}

impl Attachments {
    fn handles(&self) -> Vec<u64> {
        let mut handles = vec![self.color, self.depth];
        if let Some(msaa) = &self.msaa {
            handles.extend([msaa.color, msaa.depth]);
        }
        handles
    }
}

struct DepthResolve {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

pub struct RenderTarget {
    id: TargetId,
    label: String,
    width: u32,
    height: u32,
    pixel_density: f32,
    supersample: f32,
    tracks_host_size: bool,
    tracks_host_density: bool,
    formats: NegotiatedFormats,
    clear_color: Option<wgpu::Color>,
    textures: HandleStore<AttachmentTexture>,
    attachments: Attachments,
    depth_resolve: Option<DepthResolve>,
}

impl RenderTarget {
    /// Negotiate formats against the host's capabilities and allocate the attachments.
    pub fn new<H: HostSurface + ?Sized>(host: &H, options: TargetOptions) -> Result<Self, PostFxError> {
        let request = FormatRequest {
            color: options.color_format,
            depth: options.depth_format,
            antialias: options.antialias,
        };
        let formats = negotiate(&request, host.capabilities(), host.surface_format().is_srgb())?;

        let surface = host.surface_size();
        let (width, height) = options
            .size
            .map_or((surface.width, surface.height), |s| (s.width, s.height));
        let pixel_density = options.pixel_density.unwrap_or(surface.pixel_density);
        let supersample = options.supersample.max(f32::EPSILON);

        let device = host.device();
        let depth_resolve = formats
            .is_multisampled()
            .then(|| {
                pipeline::scoped(device, "Depth Resolve", || {
                    let bind_group_layout = pipeline::create_depth_resolve_bind_group_layout(device);
                    DepthResolve {
                        pipeline: pipeline::create_depth_resolve_pipeline(
                            device,
                            &bind_group_layout,
                            formats.depth_format,
                        ),
                        bind_group_layout,
                    }
                })
            })
            .transpose()?;

        let mut textures = HandleStore::new();
        let extent = pixel_extent(width, height, pixel_density, supersample);
        let attachments = allocate_attachments(
            device,
            &options.label,
            &formats,
            extent,
            &mut textures,
            depth_resolve.as_ref(),
        )?;

        log::info!(
            "Created {}: {}x{} @{}x ({}x{} px), {:?}/{:?}, {} sample(s)",
            options.label,
            width,
            height,
            pixel_density * supersample,
            extent.0,
            extent.1,
            formats.color_format,
            formats.depth_format,
            formats.sample_count,
        );

        Ok(Self {
            id: TargetId::next(),
            label: options.label,
            width,
            height,
            pixel_density,
            supersample,
            tracks_host_size: options.size.is_none(),
            tracks_host_density: options.pixel_density.is_none(),
            formats,
            clear_color: options.clear_color,
            textures,
            attachments,
            depth_resolve,
        })
    }

    /// Record `scene` into this target, then resolve multisample storage.
    ///
    /// The target is the frame's current destination while `scene` runs; the previous
    /// destination and viewport are current again when this returns.
    pub fn draw<H, F>(&mut self, host: &H, frame: &mut Frame<'_>, scene: F) -> Result<(), PostFxError>
    where
        H: HostSurface + ?Sized,
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        self.sync_with_host(host)?;

        let (pixel_width, pixel_height) = self.pixel_size();
        let viewport = Viewport::full(pixel_width, pixel_height);
        let mut bound = frame.bind(Destination::Target(self.id), viewport);

        let (color_load, depth_load) = match self.clear_color {
            Some(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };
        let color = &self.textures[self.attachments.color];
        let depth = &self.textures[self.attachments.depth];
        let (draw_color, resolve_target, draw_depth) = match &self.attachments.msaa {
            Some(msaa) => (
                &self.textures[msaa.color].view,
                Some(&color.view),
                &self.textures[msaa.depth].view,
            ),
            None => (&color.view, None, &depth.view),
        };

        {
            let mut pass = bound.encoder().begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&self.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: draw_color,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: draw_depth,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            viewport.apply(&mut pass);
            scene(&mut pass);
        }

        if let (Some(msaa), Some(resolve)) = (&self.attachments.msaa, &self.depth_resolve) {
            render_depth_resolve(
                bound.encoder(),
                &depth.view,
                &resolve.pipeline,
                &msaa.resolve_bind_group,
            );
        }
        Ok(())
    }

    /// Resize to a fixed logical size. A target that tracked the host stops doing so.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), PostFxError> {
        self.tracks_host_size = false;
        self.reallocate(device, width, height, self.pixel_density)
    }

    /// Follow the host surface's size and density where this target tracks them.
    pub fn sync_with_host<H: HostSurface + ?Sized>(&mut self, host: &H) -> Result<(), PostFxError> {
        let surface = host.surface_size();
        let (width, height) = if self.tracks_host_size {
            (surface.width, surface.height)
        } else {
            (self.width, self.height)
        };
        let density = if self.tracks_host_density {
            surface.pixel_density
        } else {
            self.pixel_density
        };

        if (width, height, density) != (self.width, self.height, self.pixel_density) {
            self.reallocate(host.device(), width, height, density)?;
        }
        Ok(())
    }

    fn reallocate(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        pixel_density: f32,
    ) -> Result<(), PostFxError> {
        let extent = pixel_extent(width, height, pixel_density, self.supersample);
        let fresh = allocate_attachments(
            device,
            &self.label,
            &self.formats,
            extent,
            &mut self.textures,
            self.depth_resolve.as_ref(),
        )?;

        // Old textures are dropped rather than destroyed: commands already recorded this frame
        // may still reference them.
        let stale = std::mem::replace(&mut self.attachments, fresh);
        for handle in stale.handles() {
            self.textures.remove(handle);
        }

        self.width = width;
        self.height = height;
        self.pixel_density = pixel_density;
        log::debug!("{} resized to {}x{} ({}x{} px)", self.label, width, height, extent.0, extent.1);
        Ok(())
    }

    /// Free every texture this target owns.
    pub fn remove(mut self) {
        for attachment in self.textures.drain() {
            attachment.texture.destroy();
        }
        log::debug!("{} removed", self.label);
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Logical width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Logical height.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_density(&self) -> f32 {
        self.pixel_density
    }

    pub fn supersample(&self) -> f32 {
        self.supersample
    }

    pub fn tracks_host(&self) -> bool {
        self.tracks_host_size
    }

    /// Pixel density follows the host's rather than a fixed `TargetOptions::pixel_density`.
    pub fn tracks_host_density(&self) -> bool {
        self.tracks_host_density
    }

    /// Allocated size of the color and depth textures.
    pub fn pixel_size(&self) -> (u32, u32) {
        let color = self.color();
        (color.width, color.height)
    }

    /// Resolved color of the last draw. Valid until the next resize.
    pub fn color(&self) -> &AttachmentTexture {
        &self.textures[self.attachments.color]
    }

    /// Resolved depth of the last draw. Valid until the next resize.
    pub fn depth(&self) -> &AttachmentTexture {
        &self.textures[self.attachments.depth]
    }

    pub fn formats(&self) -> &NegotiatedFormats {
        &self.formats
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.formats.color_format
    }

    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.formats.depth_format
    }

    pub fn sample_count(&self) -> u32 {
        self.formats.sample_count
    }

    pub fn is_antialiased(&self) -> bool {
        self.formats.is_multisampled()
    }

    /// Color target state for scene pipelines drawing into this target.
    pub fn color_target_state(&self) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format: self.formats.color_format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        }
    }

    /// Depth state for scene pipelines drawing into this target.
    pub fn depth_stencil_state(&self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: self.formats.depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }

    pub fn multisample_state(&self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: self.formats.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}

pub(crate) fn create_attachment(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    (width, height): (u32, u32),
    sample_count: u32,
    usage: wgpu::TextureUsages,
) -> AttachmentTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    AttachmentTexture {
        texture,
        view,
        width,
        height,
        format,
        sample_count,
    }
}

/// Build a complete attachment set and register it in `textures`. Nothing is registered when
/// allocation fails.
fn allocate_attachments(
    device: &wgpu::Device,
    label: &str,
    formats: &NegotiatedFormats,
    extent: (u32, u32),
    textures: &mut HandleStore<AttachmentTexture>,
    depth_resolve: Option<&DepthResolve>,
) -> Result<Attachments, PostFxError> {
    let limit = device.limits().max_texture_dimension_2d;
    if extent.0 > limit || extent.1 > limit {
        return Err(PostFxError::TargetTooLarge {
            label: label.to_string(),
            width: extent.0,
            height: extent.1,
            limit,
        });
    }

    let color_usage = wgpu::TextureUsages::RENDER_ATTACHMENT
        | wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::COPY_DST;
    let mut depth_usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    if formats.depth_format == FLOAT_DEPTH_FORMAT {
        depth_usage |= wgpu::TextureUsages::COPY_SRC;
    }

    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let color = create_attachment(device, &format!("{label} Color"), formats.color_format, extent, 1, color_usage);
    let depth = create_attachment(device, &format!("{label} Depth"), formats.depth_format, extent, 1, depth_usage);
    let msaa = formats.is_multisampled().then(|| {
        (
            create_attachment(
                device,
                &format!("{label} MSAA Color"),
                formats.color_format,
                extent,
                formats.sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
            create_attachment(
                device,
                &format!("{label} MSAA Depth"),
                formats.depth_format,
                extent,
                formats.sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
        )
    });
    let resolve_bind_group = match (&msaa, depth_resolve) {
        (Some((_, msaa_depth)), Some(resolve)) => Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Depth Resolve BG")),
            layout: &resolve.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&msaa_depth.view),
            }],
        })),
        _ => None,
    };

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    if let Some(error) = validation.or(out_of_memory) {
        return Err(PostFxError::Allocation {
            label: label.to_string(),
            message: error.to_string(),
        });
    }

    let msaa = match (msaa, resolve_bind_group) {
        (Some((msaa_color, msaa_depth)), Some(resolve_bind_group)) => Some(MsaaAttachments {
            color: textures.insert(msaa_color),
            depth: textures.insert(msaa_depth),
            resolve_bind_group,
        }),
        _ => None,
    };
    Ok(Attachments {
        color: textures.insert(color),
        depth: textures.insert(depth),
        msaa,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_extent_scales_by_density_and_supersample() {
        assert_eq!(pixel_extent(400, 300, 1.0, 1.0), (400, 300));
        assert_eq!(pixel_extent(400, 300, 2.0, 1.0), (800, 600));
        assert_eq!(pixel_extent(400, 300, 2.0, 1.5), (1200, 900));
        assert_eq!(pixel_extent(101, 33, 1.5, 1.0), (152, 50));
    }

    #[test]
    fn test_pixel_extent_never_zero() {
        assert_eq!(pixel_extent(0, 0, 1.0, 1.0), (1, 1));
        assert_eq!(pixel_extent(1, 1, 0.25, 1.0), (1, 1));
    }

    #[test]
    fn test_target_ids_are_unique() {
        assert_ne!(TargetId::next(), TargetId::next());
    }

    #[test]
    fn test_default_options_track_host() {
        let options = TargetOptions::labeled("Scene");
        assert!(options.size.is_none());
        assert!(options.pixel_density.is_none());
        assert!(!options.antialias);
        assert_eq!(options.supersample, 1.0);
        assert_eq!(options.label, "Scene");
    }
}
