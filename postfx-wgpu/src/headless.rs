//! Offscreen host: a device without a window, drawing its display into a texture that can be
//! read back.

use crate::binding::Frame;
use crate::caps::Capabilities;
use crate::error::PostFxError;
use crate::host::{Camera, HostSurface, SurfaceSize};
use crate::readback::{decode_color, read_texture};
use crate::render_targets::{create_attachment, AttachmentTexture};

/// Format of the offscreen display texture.
pub const DISPLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct OffscreenHost {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    capabilities: Capabilities,
    size: SurfaceSize,
    camera: Camera,
    display: AttachmentTexture,
}

impl OffscreenHost {
    /// Create a headless device, falling back to a software adapter when no hardware one exists.
    pub fn new(size: SurfaceSize) -> Result<Self, PostFxError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let request = |force_fallback_adapter| {
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter,
            }))
        };
        let adapter = request(false).or_else(|| request(true)).ok_or(PostFxError::NoAdapter)?;
        let adapter_info = adapter.get_info();

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("PostFx Offscreen Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))?;

        let capabilities = Capabilities::query(&adapter);
        let display = create_display(&device, size);
        log::info!(
            "Created offscreen host on {} ({:?}), {}x{} @{}x",
            adapter_info.name,
            adapter_info.backend,
            size.width,
            size.height,
            size.pixel_density,
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            capabilities,
            size,
            camera: Camera::default_for(size.width, size.height),
            display,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Start recording a frame whose final passes write the display texture.
    pub fn begin_frame(&self) -> Frame<'_> {
        Frame::new(
            &self.device,
            &self.display.view,
            (self.display.width, self.display.height),
        )
    }

    pub fn submit(&self, frame: Frame<'_>) {
        self.queue.submit(std::iter::once(frame.finish()));
    }

    /// Change the surface size or density. The camera is left as is.
    pub fn resize(&mut self, size: SurfaceSize) {
        if size != self.size {
            self.display = create_display(&self.device, size);
            self.size = size;
            log::debug!("offscreen host resized to {}x{} @{}x", size.width, size.height, size.pixel_density);
        }
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn display(&self) -> &AttachmentTexture {
        &self.display
    }

    /// Display contents as RGBA floats, row-major from the top-left pixel.
    pub fn read_display(&self) -> Result<Vec<[f32; 4]>, PostFxError> {
        let bytes = read_texture(
            &self.device,
            &self.queue,
            &self.display.texture,
            (self.display.width, self.display.height),
            wgpu::TextureAspect::All,
        )?;
        decode_color(&bytes, self.display.format)
    }
}

fn create_display(device: &wgpu::Device, size: SurfaceSize) -> AttachmentTexture {
    create_attachment(
        device,
        "Offscreen Display",
        DISPLAY_FORMAT,
        size.pixel_size(),
        1,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
    )
}

impl HostSurface for OffscreenHost {
    fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn surface_size(&self) -> SurfaceSize {
        self.size
    }

    fn surface_format(&self) -> wgpu::TextureFormat {
        DISPLAY_FORMAT
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }
}
