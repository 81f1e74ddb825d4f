//! Window-backed host presenting to a wgpu surface.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::binding::Frame;
use crate::caps::Capabilities;
use crate::error::PostFxError;
use crate::host::{Camera, HostSurface, SurfaceSize};

/// Acquired swapchain image for one frame.
pub struct SurfaceFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

impl SurfaceFrame {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Show the image. Submit the frame drawn into it first.
    pub fn present(self) {
        self.texture.present();
    }
}

pub struct WindowHost {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: Capabilities,
    size: SurfaceSize,
    camera: Camera,
}

impl WindowHost {
    /// Create a device and surface for `window`, `size` being its logical size and density.
    pub fn new(
        window: impl HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
        size: SurfaceSize,
    ) -> Result<Self, PostFxError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(PostFxError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("PostFx Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(PostFxError::IncompatibleSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (width, height) = size.pixel_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let capabilities = Capabilities::query(&adapter);
        log::info!(
            "Created window host on {}: {}x{} px, {:?}",
            adapter.get_info().name,
            width,
            height,
            surface_format,
        );

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            capabilities,
            size,
            camera: Camera::default_for(size.width, size.height),
        })
    }

    /// Reconfigure the surface. Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32, pixel_density: f32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = SurfaceSize::new(width, height).with_density(pixel_density);
        let (pixel_width, pixel_height) = self.size.pixel_size();
        self.surface_config.width = pixel_width;
        self.surface_config.height = pixel_height;
        self.surface.configure(&self.device, &self.surface_config);
        log::debug!("surface resized to {width}x{height} @{pixel_density}x");
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn acquire(&self) -> Result<SurfaceFrame, PostFxError> {
        let texture = self.surface.get_current_texture()?;
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(SurfaceFrame { texture, view })
    }

    pub fn begin_frame<'a>(&self, surface_frame: &'a SurfaceFrame) -> Frame<'a> {
        Frame::new(
            &self.device,
            &surface_frame.view,
            (self.surface_config.width, self.surface_config.height),
        )
    }

    pub fn submit(&self, frame: Frame<'_>) {
        self.queue.submit(std::iter::once(frame.finish()));
    }
}

impl HostSurface for WindowHost {
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
        self.surface_config.format
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }
}
