mod common;

use common::{assert_color_close, headless_host, pixel, stored_depth, SolidScene};
use postfx_wgpu::readback::read_color;
use postfx_wgpu::{
    Camera, Capabilities, ContactShadow, DepthOfField, EffectKind, GaussianBlur, HostSurface, OffscreenHost,
    PostFxError, PostProcess, PostProcessPipeline, RenderTarget, SurfaceSize, TargetOptions,
};

const SIZE: u32 = 200;
const TOLERANCE: f32 = 2.0 / 255.0;

/// Host whose adapter claims no depth-texture support, so any new target fails to allocate.
struct NoDepthTextures<'a> {
    inner: &'a OffscreenHost,
    capabilities: Capabilities,
}

impl<'a> NoDepthTextures<'a> {
    fn new(inner: &'a OffscreenHost) -> Self {
        Self {
            inner,
            capabilities: Capabilities {
                depth_textures: false,
                ..*inner.capabilities()
            },
        }
    }
}

impl HostSurface for NoDepthTextures<'_> {
    fn device(&self) -> &wgpu::Device {
        self.inner.device()
    }

    fn queue(&self) -> &wgpu::Queue {
        self.inner.queue()
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn surface_size(&self) -> SurfaceSize {
        self.inner.surface_size()
    }

    fn surface_format(&self) -> wgpu::TextureFormat {
        self.inner.surface_format()
    }

    fn camera(&self) -> &Camera {
        self.inner.camera()
    }
}

/// Draw a patterned scene through `pipeline` and compare the display with the scene itself.
fn assert_pipeline_is_identity<P: PostProcess>(host: &OffscreenHost, pipeline: &mut P, distance: f32) {
    let depth = stored_depth(host.camera(), distance);
    let scene = SolidScene::new(host.device(), pipeline.primary(), [0.0; 4], depth, true);

    let mut frame = host.begin_frame();
    pipeline
        .draw(host, &mut frame, |pass| scene.record(pass))
        .unwrap();
    assert_eq!(frame.binding_depth(), 0);
    host.submit(frame);

    let input = read_color(host.device(), host.queue(), pipeline.primary()).unwrap();
    let output = host.read_display().unwrap();
    assert_eq!(input.len(), output.len());
    for y in (3..SIZE).step_by(17) {
        for x in (5..SIZE).step_by(13) {
            assert_color_close(pixel(&output, SIZE, x, y), pixel(&input, SIZE, x, y), TOLERANCE);
        }
    }
}

#[test]
fn test_depth_of_field_wide_band_is_identity() {
    let Some(host) = headless_host(SIZE, SIZE) else { return };
    let mut dof = DepthOfField::new(&host, TargetOptions::labeled("DOF Scene")).unwrap();
    dof.set_dof(1000.0);
    dof.set_intensity(0.5);
    dof.set_samples(40);

    assert_pipeline_is_identity(&host, &mut dof, 400.0);
    assert!(dof.remove().is_none());
}

#[test]
fn test_gaussian_zero_intensity_is_identity() {
    let Some(host) = headless_host(SIZE, SIZE) else { return };
    let mut blur = GaussianBlur::new(&host, TargetOptions::labeled("Gaussian Scene")).unwrap();
    blur.set_intensity(0.0);

    // Far from the focus plane, so every pixel takes the blurred path.
    assert_pipeline_is_identity(&host, &mut blur, 1200.0);
    assert_eq!(blur.aux().pixel_size(), blur.primary().pixel_size());
    blur.remove();
}

#[test]
fn test_contact_shadow_zero_radius_is_identity() {
    let Some(host) = headless_host(SIZE, SIZE) else { return };
    let mut ao = ContactShadow::new(&host, TargetOptions::labeled("AO Scene")).unwrap();
    ao.set_search_radius(0.0);
    ao.set_intensity(1.0);

    assert_pipeline_is_identity(&host, &mut ao, 250.0);

    let visibility = read_color(host.device(), host.queue(), ao.occlusion()).unwrap();
    assert!(visibility.iter().all(|p| (p[0] - 1.0).abs() <= TOLERANCE));
    ao.remove();
}

#[test]
fn test_pipeline_variants_dispatch() {
    let Some(host) = headless_host(SIZE, SIZE) else { return };
    for kind in [EffectKind::DepthOfField, EffectKind::GaussianBlur, EffectKind::ContactShadow] {
        let mut pipeline = PostProcessPipeline::new(kind, &host, TargetOptions::default()).unwrap();
        assert_eq!(pipeline.kind(), kind);
        pipeline.set_intensity(0.0);
        pipeline.set_samples(1000);

        let scene = SolidScene::new(host.device(), pipeline.primary(), [0.3, 0.3, 0.3, 1.0], 0.9, false);
        let mut frame = host.begin_frame();
        pipeline.draw(&host, &mut frame, |pass| scene.record(pass)).unwrap();
        host.submit(frame);

        let output = host.read_display().unwrap();
        assert_color_close(pixel(&output, SIZE, SIZE / 2, SIZE / 2), [0.3, 0.3, 0.3, 1.0], TOLERANCE);
        assert!(pipeline.remove().is_none());
    }
}

#[test]
fn test_host_owned_target_is_returned() {
    let Some(host) = headless_host(SIZE, SIZE) else { return };
    let target = RenderTarget::new(&host, TargetOptions::labeled("Host Target")).unwrap();
    let id = target.id();

    let pipeline = PostProcessPipeline::with_target(EffectKind::GaussianBlur, &host, target).unwrap();
    let returned = pipeline.remove().expect("host-owned target");
    assert_eq!(returned.id(), id);
    returned.remove();
}

#[test]
fn test_failed_build_hands_back_host_target() {
    let Some(host) = headless_host(SIZE, SIZE) else { return };
    let broken = NoDepthTextures::new(&host);

    for kind in [EffectKind::GaussianBlur, EffectKind::ContactShadow] {
        let target = RenderTarget::new(&host, TargetOptions::labeled("Host Target")).unwrap();
        let id = target.id();

        let err = PostProcessPipeline::with_target(kind, &broken, target)
            .err()
            .expect("aux target cannot allocate");
        let (error, target) = err.into_parts();
        assert!(matches!(error, PostFxError::DepthTexturesUnsupported));
        assert_eq!(target.id(), id);
        target.remove();
    }
}

#[test]
fn test_aux_target_keeps_fixed_density() {
    let Some(mut host) = headless_host(100, 100) else { return };
    let mut blur = GaussianBlur::new(
        &host,
        TargetOptions {
            pixel_density: Some(2.0),
            ..TargetOptions::labeled("Dense Scene")
        },
    )
    .unwrap();
    assert_eq!(blur.primary().pixel_size(), (200, 200));
    assert_eq!(blur.aux().pixel_size(), (200, 200));

    host.resize(SurfaceSize::new(60, 40));
    let scene = SolidScene::new(host.device(), blur.primary(), [0.5; 4], 0.5, false);
    let mut frame = host.begin_frame();
    blur.draw(&host, &mut frame, |pass| scene.record(pass)).unwrap();
    host.submit(frame);

    assert_eq!(blur.primary().pixel_size(), (120, 80));
    assert_eq!(blur.aux().pixel_size(), blur.primary().pixel_size());
    blur.remove();
}
