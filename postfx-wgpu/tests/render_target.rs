mod common;

use common::{assert_color_close, draw_target, headless_host, pixel, stored_depth, SolidScene};
use postfx_wgpu::binding::{Destination, Viewport};
use postfx_wgpu::readback::{read_color, read_depth};
use postfx_wgpu::{FormatPreference, HostSurface, RenderTarget, SurfaceSize, TargetOptions, TargetSize};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

#[test]
fn test_resize_sets_texture_dimensions() {
    let Some(host) = headless_host(64, 64) else { return };

    let mut target = RenderTarget::new(
        &host,
        TargetOptions {
            size: Some(TargetSize { width: 64, height: 48 }),
            pixel_density: Some(2.0),
            ..TargetOptions::labeled("Resize")
        },
    )
    .unwrap();
    assert_eq!(target.pixel_size(), (128, 96));

    target.resize(host.device(), 100, 50).unwrap();
    assert_eq!((target.width(), target.height()), (100, 50));
    assert_eq!(target.pixel_size(), (200, 100));
    let (color, depth) = (target.color(), target.depth());
    assert_eq!((color.width, color.height), (depth.width, depth.height));
    assert_eq!(color.texture.width(), 200);
    assert_eq!(depth.texture.height(), 100);

    target.remove();
}

#[test]
fn test_tracking_target_follows_host() {
    let Some(mut host) = headless_host(64, 64) else { return };

    let mut target = RenderTarget::new(
        &host,
        TargetOptions {
            supersample: 2.0,
            ..TargetOptions::labeled("Tracking")
        },
    )
    .unwrap();
    assert!(target.tracks_host());
    assert_eq!(target.pixel_size(), (128, 128));

    host.resize(SurfaceSize::new(80, 30).with_density(1.5));
    target.sync_with_host(&host).unwrap();
    assert_eq!((target.width(), target.height()), (80, 30));
    assert_eq!(target.pixel_size(), (240, 90));

    // A fixed resize stops tracking.
    target.resize(host.device(), 10, 10).unwrap();
    host.resize(SurfaceSize::new(64, 64));
    target.sync_with_host(&host).unwrap();
    assert_eq!((target.width(), target.height()), (10, 10));
}

#[test]
fn test_red_scene_color_and_depth() {
    let Some(host) = headless_host(400, 400) else { return };

    let mut target = RenderTarget::new(
        &host,
        TargetOptions {
            size: Some(TargetSize { width: 400, height: 400 }),
            depth_format: FormatPreference::Float,
            ..TargetOptions::labeled("Red Scene")
        },
    )
    .unwrap();

    let distance = 500.0;
    let camera = *host.camera();
    let scene = SolidScene::new(host.device(), &target, RED, stored_depth(&camera, distance), false);
    draw_target(&host, &mut target, &scene);

    let colors = read_color(host.device(), host.queue(), &target).unwrap();
    for (x, y) in [(200, 200), (1, 1), (398, 37), (120, 399)] {
        assert_color_close(pixel(&colors, 400, x, y), RED, 1e-3);
    }

    if target.formats().downgraded || !host.capabilities().depth_readback {
        eprintln!("depth readback unsupported, skipping depth check");
        return;
    }
    let depths = read_depth(host.device(), host.queue(), &target).unwrap();
    let z = camera.depth_range().linearize(depths[200 * 400 + 200]);
    assert!((z - distance).abs() / distance < 1e-3, "linear depth {z}, expected {distance}");
}

#[test]
fn test_multisampled_center_matches_single_sample() {
    let Some(host) = headless_host(128, 128) else { return };
    let color = [0.2, 0.6, 0.4, 1.0];
    let depth = stored_depth(host.camera(), 300.0);

    let mut plain = RenderTarget::new(&host, TargetOptions::labeled("Plain")).unwrap();
    let mut msaa = RenderTarget::new(
        &host,
        TargetOptions {
            antialias: true,
            ..TargetOptions::labeled("MSAA")
        },
    )
    .unwrap();

    for target in [&mut plain, &mut msaa] {
        let scene = SolidScene::new(host.device(), target, color, depth, false);
        draw_target(&host, target, &scene);
    }

    let a = read_color(host.device(), host.queue(), &plain).unwrap();
    let b = read_color(host.device(), host.queue(), &msaa).unwrap();
    assert_color_close(pixel(&a, 128, 64, 64), pixel(&b, 128, 64, 64), 2.0 / 255.0);
    assert_color_close(pixel(&b, 128, 64, 64), color, 2.0 / 255.0);
}

#[test]
fn test_multisampled_depth_matches_single_sample() {
    let Some(host) = headless_host(128, 128) else { return };
    if !host.capabilities().depth_readback {
        eprintln!("depth readback unsupported, skipping");
        return;
    }
    let distance = 450.0;
    let camera = *host.camera();
    let float_depth = |label: &str, antialias: bool| TargetOptions {
        antialias,
        depth_format: FormatPreference::Float,
        ..TargetOptions::labeled(label)
    };

    let mut plain = RenderTarget::new(&host, float_depth("Plain Depth", false)).unwrap();
    let mut msaa = RenderTarget::new(&host, float_depth("MSAA Depth", true)).unwrap();
    if plain.formats().downgraded || !msaa.is_antialiased() {
        eprintln!("multisampled float depth unsupported, skipping");
        return;
    }

    for target in [&mut plain, &mut msaa] {
        let scene = SolidScene::new(host.device(), target, RED, stored_depth(&camera, distance), false);
        draw_target(&host, target, &scene);
    }

    let range = camera.depth_range();
    let center = 64 * 128 + 64;
    let a = range.linearize(read_depth(host.device(), host.queue(), &plain).unwrap()[center]);
    let b = range.linearize(read_depth(host.device(), host.queue(), &msaa).unwrap()[center]);
    assert!((a - distance).abs() / distance < 1e-3, "single-sample depth {a}");
    assert!((a - b).abs() / distance < 1e-3, "resolved depth {b}, single-sample {a}");
}

#[test]
fn test_draw_restores_previous_binding() {
    let Some(host) = headless_host(32, 32) else { return };
    let mut target = RenderTarget::new(&host, TargetOptions::labeled("Scoped")).unwrap();
    let scene = SolidScene::new(host.device(), &target, RED, 0.5, false);

    let mut frame = host.begin_frame();
    let outer = Destination::Target(postfx_wgpu::TargetId::next());
    {
        let mut bound = frame.bind(outer, Viewport::full(16, 16));
        target.draw(&host, &mut bound, |pass| scene.record(pass)).unwrap();
        assert_eq!(bound.current().destination, outer);
        assert_eq!(bound.current().viewport, Viewport::full(16, 16));
        assert_eq!(bound.binding_depth(), 1);
    }
    assert_eq!(frame.current().destination, Destination::Surface);
    assert_eq!(frame.binding_depth(), 0);
    host.submit(frame);
}
