//! CPU evaluation of the post-process kernels.
//!
//! Each function mirrors its WGSL counterpart (same tap layout, gates and weights) over a
//! [`SceneImage`], one fragment per pixel with the logical size equal to the image size. Used to
//! check kernel behaviour without a GPU adapter.

use glam::{Vec2, Vec3, Vec4};

use crate::depth::{DepthRange, ProjInfo};
use crate::uniforms::{
    BlurParams, ContactShadowParams, MAX_BLUR_SAMPLES, MAX_DENOISE_SAMPLES, MAX_SHADOW_SAMPLES,
};

const TWO_PI: f32 = std::f32::consts::TAU;
const SHADOW_EPSILON: f32 = 0.01;
const GAUSSIAN_SIGMA: f32 = 1.0 / 6.0;

/// Color plus stored depth, row-major from the top-left pixel.
#[derive(Clone, Debug)]
pub struct SceneImage {
    width: usize,
    height: usize,
    color: Vec<Vec4>,
    depth: Vec<f32>,
}

impl SceneImage {
    /// Build an image from a per-pixel `(color, stored depth)` function.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> (Vec4, f32)) -> Self {
        let mut color = Vec::with_capacity(width * height);
        let mut depth = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let (c, d) = f(x, y);
                color.push(c);
                depth.push(d);
            }
        }
        Self { width, height, color, depth }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn color_at(&self, x: usize, y: usize) -> Vec4 {
        self.color[y * self.width + x]
    }

    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.depth[y * self.width + x]
    }

    fn extent(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Linear filter, clamp-to-edge.
    pub fn sample_color(&self, uv: Vec2) -> Vec4 {
        sample_bilinear(self.width, self.height, &self.color, uv)
    }

    /// Nearest filter, clamp-to-edge.
    pub fn sample_depth(&self, uv: Vec2) -> f32 {
        let p = (uv * self.extent()).floor();
        self.depth[texel_index(self.width, self.height, p.x as i64, p.y as i64)]
    }

    fn fragments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let extent = self.extent();
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| {
                let frag = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                (frag, frag / extent)
            })
        })
    }
}

fn texel_index(width: usize, height: usize, x: i64, y: i64) -> usize {
    let x = x.clamp(0, width as i64 - 1) as usize;
    let y = y.clamp(0, height as i64 - 1) as usize;
    y * width + x
}

fn sample_bilinear(width: usize, height: usize, data: &[Vec4], uv: Vec2) -> Vec4 {
    let p = uv * Vec2::new(width as f32, height as f32) - 0.5;
    let base = p.floor();
    let f = p - base;
    let (x, y) = (base.x as i64, base.y as i64);
    let at = |dx: i64, dy: i64| data[texel_index(width, height, x + dx, y + dy)];
    let top = at(0, 0).lerp(at(1, 0), f.x);
    let bottom = at(0, 1).lerp(at(1, 1), f.x);
    top.lerp(bottom, f.y)
}

fn rand(co: Vec2) -> f32 {
    let v = co.dot(Vec2::new(12.9898, 78.233)).sin() * 43758.5453;
    v - v.floor()
}

fn clamp_count(samples: i32, cap: u32) -> i32 {
    samples.min(cap as i32)
}

fn blur_amount(params: &BlurParams, z: f32, pixel_scale: f32) -> f32 {
    ((z - params.target_z).abs() - params.dof / 2.0).clamp(0.0, 0.3 * pixel_scale)
}

fn is_out_of_focus(params: &BlurParams, z: f32) -> bool {
    (z - params.target_z).abs() > params.dof / 2.0
}

/// dof.wgsl
pub fn depth_of_field(image: &SceneImage, params: &BlurParams) -> Vec<Vec4> {
    let range = DepthRange::new(params.near, params.far);
    let pixel_scale = params.size[0].max(params.size[1]);
    let count = clamp_count(params.num_samples, MAX_BLUR_SAMPLES);

    image
        .fragments()
        .map(|(frag, uv)| {
            let mut color = image.sample_color(uv);
            let mut total = 1.0;
            let orig_z = range.linearize(image.sample_depth(uv));
            if !is_out_of_focus(params, orig_z) {
                return color;
            }

            let blur_amt = blur_amount(params, orig_z, pixel_scale);
            let jitter = 5.0 * rand(frag);
            for i in 0..count.max(0) {
                let t = (i + 1) as f32 / count as f32;
                let angle = t * 12.0 * TWO_PI + jitter;
                let radius = 1.0 - t * t * t;
                let offset = Vec2::new(angle.cos(), angle.sin()) * radius * params.intensity * blur_amt
                    / pixel_scale;

                let z = range.linearize(image.sample_depth(uv + offset));
                let sample_blur = blur_amount(params, z, pixel_scale);
                if z >= orig_z || sample_blur >= blur_amt * radius + 5.0 {
                    color += image.sample_color(uv + offset);
                    total += 1.0;
                }
            }
            color / total
        })
        .collect()
}

/// gaussian_blur.wgsl, along the axis selected by `params.direction`.
pub fn gaussian_blur(image: &SceneImage, params: &BlurParams) -> Vec<Vec4> {
    let range = DepthRange::new(params.near, params.far);
    let pixel_scale = params.size[0].max(params.size[1]);
    let count = clamp_count(params.num_samples, MAX_BLUR_SAMPLES);
    let axis = if params.direction == 0 { Vec2::X } else { Vec2::Y };
    let steps = (count - 1).max(1) as f32;
    let norm = 1.0 / (TWO_PI.sqrt() * GAUSSIAN_SIGMA);

    image
        .fragments()
        .map(|(_, uv)| {
            let mut color = image.sample_color(uv);
            let mut total = 1.0;
            let orig_z = range.linearize(image.sample_depth(uv));
            if !is_out_of_focus(params, orig_z) {
                return color;
            }

            let blur_amt = blur_amount(params, orig_z, pixel_scale);
            for i in 0..count.max(0) {
                let radius = 2.0 * i as f32 / steps - 1.0;
                let dist_away = radius * params.intensity * blur_amt;
                let offset = axis * dist_away / pixel_scale;

                let z = range.linearize(image.sample_depth(uv + offset));
                let sample_blur = blur_amount(params, z, pixel_scale);
                let t = dist_away / (sample_blur * params.intensity).max(1e-5);
                let weight = norm * (-0.5 * (t / GAUSSIAN_SIGMA).powi(2)).exp();
                color += weight * image.sample_color(uv + offset);
                total += weight;
            }
            color / total
        })
        .collect()
}

/// Rotate `v` by the rotation taking +Y onto `normal`.
pub fn align_to_normal(v: Vec3, normal: Vec3) -> Vec3 {
    let axis = Vec3::Y.cross(normal);
    let sin_angle = axis.length();
    let cos_angle = Vec3::Y.dot(normal);
    if sin_angle < 0.01 {
        return if cos_angle > 0.0 { v } else { Vec3::new(v.x, -v.y, -v.z) };
    }
    let k = axis / sin_angle;
    v * cos_angle + k.cross(v) * sin_angle + k * k.dot(v) * (1.0 - cos_angle)
}

/// contact_shadow.wgsl: per-pixel visibility in `[0, 1]`, 1 meaning unoccluded.
pub fn contact_shadow_visibility(image: &SceneImage, params: &ContactShadowParams) -> Vec<f32> {
    let range = DepthRange::new(params.near, params.far);
    let info = ProjInfo(params.proj_info);
    let size = Vec2::from(params.size);
    let view_from_screen = |uv: Vec2| info.view_position(uv * size, range.linearize(image.sample_depth(uv)));

    let radius_squared = (params.search_radius * params.search_radius).max(1e-6);
    let count = clamp_count(params.num_samples, MAX_SHADOW_SAMPLES);
    let texel = Vec2::ONE / image.extent();

    image
        .fragments()
        .map(|(frag, uv)| {
            let position = view_from_screen(uv);
            let dx = view_from_screen(uv + Vec2::new(texel.x, 0.0)) - position;
            let dy = view_from_screen(uv + Vec2::new(0.0, texel.y)) - position;
            let mut normal = dx.cross(dy).normalize_or_zero();
            if normal.dot(position) > 0.0 {
                normal = -normal;
            }

            let mut occlusion = 0.0;
            for i in 0..count.max(0) {
                let t = (i + 1) as f32 / count as f32;
                let seed = frag + Vec2::new(i as f32 * 7.31, i as f32 * 3.17);
                let phi = t * 11.0 * TWO_PI + 0.5 * rand(seed);
                let theta = t * std::f32::consts::FRAC_PI_2 + 0.5 * rand(Vec2::new(seed.y, seed.x));
                let radius = 1.0 - t * t;
                let local = radius
                    * Vec3::new(phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());

                let test_position = position + align_to_normal(local, normal) * params.search_radius;
                let sample_uv = info.screen_position(test_position) / size;
                let sample_position = view_from_screen(sample_uv);
                if sample_position.z > 0.99 * params.far {
                    continue;
                }

                let to_sample = sample_position - position;
                let dist_squared = to_sample.length_squared();
                let vn = to_sample.dot(normal) - params.bias;
                let falloff = (radius_squared - dist_squared).max(0.0) / radius_squared;
                occlusion += falloff.powi(3) * (vn / (SHADOW_EPSILON + dist_squared)).max(0.0);
            }

            let average = occlusion / count.max(1) as f32;
            (1.0 - average).max(0.0).powf(1.0 + params.exponent).clamp(0.0, 1.0)
        })
        .collect()
}

/// contact_shadow_denoise.wgsl: depth-gated disk blur of `visibility`, composited onto color.
pub fn contact_shadow_composite(
    image: &SceneImage,
    visibility: &[f32],
    params: &ContactShadowParams,
) -> Vec<Vec4> {
    let occlusion: Vec<Vec4> = visibility.iter().map(|v| Vec4::splat(*v)).collect();
    let sample_occlusion = |uv: Vec2| sample_bilinear(image.width, image.height, &occlusion, uv).x;
    let size = Vec2::from(params.size);
    let count = clamp_count(params.num_blur_samples, MAX_DENOISE_SAMPLES);

    image
        .fragments()
        .map(|(_, uv)| {
            let color = image.sample_color(uv);
            let center_depth = image.sample_depth(uv);
            let mut blurred = sample_occlusion(uv);
            let mut total = 1.0;

            for i in 0..count.max(0) {
                let t = (i + 1) as f32 / count as f32;
                let angle = t * 12.0 * TWO_PI;
                let offset = Vec2::new(angle.cos(), angle.sin()) * t.sqrt() * params.blur_radius / size;
                if image.sample_depth(uv + offset) >= center_depth {
                    blurred += sample_occlusion(uv + offset);
                    total += 1.0;
                }
            }

            let shade = 1.0 + (blurred / total - 1.0) * params.intensity;
            (color.truncate() * shade).extend(color.w)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    const NEAR: f32 = 10.0;
    const FAR: f32 = 5000.0;

    fn checker(x: usize, y: usize) -> Vec4 {
        if (x + y) % 2 == 0 {
            Vec4::new(1.0, 1.0, 1.0, 1.0)
        } else {
            Vec4::new(0.0, 0.2, 0.4, 1.0)
        }
    }

    /// Left half at `near_z`, right half at `far_z`, checkerboard color.
    fn split_scene(size: usize, near_z: f32, far_z: f32) -> SceneImage {
        let range = DepthRange::new(NEAR, FAR);
        SceneImage::from_fn(size, size, |x, y| {
            let z = if x < size / 2 { near_z } else { far_z };
            (checker(x, y), range.delinearize(z))
        })
    }

    fn blur_params(size: usize) -> BlurParams {
        BlurParams {
            size: [size as f32; 2],
            intensity: 1.0,
            dof: 0.0,
            target_z: 300.0,
            near: NEAR,
            far: FAR,
            num_samples: 15,
            direction: 0,
            _pad: [0.0; 3],
        }
    }

    fn assert_images_close(a: &[Vec4], b: &[Vec4]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((*x - *y).abs().max_element() < 1e-4, "pixel {i}: {x} vs {y}");
        }
    }

    fn unblurred(image: &SceneImage) -> Vec<Vec4> {
        image.color.clone()
    }

    #[test]
    fn test_sampling_at_texel_centers() {
        let image = split_scene(8, 300.0, 600.0);
        let uv = Vec2::new(2.5, 5.5) / 8.0;
        assert!((image.sample_color(uv) - image.color_at(2, 5)).abs().max_element() < 1e-5);
        assert_eq!(image.sample_depth(uv), image.depth_at(2, 5));
        assert_eq!(image.sample_depth(Vec2::new(-1.0, 2.0)), image.depth_at(0, 7));
    }

    #[test]
    fn test_dof_wide_band_is_identity() {
        let image = split_scene(32, 300.0, 600.0);
        let params = BlurParams { dof: 1000.0, target_z: 450.0, ..blur_params(32) };
        assert_images_close(&depth_of_field(&image, &params), &unblurred(&image));
    }

    #[test]
    fn test_dof_blurs_only_out_of_focus() {
        let image = split_scene(32, 300.0, 600.0);
        // Stored depth linearizes back to 299.9998, so the in-focus half needs a band around 300.
        let params = BlurParams { dof: 1.0, ..blur_params(32) };
        let out = depth_of_field(&image, &params);

        for y in 0..32 {
            for x in 0..16 {
                let i = y * 32 + x;
                assert!((out[i] - image.color_at(x, y)).abs().max_element() < 1e-4);
            }
        }
        let changed = (0..32)
            .flat_map(|y| (16..32).map(move |x| (x, y)))
            .filter(|&(x, y)| (out[y * 32 + x] - image.color_at(x, y)).abs().max_element() > 0.1)
            .count();
        assert!(changed > 0);
    }

    #[test]
    fn test_gaussian_zero_intensity_is_identity() {
        let image = split_scene(32, 300.0, 600.0);
        for direction in [0, 1] {
            let params = BlurParams { intensity: 0.0, direction, ..blur_params(32) };
            assert_images_close(&gaussian_blur(&image, &params), &unblurred(&image));
        }
    }

    #[test]
    fn test_gaussian_wide_band_is_identity() {
        let image = split_scene(32, 300.0, 600.0);
        let params = BlurParams { dof: 1000.0, target_z: 450.0, ..blur_params(32) };
        assert_images_close(&gaussian_blur(&image, &params), &unblurred(&image));
    }

    #[test]
    fn test_gaussian_blurs_along_axis() {
        // Vertical stripes: a horizontal blur mixes them, a vertical one leaves them alone.
        let range = DepthRange::new(NEAR, FAR);
        let image = SceneImage::from_fn(32, 32, |x, _| {
            (Vec4::splat((x % 2) as f32), range.delinearize(600.0))
        });
        let horizontal = gaussian_blur(&image, &blur_params(32));
        let vertical = gaussian_blur(&image, &BlurParams { direction: 1, ..blur_params(32) });

        assert_images_close(&vertical, &unblurred(&image));
        assert!((horizontal[16 * 32 + 16] - image.color_at(16, 16)).abs().max_element() > 0.1);
    }

    #[test]
    fn test_sample_count_truncated_at_cap() {
        let image = split_scene(16, 300.0, 600.0);
        let capped = BlurParams { num_samples: MAX_BLUR_SAMPLES as i32, ..blur_params(16) };
        let over = BlurParams { num_samples: 500, ..blur_params(16) };
        assert_eq!(gaussian_blur(&image, &capped), gaussian_blur(&image, &over));
        assert_eq!(depth_of_field(&image, &capped), depth_of_field(&image, &over));
    }

    #[test]
    fn test_align_to_normal() {
        let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((align_to_normal(Vec3::Y, normal) - normal).length() < 1e-5);
        assert_eq!(align_to_normal(Vec3::X, Vec3::Y), Vec3::X);

        let flipped = align_to_normal(Vec3::new(0.2, 0.9, 0.1), -Vec3::Y);
        assert!(flipped.y < 0.0);
        assert!((flipped.length() - Vec3::new(0.2, 0.9, 0.1).length()).abs() < 1e-6);
    }

    /// A wall at distance 500 with a box face at 400 covering the left columns.
    fn wall_scene() -> (SceneImage, ContactShadowParams) {
        let size = 64;
        let range = DepthRange::new(NEAR, FAR);
        let image = SceneImage::from_fn(size, size, |x, _| {
            let z = if x < 28 { 400.0 } else { 500.0 };
            (Vec4::new(0.8, 0.6, 0.4, 1.0), range.delinearize(z))
        });
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, NEAR, FAR);
        let params = ContactShadowParams {
            proj_info: ProjInfo::from_projection(&projection, size as f32, size as f32).0,
            size: [size as f32; 2],
            near: NEAR,
            far: FAR,
            search_radius: 100.0,
            intensity: 0.5,
            exponent: 250.0,
            bias: 1.0,
            num_samples: 15,
            blur_radius: 8.0,
            num_blur_samples: 20,
            _pad: 0.0,
        };
        (image, params)
    }

    #[test]
    fn test_contact_shadow_zero_radius_is_unoccluded() {
        let (image, params) = wall_scene();
        let visibility =
            contact_shadow_visibility(&image, &ContactShadowParams { search_radius: 0.0, ..params });
        assert!(visibility.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_contact_shadow_visibility_non_increasing_with_radius() {
        let (image, params) = wall_scene();
        let radii = [0.0, 50.0, 300.0];
        let maps: Vec<Vec<f32>> = radii
            .iter()
            .map(|&search_radius| {
                contact_shadow_visibility(&image, &ContactShadowParams { search_radius, ..params })
            })
            .collect();

        // Wall pixels just right of the box edge.
        let pixels: Vec<usize> = (30..37).map(|x| 32 * 64 + x).collect();
        for &p in &pixels {
            let values: Vec<f32> = maps.iter().map(|m| m[p]).collect();
            for pair in values.windows(2) {
                assert!(pair[1] <= pair[0], "pixel {p}: {values:?}");
            }
            assert_eq!(values[0], 1.0);
        }
        let widest = pixels.iter().map(|&p| maps[2][p]).fold(1.0f32, f32::min);
        assert!(widest < 1.0);
    }

    #[test]
    fn test_flat_wall_is_unoccluded() {
        let (image, params) = wall_scene();
        let visibility = contact_shadow_visibility(&image, &params);
        // Far right columns see only the wall inside the search radius.
        assert_eq!(visibility[32 * 64 + 60], 1.0);
    }

    #[test]
    fn test_composite_preserves_color_when_unoccluded() {
        let (image, params) = wall_scene();
        let visibility = vec![1.0; 64 * 64];
        let out = contact_shadow_composite(&image, &visibility, &params);
        assert_images_close(&out, &unblurred(&image));
    }

    #[test]
    fn test_composite_scales_by_intensity() {
        let (image, params) = wall_scene();
        let visibility = vec![0.0; 64 * 64];

        let none = contact_shadow_composite(&image, &visibility, &ContactShadowParams { intensity: 0.0, ..params });
        assert_images_close(&none, &unblurred(&image));

        let half = contact_shadow_composite(&image, &visibility, &params);
        let expected = Vec4::new(0.4, 0.3, 0.2, 1.0);
        assert!((half[100] - expected).abs().max_element() < 1e-5);
    }
}
