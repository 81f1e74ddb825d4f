//! Depth linearization and view-space reconstruction.
//!
//! Stored depth follows wgpu's `[0, 1]` convention. "View space" here is camera space with `x`
//! to the right, `y` up and `z` measured as positive distance along the view direction, which is
//! what the post-process shaders reconstruct from a depth sample.

use glam::{Mat4, Vec2, Vec3};

/// Near/far clip distances of the active camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
}

impl DepthRange {
    pub fn new(near: f32, far: f32) -> Self {
        Self { near, far }
    }

    /// Convert a stored depth sample to linear view-space distance.
    ///
    /// `linearize(0.0) == near`, `linearize(1.0) == far`, strictly increasing in between.
    pub fn linearize(&self, depth: f32) -> f32 {
        let d = 2.0 * depth - 1.0;
        2.0 * self.near * self.far / (self.far + self.near - d * (self.far - self.near))
    }

    /// Inverse of [`DepthRange::linearize`].
    pub fn delinearize(&self, z: f32) -> f32 {
        self.far * (z - self.near) / (z * (self.far - self.near))
    }
}

/// Inverse-projection coefficients: `view.xy = (pixel * xy + zw) * z`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjInfo(pub [f32; 4]);

impl ProjInfo {
    /// Derive the coefficients from a wgpu-convention projection matrix and the logical size of
    /// the surface the pixels are measured in.
    pub fn from_projection(projection: &Mat4, width: f32, height: f32) -> Self {
        let p = projection.to_cols_array();
        Self([
            2.0 / (width * p[0]),
            -2.0 / (height * p[5]),
            (p[8] - 1.0) / p[0],
            (1.0 + p[9]) / p[5],
        ])
    }

    pub fn scale(&self) -> Vec2 {
        Vec2::new(self.0[0], self.0[1])
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.0[2], self.0[3])
    }

    /// View-space position of the point seen at `pixel` with linear depth `z`.
    pub fn view_position(&self, pixel: Vec2, z: f32) -> Vec3 {
        ((pixel * self.scale() + self.offset()) * z).extend(z)
    }

    /// Pixel position a view-space point projects to.
    pub fn screen_position(&self, point: Vec3) -> Vec2 {
        (point.truncate() / point.z - self.offset()) / self.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> (Mat4, DepthRange) {
        let near = 10.0;
        let far = 1000.0;
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.5, near, far);
        (projection, DepthRange::new(near, far))
    }

    #[test]
    fn test_linearize_endpoints() {
        let range = DepthRange::new(0.5, 200.0);
        assert!((range.linearize(0.0) - 0.5).abs() < 1e-5);
        assert!((range.linearize(1.0) - 200.0).abs() < 1e-2);
    }

    #[test]
    fn test_linearize_monotonic() {
        let range = DepthRange::new(1.0, 500.0);
        let mut previous = range.linearize(0.0);
        for i in 1..=100 {
            let z = range.linearize(i as f32 / 100.0);
            assert!(z > previous, "not increasing at step {i}");
            assert!(z >= range.near && z <= range.far * 1.0001);
            previous = z;
        }
    }

    #[test]
    fn test_linearize_matches_projection() {
        let (projection, range) = camera();
        for distance in [12.0, 50.0, 333.0, 990.0] {
            let ndc = projection.project_point3(Vec3::new(0.0, 0.0, -distance));
            let z = range.linearize(ndc.z);
            assert!((z - distance).abs() / distance < 1e-3, "{z} vs {distance}");
            assert!((range.delinearize(z) - ndc.z).abs() < 1e-5);
        }
    }

    #[test]
    fn test_view_position_reconstruction() {
        let (projection, _) = camera();
        let (width, height) = (300.0, 200.0);
        let info = ProjInfo::from_projection(&projection, width, height);

        let point = Vec3::new(-40.0, 25.0, -180.0);
        let ndc = projection.project_point3(point);
        let pixel = Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height);

        let view = info.view_position(pixel, -point.z);
        assert!((view - Vec3::new(point.x, point.y, -point.z)).length() < 1e-2);

        let back = info.screen_position(view);
        assert!((back - pixel).length() < 1e-3);
    }

    #[test]
    fn test_screen_center_maps_to_axis() {
        let (projection, _) = camera();
        let info = ProjInfo::from_projection(&projection, 640.0, 480.0);
        let view = info.view_position(Vec2::new(320.0, 240.0), 100.0);
        assert!(view.x.abs() < 1e-3 && view.y.abs() < 1e-3);
        assert_eq!(view.z, 100.0);
    }
}
