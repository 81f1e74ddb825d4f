/// Embedded WGSL shader sources for the render-target and post-process passes.
/// Every fragment shader pairs with `FULLSCREEN_QUAD_VERT` (`vs_main`) and exposes `fs_main`.

pub const FULLSCREEN_QUAD_VERT: &str = include_str!("../shaders/fullscreen_quad.wgsl");
pub const DEPTH_RESOLVE_FRAG: &str = include_str!("../shaders/depth_resolve.wgsl");
pub const DOF_FRAG: &str = include_str!("../shaders/dof.wgsl");
pub const GAUSSIAN_BLUR_FRAG: &str = include_str!("../shaders/gaussian_blur.wgsl");
pub const CONTACT_SHADOW_FRAG: &str = include_str!("../shaders/contact_shadow.wgsl");
pub const CONTACT_SHADOW_DENOISE_FRAG: &str = include_str!("../shaders/contact_shadow_denoise.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_entry_points() {
        for source in [
            DEPTH_RESOLVE_FRAG,
            DOF_FRAG,
            GAUSSIAN_BLUR_FRAG,
            CONTACT_SHADOW_FRAG,
            CONTACT_SHADOW_DENOISE_FRAG,
        ] {
            assert!(source.contains("fn fs_main("));
        }
        assert!(FULLSCREEN_QUAD_VERT.contains("fn vs_main("));
    }

    #[test]
    fn test_loop_caps_match_constants() {
        use crate::uniforms::{MAX_BLUR_SAMPLES, MAX_DENOISE_SAMPLES, MAX_SHADOW_SAMPLES};

        let cap = |n: u32| format!("const MAX_NUM_SAMPLES: i32 = {n};");
        assert!(DOF_FRAG.contains(&cap(MAX_BLUR_SAMPLES)));
        assert!(GAUSSIAN_BLUR_FRAG.contains(&cap(MAX_BLUR_SAMPLES)));
        assert!(CONTACT_SHADOW_FRAG.contains(&cap(MAX_SHADOW_SAMPLES)));
        assert!(CONTACT_SHADOW_DENOISE_FRAG.contains(&cap(MAX_DENOISE_SAMPLES)));
    }

    #[test]
    fn test_depth_reads_use_float_level() {
        for source in [DOF_FRAG, GAUSSIAN_BLUR_FRAG, CONTACT_SHADOW_FRAG, CONTACT_SHADOW_DENOISE_FRAG] {
            let reads: Vec<&str> = source
                .lines()
                .filter(|line| line.contains("textureSampleLevel(depth_tex"))
                .collect();
            assert!(!reads.is_empty());
            for line in reads {
                assert!(line.contains(", 0.0)"), "depth read without a float level: {line}");
            }
        }
    }
}
