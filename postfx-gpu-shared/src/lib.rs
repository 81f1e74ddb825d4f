//! Backend-independent pieces of the postfx pipeline: depth math, uniform contracts, embedded
//! WGSL sources and CPU reference kernels.

pub mod depth;
pub mod reference;
pub mod shaders;
pub mod uniforms;
