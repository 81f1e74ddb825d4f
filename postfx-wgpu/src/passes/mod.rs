//! Render pass recording helpers.

pub mod fullscreen;
pub mod resolve;
