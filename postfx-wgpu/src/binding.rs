//! Scoped destination binding for one frame's command stream.
//!
//! A [`Frame`] records which destination (display surface or render target) and viewport are
//! current. [`Frame::bind`] pushes a new binding and returns a guard; dropping the guard restores
//! whatever was bound before, on every exit path.

use std::ops::{Deref, DerefMut};

use crate::render_targets::TargetId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Surface,
    Target(TargetId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Whole attachment of `width`×`height` pixels.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn apply(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_viewport(self.x, self.y, self.width, self.height, 0.0, 1.0);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Binding {
    pub destination: Destination,
    pub viewport: Viewport,
}

/// Stack of bindings above a fixed root.
#[derive(Debug)]
pub struct BindingStack {
    root: Binding,
    pushed: Vec<Binding>,
}

impl BindingStack {
    pub fn new(root: Binding) -> Self {
        Self {
            root,
            pushed: Vec::new(),
        }
    }

    pub fn current(&self) -> Binding {
        self.pushed.last().copied().unwrap_or(self.root)
    }

    /// Push `binding`, returning the depth to restore to.
    pub fn push(&mut self, binding: Binding) -> usize {
        let depth = self.pushed.len();
        self.pushed.push(binding);
        depth
    }

    pub fn restore(&mut self, depth: usize) {
        self.pushed.truncate(depth);
    }

    pub fn depth(&self) -> usize {
        self.pushed.len()
    }
}

/// Command recording state for one frame.
pub struct Frame<'a> {
    encoder: wgpu::CommandEncoder,
    output: &'a wgpu::TextureView,
    bindings: BindingStack,
}

impl<'a> Frame<'a> {
    /// Start a frame whose final passes write `output`, a `width`×`height` pixel view.
    pub fn new(device: &wgpu::Device, output: &'a wgpu::TextureView, output_size: (u32, u32)) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("PostFx Frame Encoder"),
        });
        Self {
            encoder,
            output,
            bindings: BindingStack::new(Binding {
                destination: Destination::Surface,
                viewport: Viewport::full(output_size.0, output_size.1),
            }),
        }
    }

    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    /// Display view written by final passes.
    pub fn output(&self) -> &'a wgpu::TextureView {
        self.output
    }

    pub fn current(&self) -> Binding {
        self.bindings.current()
    }

    pub fn binding_depth(&self) -> usize {
        self.bindings.depth()
    }

    /// Make `destination` current until the returned guard is dropped.
    pub fn bind(&mut self, destination: Destination, viewport: Viewport) -> BoundDestination<'_, 'a> {
        let restore_to = self.bindings.push(Binding {
            destination,
            viewport,
        });
        BoundDestination {
            frame: self,
            restore_to,
        }
    }

    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }
}

/// Guard returned by [`Frame::bind`]; derefs to the frame.
pub struct BoundDestination<'f, 'a> {
    frame: &'f mut Frame<'a>,
    restore_to: usize,
}

impl<'a> Deref for BoundDestination<'_, 'a> {
    type Target = Frame<'a>;

    fn deref(&self) -> &Frame<'a> {
        &*self.frame
    }
}

impl<'a> DerefMut for BoundDestination<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Frame<'a> {
        &mut *self.frame
    }
}

impl Drop for BoundDestination<'_, '_> {
    fn drop(&mut self) {
        self.frame.bindings.restore(self.restore_to);
        log::trace!("restored binding {:?}", self.frame.bindings.current().destination);
    }
}
