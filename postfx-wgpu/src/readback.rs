//! Texture readback into tight CPU buffers.

use std::sync::mpsc;

use crate::error::PostFxError;
use crate::render_targets::{AttachmentTexture, RenderTarget};

/// Round `value` up to wgpu's copy row alignment (256 bytes).
fn align_bytes_per_row(value: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    value.div_ceil(align) * align
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> Option<u32> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm
        | wgpu::TextureFormat::Rgba8UnormSrgb
        | wgpu::TextureFormat::Bgra8Unorm
        | wgpu::TextureFormat::Bgra8UnormSrgb
        | wgpu::TextureFormat::Depth32Float => Some(4),
        wgpu::TextureFormat::Rgba16Float => Some(8),
        _ => None,
    }
}

/// Copy a single-sample texture into a row-major byte buffer without row padding.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    (width, height): (u32, u32),
    aspect: wgpu::TextureAspect,
) -> Result<Vec<u8>, PostFxError> {
    let format = texture.format();
    let bpp = bytes_per_pixel(format).ok_or(PostFxError::UnsupportedReadback(format))?;
    if texture.sample_count() != 1 {
        return Err(PostFxError::UnsupportedReadback(format));
    }

    let tight_bpr = bpp * width;
    let padded_bpr = align_bytes_per_row(tight_bpr);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size: padded_bpr as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    receiver.recv().map_err(|_| PostFxError::ReadbackChannelClosed)??;

    let data = slice.get_mapped_range();
    let tight_bpr = tight_bpr as usize;
    let mut tight = Vec::with_capacity(tight_bpr * height as usize);
    for row in data.chunks(padded_bpr as usize).take(height as usize) {
        tight.extend_from_slice(&row[..tight_bpr]);
    }
    drop(data);
    staging.unmap();
    Ok(tight)
}

/// Stored color values as RGBA floats. 8-bit formats are normalized without sRGB decoding.
pub fn decode_color(bytes: &[u8], format: wgpu::TextureFormat) -> Result<Vec<[f32; 4]>, PostFxError> {
    let unorm = |b: u8| b as f32 / 255.0;
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(bytes
            .chunks_exact(4)
            .map(|p| [unorm(p[0]), unorm(p[1]), unorm(p[2]), unorm(p[3])])
            .collect()),
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(bytes
            .chunks_exact(4)
            .map(|p| [unorm(p[2]), unorm(p[1]), unorm(p[0]), unorm(p[3])])
            .collect()),
        wgpu::TextureFormat::Rgba16Float => Ok(bytes
            .chunks_exact(8)
            .map(|p| {
                let channel = |i: usize| half::f16::from_le_bytes([p[2 * i], p[2 * i + 1]]).to_f32();
                [channel(0), channel(1), channel(2), channel(3)]
            })
            .collect()),
        _ => Err(PostFxError::UnsupportedReadback(format)),
    }
}

/// `Depth32Float` texels. The byte buffer carries no alignment guarantee, so texels are decoded
/// one by one.
fn decode_depth(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn read_attachment_color(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    attachment: &AttachmentTexture,
) -> Result<Vec<[f32; 4]>, PostFxError> {
    let bytes = read_texture(
        device,
        queue,
        &attachment.texture,
        (attachment.width, attachment.height),
        wgpu::TextureAspect::All,
    )?;
    decode_color(&bytes, attachment.format)
}

/// Resolved color of `target`, row-major from the top-left pixel.
pub fn read_color(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &RenderTarget,
) -> Result<Vec<[f32; 4]>, PostFxError> {
    read_attachment_color(device, queue, target.color())
}

/// Resolved stored depth of `target`. Only `Depth32Float` targets can be read back.
pub fn read_depth(device: &wgpu::Device, queue: &wgpu::Queue, target: &RenderTarget) -> Result<Vec<f32>, PostFxError> {
    let depth = target.depth();
    if depth.format != wgpu::TextureFormat::Depth32Float {
        return Err(PostFxError::UnsupportedReadback(depth.format));
    }
    let bytes = read_texture(
        device,
        queue,
        &depth.texture,
        (depth.width, depth.height),
        wgpu::TextureAspect::DepthOnly,
    )?;
    Ok(decode_depth(&bytes))
}
