// gpu/frame.rs - Per-cycle frame texture and CPU→GPU upload.
//
// A `GpuFrame` lives for exactly one render cycle: the backend uploads the
// latest frame, draws with it, and drops it at the end of the iteration.
// Dropping releases the texture once the GPU is done with it.
//
// ROW ALIGNMENT
// ─────────────
// `copy_buffer_to_texture` needs `bytes_per_row` to be a multiple of
// `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT` (256). An RGBA8 row is `width * 4`
// bytes, which is 256-aligned only when width is a multiple of 64 (640 is,
// 752 is not). Rows are therefore copied into a staging buffer with padded
// stride:
//
//   staging row y: [ width*4 bytes of pixels | padding up to 256k ]
//
// When the frame is already aligned the staging copy is a straight memcpy
// of the whole buffer.

use wgpu::util::DeviceExt;

use crate::collector::BYTES_PER_PIXEL;
use crate::frame::FrameError;
use crate::gpu::device::GpuDevice;

const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Texture format frames are uploaded in.
pub const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// One video frame resident on the GPU as an `Rgba8Unorm` 2D texture.
pub struct GpuFrame {
    pub texture: wgpu::Texture,
    /// Full-texture view, bound at binding 0 of the recolor pass.
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuFrame {
    /// Create a texture sized to the frame and queue the pixel copy.
    ///
    /// `pixels` is interleaved RGBA8, row-major, no padding. Zero dimensions
    /// or a buffer of the wrong length are reported and nothing is created;
    /// the caller skips the cycle.
    ///
    /// The copy is submitted but not waited on. Any pass submitted later on
    /// the same queue sees the uploaded pixels.
    pub fn upload(gpu: &GpuDevice, pixels: &[u8], width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions { width, height });
        }
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let expected = row_bytes * height as usize;
        if pixels.len() != expected {
            return Err(FrameError::BufferSize { width, height, expected, actual: pixels.len() });
        }

        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };

        // TEXTURE_BINDING for sampling in the fragment shader, COPY_DST for
        // the upload, COPY_SRC so tests can read it back.
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GpuFrame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let aligned_bytes_per_row = align_to(row_bytes as u32, COPY_ALIGNMENT);
        let staging = pad_rows(pixels, row_bytes, aligned_bytes_per_row as usize, height as usize);

        let staging_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuFrame::staging"),
            contents: &staging,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("GpuFrame::upload"),
            });

        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            size,
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));

        Ok(GpuFrame { texture, view, width, height })
    }
}

/// Copy `height` rows of `row_bytes` into a buffer with `stride`-byte rows.
fn pad_rows(pixels: &[u8], row_bytes: usize, stride: usize, height: usize) -> Vec<u8> {
    if stride == row_bytes {
        return pixels.to_vec();
    }
    let mut staging = vec![0u8; stride * height];
    for (src, dst) in pixels.chunks_exact(row_bytes).zip(staging.chunks_exact_mut(stride)) {
        dst[..row_bytes].copy_from_slice(src);
    }
    staging
}

/// Round `value` up to the next multiple of `alignment`.
///
///   align_to(100, 256)  = 256
///   align_to(2560, 256) = 2560   (640 px × 4 bytes)
///   align_to(3008, 256) = 3072   (752 px × 4 bytes)
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
