// gpu/palette.rs - Device-resident palette uniform with swap-and-release.
//
// The palette buffer is never written in place. Publishing a palette:
//
//   1. creates a new uniform buffer, fully initialised at creation
//      (`create_buffer_init` maps, fills and unmaps before returning);
//   2. swaps it into `self.buffer`;
//   3. drops the old buffer.
//
// wgpu keeps a dropped buffer alive until every submitted command that
// references it has finished, so a render pass already in flight keeps
// reading the old palette while the next one binds the new one. There is no
// moment without a valid, fully written buffer, and no pass can see a mix
// of two generations.

use wgpu::util::DeviceExt;

use crate::gpu::device::GpuDevice;
use crate::palette::{Palette, PALETTE_SIZE};

/// Size of the palette uniform in bytes: 16 × vec3<f32> at 16-byte stride.
pub const PALETTE_BUFFER_SIZE: u64 = (PALETTE_SIZE * 16) as u64;

/// The palette uniform currently bound by the recolor pass.
pub struct PaletteBuffer {
    buffer: wgpu::Buffer,
    generation: u64,
}

impl PaletteBuffer {
    pub fn new(gpu: &GpuDevice, palette: &Palette) -> Self {
        PaletteBuffer {
            buffer: create_palette_buffer(gpu, palette),
            generation: palette.generation(),
        }
    }

    /// Replace the device palette with `palette`.
    pub fn upload(&mut self, gpu: &GpuDevice, palette: &Palette) {
        let next = create_palette_buffer(gpu, palette);
        let previous = std::mem::replace(&mut self.buffer, next);
        self.generation = palette.generation();
        drop(previous);
        tracing::debug!(generation = self.generation, "palette buffer swapped");
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Generation of the palette the buffer holds.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn create_palette_buffer(gpu: &GpuDevice, palette: &Palette) -> wgpu::Buffer {
    let label = format!("PaletteBuffer gen {}", palette.generation());
    gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&label),
        contents: palette.as_bytes(),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}
