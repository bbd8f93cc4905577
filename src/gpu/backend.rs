// gpu/backend.rs - The GPU render backend driven by the frame scheduler.
//
// Owns everything created once at startup (device, pipeline, palette buffer,
// display surface) and runs one upload + recolor + present per frame:
//
//   frame bytes ──upload──▶ GpuFrame ──recolor pass──▶ surface target ──present
//                                         ▲
//                           PaletteBuffer ┘ (swapped by publish_palette)
//
// The per-frame texture is a local in `render_frame` and is dropped when the
// call returns, so device memory for frames does not accumulate.

use crate::config::HuekeyConfig;
use crate::frame::Frame;
use crate::gpu::device::GpuDevice;
use crate::gpu::frame::GpuFrame;
use crate::gpu::palette::PaletteBuffer;
use crate::gpu::recolor::RecolorPipeline;
use crate::gpu::surface::DisplaySurface;
use crate::palette::Palette;
use crate::scheduler::{RenderBackend, RenderError};

/// wgpu implementation of [`RenderBackend`].
pub struct GpuRecolorer<D> {
    pipeline: RecolorPipeline,
    palette: PaletteBuffer,
    surface: D,
    gpu: GpuDevice,
}

impl<D: DisplaySurface> GpuRecolorer<D> {
    /// Build the pipeline for `surface`'s format and bind the seed palette.
    pub fn new(gpu: GpuDevice, surface: D, config: &HuekeyConfig) -> Self {
        let resolution = (config.frame.expected_width, config.frame.expected_height);
        let pipeline = RecolorPipeline::new(&gpu, surface.format(), &config.recolor, resolution);
        let palette = PaletteBuffer::new(&gpu, &Palette::seed());
        tracing::info!(adapter = %gpu, "gpu recolorer ready");
        GpuRecolorer { pipeline, palette, surface, gpu }
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    /// Wait for the surface to show every frame rendered so far. For
    /// shutdown and tests; `render_frame` itself never waits.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.surface.flush(&self.gpu)
    }

    /// Generation of the palette currently bound for rendering.
    pub fn palette_generation(&self) -> u64 {
        self.palette.generation()
    }
}

impl<D: DisplaySurface> RenderBackend for GpuRecolorer<D> {
    fn publish_palette(&mut self, palette: &Palette) -> Result<(), RenderError> {
        self.palette.upload(&self.gpu, palette);
        Ok(())
    }

    fn render_frame(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let (width, height) = frame.dimensions();
        let max = self.gpu.max_texture_dimension();
        if width > max || height > max {
            return Err(RenderError::Surface(format!(
                "frame {width}x{height} exceeds the device texture limit {max}"
            )));
        }

        let gpu_frame = GpuFrame::upload(&self.gpu, frame.as_bytes(), width, height)?;
        self.surface.configure(&self.gpu, width, height);
        let target = self.surface.acquire_current_target()?;
        self.pipeline.render(&self.gpu, &gpu_frame, &self.palette, &target);
        self.surface.present(&self.gpu)
    }
}
