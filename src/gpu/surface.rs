// gpu/surface.rs - Display surface interface and an offscreen implementation.
//
// The recolor pass draws into whatever the display surface hands out as its
// current target. A windowing integration would wrap a `wgpu::Surface`; the
// crate ships `OffscreenSurface`, which renders into an owned texture and
// copies each presented frame back to CPU memory. The demo blits that buffer
// into a minifb window, and the GPU tests compare it against the CPU
// reference.
//
// READBACK
// ────────
// `present` never waits for the GPU. It queues a texture → buffer copy into
// one of two readback buffers and requests a map; later presents pick up
// maps that have completed in the meantime:
//
//   present N:    poll ─▶ collect finished maps ─▶ copy frame N into free slot ─▶ map_async
//   present N+1:  poll ─▶ collect (frame N lands in latest_pixels) ─▶ copy N+1 ...
//
// `latest_pixels` is therefore the newest *completed* frame, usually one
// present behind. When both slots are still in flight the frame is drawn but
// not read back. `flush` blocks until everything queued has landed, and reads
// the target once more if the last present was skipped; only tests and
// shutdown call it.
//
// Texture → buffer copies have the same 256-byte row alignment rule as
// uploads, so readback rows are padded and stripped while copying out of the
// mapped range.
//
// NEW RUST CONCEPTS:
// - `Maintain::Poll` vs `Maintain::Wait`: both drive wgpu's callbacks, only
//   `Wait` blocks until the queue is idle.
// - `try_recv` on the map callback's channel: a map is finished exactly when
//   its callback has sent.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::collector::BYTES_PER_PIXEL;
use crate::gpu::device::GpuDevice;
use crate::gpu::frame::align_to;
use crate::scheduler::RenderError;

/// Readback buffers per offscreen surface.
pub const READBACK_SLOTS: usize = 2;

type MapResult = Result<(), wgpu::BufferAsyncError>;

/// Where rendered frames go.
pub trait DisplaySurface {
    /// Texture format render targets are created with.
    fn format(&self) -> wgpu::TextureFormat;

    /// Make the surface `width × height`. Cheap when the size is unchanged.
    fn configure(&mut self, gpu: &GpuDevice, width: u32, height: u32);

    /// View of the texture the next pass should draw into.
    fn acquire_current_target(&mut self) -> Result<wgpu::TextureView, RenderError>;

    /// Finish the frame that was drawn into the current target. Must not
    /// wait for the GPU.
    fn present(&mut self, gpu: &GpuDevice) -> Result<(), RenderError>;

    /// Block until every presented frame is visible. Not part of the frame
    /// loop.
    fn flush(&mut self, _gpu: &GpuDevice) -> Result<(), RenderError> {
        Ok(())
    }
}

/// One readback buffer and its outstanding map, if any.
struct Readback {
    buffer: wgpu::Buffer,
    pending: Option<Receiver<MapResult>>,
    /// Present sequence number of the frame copied into `buffer`.
    seq: u64,
}

/// Renders into an owned texture and keeps the newest read-back frame as
/// RGBA8.
pub struct OffscreenSurface {
    format: wgpu::TextureFormat,
    target: Option<wgpu::Texture>,
    width: u32,
    height: u32,
    readbacks: Vec<Readback>,
    presented: u64,
    latest_seq: u64,
    latest: Vec<u8>,
    skipped: u64,
    /// The last present was not read back.
    stale: bool,
}

impl Default for OffscreenSurface {
    fn default() -> Self {
        OffscreenSurface::new()
    }
}

impl OffscreenSurface {
    /// An unconfigured surface. The first `configure` allocates the target.
    pub fn new() -> Self {
        OffscreenSurface {
            format: wgpu::TextureFormat::Rgba8Unorm,
            target: None,
            width: 0,
            height: 0,
            readbacks: Vec::new(),
            presented: 0,
            latest_seq: 0,
            latest: Vec::new(),
            skipped: 0,
            stale: false,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA8 pixels of the newest frame whose readback has completed; empty
    /// before the first one and after a resize.
    pub fn latest_pixels(&self) -> &[u8] {
        &self.latest
    }

    /// Readbacks queued but not yet collected.
    pub fn pending_readbacks(&self) -> usize {
        self.readbacks.iter().filter(|r| r.pending.is_some()).count()
    }

    /// Presents that found no free readback slot.
    pub fn skipped_readbacks(&self) -> u64 {
        self.skipped
    }

    /// Copy the target into a free readback slot and request its map.
    /// Returns false when every slot is still in flight.
    fn queue_readback(&mut self, gpu: &GpuDevice) -> bool {
        let Some(free) = self.readbacks.iter().position(|r| r.pending.is_none()) else {
            return false;
        };
        let Some(texture) = self.target.as_ref() else {
            return false;
        };
        let (_, aligned) = self.row_layout();
        self.presented += 1;

        let slot = &mut self.readbacks[free];
        copy_to_buffer(gpu, texture, &slot.buffer, aligned, self.width, self.height);
        let (tx, rx) = mpsc::channel();
        slot.buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        slot.pending = Some(rx);
        slot.seq = self.presented;
        true
    }

    fn row_layout(&self) -> (usize, u32) {
        let row_bytes = self.width * BYTES_PER_PIXEL as u32;
        (row_bytes as usize, align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT))
    }

    /// Move finished maps into `latest`. A failed map leaves `latest` as it
    /// was and is reported after the other slots are drained.
    fn collect_completed(&mut self) -> Result<(), RenderError> {
        let (row_bytes, aligned) = self.row_layout();
        let frame_bytes = row_bytes * self.height as usize;
        let mut failure = None;

        for slot in self.readbacks.iter_mut() {
            let status = match &slot.pending {
                Some(rx) => map_status(rx.try_recv()),
                None => continue,
            };
            match status {
                None => {}
                Some(Ok(())) => {
                    if slot.seq > self.latest_seq {
                        let mapped = slot.buffer.slice(..).get_mapped_range();
                        self.latest.resize(frame_bytes, 0);
                        unpad_rows(&mapped, aligned as usize, row_bytes, &mut self.latest);
                        drop(mapped);
                        self.latest_seq = slot.seq;
                    }
                    slot.buffer.unmap();
                    slot.pending = None;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, seq = slot.seq, "readback failed");
                    slot.pending = None;
                    failure = Some(e);
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }
}

impl DisplaySurface for OffscreenSurface {
    fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn configure(&mut self, gpu: &GpuDevice, width: u32, height: u32) {
        if self.target.is_some() && (width, height) == (self.width, self.height) {
            return;
        }
        tracing::debug!(width, height, "offscreen surface configured");
        self.target = Some(gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("OffscreenSurface"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        }));
        self.width = width;
        self.height = height;

        // Old-size buffers go away with any maps still pending on them.
        let (_, aligned) = self.row_layout();
        self.readbacks = (0..READBACK_SLOTS)
            .map(|i| Readback {
                buffer: gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("OffscreenSurface readback {i}")),
                    size: aligned as u64 * height as u64,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                pending: None,
                seq: 0,
            })
            .collect();
        self.latest.clear();
        self.stale = false;
    }

    fn acquire_current_target(&mut self) -> Result<wgpu::TextureView, RenderError> {
        let texture = self
            .target
            .as_ref()
            .ok_or_else(|| RenderError::Surface("offscreen surface not configured".into()))?;
        Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn present(&mut self, gpu: &GpuDevice) -> Result<(), RenderError> {
        if self.target.is_none() {
            return Err(RenderError::Surface("offscreen surface not configured".into()));
        }
        gpu.device.poll(wgpu::Maintain::Poll);
        let collected = self.collect_completed();

        if self.queue_readback(gpu) {
            self.stale = false;
            gpu.device.poll(wgpu::Maintain::Poll);
        } else {
            self.skipped += 1;
            self.stale = true;
            tracing::debug!(skipped = self.skipped, "no free readback slot; frame not read back");
        }
        collected
    }

    fn flush(&mut self, gpu: &GpuDevice) -> Result<(), RenderError> {
        if self.pending_readbacks() > 0 {
            gpu.device.poll(wgpu::Maintain::Wait);
            self.collect_completed()?;
        }
        // The target still holds the last presented frame; read it now if
        // its present found no free slot.
        if self.stale && self.queue_readback(gpu) {
            self.stale = false;
            gpu.device.poll(wgpu::Maintain::Wait);
            self.collect_completed()?;
        }
        Ok(())
    }
}

/// Interpret a map callback's channel. `None` while the map is in flight.
fn map_status(received: Result<MapResult, TryRecvError>) -> Option<Result<(), RenderError>> {
    match received {
        Err(TryRecvError::Empty) => None,
        Ok(Ok(())) => Some(Ok(())),
        Ok(Err(e)) => Some(Err(RenderError::Surface(format!("readback map failed: {e}")))),
        Err(TryRecvError::Disconnected) => {
            Some(Err(RenderError::Surface("readback map callback dropped without a result".into())))
        }
    }
}

fn copy_to_buffer(
    gpu: &GpuDevice,
    texture: &wgpu::Texture,
    buffer: &wgpu::Buffer,
    aligned_bytes_per_row: u32,
    width: u32,
    height: u32,
) {
    let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(aligned_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));
}

/// Copy `stride`-byte rows into tightly packed `row_bytes` rows.
fn unpad_rows(padded: &[u8], stride: usize, row_bytes: usize, out: &mut [u8]) {
    for (src, dst) in padded.chunks_exact(stride).zip(out.chunks_exact_mut(row_bytes)) {
        dst.copy_from_slice(&src[..row_bytes]);
    }
}

/// Blocking copy of an RGBA8 texture back to CPU memory, tightly packed.
#[cfg(test)]
pub(crate) fn read_texture_rgba(
    gpu: &GpuDevice,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    let row_bytes = width * BYTES_PER_PIXEL as u32;
    let aligned = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: aligned as u64 * height as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    copy_to_buffer(gpu, texture, &buffer, aligned, width, height);

    let (tx, rx) = mpsc::channel();
    buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device.poll(wgpu::Maintain::Wait);

    if let Some(status) = map_status(rx.recv().map_err(|_| TryRecvError::Disconnected)) {
        status?;
    }

    let mut out = vec![0u8; (row_bytes * height) as usize];
    unpad_rows(&buffer.slice(..).get_mapped_range(), aligned as usize, row_bytes as usize, &mut out);
    buffer.unmap();
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
