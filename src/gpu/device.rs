// gpu/device.rs - wgpu adapter and device acquisition.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends and pick the best one.
//   - Request a device + queue once, at startup.
//   - Turn "no usable GPU" into a single fatal `GpuError` that the caller
//     surfaces once. Nothing in the frame loop retries device acquisition.
//
// ADAPTER SELECTION:
// `request_adapter`'s power-preference heuristics can hand back a software
// rasterizer (llvmpipe, WARP) even when real hardware is present. We
// enumerate explicitly and rank by device type:
//
//   DiscreteGpu / IntegratedGpu   real hardware        <- preferred
//   VirtualGpu / Other            VM pass-through etc. <- acceptable
//   Cpu                           software rasterizer  <- only if allowed
//
// Software adapters are accepted only when `GpuOptions::allow_software` is
// set. Headless test machines set it; the live demo does not.
//
// NEW RUST CONCEPTS:
// - `pollster::block_on`: runs an async fn to completion on the current
//   thread. wgpu's adapter/device API is async because on the web it maps
//   to JS Promises; natively we simply block once at startup.
// - `min_by_key` over an enum-derived rank: picks the first adapter of the
//   best tier without sorting the whole list.

use std::fmt;

use thiserror::Error;

/// Errors from GPU device acquisition. Fatal to the pipeline.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No adapter on any enabled backend passed the selection filter.
    #[error("no compatible graphics adapter found (backends: {backends:?}, software allowed: {allow_software})")]
    NoSuitableAdapter { backends: wgpu::Backends, allow_software: bool },
    /// wgpu device request failed (driver issue, unsupported limits, etc.).
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Device acquisition options.
#[derive(Debug, Clone, Copy)]
pub struct GpuOptions {
    /// Backends to enumerate.
    pub backends: wgpu::Backends,
    /// Accept a CPU/software adapter when no hardware adapter exists.
    pub allow_software: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        GpuOptions { backends: wgpu::Backends::PRIMARY, allow_software: false }
    }
}

impl GpuOptions {
    /// Options for tests and headless tools: any backend, software allowed.
    pub fn headless() -> Self {
        GpuOptions { backends: wgpu::Backends::all(), allow_software: true }
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Selection tier; lower is better.
fn adapter_rank(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu => 0,
        wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => 1,
        wgpu::DeviceType::Cpu => 2,
    }
}

/// The GPU context: device, queue, and the adapter they came from.
///
/// Create once with [`GpuDevice::new`] and keep it for the lifetime of the
/// pipeline.
///
/// # Field drop order
/// Struct fields drop top to bottom. `_instance` is declared last so the
/// `wgpu::Instance` outlives `device` and `queue`; some Vulkan layers crash
/// when the instance goes away before device-level objects.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Acquire a hardware adapter on the primary backends.
    pub fn new() -> Result<Self, GpuError> {
        Self::with_options(GpuOptions::default())
    }

    pub fn with_options(options: GpuOptions) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(options))
    }

    async fn init_async(options: GpuOptions) -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            // Validation layer in debug builds for shader error feedback.
            wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: options.backends,
            flags,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(options.backends);
        for a in &adapters {
            let info = a.get_info();
            tracing::info!(
                name = %info.name,
                backend = ?info.backend,
                device_type = ?info.device_type,
                "graphics adapter found"
            );
        }

        let adapter = adapters
            .into_iter()
            .filter(|a| options.allow_software || a.get_info().device_type != wgpu::DeviceType::Cpu)
            .min_by_key(|a| adapter_rank(a.get_info().device_type))
            .ok_or(GpuError::NoSuitableAdapter {
                backends: options.backends,
                allow_software: options.allow_software,
            })?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };
        tracing::info!(adapter = %adapter_info, "using graphics adapter");

        // Downlevel limits: a full-screen draw, one 2D texture and a 256-byte
        // uniform fit comfortably, and this keeps GLES/WebGL-class adapters
        // usable.
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("huekey"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        Ok(GpuDevice { device, queue, adapter_info, _instance: instance })
    }

    /// Largest texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ adapter: {} }}", self.adapter_info)
    }
}

// ============================================================
// Tests
// ============================================================
