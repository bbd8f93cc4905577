// gpu/mod.rs - wgpu render layer.
//
// The CPU modules in the parent crate are the reference: `recolor` defines
// what a recolored pixel is, and the fragment shader here is validated
// against it pixel for pixel (allowing ±1 for unorm rounding).
//
// Ownership per render cycle:
//
//   created once                 created per frame
//   ────────────                 ─────────────────
//   GpuDevice                    GpuFrame (texture + view)
//   RecolorPipeline              bind group
//   PaletteBuffer (swapped)
//   DisplaySurface
//
// `GpuRecolorer` ties these together and implements the scheduler's
// `RenderBackend`.

pub mod backend;
pub mod device;
pub mod frame;
pub mod palette;
pub mod recolor;
pub mod surface;

pub use backend::GpuRecolorer;
pub use device::{GpuDevice, GpuError, GpuOptions};
pub use surface::{DisplaySurface, OffscreenSurface};
