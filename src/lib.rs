// huekey: live palette highlighting for video frames
//
// Frames are quantized into a set of observed colors, a 16-entry palette is
// extracted from that set with k-means on a worker thread, and a GPU pass
// replaces every pixel close to a palette entry with a marker color.
//
// CPU modules (reference implementations, no GPU needed):
//   color      quantization keys
//   collector  observed color set
//   kmeans     clustering
//   palette    palette type and background extractor
//   recolor    per-pixel match and replace
//   frame      frames and frame sources
//   scheduler  per-frame loop
//   config     TOML configuration

pub mod collector;
pub mod color;
pub mod config;
pub mod frame;
pub mod kmeans;
pub mod palette;
pub mod recolor;
pub mod scheduler;

pub mod gpu;

pub use config::HuekeyConfig;
pub use frame::{Frame, FrameSource};
pub use palette::Palette;
pub use scheduler::{FrameScheduler, RenderBackend};
