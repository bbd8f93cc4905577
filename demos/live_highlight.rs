// demos/live_highlight.rs
//
// Live palette highlighting in a window. Frames come from a directory of
// PNG/JPEG images (played in a loop) or, without --frames, from a built-in
// animated test pattern. Every frame goes through the GPU recolor pass; the
// window shows the result.
//
// Usage:
//   cargo run --example live_highlight --release
//   cargo run --example live_highlight --release -- --frames /path/to/pngs
//   cargo run --example live_highlight --release -- --config huekey.toml
//   RUST_LOG=huekey=debug cargo run --example live_highlight
//
// Controls:
//   K      run palette extraction over the colors seen so far
//   C      toggle color collection
//   R      forget all collected colors
//   Q/Esc  quit

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing_subscriber::EnvFilter;

use huekey::color::Rgb8;
use huekey::config::HuekeyConfig;
use huekey::frame::{Frame, FrameSource, ImageSequenceSource};
use huekey::gpu::{GpuDevice, GpuRecolorer, OffscreenSurface};
use huekey::scheduler::{FrameScheduler, TickOutcome};

#[derive(Parser, Debug)]
#[command(about = "Highlight palette colors in a live frame stream")]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of PNG/JPEG frames to play in a loop.
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Override the configured frame width.
    #[arg(long)]
    width: Option<u32>,

    /// Override the configured frame height.
    #[arg(long)]
    height: Option<u32>,

    /// Start with color collection switched off.
    #[arg(long)]
    no_collect: bool,
}

/// Moving color bars over a slow gradient, for running without a camera.
struct TestPattern {
    width: u32,
    height: u32,
    t: u32,
}

impl FrameSource for TestPattern {
    fn current_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&mut self) -> Option<Frame> {
        const BARS: [Rgb8; 6] = [
            Rgb8::new(230, 40, 40),
            Rgb8::new(40, 200, 60),
            Rgb8::new(50, 70, 220),
            Rgb8::new(240, 200, 30),
            Rgb8::new(30, 200, 210),
            Rgb8::new(200, 50, 200),
        ];
        self.t = self.t.wrapping_add(2);
        let (w, h, t) = (self.width, self.height, self.t);
        let bar_w = (w / 8).max(1);
        Frame::from_rgb_fn(w, h, |x, y| {
            let bar = ((x + t) / bar_w) as usize;
            if y > h / 4 && y < 3 * h / 4 && bar % 2 == 0 {
                BARS[(bar / 2) % BARS.len()]
            } else {
                Rgb8::new((x * 255 / w) as u8, (y * 255 / h) as u8, 64)
            }
        })
        .ok()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = HuekeyConfig::load_or_default(args.config.as_deref());
    if let Some(w) = args.width {
        config.frame.expected_width = w;
    }
    if let Some(h) = args.height {
        config.frame.expected_height = h;
    }
    if args.no_collect {
        config.scheduler.extraction_enabled = false;
    }
    config.validate().context("invalid configuration")?;

    let source: Box<dyn FrameSource> = match &args.frames {
        Some(dir) => {
            let seq = ImageSequenceSource::open(dir)
                .with_context(|| format!("opening frame directory {}", dir.display()))?;
            println!("Playing {} frames from {}", seq.len(), dir.display());
            Box::new(seq)
        }
        None => Box::new(TestPattern {
            width: config.frame.expected_width,
            height: config.frame.expected_height,
            t: 0,
        }),
    };

    // No GPU is fatal: report once and stop.
    let gpu = GpuDevice::new().context("GPU initialisation failed")?;
    println!("{gpu}");
    let backend = GpuRecolorer::new(gpu, OffscreenSurface::new(), &config);
    let mut scheduler = FrameScheduler::new(&config, source, backend)?;

    let (win_w, win_h) = (config.frame.expected_width as usize, config.frame.expected_height as usize);
    let mut window = Window::new(
        "huekey - K: extract  C: collect  R: reset  Esc: quit",
        win_w,
        win_h,
        WindowOptions { resize: false, ..Default::default() },
    )?;
    window.set_target_fps(config.scheduler.target_fps as usize);

    let mut fb = vec![0u32; win_w * win_h];
    let mut last_status = Instant::now();
    let mut last_count = usize::MAX;

    while window.is_open() && !window.is_key_down(Key::Escape) && !window.is_key_down(Key::Q) {
        if window.is_key_pressed(Key::K, KeyRepeat::No) {
            match scheduler.trigger_extraction() {
                Ok(()) => println!("Extracting palette from {} colors...", scheduler.colors().len()),
                Err(e) => println!("{e}"),
            }
        }
        if window.is_key_pressed(Key::C, KeyRepeat::No) {
            let on = scheduler.toggle_extraction();
            println!("Color collection {}", if on { "on" } else { "off" });
        }
        if window.is_key_pressed(Key::R, KeyRepeat::No) {
            scheduler.clear_colors();
        }

        if let TickOutcome::Processed { rendered: true, .. } = scheduler.tick() {
            // The window has a fixed size; frames of another size are
            // shown clipped or padded.
            let surface = scheduler.backend().surface();
            let (w, h) = surface.dimensions();
            blit_rgba(surface.latest_pixels(), w as usize, h as usize, &mut fb, win_w, win_h);
        }

        let count = scheduler.colors().len();
        if count != last_count && last_status.elapsed().as_millis() >= 250 {
            window.set_title(&format!("huekey - Unique Colors: {count}"));
            last_count = count;
            last_status = Instant::now();
        }

        if let Err(e) = window.update_with_buffer(&fb, win_w, win_h) {
            bail!("window update failed: {e}");
        }
    }

    scheduler.backend_mut().flush().context("flushing the last frame")?;
    let skipped = scheduler.backend().surface().skipped_readbacks();
    if skipped > 0 {
        println!("{skipped} frames were rendered but not shown (readback busy)");
    }

    let stats = scheduler.stats();
    println!(
        "Unique Colors: {}  frames: {} rendered: {} palettes: {} render failures: {}",
        stats.observed_colors, stats.frames_seen, stats.frames_rendered, stats.palettes_published, stats.render_failures
    );
    Ok(())
}

/// Copy an RGBA8 image into a 0x00RRGGBB framebuffer, clipping to the
/// smaller of the two sizes.
fn blit_rgba(src: &[u8], src_w: usize, src_h: usize, fb: &mut [u32], fb_w: usize, fb_h: usize) {
    if src.len() < src_w * src_h * 4 {
        return;
    }
    let w = src_w.min(fb_w);
    for y in 0..src_h.min(fb_h) {
        let row = &src[y * src_w * 4..][..w * 4];
        for (x, px) in row.chunks_exact(4).enumerate() {
            fb[y * fb_w + x] = ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | (px[2] as u32);
        }
    }
}
