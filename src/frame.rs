// frame.rs - RGBA8 frames and the frame-source interface.
//
// A `Frame` is one owned, tightly packed RGBA8 image (stride == width * 4).
// Frame sources stand in for a camera: they are polled, never awaited, and
// report (0, 0) until they have something to show.
//
// The sources in this file are deterministic (solid, split, pending) or
// file-backed (`ImageSequenceSource`). Live capture devices implement
// `FrameSource` outside this crate.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::collector::BYTES_PER_PIXEL;
use crate::color::Rgb8;

/// Errors for a single frame. Never fatal to the loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has zero dimensions ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    BufferSize { width: u32, height: u32, expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One video frame: interleaved RGBA8, row-major, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap a pixel buffer, checking that its length matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions { width, height });
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(FrameError::BufferSize { width, height, expected, actual: pixels.len() });
        }
        Ok(Frame { pixels, width, height })
    }

    /// Build a frame by evaluating `f(x, y)` for every pixel. Alpha is 255.
    pub fn from_rgb_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> Rgb8,
    ) -> Result<Self, FrameError> {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        for y in 0..height {
            for x in 0..width {
                let c = f(x, y);
                pixels.extend_from_slice(&[c.r, c.g, c.b, 255]);
            }
        }
        Frame::new(width, height, pixels)
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, color: Rgb8) -> Result<Self, FrameError> {
        Frame::from_rgb_fn(width, height, |_, _| color)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB of pixel (x, y). Panics if out of bounds.
    pub fn rgb(&self, x: u32, y: u32) -> Rgb8 {
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Rgb8::new(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2])
    }
}

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// A non-blocking producer of video frames.
pub trait FrameSource {
    /// Dimensions of the latest frame, or `(0, 0)` before the source is
    /// ready.
    fn current_dimensions(&self) -> (u32, u32);

    /// The latest frame, or `None` before the source is ready.
    fn current_frame(&mut self) -> Option<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn current_dimensions(&self) -> (u32, u32) {
        (**self).current_dimensions()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        (**self).current_frame()
    }
}

/// Always returns the same frame.
#[derive(Debug, Clone)]
pub struct StaticSource {
    frame: Frame,
}

impl StaticSource {
    pub fn new(frame: Frame) -> Self {
        StaticSource { frame }
    }

    /// One color over the whole frame.
    pub fn solid(width: u32, height: u32, color: Rgb8) -> Result<Self, FrameError> {
        Ok(StaticSource::new(Frame::solid(width, height, color)?))
    }

    /// `left` on the left half of every row, `right` on the rest.
    pub fn split(width: u32, height: u32, left: Rgb8, right: Rgb8) -> Result<Self, FrameError> {
        let half = width / 2;
        let frame = Frame::from_rgb_fn(width, height, |x, _| if x < half { left } else { right })?;
        Ok(StaticSource::new(frame))
    }
}

impl FrameSource for StaticSource {
    fn current_dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        Some(self.frame.clone())
    }
}

/// Wraps a source and reports "not ready" for the first `warmup` dimension
/// polls, like a camera that has not produced its first frame yet.
#[derive(Debug, Clone)]
pub struct PendingSource<S> {
    inner: S,
    remaining: std::cell::Cell<usize>,
}

impl<S: FrameSource> PendingSource<S> {
    pub fn new(inner: S, warmup: usize) -> Self {
        PendingSource { inner, remaining: std::cell::Cell::new(warmup) }
    }

    fn ready(&self) -> bool {
        self.remaining.get() == 0
    }
}

impl<S: FrameSource> FrameSource for PendingSource<S> {
    fn current_dimensions(&self) -> (u32, u32) {
        if self.ready() {
            return self.inner.current_dimensions();
        }
        self.remaining.set(self.remaining.get() - 1);
        (0, 0)
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if self.ready() {
            self.inner.current_frame()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// ImageSequenceSource
// ---------------------------------------------------------------------------

/// Errors opening an image sequence.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no PNG or JPEG files in {0}")]
    Empty(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Cycles through a directory of still images, one per poll.
///
/// Files are sorted by name and decoded up front, so polling never touches
/// the filesystem.
pub struct ImageSequenceSource {
    frames: Vec<Frame>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self, SequenceError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SequenceError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SequenceError::Empty(dir.to_path_buf()));
        }

        let mut frames = Vec::with_capacity(files.len());
        for path in &files {
            frames.push(load_rgba(path)?);
        }
        tracing::info!(dir = %dir.display(), frames = frames.len(), "loaded image sequence");

        Ok(ImageSequenceSource { frames, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn current_dimensions(&self) -> (u32, u32) {
        self.frames[self.next].dimensions()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Some(frame)
    }
}

/// Decode any supported image file into an RGBA8 frame.
pub fn load_rgba(path: &Path) -> Result<Frame, SequenceError> {
    let img = image::open(path).map_err(|source| SequenceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(Frame::new(w, h, rgba.into_raw())?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_zero_dimensions() {
        assert_eq!(
            Frame::new(0, 4, vec![]),
            Err(FrameError::ZeroDimensions { width: 0, height: 4 })
        );
    }

    #[test]
    fn test_frame_rejects_wrong_length() {
        let err = Frame::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err, FrameError::BufferSize { width: 2, height: 2, expected: 16, actual: 15 });
    }

    #[test]
    fn test_split_source_halves() {
        let red = Rgb8::new(255, 0, 0);
        let blue = Rgb8::new(0, 0, 255);
        let mut src = StaticSource::split(4, 2, red, blue).unwrap();
        let f = src.current_frame().unwrap();
        assert_eq!(f.rgb(0, 0), red);
        assert_eq!(f.rgb(1, 1), red);
        assert_eq!(f.rgb(2, 0), blue);
        assert_eq!(f.rgb(3, 1), blue);
    }

    #[test]
    fn test_pending_source_warms_up() {
        let inner = StaticSource::solid(2, 2, Rgb8::new(1, 2, 3)).unwrap();
        let mut src = PendingSource::new(inner, 2);
        assert_eq!(src.current_dimensions(), (0, 0));
        assert!(src.current_frame().is_none());
        assert_eq!(src.current_dimensions(), (0, 0));
        assert_eq!(src.current_dimensions(), (2, 2));
        assert!(src.current_frame().is_some());
    }

    #[test]
    fn test_missing_sequence_dir() {
        let err = ImageSequenceSource::open(Path::new("/nonexistent/frames")).err().unwrap();
        assert!(matches!(err, SequenceError::ReadDir { .. }));
    }

    /// Fresh, empty directory under the system temp dir.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("huekey-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
        image::RgbaImage::from_pixel(w, h, image::Rgba(rgba)).save(path).unwrap();
    }

    #[test]
    fn test_sequence_sorted_and_cycles() {
        let dir = scratch_dir("sequence");
        // Written out of order; the source sorts by file name.
        write_png(&dir.join("frame_b.png"), 3, 2, [0, 0, 255, 255]);
        write_png(&dir.join("frame_a.png"), 3, 2, [255, 0, 0, 255]);
        std::fs::write(dir.join("notes.txt"), "not an image").unwrap();

        let mut src = ImageSequenceSource::open(&dir).unwrap();
        assert_eq!(src.len(), 2);
        assert_eq!(src.current_dimensions(), (3, 2));

        let order: Vec<Rgb8> = (0..3).map(|_| src.current_frame().unwrap().rgb(0, 0)).collect();
        assert_eq!(order, vec![Rgb8::new(255, 0, 0), Rgb8::new(0, 0, 255), Rgb8::new(255, 0, 0)]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rgba_decodes_png() {
        let dir = scratch_dir("load");
        let path = dir.join("one.png");
        write_png(&path, 4, 3, [10, 20, 30, 128]);

        let frame = load_rgba(&path).unwrap();
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(&frame.as_bytes()[..4], &[10, 20, 30, 128]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sequence_without_images_is_empty() {
        let dir = scratch_dir("no-images");
        std::fs::write(dir.join("readme.txt"), "nothing to play").unwrap();

        let err = ImageSequenceSource::open(&dir).err().unwrap();
        assert!(matches!(err, SequenceError::Empty(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sequence_undecodable_image() {
        let dir = scratch_dir("broken");
        std::fs::write(dir.join("broken.png"), b"not really a png").unwrap();

        let err = ImageSequenceSource::open(&dir).err().unwrap();
        assert!(matches!(err, SequenceError::Decode { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
