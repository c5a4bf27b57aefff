//! Frame source backed by still images on disk.
//!
//! A single file is decoded once and reused every tick. A directory is
//! replayed in file-name order and loops at the end, which stands in for a
//! live camera on the bench.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbImage;
use machine_core::zones::{BufferSizeError, FrameDimensions, PackedFrame, PixelLayout};
use thiserror::Error;
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("cannot read frame source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no images found in {0}")]
    Empty(PathBuf),
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decoded RGB frame owned by the host.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    dimensions: FrameDimensions,
    pixels: Vec<u8>,
}

impl DecodedFrame {
    pub fn from_rgb(image: RgbImage) -> Self {
        let dimensions = FrameDimensions::new(image.width(), image.height());
        Self {
            dimensions,
            pixels: image.into_raw(),
        }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    pub fn as_packed(&self) -> Result<PackedFrame<'_>, BufferSizeError> {
        PackedFrame::new(self.dimensions, PixelLayout::Rgb8, &self.pixels)
    }
}

pub struct FrameSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    current: Option<DecodedFrame>,
}

impl FrameSource {
    /// Opens `path` and decodes the first frame so a broken source fails early.
    pub fn open(path: &Path) -> Result<Self, FrameSourceError> {
        let io_error = |source| FrameSourceError::Io {
            path: path.to_path_buf(),
            source,
        };

        let paths = if fs::metadata(path).map_err(io_error)?.is_dir() {
            let mut paths = Vec::new();
            for entry in fs::read_dir(path).map_err(io_error)? {
                let candidate = entry.map_err(io_error)?.path();
                if candidate.is_file() && has_image_extension(&candidate) {
                    paths.push(candidate);
                }
            }
            paths.sort();
            paths
        } else {
            vec![path.to_path_buf()]
        };

        let first = paths
            .first()
            .ok_or_else(|| FrameSourceError::Empty(path.to_path_buf()))?;
        let current = Some(decode(first)?);

        Ok(Self {
            paths,
            cursor: 0,
            current,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Size of the most recently decoded frame.
    pub fn dimensions(&self) -> Option<FrameDimensions> {
        self.current.as_ref().map(DecodedFrame::dimensions)
    }

    /// Frame for this tick, or `None` when the image cannot be decoded.
    pub fn next_frame(&mut self) -> Option<&DecodedFrame> {
        if self.paths.len() > 1 {
            let path = &self.paths[self.cursor];
            self.cursor = (self.cursor + 1) % self.paths.len();
            self.current = match decode(path) {
                Ok(frame) => Some(frame),
                Err(error) => {
                    debug!(%error, "frame skipped");
                    None
                }
            };
        }
        self.current.as_ref()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn decode(path: &Path) -> Result<DecodedFrame, FrameSourceError> {
    let image = image::open(path).map_err(|source| FrameSourceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(DecodedFrame::from_rgb(image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use machine_core::zones::{Frame, Hsv};

    fn write_png(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(4, 2, Rgb(color))
            .save(&path)
            .expect("save png");
        path
    }

    #[test]
    fn still_image_is_reused() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_png(dir.path(), "still.png", [255, 255, 0]);

        let mut source = FrameSource::open(&path).expect("open");
        assert_eq!(source.len(), 1);
        for _ in 0..3 {
            let frame = source.next_frame().expect("frame");
            assert_eq!(frame.dimensions(), FrameDimensions::new(4, 2));
            let packed = frame.as_packed().expect("packed");
            assert_eq!(packed.hsv_at(0, 0), Hsv::new(30, 255, 255));
        }
    }

    #[test]
    fn directory_replays_in_name_order_and_loops() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_png(dir.path(), "b.png", [0, 0, 255]);
        write_png(dir.path(), "a.png", [255, 0, 0]);
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write note");

        let mut source = FrameSource::open(dir.path()).expect("open");
        assert_eq!(source.len(), 2);

        let hue = |source: &mut FrameSource| {
            let frame = source.next_frame().expect("frame");
            frame.as_packed().expect("packed").hsv_at(1, 1).h
        };
        assert_eq!(hue(&mut source), 0);
        assert_eq!(hue(&mut source), 120);
        assert_eq!(hue(&mut source), 0);
    }

    #[test]
    fn unreadable_sources_fail_to_open() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            FrameSource::open(dir.path()),
            Err(FrameSourceError::Empty(_))
        ));

        let bogus = dir.path().join("broken.png");
        fs::write(&bogus, b"not an image").expect("write");
        assert!(matches!(
            FrameSource::open(&bogus),
            Err(FrameSourceError::Decode { .. })
        ));

        assert!(matches!(
            FrameSource::open(&dir.path().join("missing")),
            Err(FrameSourceError::Io { .. })
        ));
    }
}
