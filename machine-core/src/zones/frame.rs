//! Borrowed views over packed camera frames.

use core::fmt;

use super::color::Hsv;

/// Width and height of a frame in pixels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Anything the classifier can sample pixels from.
pub trait Frame {
    fn dimensions(&self) -> FrameDimensions;

    /// Returns the pixel at `(x, y)` converted to the classification space.
    ///
    /// Callers guarantee the coordinate lies inside [`Frame::dimensions`].
    fn hsv_at(&self, x: u32, y: u32) -> Hsv;
}

/// Byte order of a packed three-channel frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    /// Already converted; channels are `h, s, v` in the halved-hue encoding.
    Hsv8,
}

impl PixelLayout {
    pub const CHANNELS: usize = 3;
}

/// Rejected frame buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferSizeError {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for BufferSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame buffer holds {} bytes, expected {}",
            self.actual, self.expected
        )
    }
}

/// Row-major, tightly packed 8-bit frame.
#[derive(Copy, Clone, Debug)]
pub struct PackedFrame<'a> {
    dimensions: FrameDimensions,
    layout: PixelLayout,
    data: &'a [u8],
}

impl<'a> PackedFrame<'a> {
    /// Wraps `data`, checking it holds exactly one frame.
    pub fn new(
        dimensions: FrameDimensions,
        layout: PixelLayout,
        data: &'a [u8],
    ) -> Result<Self, BufferSizeError> {
        let expected = dimensions.pixel_count() * PixelLayout::CHANNELS;
        if data.len() != expected {
            return Err(BufferSizeError {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            dimensions,
            layout,
            data,
        })
    }
}

impl Frame for PackedFrame<'_> {
    fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    fn hsv_at(&self, x: u32, y: u32) -> Hsv {
        let offset =
            (y as usize * self.dimensions.width as usize + x as usize) * PixelLayout::CHANNELS;
        let px = &self.data[offset..offset + PixelLayout::CHANNELS];
        match self.layout {
            PixelLayout::Rgb8 => Hsv::from_rgb(px[0], px[1], px[2]),
            PixelLayout::Bgr8 => Hsv::from_rgb(px[2], px[1], px[0]),
            PixelLayout::Hsv8 => Hsv::new(px[0], px[1], px[2]),
        }
    }
}
