//! Camera frames.
//!
//! [`Image`] is an owned 8-bit sRGB image with alpha channel. RGBA is used so that frames can be
//! uploaded to the GUI as textures without conversion.

use std::fmt;

use image::{ImageFormat, Rgba, RgbaImage};

/// Width and height of an image or network input, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of pixels in an image with this resolution.
    #[inline]
    pub fn num_pixels(&self) -> u32 {
        self.width * self.height
    }

    /// Returns the `width / height` ratio, or [`None`] if either dimension is zero.
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }

    /// Computes the largest centered [`Rect`] inside `self` that has the same aspect ratio as
    /// `target`.
    ///
    /// If either resolution is empty, the full area of `self` is returned.
    pub fn fit_aspect_ratio(&self, target: Resolution) -> Rect {
        let full = Rect::new(0, 0, self.width, self.height);
        let (Some(from), Some(to)) = (target.aspect_ratio(), self.aspect_ratio()) else {
            return full;
        };

        if from > to {
            // Target is wider: keep the full width, crop top and bottom.
            let h = ((self.width as f32 / from) as u32).min(self.height);
            Rect::new(0, (self.height - h) / 2, self.width, h)
        } else {
            // Target is taller (or equal): keep the full height, crop left and right.
            let w = ((self.height as f32 * from) as u32).min(self.width);
            Rect::new((self.width - w) / 2, 0, w, self.height)
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Creates a black image of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        }
    }

    /// Creates an image from raw RGBA8 pixel data.
    ///
    /// Returns [`None`] if `data` does not hold exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|buf| Self { buf })
    }

    /// Decodes a JFIF JPEG or Motion JPEG frame.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
        Ok(Self {
            buf: image.to_rgba8(),
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the RGBA color of the pixel at `(x, y)`, clamping coordinates to the image.
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width().saturating_sub(1));
        let y = y.min(self.height().saturating_sub(1));
        self.buf.get_pixel(x, y).0
    }

    /// Returns the raw RGBA8 pixel data, row by row.
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_square_into_landscape() {
        let rect = Resolution::new(640, 480).fit_aspect_ratio(Resolution::new(224, 224));
        assert_eq!(rect, Rect::new(80, 0, 480, 480));
    }

    #[test]
    fn fit_landscape_into_portrait() {
        let rect = Resolution::new(100, 200).fit_aspect_ratio(Resolution::new(2, 1));
        assert_eq!(rect, Rect::new(0, 75, 100, 50));
    }

    #[test]
    fn fit_empty() {
        let rect = Resolution::new(0, 10).fit_aspect_ratio(Resolution::new(1, 1));
        assert_eq!(rect, Rect::new(0, 0, 0, 10));
    }

    #[test]
    fn get_clamps() {
        let image = Image::from_rgba(2, 1, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        assert_eq!(image.get(0, 0), [1, 2, 3, 255]);
        assert_eq!(image.get(7, 7), [4, 5, 6, 255]);
        assert!(Image::from_rgba(2, 2, vec![0; 3]).is_none());
    }
}
