//! Image descriptor types: color format, alpha mode and dimensions.

use crate::error::{Error, Result};

/// Pixel color formats (memory layout of one pixel).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ColorFormat {
    /// 8-bit alpha only.
    Alpha8,
    /// 8-bit grayscale.
    Gray8,
    /// 8-bit index into a [`ColorPalette`](crate::palette::ColorPalette).
    Index8,
    /// RGB 5-6-5, packed (16 bits/pixel).
    Rgb565,
    /// ARGB 4-4-4-4, packed (16 bits/pixel).
    Argb4444,
    /// RGBA 8-bit per channel, packed (32 bits/pixel).
    #[default]
    Rgba8888,
    /// BGRA 8-bit per channel, packed (32 bits/pixel).
    Bgra8888,
    /// RGBA half-float per channel (64 bits/pixel).
    RgbaF16,
}

impl ColorFormat {
    /// Bytes occupied by a single pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            ColorFormat::Alpha8 | ColorFormat::Gray8 | ColorFormat::Index8 => 1,
            ColorFormat::Rgb565 | ColorFormat::Argb4444 => 2,
            ColorFormat::Rgba8888 | ColorFormat::Bgra8888 => 4,
            ColorFormat::RgbaF16 => 8,
        }
    }

    /// Pixels are indices into a color palette.
    #[inline]
    pub const fn is_indexed(&self) -> bool {
        matches!(self, ColorFormat::Index8)
    }

    /// Format has no alpha channel at all.
    #[inline]
    pub const fn is_always_opaque(&self) -> bool {
        matches!(self, ColorFormat::Rgb565 | ColorFormat::Gray8)
    }

    /// Check whether `alpha` can describe pixels of this format.
    pub fn supports_alpha_mode(&self, alpha: AlphaMode) -> bool {
        if self.is_always_opaque() {
            return alpha == AlphaMode::Opaque;
        }
        match self {
            // Alpha-only pixels have no color to premultiply against.
            ColorFormat::Alpha8 => alpha != AlphaMode::Straight,
            _ => true,
        }
    }
}

/// How the alpha channel relates to the color channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    /// Color channels are independent of alpha.
    Straight,
    /// Color channels are already multiplied by alpha.
    #[default]
    Premultiplied,
    /// Every pixel is fully opaque; alpha is ignored.
    Opaque,
}

impl AlphaMode {
    /// Map the bitmap-level "is premultiplied" flag onto an alpha mode.
    ///
    /// Opaque stays opaque regardless of the flag.
    pub fn from_premultiplied(current: AlphaMode, premultiplied: bool) -> AlphaMode {
        match (current, premultiplied) {
            (AlphaMode::Opaque, _) => AlphaMode::Opaque,
            (_, true) => AlphaMode::Premultiplied,
            (_, false) => AlphaMode::Straight,
        }
    }
}

/// Width, height, color format and alpha mode of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel memory layout.
    pub color_format: ColorFormat,
    /// Alpha interpretation.
    pub alpha_mode: AlphaMode,
}

impl ImageDescriptor {
    /// Create a new descriptor.
    pub const fn new(
        width: u32,
        height: u32,
        color_format: ColorFormat,
        alpha_mode: AlphaMode,
    ) -> Self {
        Self {
            width,
            height,
            color_format,
            alpha_mode,
        }
    }

    /// Premultiplied RGBA 8888 descriptor.
    pub const fn rgba(width: u32, height: u32) -> Self {
        Self::new(
            width,
            height,
            ColorFormat::Rgba8888,
            AlphaMode::Premultiplied,
        )
    }

    /// Return a copy with a different alpha mode.
    pub const fn with_alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    /// Bytes per pixel of the color format.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.color_format.bytes_per_pixel()
    }

    /// Bytes needed for one tightly-packed row.
    pub fn min_row_bytes(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.bytes_per_pixel())
            .ok_or_else(|| {
                Error::InvalidDescriptor(format!("row of {} pixels overflows", self.width))
            })
    }

    /// Bytes covered by `height` rows of `row_stride` bytes.
    pub fn footprint(&self, row_stride: usize) -> Result<usize> {
        row_stride
            .checked_mul(self.height as usize)
            .ok_or_else(|| {
                Error::InvalidDescriptor(format!(
                    "{} rows of {} bytes overflows",
                    self.height, row_stride
                ))
            })
    }

    /// Check dimensions and alpha compatibility.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDescriptor(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.color_format.supports_alpha_mode(self.alpha_mode) {
            return Err(Error::IncompatibleAlphaMode {
                color_format: self.color_format,
                alpha: self.alpha_mode,
            });
        }
        self.min_row_bytes().map(|_| ())
    }

    /// Validate `row_stride` against this descriptor and return the footprint.
    pub fn checked_footprint(&self, row_stride: usize) -> Result<usize> {
        self.validate()?;
        let min_row_bytes = self.min_row_bytes()?;
        if row_stride < min_row_bytes {
            return Err(Error::InvalidRowStride {
                row_stride,
                min_row_bytes,
            });
        }
        self.footprint(row_stride)
    }
}
