//! Indexed color palettes.

use crate::config::MAX_PALETTE_ENTRIES;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Immutable lookup table for [`ColorFormat::Index8`](crate::format::ColorFormat::Index8) pixels.
///
/// Entries are packed 32-bit ARGB colors. A palette is never edited after
/// construction; buffers share it through `Arc<ColorPalette>` and swap the
/// reference to change colors.
///
/// # Example
///
/// ```rust
/// use pixel_storage::palette::ColorPalette;
///
/// let palette = ColorPalette::shared(vec![0xFF00_0000, 0xFFFF_FFFF]).unwrap();
/// assert_eq!(palette.len(), 2);
/// assert_eq!(palette.get(1), Some(0xFFFF_FFFF));
/// ```
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ColorPalette {
    entries: Box<[u32]>,
}

impl ColorPalette {
    /// Create a palette from ARGB entries.
    ///
    /// # Errors
    ///
    /// Returns an error if `entries` is empty or longer than 256.
    pub fn new(entries: impl Into<Vec<u32>>) -> Result<Self> {
        let entries = entries.into();
        if entries.is_empty() {
            return Err(Error::InvalidPalette("palette has no entries".into()));
        }
        if entries.len() > MAX_PALETTE_ENTRIES {
            return Err(Error::InvalidPalette(format!(
                "{} entries exceeds the maximum of {}",
                entries.len(),
                MAX_PALETTE_ENTRIES
            )));
        }
        Ok(Self {
            entries: entries.into_boxed_slice(),
        })
    }

    /// Create a palette already wrapped for sharing.
    pub fn shared(entries: impl Into<Vec<u32>>) -> Result<Arc<Self>> {
        Self::new(entries).map(Arc::new)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; empty palettes cannot be built.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Color at `index`, if present.
    pub fn get(&self, index: u8) -> Option<u32> {
        self.entries.get(index as usize).copied()
    }

    /// All entries in order.
    pub fn entries(&self) -> &[u32] {
        &self.entries
    }
}
