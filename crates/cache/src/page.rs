//! Compressed page records

/// Blank border removed from each side of a page, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub left: u16,
    pub right: u16,
    pub top: u16,
    pub bottom: u16,
}

impl Margins {
    /// Create margins from pixel counts, saturating at `u16::MAX`
    pub fn from_pixels(left: u32, right: u32, top: u32, bottom: u32) -> Self {
        let clamp = |v: u32| u16::try_from(v).unwrap_or(u16::MAX);
        Self {
            left: clamp(left),
            right: clamp(right),
            top: clamp(top),
            bottom: clamp(bottom),
        }
    }

    /// Total horizontal margin
    pub fn horizontal(&self) -> u32 {
        u32::from(self.left) + u32::from(self.right)
    }

    /// Total vertical margin
    pub fn vertical(&self) -> u32 {
        u32::from(self.top) + u32::from(self.bottom)
    }

    /// Largest margin on any side
    pub fn max(&self) -> u16 {
        self.left.max(self.right).max(self.top).max(self.bottom)
    }
}

/// A rendered page after margin trimming and compression.
///
/// The bitmap is 4 bytes per pixel, tightly packed, `width * height` pixels.
/// The record owns its compressed bytes; they are freed with the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPage {
    data: Box<[u8]>,
    uncompressed_len: usize,
    width: u32,
    height: u32,
    margins: Margins,
}

impl CompressedPage {
    /// Bytes per pixel of the stored bitmap
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Assemble a record from already compressed bytes.
    ///
    /// `uncompressed_len` is normally `width * height * 4`; it is taken as
    /// given so the decoder can check the stream against it.
    pub fn from_parts(
        data: Vec<u8>,
        uncompressed_len: usize,
        width: u32,
        height: u32,
        margins: Margins,
    ) -> Self {
        Self {
            data: data.into_boxed_slice(),
            uncompressed_len,
            width,
            height,
            margins,
        }
    }

    /// Compressed bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the compressed bytes
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }

    /// Size of the bitmap once decompressed
    pub fn uncompressed_len(&self) -> usize {
        self.uncompressed_len
    }

    /// Trimmed width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Trimmed height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Width of the page before trimming
    pub fn full_width(&self) -> u32 {
        self.width + self.margins.horizontal()
    }

    /// Height of the page before trimming
    pub fn full_height(&self) -> u32 {
        self.height + self.margins.vertical()
    }

    /// Row length of the decompressed bitmap in bytes
    pub fn row_bytes(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }
}
