//! PDF Viewer Cache Library
//!
//! Compressed per-document page store and the per-viewer decode cache that
//! turns stored pages back into paintable bitmaps.

pub mod codec;
pub mod decode;
pub mod page;
pub mod store;

pub use codec::CodecError;
pub use decode::{
    DecodeError, DecodeStats, DecodedPage, ViewportDecodeCache, DEFAULT_DECODE_CAPACITY,
    DEFAULT_DECODE_SLOTS,
};
pub use page::{CompressedPage, Margins};
pub use store::{CompressedPageStore, PageStatus, StoreError};
