//! Decoder for Hasselblad 3FR raw files.
//!
//! The crate reads the TIFF container of a 3FR file, finds the strip with
//! the raw sensor data and decompresses it with the Hasselblad lossless
//! JPEG variant. Camera calibration comes from a catalog built into the
//! crate.
//!
//! ```rust,no_run
//! let image = threefr::decode_file("photo.3fr").unwrap();
//! println!("{}x{} {}", image.width, image.height, image.metadata.cfa);
//! for err in &image.errors {
//!   eprintln!("partially decoded: {}", err);
//! }
//! ```

#[macro_use] extern crate lazy_static;

use std::io::Read;
use std::path::Path;

#[doc(hidden)] pub mod decoders;
pub use crate::decoders::{Buffer, Camera, Decoder, DecompressOptions, RawError, RawHide, RawImage, RawMetadata};
pub use crate::decoders::{StripDecompressor, StripDescriptor, CFA};
pub use crate::decoders::cfa::{CFA_COLOR_B, CFA_COLOR_E, CFA_COLOR_G, CFA_COLOR_R};
pub use crate::decoders::ljpeg::HasselbladDecompressor;
pub use crate::decoders::tfr::TfrDecoder;

lazy_static! {
  static ref LOADER: RawHide = RawHide::new();
}

/// Decodes a file from disk with the built-in catalog
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<RawImage, RawError> {
  LOADER.decode_file(path)
}

/// Decodes a file from any reader with the built-in catalog
pub fn decode(reader: &mut dyn Read) -> Result<RawImage, RawError> {
  LOADER.decode(reader)
}

/// Like [`decode`] but panics are not caught
pub fn decode_unwrapped(reader: &mut dyn Read) -> Result<RawImage, RawError> {
  LOADER.decode_unwrapped(reader)
}

/// Reads identification and calibration data without decoding the pixels
pub fn decode_metadata(reader: &mut dyn Read) -> Result<RawMetadata, RawError> {
  LOADER.decode_metadata(reader)
}

/// Parses the built-in catalog now instead of on first use
pub fn force_initialization() {
  lazy_static::initialize(&LOADER);
}
