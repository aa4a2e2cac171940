use std::collections::HashMap;

use tracing::{debug, warn};

use crate::decoders::*;
use crate::decoders::ljpeg::HasselbladDecompressor;
use crate::decoders::tiff::*;

const FORMAT: &str = "3FR";

/// 3FR files carry a thumbnail strip first, the raw data is in the second
/// directory with strip offsets
pub const RAW_IFD_INDEX: usize = 1;

/// Catalog hint with the base value every row's predictor starts from
pub const HINT_PIXEL_BASE_OFFSET: &str = "pixelBaseOffset";

/// Decoder for Hasselblad 3FR files
#[derive(Debug, Clone)]
pub struct TfrDecoder<'a, D = HasselbladDecompressor> {
  buffer: &'a [u8],
  rawhide: &'a RawHide,
  tiff: TiffIFD<'a>,
  hints: HashMap<String, String>,
  strip_index: usize,
  decompressor: D,
}

impl<'a> TfrDecoder<'a> {
  /// Decoder using the catalog hints of the camera that made the file
  pub fn new(buf: &'a [u8], tiff: TiffIFD<'a>, rawhide: &'a RawHide) -> TfrDecoder<'a> {
    let hints = identify(&tiff)
      .and_then(|(make, model)| rawhide.find_camera(make, model, ""))
      .map(|cam| cam.hints.clone())
      .unwrap_or_default();

    TfrDecoder {
      buffer: buf,
      rawhide,
      tiff,
      hints,
      strip_index: RAW_IFD_INDEX,
      decompressor: HasselbladDecompressor,
    }
  }
}

impl<'a, D: StripDecompressor> TfrDecoder<'a, D> {
  pub fn with_hints(mut self, hints: HashMap<String, String>) -> TfrDecoder<'a, D> {
    self.hints = hints;
    self
  }

  /// Picks a different directory for sibling formats that put the raw data elsewhere
  pub fn with_strip_index(mut self, index: usize) -> TfrDecoder<'a, D> {
    self.strip_index = index;
    self
  }

  pub fn with_decompressor<E: StripDecompressor>(self, decompressor: E) -> TfrDecoder<'a, E> {
    TfrDecoder {
      buffer: self.buffer,
      rawhide: self.rawhide,
      tiff: self.tiff,
      hints: self.hints,
      strip_index: self.strip_index,
      decompressor,
    }
  }

  fn pixel_base_offset(&self) -> i32 {
    match self.hints.get(HINT_PIXEL_BASE_OFFSET) {
      Some(value) => match leading_int(value) {
        Some(offset) => offset,
        None => {
          warn!("{}: ignoring {} hint \"{}\", not a number", FORMAT, HINT_PIXEL_BASE_OFFSET, value);
          0
        },
      },
      None => 0,
    }
  }

  fn model_ifd(&self) -> Result<&TiffIFD<'a>, RawError> {
    match self.tiff.find_first_ifd(Tag::Model) {
      Some(ifd) => Ok(ifd),
      None => Err(RawError::ModelNotFound(FORMAT)),
    }
  }
}

// Integer at the start of a hint value, trailing text is ignored
fn leading_int(value: &str) -> Option<i32> {
  let s = value.trim_start();
  let sign = if s.starts_with('-') || s.starts_with('+') { 1 } else { 0 };
  let end = sign + s[sign..].bytes().take_while(u8::is_ascii_digit).count();
  s[..end].parse::<i32>().ok()
}

// Make and model from the first directory that has a model
fn identify<'a>(tiff: &TiffIFD<'a>) -> Option<(&'a str, &'a str)> {
  let ifd = tiff.find_first_ifd(Tag::Model)?;
  let make = ifd.find_entry(Tag::Make)?.get_str().ok()?;
  let model = ifd.find_entry(Tag::Model)?.get_str().ok()?;
  Some((make, model))
}

impl<'a, D: StripDecompressor> Decoder for TfrDecoder<'a, D> {
  fn check_support(&self) -> Result<&Camera, RawError> {
    let ifd = self.model_ifd()?;
    let make = fetch_tag!(ifd, Tag::Make, FORMAT).get_str()?;
    let model = fetch_tag!(ifd, Tag::Model, FORMAT).get_str()?;
    self.rawhide.check_supported_with_everything(make, model, "")
  }

  fn decode_raw(&self) -> Result<RawImage, RawError> {
    let strip = locate_strip(&self.tiff, self.strip_index, FORMAT)?;
    let mut image = RawImage::new(strip.width, strip.height)?;

    let opts = DecompressOptions {
      // Lengths come in pairs ahead of their differences, a combined
      // length and difference lookup can't follow that layout
      full_huffman_decode: false,
      pixel_base_offset: self.pixel_base_offset(),
      origin: (0, 0),
    };

    match self.decompressor.decompress(self.buffer, strip.offset, &mut image, &opts) {
      Ok(()) => debug!("{}: decoded {}x{}", FORMAT, image.width, image.height),
      // Truncated files still have most of the frame, keep what was decoded
      Err(e) if e.is_io() => {
        warn!("{}: {}", FORMAT, e);
        image.set_error(&e.to_string());
      },
      Err(e) => return Err(e),
    }

    Ok(image)
  }

  fn decode_metadata(&self) -> Result<RawMetadata, RawError> {
    let mut meta = RawMetadata::default();
    meta.cfa = CFA::new("RGGB");

    let ifd = self.model_ifd()?;
    if !ifd.has_entry(Tag::Make) {
      return Err(RawError::MakeNotFound(FORMAT))
    }
    let make = fetch_tag!(ifd, Tag::Make, FORMAT).get_str()?;
    let model = fetch_tag!(ifd, Tag::Model, FORMAT).get_str()?;
    self.rawhide.set_metadata(&mut meta, make, model, "", 0);

    if let Some(wb) = self.tiff.find_entry_recursive(Tag::AsShotNeutral) {
      if wb.count == 3 {
        let neutral: Result<Vec<f32>, RawError> = (0..3).map(|i| wb.get_f32(i)).collect();
        match neutral {
          Ok(neutral) => {
            for (coeff, val) in meta.wb_coeffs.iter_mut().zip(neutral) {
              *coeff = 1.0 / val;
            }
          },
          Err(e) => debug!("{}: ignoring white balance: {}", FORMAT, e),
        }
      }
    }

    Ok(meta)
  }
}
