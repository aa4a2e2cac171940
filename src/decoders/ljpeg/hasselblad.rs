use std::cmp;

use tracing::debug;

use crate::decoders::basics::*;
use crate::decoders::ljpeg::huffman::get_diff;
use crate::decoders::ljpeg::LjpegHeader;
use crate::decoders::*;

/// Hasselblad's lossless JPEG variant.
///
/// Pixels are coded in pairs: two huffman length codes first, then the two
/// difference values. Both predictors restart at `0x8000 + pixel_base_offset`
/// at the start of every row.
#[derive(Debug, Copy, Clone, Default)]
pub struct HasselbladDecompressor;

impl StripDecompressor for HasselbladDecompressor {
  fn decompress(&self, src: &[u8], offset: usize, image: &mut RawImage, opts: &DecompressOptions) -> Result<(), RawError> {
    if opts.full_huffman_decode {
      return Err(RawError::Decoder("Hasselblad: pixels are packed two at a time, full huffman decoding can't be used".to_string()))
    }
    if offset >= src.len() {
      return Err(RawError::Io(format!("Hasselblad: strip offset {} is past the end of the {} byte file", offset, src.len())))
    }
    let (x0, y0) = opts.origin;
    if x0 >= image.width || y0 >= image.height {
      return Err(RawError::Decoder(format!("Hasselblad: origin {}x{} is outside the {}x{} image", x0, y0, image.width, image.height)))
    }

    let src = &src[offset..];
    let header = LjpegHeader::new(src)?;
    let frame_width = header.width * header.components;
    let cols = cmp::min(frame_width, image.width - x0);
    let rows = cmp::min(header.height, image.height - y0);
    // Only the predictor reset matters, the header's predictor and point
    // transform are not used by this layout
    debug!("Hasselblad: decoding {}x{} of a {}x{} frame, {} bits, predictor {}, point transform {}, base offset {}",
           cols, rows, frame_width, header.height, header.precision, header.predictor,
           header.point_transform, opts.pixel_base_offset);

    let mut pump = BitPumpMSB32::new(&src[header.scan_offset..]);
    let base = opts.pixel_base_offset.wrapping_add(0x8000);
    for row in 0..rows {
      let out = &mut image.row_mut(y0 + row)[x0..x0 + cols];
      let mut p1 = base;
      let mut p2 = base;
      // Columns past the image edge still have to be read to stay in sync
      for col in (0..frame_width).step_by(2) {
        let len1 = header.huff.huff_len(&mut pump)?;
        let len2 = header.huff.huff_len(&mut pump)?;
        p1 = p1.wrapping_add(get_diff(&mut pump, len1));
        p2 = p2.wrapping_add(get_diff(&mut pump, len2));
        if pump.is_past_end() {
          return Err(RawError::Io(format!("Hasselblad: stream truncated at row {}", y0 + row)))
        }
        if let Some(p) = out.get_mut(col) {
          *p = p1 as u16;
        }
        if let Some(p) = out.get_mut(col + 1) {
          *p = p2 as u16;
        }
      }
    }

    Ok(())
  }
}
