use std::f32::NAN;

use crate::decoders::cfa::CFA;
use crate::decoders::RawError;

// Largest side length accepted for a raw image
const MAX_DIMENSION: usize = 65535;

/// Camera identification and calibration that goes along with the pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetadata {
  pub make: String,
  pub model: String,
  pub clean_make: String,
  pub clean_model: String,
  pub cfa: CFA,
  /// White balance multipliers, NaN when the file doesn't have them
  pub wb_coeffs: [f32; 4],
  pub blacklevels: [u16; 4],
  pub whitelevels: [u16; 4],
  /// Matrix from XYZ to camera space, NaN when the camera has none
  pub xyz_to_cam: [[f32; 3]; 4],
  /// Crops from the edges of the image, top/right/bottom/left
  pub crops: [usize; 4],
}

impl Default for RawMetadata {
  fn default() -> RawMetadata {
    RawMetadata {
      make: String::new(),
      model: String::new(),
      clean_make: String::new(),
      clean_model: String::new(),
      cfa: CFA::default(),
      wb_coeffs: [NAN, NAN, NAN, NAN],
      blacklevels: [0, 0, 0, 0],
      whitelevels: [65535, 65535, 65535, 65535],
      xyz_to_cam: [[NAN, NAN, NAN]; 4],
      crops: [0, 0, 0, 0],
    }
  }
}

/// Decoded sensor values plus whatever went wrong getting them
#[derive(Debug, Clone)]
pub struct RawImage {
  pub width: usize,
  pub height: usize,
  pub data: Vec<u16>,
  /// Problems hit after the buffer was allocated. The pixels are still
  /// returned, anything not reached by the decoder is left at zero.
  pub errors: Vec<String>,
  pub metadata: RawMetadata,
}

impl RawImage {
  /// Allocates a zeroed image. The size never changes afterwards.
  pub fn new(width: usize, height: usize) -> Result<RawImage, RawError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
      return Err(RawError::InvalidDimensions { width, height })
    }
    Ok(RawImage {
      width,
      height,
      data: vec![0; width * height],
      errors: Vec::new(),
      metadata: RawMetadata::default(),
    })
  }

  pub fn set_error(&mut self, err: &str) {
    self.errors.push(err.to_string());
  }

  /// True when decoding stopped early and only part of the data is valid
  pub fn is_partial(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn row(&self, row: usize) -> &[u16] {
    &self.data[row * self.width..(row + 1) * self.width]
  }

  pub fn row_mut(&mut self, row: usize) -> &mut [u16] {
    &mut self.data[row * self.width..(row + 1) * self.width]
  }

  pub fn pixel(&self, row: usize, col: usize) -> u16 {
    self.data[row * self.width + col]
  }
}
