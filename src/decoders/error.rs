use thiserror::Error;

/// Everything that can go wrong while decoding a raw file.
///
/// Only [`RawError::Io`] is recoverable: once the pixel buffer exists a
/// truncated or inconsistent stream is recorded on the image with
/// [`RawImage::set_error`](crate::RawImage::set_error) and the partially
/// filled buffer is still returned. All other variants abort the operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RawError {
  /// Fewer directories with strip offsets than the format expects
  #[error("{0}: No image data found")]
  NoImageData(&'static str),

  #[error("{0}: Model name not found")]
  ModelNotFound(&'static str),

  #[error("{0}: Make name not found")]
  MakeNotFound(&'static str),

  #[error("{format}: Couldn't find tag {tag}")]
  MissingTag { format: &'static str, tag: String },

  /// A tag was read with a type its field type can't provide
  #[error("Tag {tag} has type {typ}, can't read it as {expected}")]
  WrongType { tag: String, typ: u16, expected: &'static str },

  #[error("Tag {tag} has {count} values, can't read index {index}")]
  MissingValue { tag: String, count: usize, index: usize },

  #[error("Invalid image dimensions {width}x{height}")]
  InvalidDimensions { width: usize, height: usize },

  #[error("Couldn't find camera \"{make}\" \"{model}\" mode \"{mode}\"")]
  UnknownCamera { make: String, model: String, mode: String },

  #[error("Camera \"{make}\" \"{model}\" is explicitly not supported")]
  UnsupportedCamera { make: String, model: String },

  #[error("Unsupported format: {0}")]
  UnsupportedFormat(String),

  #[error("TIFF: {0}")]
  Tiff(String),

  #[error("Camera catalog: {0}")]
  Catalog(String),

  /// Stream truncation or inconsistency inside the compressed data
  #[error("{0}")]
  Io(String),

  /// The decompressor was asked for something it can't do
  #[error("{0}")]
  Decoder(String),

  #[error("Decoding panicked: {0}")]
  Panic(String),
}

impl RawError {
  /// True for failures that leave an already allocated image usable.
  pub fn is_io(&self) -> bool {
    match self {
      RawError::Io(_) => true,
      _ => false,
    }
  }
}

impl From<std::io::Error> for RawError {
  fn from(err: std::io::Error) -> RawError {
    RawError::Io(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn structural_messages_name_the_failure_site() {
    assert_eq!(RawError::NoImageData("3FR").to_string(), "3FR: No image data found");
    assert_eq!(RawError::ModelNotFound("3FR").to_string(), "3FR: Model name not found");
    assert_eq!(RawError::MakeNotFound("3FR").to_string(), "3FR: Make name not found");
  }

  #[test]
  fn only_io_is_soft() {
    assert!(RawError::Io("truncated".to_string()).is_io());
    assert!(!RawError::Decoder("bad header".to_string()).is_io());
    assert!(!RawError::NoImageData("3FR").is_io());
  }

  #[test]
  fn io_messages_are_verbatim() {
    let err = RawError::Io("Hasselblad: stream truncated at row 7".to_string());
    assert_eq!(err.to_string(), "Hasselblad: stream truncated at row 7");
  }
}
