use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use serde_derive::Deserialize;
use tracing::{debug, warn};

macro_rules! fetch_tag {
  ($tiff:expr, $tag:expr, $format:expr) => (
    $tiff.find_entry($tag).ok_or_else(|| $crate::decoders::RawError::MissingTag {
      format: $format,
      tag: format!("{:?}", $tag),
    })?
  );
}

pub mod basics;
pub mod cameras;
pub mod cfa;
mod error;
pub mod image;
pub mod ljpeg;
pub mod tfr;
pub mod tiff;
#[cfg(test)]
pub(crate) mod testutil;

pub use self::cameras::{Camera, Sensor};
pub use self::cfa::CFA;
pub use self::error::RawError;
pub use self::image::{RawImage, RawMetadata};
use self::tiff::*;

pub static CAMERAS_TOML: &'static str = include_str!(concat!(env!("OUT_DIR"), "/all.toml"));

/// A camera format decoder.
///
/// The three operations are independent of each other and can be called in
/// any order, [`Decoder::image`] runs them all.
pub trait Decoder {
  fn check_support(&self) -> Result<&Camera, RawError>;

  /// Decodes the sensor data. Stream errors after the image was allocated
  /// are recorded on the image instead of failing the call.
  fn decode_raw(&self) -> Result<RawImage, RawError>;

  fn decode_metadata(&self) -> Result<RawMetadata, RawError>;

  fn image(&self) -> Result<RawImage, RawError> {
    self.check_support()?;
    let mut image = self.decode_raw()?;
    image.metadata = self.decode_metadata()?;
    Ok(image)
  }
}

/// Knobs a format decoder sets on the entropy decompressor
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DecompressOptions {
  /// Decode code length and difference bits with one table lookup
  pub full_huffman_decode: bool,
  /// Added to the predictor every row starts from
  pub pixel_base_offset: i32,
  /// Pixel the decoded data starts at, (column, row)
  pub origin: (usize, usize),
}

impl Default for DecompressOptions {
  fn default() -> DecompressOptions {
    DecompressOptions {
      full_huffman_decode: true,
      pixel_base_offset: 0,
      origin: (0, 0),
    }
  }
}

/// Turns a compressed strip into pixels.
///
/// Implementations bounds check `offset` against `src` themselves. Running
/// out of data or finding an inconsistent stream must be reported as
/// [`RawError::Io`] and leave already written pixels in place.
pub trait StripDecompressor {
  fn decompress(&self, src: &[u8], offset: usize, image: &mut RawImage, opts: &DecompressOptions) -> Result<(), RawError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StripDescriptor {
  pub width: usize,
  pub height: usize,
  pub offset: usize,
}

/// Reads the strip from the `index`-th directory carrying strip offsets,
/// counted in traversal order
pub fn locate_strip(tiff: &TiffIFD, index: usize, format: &'static str) -> Result<StripDescriptor, RawError> {
  let data = tiff.find_ifds_with_tag(Tag::StripOffsets);
  let raw = match data.get(index) {
    Some(ifd) => ifd,
    None => return Err(RawError::NoImageData(format)),
  };

  let width = fetch_tag!(raw, Tag::ImageWidth, format).get_usize(0)?;
  let height = fetch_tag!(raw, Tag::ImageLength, format).get_usize(0)?;
  let offset = fetch_tag!(raw, Tag::StripOffsets, format).get_usize(0)?;
  debug!("{}: raw strip {}x{} at offset {} (directory {} of {})", format, width, height, offset, index, data.len());

  Ok(StripDescriptor { width, height, offset })
}

#[derive(Debug, Clone)]
pub struct Buffer {
  pub buf: Vec<u8>,
  pub size: usize,
}

impl Buffer {
  pub fn new(reader: &mut dyn Read) -> Result<Buffer, RawError> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    let size = buffer.len();
    Ok(Buffer {
      buf: buffer,
      size,
    })
  }
}

#[derive(Debug, Deserialize)]
struct CameraList {
  #[serde(default)]
  cameras: Vec<Camera>,
}

/// The loader: holds the calibration catalog and picks decoders for files
#[derive(Debug, Clone)]
pub struct RawHide {
  cameras: HashMap<(String, String, String), Camera>,
}

impl RawHide {
  pub fn new() -> RawHide {
    match RawHide::from_toml(CAMERAS_TOML) {
      Ok(rawhide) => rawhide,
      Err(e) => panic!("Error parsing the built-in camera catalog: {}", e),
    }
  }

  /// Loader with a catalog from a TOML document made of `[[cameras]]` tables
  pub fn from_toml(toml_str: &str) -> Result<RawHide, RawError> {
    let list: CameraList = toml::from_str(toml_str).map_err(|e| RawError::Catalog(e.to_string()))?;
    let mut cameras = HashMap::new();
    for mut cam in list.cameras {
      if cam.clean_make.is_empty() {
        cam.clean_make = cam.make.clone();
      }
      if cam.clean_model.is_empty() {
        cam.clean_model = cam.model.clone();
      }
      let key = (cam.make.clone(), cam.model.clone(), cam.mode.clone());
      // First definition wins
      cameras.entry(key).or_insert(cam);
    }
    Ok(RawHide { cameras })
  }

  pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
    self.cameras.values()
  }

  pub fn find_camera(&self, make: &str, model: &str, mode: &str) -> Option<&Camera> {
    let key = (make.trim().to_string(), model.trim().to_string(), mode.trim().to_string());
    self.cameras.get(&key)
  }

  pub fn check_supported_with_everything<'b>(&'b self, make: &str, model: &str, mode: &str) -> Result<&'b Camera, RawError> {
    match self.find_camera(make, model, mode) {
      Some(cam) if cam.supported => Ok(cam),
      Some(cam) => Err(RawError::UnsupportedCamera {
        make: cam.make.clone(),
        model: cam.model.clone(),
      }),
      None => Err(RawError::UnknownCamera {
        make: make.to_string(),
        model: model.to_string(),
        mode: mode.to_string(),
      }),
    }
  }

  /// Fills in catalog defaults. Cameras missing from the catalog only get
  /// the make and model from the file.
  pub fn set_metadata(&self, meta: &mut RawMetadata, make: &str, model: &str, mode: &str, iso: u32) {
    match self.find_camera(make, model, mode) {
      Some(cam) => cam.apply(meta, iso),
      None => {
        warn!("Couldn't find camera \"{}\" \"{}\" mode \"{}\" in the catalog", make, model, mode);
        meta.make = make.to_string();
        meta.model = model.to_string();
        meta.clean_make = make.to_string();
        meta.clean_model = model.to_string();
      },
    }
  }

  pub fn get_decoder<'b>(&'b self, buf: &'b Buffer) -> Result<Box<dyn Decoder + 'b>, RawError> {
    let buffer = &buf.buf[..];
    if !is_tiff(buffer) {
      return Err(RawError::UnsupportedFormat("not a TIFF based raw file".to_string()))
    }

    let tiff = TiffIFD::new_file(buffer)?;
    if tiff.has_entry_recursive(Tag::DNGVersion) {
      return Err(RawError::UnsupportedFormat("DNG files are not supported".to_string()))
    }
    let make = match tiff.find_entry_recursive(Tag::Make) {
      Some(entry) => entry.get_str()?.to_string(),
      None => return Err(RawError::UnsupportedFormat("Couldn't find a make in the file".to_string())),
    };

    if make.starts_with("Hasselblad") {
      debug!("Using the 3FR decoder for make \"{}\"", make);
      return Ok(Box::new(tfr::TfrDecoder::new(buffer, tiff, self)))
    }

    Err(RawError::UnsupportedFormat(format!("Couldn't find a decoder for make \"{}\"", make)))
  }

  pub fn decode(&self, reader: &mut dyn Read) -> Result<RawImage, RawError> {
    let buffer = Buffer::new(reader)?;
    match panic::catch_unwind(AssertUnwindSafe(|| self.decode_buffer(&buffer))) {
      Ok(result) => result,
      Err(cause) => Err(RawError::Panic(panic_message(cause))),
    }
  }

  /// Decodes a file and lets panics through, for fuzzing
  pub fn decode_unwrapped(&self, reader: &mut dyn Read) -> Result<RawImage, RawError> {
    let buffer = Buffer::new(reader)?;
    self.decode_buffer(&buffer)
  }

  pub fn decode_metadata(&self, reader: &mut dyn Read) -> Result<RawMetadata, RawError> {
    let buffer = Buffer::new(reader)?;
    match panic::catch_unwind(AssertUnwindSafe(|| self.get_decoder(&buffer)?.decode_metadata())) {
      Ok(result) => result,
      Err(cause) => Err(RawError::Panic(panic_message(cause))),
    }
  }

  pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<RawImage, RawError> {
    let mut file = File::open(path)?;
    self.decode(&mut file)
  }

  fn decode_buffer(&self, buffer: &Buffer) -> Result<RawImage, RawError> {
    let decoder = self.get_decoder(buffer)?;
    decoder.image()
  }
}

impl Default for RawHide {
  fn default() -> RawHide {
    RawHide::new()
  }
}

fn panic_message(cause: Box<dyn std::any::Any + Send>) -> String {
  if let Some(msg) = cause.downcast_ref::<&str>() {
    msg.to_string()
  } else if let Some(msg) = cause.downcast_ref::<String>() {
    msg.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decoders::testutil::*;
  use proptest::prelude::*;

  const CATALOG: &str = r#"
    [[cameras]]
    make = "Hasselblad"
    model = "Hasselblad H3D"
    hints = { pixelBaseOffset = "-1024" }

    [[cameras]]
    make = "Hasselblad"
    model = "Hasselblad CFV-50"
    supported = false

    [[cameras]]
    make = "Hasselblad"
    model = "Hasselblad H3D"
    clean_model = "duplicate"
  "#;

  fn strip_ifd(width: u32, height: u32, offset: u32) -> TestIfd {
    TestIfd::new()
      .long(Tag::ImageWidth, width)
      .long(Tag::ImageLength, height)
      .long(Tag::StripOffsets, offset)
  }

  #[test]
  fn builtin_catalog_loads() {
    let rawhide = RawHide::new();
    assert!(rawhide.cameras().count() > 0);
    let cam = rawhide.find_camera("Hasselblad", "Hasselblad H3D", "").unwrap();
    assert_eq!(cam.clean_model, "H3D");
  }

  #[test]
  fn catalog_lookup_outcomes_are_distinct() {
    let rawhide = RawHide::from_toml(CATALOG).unwrap();
    let cam = rawhide.check_supported_with_everything("Hasselblad", " Hasselblad H3D ", "").unwrap();
    assert_eq!(cam.clean_model, "Hasselblad H3D");
    match rawhide.check_supported_with_everything("Hasselblad", "Hasselblad CFV-50", "") {
      Err(RawError::UnsupportedCamera { .. }) => {},
      other => panic!("expected an unsupported camera, got {:?}", other),
    }
    match rawhide.check_supported_with_everything("Hasselblad", "Hasselblad X1D", "") {
      Err(RawError::UnknownCamera { model, .. }) => assert_eq!(model, "Hasselblad X1D"),
      other => panic!("expected an unknown camera, got {:?}", other),
    }
  }

  #[test]
  fn broken_catalog_is_an_error() {
    match RawHide::from_toml("[[cameras]]\nmake = 3\n") {
      Err(RawError::Catalog(_)) => {},
      other => panic!("expected a catalog error, got {:?}", other),
    }
  }

  #[test]
  fn unknown_camera_metadata_keeps_file_names() {
    let rawhide = RawHide::from_toml(CATALOG).unwrap();
    let mut meta = RawMetadata::default();
    rawhide.set_metadata(&mut meta, "Hasselblad", "Hasselblad X1D", "", 0);
    assert_eq!(meta.model, "Hasselblad X1D");
    assert_eq!(meta.clean_model, "Hasselblad X1D");
    assert_eq!(meta.whitelevels, [65535; 4]);
  }

  #[test]
  fn locates_the_second_strip() {
    let buf = build_tiff(&[strip_ifd(100, 50, 10), strip_ifd(4032, 3024, 4096)], &[]);
    let tiff = TiffIFD::new_file(&buf).unwrap();
    let strip = locate_strip(&tiff, 1, "3FR").unwrap();
    assert_eq!(strip, StripDescriptor { width: 4032, height: 3024, offset: 4096 });
  }

  #[test]
  fn one_strip_is_not_enough() {
    let buf = build_tiff(&[strip_ifd(100, 50, 10)], &[]);
    let tiff = TiffIFD::new_file(&buf).unwrap();
    assert_eq!(locate_strip(&tiff, 1, "3FR").unwrap_err(), RawError::NoImageData("3FR"));
  }

  #[test]
  fn missing_geometry_is_a_missing_tag() {
    let buf = build_tiff(&[
      strip_ifd(100, 50, 10),
      TestIfd::new().long(Tag::StripOffsets, 10).long(Tag::ImageWidth, 4),
    ], &[]);
    let tiff = TiffIFD::new_file(&buf).unwrap();
    match locate_strip(&tiff, 1, "3FR") {
      Err(RawError::MissingTag { tag, .. }) => assert_eq!(tag, "ImageLength"),
      other => panic!("expected a missing tag, got {:?}", other),
    }
  }

  #[test]
  fn wrongly_typed_geometry_fails_hard() {
    let buf = build_tiff(&[
      strip_ifd(100, 50, 10),
      TestIfd::new().long(Tag::StripOffsets, 10).ascii(Tag::ImageWidth, "4032").long(Tag::ImageLength, 4),
    ], &[]);
    let tiff = TiffIFD::new_file(&buf).unwrap();
    match locate_strip(&tiff, 1, "3FR") {
      Err(RawError::WrongType { tag, typ, .. }) => {
        assert_eq!(tag, "ImageWidth");
        assert_eq!(typ, 2);
      },
      other => panic!("expected a wrong type, got {:?}", other),
    }
  }

  #[test]
  fn non_tiff_files_have_no_decoder() {
    let rawhide = RawHide::from_toml(CATALOG).unwrap();
    let buffer = Buffer::new(&mut &b"\x89PNG\r\n\x1a\n"[..]).unwrap();
    let res = rawhide.get_decoder(&buffer);
    match res {
      Err(RawError::UnsupportedFormat(_)) => {},
      Err(e) => panic!("expected an unsupported format, got {:?}", e),
      Ok(_) => panic!("expected an unsupported format"),
    }
  }

  #[test]
  fn other_makes_have_no_decoder() {
    let rawhide = RawHide::from_toml(CATALOG).unwrap();
    let buf = build_tiff(&[TestIfd::new().ascii(Tag::Make, "Canon").ascii(Tag::Model, "EOS")], &[]);
    let buffer = Buffer::new(&mut &buf[..]).unwrap();
    assert!(rawhide.get_decoder(&buffer).is_err());
  }

  proptest! {
    #[test]
    fn always_picks_the_second_strip_directory(extra in 0usize..6, top_level in any::<bool>()) {
      let mut dirs: Vec<TestIfd> = (0..(2 + extra) as u32).map(|i| strip_ifd(10 + i, 20 + i, 30 + i)).collect();
      let chain = if top_level {
        dirs
      } else {
        // Same order expressed as a root with sub IFDs
        let first = dirs.remove(0);
        vec![dirs.into_iter().fold(first, |root, sub| root.subifd(sub))]
      };
      let buf = build_tiff(&chain, &[]);
      let tiff = TiffIFD::new_file(&buf).unwrap();
      let strip = locate_strip(&tiff, 1, "3FR").unwrap();
      prop_assert_eq!(strip, StripDescriptor { width: 11, height: 21, offset: 31 });
    }
  }
}
