use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use enumn::N;
use tracing::debug;

use crate::decoders::RawError;

// Guards against maliciously deep or circular directory trees
const MAX_DEPTH: usize = 8;
const MAX_CHAIN: usize = 64;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_SBYTE: u16 = 6;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SSHORT: u16 = 8;
const TYPE_SLONG: u16 = 9;
const TYPE_SRATIONAL: u16 = 10;
const TYPE_FLOAT: u16 = 11;
const TYPE_DOUBLE: u16 = 12;
const TYPE_IFD: u16 = 13;

// Size in bytes of one value of each field type, indexed by type
const DATASHIFTS: [usize; 14] = [0, 1, 1, 2, 4, 8, 1, 1, 2, 4, 8, 4, 8, 4];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, N)]
#[repr(u16)]
pub enum Tag {
  NewSubFileType    = 0x00FE,
  ImageWidth        = 0x0100,
  ImageLength       = 0x0101,
  BitsPerSample     = 0x0102,
  Compression       = 0x0103,
  PhotometricInt    = 0x0106,
  Make              = 0x010F,
  Model             = 0x0110,
  StripOffsets      = 0x0111,
  Orientation       = 0x0112,
  SamplesPerPixel   = 0x0115,
  StripByteCounts   = 0x0117,
  Software          = 0x0131,
  SubIFDs           = 0x014A,
  ExifIFDPointer    = 0x8769,
  ISOSpeed          = 0x8827,
  DNGVersion        = 0xC612,
  UniqueCameraModel = 0xC614,
  AsShotNeutral     = 0xC628,
}

impl Tag {
  pub fn value(self) -> u16 {
    self as u16
  }
}

// Names a raw tag number for error messages, falling back to hex for tags
// this crate doesn't know about
fn tag_name(tag: u16) -> String {
  match Tag::n(tag) {
    Some(t) => format!("{:?}", t),
    None => format!("0x{:04x}", tag),
  }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Endian {
  Big,
  Little,
}

impl Endian {
  pub fn ru16(self, buf: &[u8], pos: usize) -> u16 {
    match self {
      Endian::Big => BigEndian::read_u16(&buf[pos..]),
      Endian::Little => LittleEndian::read_u16(&buf[pos..]),
    }
  }

  pub fn ru32(self, buf: &[u8], pos: usize) -> u32 {
    match self {
      Endian::Big => BigEndian::read_u32(&buf[pos..]),
      Endian::Little => LittleEndian::read_u32(&buf[pos..]),
    }
  }

  pub fn rf32(self, buf: &[u8], pos: usize) -> f32 {
    match self {
      Endian::Big => BigEndian::read_f32(&buf[pos..]),
      Endian::Little => LittleEndian::read_f32(&buf[pos..]),
    }
  }

  pub fn rf64(self, buf: &[u8], pos: usize) -> f64 {
    match self {
      Endian::Big => BigEndian::read_f64(&buf[pos..]),
      Endian::Little => LittleEndian::read_f64(&buf[pos..]),
    }
  }
}

/// Checks the byte order mark and magic number of a TIFF header
pub fn is_tiff(buf: &[u8]) -> bool {
  if buf.len() < 8 {
    return false
  }
  match &buf[0..2] {
    b"II" => LittleEndian::read_u16(&buf[2..]) == 42,
    b"MM" => BigEndian::read_u16(&buf[2..]) == 42,
    _ => false,
  }
}

#[derive(Clone)]
pub struct TiffEntry<'a> {
  tag: u16,
  typ: u16,
  pub count: usize,
  data: &'a [u8],
  endian: Endian,
}

/// A directory of entries plus the directories it points to.
///
/// The root returned by [`TiffIFD::new_file`] holds no entries of its own,
/// its children are the top level IFD chain in file order. Every recursive
/// lookup walks the tree depth first, a directory before its children and
/// children in the order they were declared (SubIFDs before the EXIF IFD).
#[derive(Debug, Clone)]
pub struct TiffIFD<'a> {
  entries: HashMap<u16, TiffEntry<'a>>,
  subifds: Vec<TiffIFD<'a>>,
  nextifd: usize,
  endian: Endian,
}

impl<'a> TiffIFD<'a> {
  pub fn new_file(buf: &'a [u8]) -> Result<TiffIFD<'a>, RawError> {
    if !is_tiff(buf) {
      return Err(RawError::Tiff("not a TIFF file".to_string()))
    }
    let endian = match &buf[0..2] {
      b"II" => Endian::Little,
      _ => Endian::Big,
    };

    let mut seen = HashSet::new();
    let mut subifds = Vec::new();
    let mut offset = endian.ru32(buf, 4) as usize;
    while offset != 0 && subifds.len() < MAX_CHAIN {
      if !seen.insert(offset) {
        debug!("TIFF: IFD chain loops back to offset {}", offset);
        break
      }
      let ifd = match TiffIFD::new(buf, offset, 0, endian, &mut seen) {
        Ok(ifd) => ifd,
        // A broken later IFD doesn't invalidate the ones already parsed
        Err(e) if !subifds.is_empty() => {
          debug!("TIFF: ignoring IFD at {}: {}", offset, e);
          break
        },
        Err(e) => return Err(e),
      };
      offset = ifd.nextifd;
      subifds.push(ifd);
    }

    Ok(TiffIFD {
      entries: HashMap::new(),
      subifds,
      nextifd: 0,
      endian,
    })
  }

  pub fn new(buf: &'a [u8], offset: usize, depth: usize, endian: Endian, seen: &mut HashSet<usize>) -> Result<TiffIFD<'a>, RawError> {
    if offset.checked_add(2).map_or(true, |end| end > buf.len()) {
      return Err(RawError::Tiff(format!("IFD offset {} is past the end of the file", offset)))
    }
    let num = endian.ru16(buf, offset) as usize;
    let table_end = offset + 2 + num * 12;
    if table_end > buf.len() {
      return Err(RawError::Tiff(format!("IFD at {} has {} entries but the file ends at {}", offset, num, buf.len())))
    }

    let mut entries = HashMap::new();
    let mut subifds = Vec::new();

    for i in 0..num {
      let entry_offset = offset + 2 + i * 12;
      let entry = match TiffEntry::new(buf, entry_offset, endian) {
        Some(entry) => entry,
        None => continue,
      };

      if entry.tag == Tag::SubIFDs.value() || entry.tag == Tag::ExifIFDPointer.value() {
        if depth < MAX_DEPTH {
          for j in 0..entry.count {
            let sub_offset = match entry.get_usize(j) {
              Ok(off) => off,
              Err(_) => break,
            };
            if !seen.insert(sub_offset) {
              continue
            }
            match TiffIFD::new(buf, sub_offset, depth + 1, endian, seen) {
              Ok(ifd) => subifds.push(ifd),
              Err(e) => debug!("TIFF: ignoring sub IFD at {}: {}", sub_offset, e),
            }
          }
        }
      }

      entries.insert(entry.tag, entry);
    }

    let nextifd = if table_end + 4 <= buf.len() {
      endian.ru32(buf, table_end) as usize
    } else {
      0
    };

    Ok(TiffIFD {
      entries,
      subifds,
      nextifd,
      endian,
    })
  }

  pub fn find_entry(&self, tag: Tag) -> Option<&TiffEntry<'a>> {
    self.entries.get(&tag.value())
  }

  pub fn has_entry(&self, tag: Tag) -> bool {
    self.entries.contains_key(&tag.value())
  }

  /// First entry with this tag anywhere in the subtree
  pub fn find_entry_recursive(&self, tag: Tag) -> Option<&TiffEntry<'a>> {
    if let Some(entry) = self.entries.get(&tag.value()) {
      return Some(entry)
    }
    self.subifds.iter().find_map(|ifd| ifd.find_entry_recursive(tag))
  }

  pub fn has_entry_recursive(&self, tag: Tag) -> bool {
    self.find_entry_recursive(tag).is_some()
  }

  /// Every directory in the subtree that carries this tag, in traversal order
  pub fn find_ifds_with_tag(&self, tag: Tag) -> Vec<&TiffIFD<'a>> {
    let mut ifds = Vec::new();
    self.collect_ifds_with_tag(tag, &mut ifds);
    ifds
  }

  fn collect_ifds_with_tag<'b>(&'b self, tag: Tag, ifds: &mut Vec<&'b TiffIFD<'a>>) {
    if self.has_entry(tag) {
      ifds.push(self);
    }
    for ifd in &self.subifds {
      ifd.collect_ifds_with_tag(tag, ifds);
    }
  }

  pub fn find_first_ifd(&self, tag: Tag) -> Option<&TiffIFD<'a>> {
    if self.has_entry(tag) {
      return Some(self)
    }
    self.subifds.iter().find_map(|ifd| ifd.find_first_ifd(tag))
  }

  pub fn subifds(&self) -> &[TiffIFD<'a>] {
    &self.subifds
  }

  pub fn endian(&self) -> Endian {
    self.endian
  }
}

impl<'a> TiffEntry<'a> {
  // Entries with an unknown type or data outside the file are dropped
  fn new(buf: &'a [u8], offset: usize, endian: Endian) -> Option<TiffEntry<'a>> {
    let tag = endian.ru16(buf, offset);
    let typ = endian.ru16(buf, offset + 2);
    let count = endian.ru32(buf, offset + 4) as usize;

    if typ == 0 || typ as usize >= DATASHIFTS.len() {
      debug!("TIFF: skipping tag {} with unknown type {}", tag_name(tag), typ);
      return None
    }
    let bytesize = count.checked_mul(DATASHIFTS[typ as usize])?;
    let doffset = if bytesize <= 4 {
      offset + 8
    } else {
      endian.ru32(buf, offset + 8) as usize
    };
    let end = doffset.checked_add(bytesize)?;
    if end > buf.len() {
      debug!("TIFF: skipping tag {}, its data ends past the end of the file", tag_name(tag));
      return None
    }

    Some(TiffEntry {
      tag,
      typ,
      count,
      data: &buf[doffset..end],
      endian,
    })
  }

  pub fn tag(&self) -> u16 {
    self.tag
  }

  pub fn typ(&self) -> u16 {
    self.typ
  }

  fn check_index(&self, idx: usize) -> Result<usize, RawError> {
    if idx >= self.count {
      return Err(RawError::MissingValue {
        tag: tag_name(self.tag),
        count: self.count,
        index: idx,
      })
    }
    Ok(idx * DATASHIFTS[self.typ as usize])
  }

  fn wrong_type(&self, expected: &'static str) -> RawError {
    RawError::WrongType {
      tag: tag_name(self.tag),
      typ: self.typ,
      expected,
    }
  }

  pub fn get_u32(&self, idx: usize) -> Result<u32, RawError> {
    match self.typ {
      TYPE_BYTE | TYPE_UNDEFINED => {
        let pos = self.check_index(idx)?;
        Ok(self.data[pos] as u32)
      },
      TYPE_SHORT => {
        let pos = self.check_index(idx)?;
        Ok(self.endian.ru16(self.data, pos) as u32)
      },
      TYPE_LONG | TYPE_IFD => {
        let pos = self.check_index(idx)?;
        Ok(self.endian.ru32(self.data, pos))
      },
      _ => Err(self.wrong_type("an integer")),
    }
  }

  pub fn get_usize(&self, idx: usize) -> Result<usize, RawError> {
    Ok(self.get_u32(idx)? as usize)
  }

  pub fn get_f32(&self, idx: usize) -> Result<f32, RawError> {
    match self.typ {
      TYPE_BYTE | TYPE_SHORT | TYPE_LONG | TYPE_IFD => Ok(self.get_u32(idx)? as f32),
      TYPE_SBYTE => {
        let pos = self.check_index(idx)?;
        Ok(self.data[pos] as i8 as f32)
      },
      TYPE_SSHORT => {
        let pos = self.check_index(idx)?;
        Ok(self.endian.ru16(self.data, pos) as i16 as f32)
      },
      TYPE_SLONG => {
        let pos = self.check_index(idx)?;
        Ok(self.endian.ru32(self.data, pos) as i32 as f32)
      },
      TYPE_RATIONAL => {
        let pos = self.check_index(idx)?;
        let num = self.endian.ru32(self.data, pos);
        let den = self.endian.ru32(self.data, pos + 4);
        Ok((num as f64 / den as f64) as f32)
      },
      TYPE_SRATIONAL => {
        let pos = self.check_index(idx)?;
        let num = self.endian.ru32(self.data, pos) as i32;
        let den = self.endian.ru32(self.data, pos + 4) as i32;
        Ok((num as f64 / den as f64) as f32)
      },
      TYPE_FLOAT => {
        let pos = self.check_index(idx)?;
        Ok(self.endian.rf32(self.data, pos))
      },
      TYPE_DOUBLE => {
        let pos = self.check_index(idx)?;
        Ok(self.endian.rf64(self.data, pos) as f32)
      },
      _ => Err(self.wrong_type("a number")),
    }
  }

  /// ASCII value up to the first NUL, surrounding whitespace removed
  pub fn get_str(&self) -> Result<&'a str, RawError> {
    if self.typ != TYPE_ASCII {
      return Err(self.wrong_type("a string"))
    }
    let data: &'a [u8] = self.data;
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    match std::str::from_utf8(&data[..end]) {
      Ok(s) => Ok(s.trim()),
      Err(_) => Err(self.wrong_type("a UTF-8 string")),
    }
  }
}

impl<'a> fmt::Debug for TiffEntry<'a> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "TiffEntry {{ tag: {}, typ: {}, count: {} }}", tag_name(self.tag), self.typ, self.count)
  }
}
