use byteorder::{BigEndian, ByteOrder};

use crate::decoders::RawError;

pub mod huffman;
pub mod hasselblad;

pub use self::hasselblad::HasselbladDecompressor;
use self::huffman::HuffTable;

const M_SOF0: u8 = 0xC0;
const M_DHT: u8 = 0xC4;
const M_SOF3: u8 = 0xC3;
const M_DAC: u8 = 0xCC;
const M_JPG: u8 = 0xC8;
const M_SOF15: u8 = 0xCF;
const M_SOI: u8 = 0xD8;
const M_EOI: u8 = 0xD9;
const M_SOS: u8 = 0xDA;

/// Big endian byte reader for marker segments, every read bounds checked
#[derive(Debug, Copy, Clone)]
pub struct ByteStream<'a> {
  buffer: &'a [u8],
  pos: usize,
}

impl<'a> ByteStream<'a> {
  pub fn new(src: &'a [u8]) -> ByteStream<'a> {
    ByteStream { buffer: src, pos: 0 }
  }

  pub fn get_pos(&self) -> usize {
    self.pos
  }

  fn overrun(&self, want: usize) -> RawError {
    RawError::Io(format!("ljpeg: wanted {} bytes at offset {} but the stream ends at {}", want, self.pos, self.buffer.len()))
  }

  pub fn get_u8(&mut self) -> Result<u8, RawError> {
    let val = *self.buffer.get(self.pos).ok_or_else(|| self.overrun(1))?;
    self.pos += 1;
    Ok(val)
  }

  pub fn get_u16(&mut self) -> Result<u16, RawError> {
    if self.pos + 2 > self.buffer.len() {
      return Err(self.overrun(2))
    }
    let val = BigEndian::read_u16(&self.buffer[self.pos..]);
    self.pos += 2;
    Ok(val)
  }

  pub fn skip_bytes(&mut self, num: usize) -> Result<(), RawError> {
    if self.pos + num > self.buffer.len() {
      return Err(self.overrun(num))
    }
    self.pos += num;
    Ok(())
  }
}

#[derive(Debug, Copy, Clone)]
struct Component {
  id: u8,
  dc_table: usize,
}

/// Everything the lossless JPEG marker segments say about the scan
#[derive(Debug, Clone)]
pub struct LjpegHeader {
  pub precision: u8,
  pub width: usize,
  pub height: usize,
  pub components: usize,
  pub predictor: u8,
  pub point_transform: u8,
  /// Table used by the first scan component
  pub huff: HuffTable,
  /// Offset of the entropy coded data from the start of the stream
  pub scan_offset: usize,
}

impl LjpegHeader {
  pub fn new(src: &[u8]) -> Result<LjpegHeader, RawError> {
    let mut input = ByteStream::new(src);
    if input.get_u8()? != 0xFF || input.get_u8()? != M_SOI {
      return Err(RawError::Decoder("ljpeg: image did not start with SOI, probably not an LJPEG".to_string()))
    }

    let mut tables: [Option<HuffTable>; 4] = [None, None, None, None];
    let mut frame: Option<(u8, usize, usize, Vec<Component>)> = None;

    loop {
      let marker = next_marker(&mut input)?;
      match marker {
        M_DHT => parse_dht(&mut input, &mut tables)?,
        M_SOF3 => frame = Some(parse_sof(&mut input)?),
        M_SOS => {
          let (precision, width, height, mut components) = match frame {
            Some(f) => f,
            None => return Err(RawError::Decoder("ljpeg: scan starts before the frame header".to_string())),
          };
          let (predictor, point_transform) = parse_sos(&mut input, &mut components)?;
          let first = components[0];
          let huff = match tables[first.dc_table].take() {
            Some(t) => t,
            None => return Err(RawError::Decoder(format!("ljpeg: no huffman table {} for component {}", first.dc_table, first.id))),
          };
          return Ok(LjpegHeader {
            precision,
            width,
            height,
            components: components.len(),
            predictor,
            point_transform,
            huff,
            scan_offset: input.get_pos(),
          })
        },
        M_EOI => return Err(RawError::Io("ljpeg: reached end of image before the scan".to_string())),
        m if (M_SOF0..=M_SOF15).contains(&m) && m != M_JPG && m != M_DAC => {
          return Err(RawError::Decoder(format!("ljpeg: unsupported frame type {:#x}", m)))
        },
        _ => {
          // APPn, COM, DQT, DRI and friends carry nothing we need
          let len = input.get_u16()? as usize;
          input.skip_bytes(len.saturating_sub(2))?;
        },
      }
    }
  }
}

fn next_marker(input: &mut ByteStream) -> Result<u8, RawError> {
  // Skip garbage up to the next 0xFF, then any fill bytes
  while input.get_u8()? != 0xFF {}
  let mut marker = input.get_u8()?;
  while marker == 0xFF {
    marker = input.get_u8()?;
  }
  Ok(marker)
}

fn parse_dht(input: &mut ByteStream, tables: &mut [Option<HuffTable>; 4]) -> Result<(), RawError> {
  let mut remaining = (input.get_u16()? as usize).saturating_sub(2);
  while remaining > 0 {
    let b = input.get_u8()?;
    let class = b >> 4;
    let id = (b & 0x0F) as usize;
    if class != 0 {
      return Err(RawError::Decoder("ljpeg: AC huffman tables are not used by lossless JPEG".to_string()))
    }
    if id > 3 {
      return Err(RawError::Decoder(format!("ljpeg: invalid huffman table id {}", id)))
    }

    let mut bits = [0u32; 17];
    let mut count = 0usize;
    for len in 1..17 {
      bits[len] = input.get_u8()? as u32;
      count += bits[len] as usize;
    }
    if count > 256 {
      return Err(RawError::Decoder(format!("ljpeg: huffman table with {} codes", count)))
    }
    let mut huffval = Vec::with_capacity(count);
    for _ in 0..count {
      huffval.push(input.get_u8()? as u32);
    }
    tables[id] = Some(HuffTable::new(bits, huffval)?);

    let used = 1 + 16 + count;
    if used > remaining {
      return Err(RawError::Decoder("ljpeg: huffman table overruns its segment".to_string()))
    }
    remaining -= used;
  }
  Ok(())
}

fn parse_sof(input: &mut ByteStream) -> Result<(u8, usize, usize, Vec<Component>), RawError> {
  let _len = input.get_u16()?;
  let precision = input.get_u8()?;
  let height = input.get_u16()? as usize;
  let width = input.get_u16()? as usize;
  let ncomp = input.get_u8()? as usize;
  if ncomp == 0 || ncomp > 4 {
    return Err(RawError::Decoder(format!("ljpeg: {} components in frame", ncomp)))
  }
  let mut components = Vec::with_capacity(ncomp);
  for _ in 0..ncomp {
    let id = input.get_u8()?;
    let _sampling = input.get_u8()?;
    let _quant = input.get_u8()?;
    components.push(Component { id, dc_table: 0 });
  }
  Ok((precision, width, height, components))
}

fn parse_sos(input: &mut ByteStream, components: &mut [Component]) -> Result<(u8, u8), RawError> {
  let _len = input.get_u16()?;
  let ns = input.get_u8()? as usize;
  if ns != components.len() {
    return Err(RawError::Decoder(format!("ljpeg: scan has {} components, frame has {}", ns, components.len())))
  }
  for _ in 0..ns {
    let cs = input.get_u8()?;
    let td = (input.get_u8()? >> 4) as usize;
    if td > 3 {
      return Err(RawError::Decoder(format!("ljpeg: invalid huffman table selector {}", td)))
    }
    match components.iter_mut().find(|c| c.id == cs) {
      Some(c) => c.dc_table = td,
      None => return Err(RawError::Decoder(format!("ljpeg: scan references unknown component {}", cs))),
    }
  }
  let predictor = input.get_u8()?;
  let _se = input.get_u8()?;
  let point_transform = input.get_u8()? & 0x0F;
  Ok((predictor, point_transform))
}
