// Builders for synthetic TIFF containers and Hasselblad scans used by the unit tests

use crate::decoders::tiff::Tag;

#[derive(Clone)]
struct TestEntry {
  tag: u16,
  typ: u16,
  count: u32,
  data: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct TestIfd {
  entries: Vec<TestEntry>,
  subifds: Vec<TestIfd>,
}

impl TestIfd {
  pub fn new() -> TestIfd {
    TestIfd::default()
  }

  fn entry(mut self, tag: Tag, typ: u16, count: u32, data: Vec<u8>) -> TestIfd {
    self.entries.push(TestEntry { tag: tag.value(), typ, count, data });
    self
  }

  pub fn short(self, tag: Tag, v: u16) -> TestIfd {
    self.entry(tag, 3, 1, v.to_le_bytes().to_vec())
  }

  pub fn long(self, tag: Tag, v: u32) -> TestIfd {
    self.entry(tag, 4, 1, v.to_le_bytes().to_vec())
  }

  pub fn ascii(self, tag: Tag, s: &str) -> TestIfd {
    let mut data = s.as_bytes().to_vec();
    data.push(0);
    let count = data.len() as u32;
    self.entry(tag, 2, count, data)
  }

  pub fn rationals(self, tag: Tag, vals: &[(u32, u32)]) -> TestIfd {
    let mut data = Vec::new();
    for (num, den) in vals {
      data.extend_from_slice(&num.to_le_bytes());
      data.extend_from_slice(&den.to_le_bytes());
    }
    self.entry(tag, 5, vals.len() as u32, data)
  }

  pub fn subifd(mut self, ifd: TestIfd) -> TestIfd {
    self.subifds.push(ifd);
    self
  }

  // Returns (start of the IFD, position of its next-IFD pointer)
  fn write(&self, out: &mut Vec<u8>) -> (usize, usize) {
    align(out);
    let mut entries = self.entries.clone();
    if !self.subifds.is_empty() {
      let n = self.subifds.len() as u32;
      entries.push(TestEntry { tag: Tag::SubIFDs.value(), typ: 4, count: n, data: vec![0; 4 * n as usize] });
    }
    entries.sort_by_key(|e| e.tag);

    let start = out.len();
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    let table = out.len();
    out.resize(table + entries.len() * 12 + 4, 0);

    let mut subifd_slot = None;
    for (i, e) in entries.iter().enumerate() {
      let pos = table + i * 12;
      out[pos..pos + 2].copy_from_slice(&e.tag.to_le_bytes());
      out[pos + 2..pos + 4].copy_from_slice(&e.typ.to_le_bytes());
      out[pos + 4..pos + 8].copy_from_slice(&e.count.to_le_bytes());
      let slot = if e.data.len() <= 4 {
        out[pos + 8..pos + 8 + e.data.len()].copy_from_slice(&e.data);
        pos + 8
      } else {
        align(out);
        let off = out.len();
        out.extend_from_slice(&e.data);
        out[pos + 8..pos + 12].copy_from_slice(&(off as u32).to_le_bytes());
        off
      };
      if e.tag == Tag::SubIFDs.value() {
        subifd_slot = Some(slot);
      }
    }

    if let Some(slot) = subifd_slot {
      for (k, sub) in self.subifds.iter().enumerate() {
        let (off, _) = sub.write(out);
        out[slot + 4 * k..slot + 4 * k + 4].copy_from_slice(&(off as u32).to_le_bytes());
      }
    }

    (start, table + entries.len() * 12)
  }
}

fn align(out: &mut Vec<u8>) {
  if out.len() % 2 == 1 {
    out.push(0);
  }
}

/// Little endian TIFF with `payload` at offset 8 and the IFD chain after it
pub fn build_tiff(chain: &[TestIfd], payload: &[u8]) -> Vec<u8> {
  let mut out = b"II\x2a\x00\x00\x00\x00\x00".to_vec();
  out.extend_from_slice(payload);
  let mut prev_next: Option<usize> = None;
  for ifd in chain {
    let (start, next) = ifd.write(&mut out);
    match prev_next {
      Some(pos) => out[pos..pos + 4].copy_from_slice(&(start as u32).to_le_bytes()),
      None => out[4..8].copy_from_slice(&(start as u32).to_le_bytes()),
    }
    prev_next = Some(next);
  }
  out
}

/// MSB-first bit writer emitting 32 bit little endian words
pub struct BitWriterMSB32 {
  out: Vec<u8>,
  acc: u64,
  nbits: u32,
}

impl BitWriterMSB32 {
  pub fn new() -> BitWriterMSB32 {
    BitWriterMSB32 { out: Vec::new(), acc: 0, nbits: 0 }
  }

  pub fn put(&mut self, value: u32, bits: u32) {
    if bits == 0 {
      return
    }
    self.acc = (self.acc << bits) | (value as u64 & ((1u64 << bits) - 1));
    self.nbits += bits;
    while self.nbits >= 32 {
      let word = (self.acc >> (self.nbits - 32)) as u32;
      self.out.extend_from_slice(&word.to_le_bytes());
      self.nbits -= 32;
    }
  }

  pub fn finish(mut self) -> Vec<u8> {
    if self.nbits > 0 {
      let pad = 32 - self.nbits;
      self.put(0, pad);
    }
    self.out
  }
}

/// Code length category and raw bits of a JPEG difference
pub fn diff_bits(diff: i32) -> (u32, u32) {
  if diff == 0 {
    return (0, 0)
  }
  let len = 32 - diff.abs().leading_zeros();
  let bits = if diff > 0 { diff } else { diff + (1 << len) - 1 };
  (len, bits as u32)
}

/// Hasselblad scan of `rows` rows, each a list of pixel values, using a
/// table where every length category 0..=16 has the 5 bit code equal to itself
pub fn hasselblad_scan(rows: &[Vec<u16>], base: i32) -> Vec<u8> {
  let height = rows.len() as u16;
  let width = rows.first().map_or(0, |r| r.len()) as u16;

  let mut out = vec![0xFF, 0xD8];
  // DHT: class 0, id 0, seventeen 5 bit codes
  out.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x24, 0x00]);
  let mut counts = [0u8; 16];
  counts[4] = 17;
  out.extend_from_slice(&counts);
  out.extend((0..17).map(|v| v as u8));
  // SOF3: 16 bit precision, one component
  out.extend_from_slice(&[0xFF, 0xC3, 0x00, 0x0B, 0x10]);
  out.extend_from_slice(&height.to_be_bytes());
  out.extend_from_slice(&width.to_be_bytes());
  out.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
  // SOS: component 1 uses table 0, predictor 1
  out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x01, 0x00, 0x00]);

  let mut writer = BitWriterMSB32::new();
  for row in rows {
    let mut p1 = 0x8000 + base;
    let mut p2 = 0x8000 + base;
    for pair in row.chunks(2) {
      let (len1, bits1) = diff_bits(pair[0] as i32 - p1);
      let v2 = if pair.len() > 1 { pair[1] as i32 } else { p2 };
      let (len2, bits2) = diff_bits(v2 - p2);
      writer.put(len1, 5);
      writer.put(len2, 5);
      writer.put(bits1, len1);
      writer.put(bits2, len2);
      p1 = pair[0] as i32;
      p2 = v2;
    }
  }
  out.extend(writer.finish());
  out.extend_from_slice(&[0xFF, 0xD9]);
  out
}
