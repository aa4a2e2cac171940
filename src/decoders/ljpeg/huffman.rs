use crate::decoders::basics::*;
use crate::decoders::RawError;

/// Lossless JPEG huffman table mapping codes to difference length categories
#[derive(Debug, Clone)]
pub struct HuffTable {
  // Number of codes of each length, index 0 unused
  pub bits: [u32; 17],
  pub huffval: Vec<u32>,
  // (symbol, code length) for every possible peek of `maxbits` bits
  lookup: Vec<(u8, u8)>,
  maxbits: u32,
}

impl HuffTable {
  pub fn new(bits: [u32; 17], huffval: Vec<u32>) -> Result<HuffTable, RawError> {
    let total: u32 = bits.iter().sum();
    if total as usize > huffval.len() || total > 256 {
      return Err(RawError::Decoder(format!("ljpeg: huffman table declares {} codes but has {} values", total, huffval.len())))
    }
    if let Some(v) = huffval.iter().take(total as usize).find(|&&v| v > 16) {
      return Err(RawError::Decoder(format!("ljpeg: huffman difference length {} is larger than 16", v)))
    }

    let maxbits = match (1..17).rev().find(|&len| bits[len] > 0) {
      Some(len) => len as u32,
      None => return Err(RawError::Decoder("ljpeg: empty huffman table".to_string())),
    };

    let mut lookup = vec![(0u8, 0u8); 1 << maxbits];
    let mut code: u32 = 0;
    let mut h = 0;
    for len in 1..17 {
      for _ in 0..bits[len] {
        if code >= (1 << len) {
          return Err(RawError::Decoder("ljpeg: huffman table has more codes than fit".to_string()))
        }
        let shift = maxbits - len as u32;
        let start = (code << shift) as usize;
        let end = ((code + 1) << shift) as usize;
        for entry in &mut lookup[start..end] {
          *entry = (huffval[h] as u8, len as u8);
        }
        code += 1;
        h += 1;
      }
      code <<= 1;
    }

    Ok(HuffTable {
      bits,
      huffval,
      lookup,
      maxbits,
    })
  }

  /// Decodes one code and returns the difference length it stands for
  #[inline(always)]
  pub fn huff_len<P: BitPump>(&self, pump: &mut P) -> Result<u32, RawError> {
    let peek = pump.peek_bits(self.maxbits) as usize;
    let (symbol, len) = self.lookup[peek];
    if len == 0 {
      return Err(RawError::Io(format!("ljpeg: invalid huffman code {:#b}", peek)))
    }
    pump.consume_bits(len as u32);
    Ok(symbol as u32)
  }
}

/// Reads `len` raw bits and sign extends them the JPEG way
#[inline(always)]
pub fn get_diff<P: BitPump>(pump: &mut P, len: u32) -> i32 {
  if len == 0 {
    return 0
  }
  let mut diff = pump.get_bits(len) as i32;
  if diff & (1 << (len - 1)) == 0 {
    diff -= (1 << len) - 1;
  }
  if diff == 65535 {
    return -32768
  }
  diff
}
