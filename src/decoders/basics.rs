use byteorder::{ByteOrder, LittleEndian};

pub trait BitPump {
  fn peek_bits(&mut self, num: u32) -> u32;
  fn consume_bits(&mut self, num: u32);

  #[inline(always)]
  fn get_bits(&mut self, num: u32) -> u32 {
    if num == 0 {
      return 0
    }
    let val = self.peek_bits(num);
    self.consume_bits(num);
    val
  }
}

/// Reads 32 bit little endian words, most significant bit first.
///
/// Reads past the end of the buffer return zeros so hot loops stay branch
/// free; callers check [`BitPumpMSB32::is_past_end`] to detect truncation.
#[derive(Debug, Copy, Clone)]
pub struct BitPumpMSB32<'a> {
  buffer: &'a [u8],
  pos: usize,
  bits: u64,
  nbits: u32,
}

impl<'a> BitPumpMSB32<'a> {
  pub fn new(src: &'a [u8]) -> BitPumpMSB32<'a> {
    BitPumpMSB32 {
      buffer: src,
      pos: 0,
      bits: 0,
      nbits: 0,
    }
  }

  #[inline(always)]
  fn fill(&mut self) {
    while self.nbits <= 32 {
      let word = if self.pos + 4 <= self.buffer.len() {
        LittleEndian::read_u32(&self.buffer[self.pos..])
      } else {
        let mut tail = [0u8; 4];
        if self.pos < self.buffer.len() {
          let rest = &self.buffer[self.pos..];
          tail[..rest.len()].copy_from_slice(rest);
        }
        LittleEndian::read_u32(&tail)
      };
      self.bits = (self.bits << 32) | word as u64;
      self.nbits += 32;
      self.pos += 4;
    }
  }

  pub fn consumed_bits(&self) -> usize {
    self.pos * 8 - self.nbits as usize
  }

  /// True once more bits were consumed than the buffer holds, counting a
  /// short trailing word as a whole one
  pub fn is_past_end(&self) -> bool {
    let words = (self.buffer.len() + 3) / 4;
    self.consumed_bits() > words * 32
  }
}

impl<'a> BitPump for BitPumpMSB32<'a> {
  #[inline(always)]
  fn peek_bits(&mut self, num: u32) -> u32 {
    if num > self.nbits {
      self.fill();
    }
    ((self.bits >> (self.nbits - num)) & ((1u64 << num) - 1)) as u32
  }

  #[inline(always)]
  fn consume_bits(&mut self, num: u32) {
    self.nbits -= num;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_msb_first_within_le_words() {
    // Word 0x8000_0001 stored little endian
    let buf = [0x01, 0x00, 0x00, 0x80, 0xFF, 0x00, 0x00, 0x00];
    let mut pump = BitPumpMSB32::new(&buf);
    assert_eq!(pump.get_bits(1), 1);
    assert_eq!(pump.get_bits(30), 0);
    assert_eq!(pump.get_bits(1), 1);
    assert_eq!(pump.get_bits(24), 0);
    assert_eq!(pump.get_bits(8), 0xFF);
    assert!(!pump.is_past_end());
  }

  #[test]
  fn pads_with_zeros_and_reports_overrun() {
    let buf = [0xFF, 0xFF];
    let mut pump = BitPumpMSB32::new(&buf);
    // The two bytes land in the low half of the first word
    assert_eq!(pump.get_bits(16), 0);
    assert_eq!(pump.get_bits(16), 0xFFFF);
    assert!(!pump.is_past_end());
    assert_eq!(pump.get_bits(16), 0);
    assert!(pump.is_past_end());
  }

  #[test]
  fn zero_width_reads_consume_nothing() {
    let buf = [0u8; 4];
    let mut pump = BitPumpMSB32::new(&buf);
    assert_eq!(pump.get_bits(0), 0);
    assert_eq!(pump.consumed_bits(), 0);
  }
}
