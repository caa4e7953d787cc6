//! Bit-addressed reads over a byte region.
//!
//! The cursor knows nothing about declarations: it reads integers of any width
//! between 1 and 64 bits, IEEE-754 floats and NUL-terminated strings at an
//! arbitrary bit position, and fails with [`Error::BufferOverrun`] when the
//! region is exhausted. A failed read never moves the cursor.

use crate::error::Error;
use crate::types::{ByteOrder, Encoding};

#[derive(Clone, Debug)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    position: u64,
    limit: u64,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            limit: data.len() as u64 * 8,
        }
    }

    /// Restrict reads to the first `limit_bits` bits of the region.
    pub fn with_limit(mut self, limit_bits: u64) -> Self {
        self.limit = limit_bits.min(self.data.len() as u64 * 8);
        self
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.position)
    }

    pub fn seek(&mut self, bit_offset: u64) -> Result<(), Error> {
        if bit_offset > self.limit {
            return Err(Error::BufferOverrun {
                position: self.position,
                requested: bit_offset - self.position.min(bit_offset),
                available: self.remaining(),
            });
        }
        self.position = bit_offset;
        Ok(())
    }

    /// Move forward to the next multiple of `alignment` bits.
    pub fn align(&mut self, alignment: u64) -> Result<(), Error> {
        if alignment <= 1 {
            return Ok(());
        }
        let misalignment = self.position % alignment;
        if misalignment == 0 {
            return Ok(());
        }
        let padding = alignment - misalignment;
        self.check(padding)?;
        self.position += padding;
        Ok(())
    }

    pub fn read_unsigned(&mut self, bits: u32, order: ByteOrder) -> Result<u64, Error> {
        if bits == 0 || bits > 64 {
            return Err(Error::malformed(format!(
                "cannot read an integer of {bits} bits"
            )));
        }
        self.check(u64::from(bits))?;

        let pos = self.position;
        let value = if pos % 8 == 0 && bits % 8 == 0 {
            let start = (pos / 8) as usize;
            let bytes = &self.data[start..start + (bits / 8) as usize];
            match order {
                ByteOrder::LittleEndian => bytes
                    .iter()
                    .rev()
                    .fold(0_u64, |acc, b| (acc << 8) | u64::from(*b)),
                ByteOrder::BigEndian => bytes
                    .iter()
                    .fold(0_u64, |acc, b| (acc << 8) | u64::from(*b)),
            }
        } else {
            let mut value = 0_u64;
            for i in 0..u64::from(bits) {
                let p = pos + i;
                let byte = self.data[(p / 8) as usize];
                match order {
                    ByteOrder::LittleEndian => {
                        let bit = (byte >> (p % 8)) & 1;
                        value |= u64::from(bit) << i;
                    }
                    ByteOrder::BigEndian => {
                        let bit = (byte >> (7 - (p % 8))) & 1;
                        value = (value << 1) | u64::from(bit);
                    }
                }
            }
            value
        };

        self.position += u64::from(bits);
        Ok(value)
    }

    pub fn read_signed(&mut self, bits: u32, order: ByteOrder) -> Result<i64, Error> {
        let raw = self.read_unsigned(bits, order)?;
        Ok(sign_extend(raw, bits))
    }

    /// `mantissa_bits` includes the implicit leading bit, so a binary32 float
    /// is `(8, 24)` and a binary64 float `(11, 53)`.
    pub fn read_float(
        &mut self,
        exponent_bits: u32,
        mantissa_bits: u32,
        order: ByteOrder,
    ) -> Result<f64, Error> {
        match exponent_bits + mantissa_bits {
            32 => {
                let raw = self.read_unsigned(32, order)?;
                Ok(f64::from(f32::from_bits(raw as u32)))
            }
            64 => {
                let raw = self.read_unsigned(64, order)?;
                Ok(f64::from_bits(raw))
            }
            total => Err(Error::malformed(format!(
                "cannot read a floating point value of {total} bits"
            ))),
        }
    }

    /// Read a NUL-terminated string starting at the next byte boundary. The
    /// terminator is consumed but not returned.
    pub fn read_string(&mut self, _encoding: Encoding) -> Result<String, Error> {
        let start_position = self.position;
        self.align(8)?;

        let start = (self.position / 8) as usize;
        let end = (self.limit / 8) as usize;
        let region = &self.data[start..end.max(start)];
        match region.iter().position(|b| *b == 0) {
            Some(len) => {
                let s = String::from_utf8_lossy(&region[..len]).into_owned();
                self.position += (len as u64 + 1) * 8;
                Ok(s)
            }
            None => {
                let available = self.limit.saturating_sub(self.position);
                self.position = start_position;
                Err(Error::BufferOverrun {
                    position: start_position,
                    requested: available + 8,
                    available,
                })
            }
        }
    }

    fn check(&self, bits: u64) -> Result<(), Error> {
        let available = self.remaining();
        if bits > available {
            Err(Error::BufferOverrun {
                position: self.position,
                requested: bits,
                available,
            })
        } else {
            Ok(())
        }
    }
}

pub(crate) fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        raw as i64
    } else {
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ByteOrder::*;

    #[test]
    fn little_endian_bit_fields() {
        let data = [0b1010_1100];
        let mut c = BitCursor::new(&data);
        assert_eq!(c.read_unsigned(3, LittleEndian).unwrap(), 0b100);
        assert_eq!(c.read_unsigned(5, LittleEndian).unwrap(), 0b10101);
        assert_eq!(c.position(), 8);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn big_endian_bit_fields() {
        let data = [0b1010_1100];
        let mut c = BitCursor::new(&data);
        assert_eq!(c.read_unsigned(3, BigEndian).unwrap(), 0b101);
        assert_eq!(c.read_unsigned(5, BigEndian).unwrap(), 0b01100);
    }

    #[test]
    fn byte_aligned_integers() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            BitCursor::new(&data).read_unsigned(32, LittleEndian).unwrap(),
            0x0403_0201
        );
        assert_eq!(
            BitCursor::new(&data).read_unsigned(32, BigEndian).unwrap(),
            0x0102_0304
        );
        assert_eq!(
            BitCursor::new(&[0xFF; 8]).read_unsigned(64, BigEndian).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn unaligned_little_endian_crosses_bytes() {
        let data = [0xFF, 0x01];
        let mut c = BitCursor::new(&data);
        c.read_unsigned(4, LittleEndian).unwrap();
        assert_eq!(c.read_unsigned(8, LittleEndian).unwrap(), 0x1F);
        assert_eq!(c.position(), 12);
    }

    #[test]
    fn signed_integers() {
        assert_eq!(
            BitCursor::new(&[0xFF]).read_signed(4, LittleEndian).unwrap(),
            -1
        );
        assert_eq!(
            BitCursor::new(&[0x80]).read_signed(8, LittleEndian).unwrap(),
            -128
        );
        assert_eq!(
            BitCursor::new(&[0x07]).read_signed(4, LittleEndian).unwrap(),
            7
        );
    }

    #[test]
    fn floats() {
        let single = 1.5_f32.to_le_bytes();
        assert_eq!(
            BitCursor::new(&single).read_float(8, 24, LittleEndian).unwrap(),
            1.5
        );
        let double = (-2.25_f64).to_be_bytes();
        assert_eq!(
            BitCursor::new(&double).read_float(11, 53, BigEndian).unwrap(),
            -2.25
        );
        assert!(BitCursor::new(&double).read_float(5, 11, BigEndian).is_err());
    }

    #[test]
    fn overrun_leaves_position() {
        let data = [0_u8; 2];
        let mut c = BitCursor::new(&data);
        c.read_unsigned(1, LittleEndian).unwrap();
        match c.read_unsigned(16, LittleEndian) {
            Err(Error::BufferOverrun {
                position,
                requested,
                available,
            }) => {
                assert_eq!(position, 1);
                assert_eq!(requested, 16);
                assert_eq!(available, 15);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn limit_restricts_reads() {
        let data = [0_u8; 4];
        let mut c = BitCursor::new(&data).with_limit(16);
        assert_eq!(c.limit(), 16);
        c.read_unsigned(16, LittleEndian).unwrap();
        assert!(c.read_unsigned(1, LittleEndian).is_err());
        assert!(c.seek(17).is_err());
        c.seek(0).unwrap();
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn strings() {
        let data = b"x\0hi\0rest";
        let mut c = BitCursor::new(data);
        c.read_unsigned(3, LittleEndian).unwrap();
        // aligns to the next byte before reading
        assert_eq!(c.read_string(Encoding::Utf8).unwrap(), "");
        assert_eq!(c.position(), 16);
        assert_eq!(c.read_string(Encoding::Utf8).unwrap(), "hi");
        assert_eq!(c.position(), 40);
        assert!(c.read_string(Encoding::Utf8).is_err());
        assert_eq!(c.position(), 40);
    }

    #[test]
    fn align() {
        let data = [0_u8; 4];
        let mut c = BitCursor::new(&data);
        c.seek(3).unwrap();
        c.align(1).unwrap();
        assert_eq!(c.position(), 3);
        c.align(8).unwrap();
        assert_eq!(c.position(), 8);
        c.align(8).unwrap();
        assert_eq!(c.position(), 8);
        c.seek(17).unwrap();
        assert!(c.align(64).is_err());
        assert_eq!(c.position(), 17);
    }
}
