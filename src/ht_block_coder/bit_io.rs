//! Bit-level readers and writers for the HT segments.
//!
//! MagSgn and SPP grow forward and are read LSB first; a byte following
//! 0xFF carries only 7 bits. VLC and MRP grow backward from the end of their
//! segment, also LSB first, and a byte following one above 0x8F drops its
//! top bit when its low seven bits are all set.

use crate::constants::{BACKWARD_STUFF_THRESHOLD, FORWARD_STUFF_BYTE};
use crate::error::HtError;

#[inline]
pub(crate) fn low_bits(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// Forward reader with 0xFF unstuffing and a fixed fill byte past the end.
pub struct ForwardReader<'a> {
    data: &'a [u8],
    pos: usize,
    tmp: u64,
    bits: u32,
    unstuff: bool,
    fill: u8,
}

impl<'a> ForwardReader<'a> {
    pub fn new(data: &'a [u8], fill: u8) -> Self {
        let mut reader = Self {
            data,
            pos: 0,
            tmp: 0,
            bits: 0,
            unstuff: false,
            fill,
        };
        reader.fill_register();
        reader
    }

    fn read_byte(&mut self) {
        let byte = match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                b
            }
            None => self.fill,
        };
        let (val, width) = if self.unstuff { (byte & 0x7F, 7) } else { (byte, 8) };
        self.tmp |= (val as u64) << self.bits;
        self.bits += width;
        self.unstuff = byte == FORWARD_STUFF_BYTE;
    }

    fn fill_register(&mut self) {
        while self.bits <= 56 {
            self.read_byte();
        }
    }

    /// Returns at least 57 valid bits, the next stream bit in bit 0.
    #[inline]
    pub fn fetch(&mut self) -> u64 {
        self.fill_register();
        self.tmp
    }

    /// Drops `n` bits; `n` may not exceed what the last `fetch` returned.
    #[inline]
    pub fn advance(&mut self, n: u32) {
        debug_assert!(n <= self.bits);
        let n = n.min(self.bits);
        self.tmp = if n >= 64 { 0 } else { self.tmp >> n };
        self.bits -= n;
    }

    /// Reads `n <= 64` bits, the first stream bit ending up in bit 0.
    pub fn take(&mut self, n: u32) -> u64 {
        match n {
            0 => 0,
            1..=56 => {
                let value = self.fetch() & low_bits(n);
                self.advance(n);
                value
            }
            _ => {
                let low = self.take(32);
                let high = self.take(n.min(64) - 32);
                low | (high << 32)
            }
        }
    }
}

/// Backward reader used for VLC and MRP.
pub struct BackwardReader<'a> {
    data: &'a [u8],
    /// Index one past the next byte to read.
    pos: usize,
    remaining: usize,
    tmp: u64,
    bits: u32,
    unstuff: bool,
}

impl<'a> BackwardReader<'a> {
    /// VLC reader over a cleanup segment of `lcup` bytes whose MEL+VLC
    /// region is `scup` bytes long. The caller has checked `2 <= scup <= lcup`.
    pub fn for_vlc(data: &'a [u8], lcup: usize, scup: usize) -> Self {
        let head = data.get(lcup.wrapping_sub(2)).copied().unwrap_or(0);
        // the low nibble belongs to the interface locator
        let mut val = head >> 4;
        let bits = if val & 0x7 == 0x7 {
            val &= 0x7;
            3
        } else {
            4
        };
        let pos = lcup.saturating_sub(2).min(data.len());
        let mut reader = Self {
            data,
            pos,
            remaining: scup.saturating_sub(2).min(pos),
            tmp: val as u64,
            bits,
            unstuff: head > BACKWARD_STUFF_THRESHOLD,
        };
        reader.fill_register();
        reader
    }

    /// MRP reader over the last `len` bytes of `data`.
    pub fn for_mrp(data: &'a [u8], len: usize) -> Self {
        let len = len.min(data.len());
        let mut reader = Self {
            data,
            pos: data.len(),
            remaining: len,
            tmp: 0,
            bits: 0,
            unstuff: true,
        };
        reader.fill_register();
        reader
    }

    fn read_byte(&mut self) {
        let byte = if self.remaining > 0 {
            self.remaining -= 1;
            self.pos -= 1;
            self.data[self.pos]
        } else {
            0
        };
        let stuffed = self.unstuff && byte & 0x7F == 0x7F;
        let (val, width) = if stuffed { (byte & 0x7F, 7) } else { (byte, 8) };
        self.tmp |= (val as u64) << self.bits;
        self.bits += width;
        self.unstuff = byte > BACKWARD_STUFF_THRESHOLD;
    }

    fn fill_register(&mut self) {
        while self.bits <= 56 {
            self.read_byte();
        }
    }

    #[inline]
    pub fn fetch(&mut self) -> u64 {
        self.fill_register();
        self.tmp
    }

    #[inline]
    pub fn advance(&mut self, n: u32) {
        debug_assert!(n <= self.bits);
        let n = n.min(self.bits);
        self.tmp = if n >= 64 { 0 } else { self.tmp >> n };
        self.bits -= n;
    }
}

/// Forward writer for MagSgn and SPP.
pub struct ForwardWriter {
    buf: Vec<u8>,
    capacity: usize,
    tmp: u64,
    used: u32,
    max_bits: u32,
}

impl ForwardWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            tmp: 0,
            used: 0,
            max_bits: 8,
        }
    }

    /// Appends the `len` low bits of `cwd`, least significant first.
    pub fn write(&mut self, mut cwd: u64, mut len: u32) -> Result<(), HtError> {
        while len > 0 {
            let t = (self.max_bits - self.used).min(len);
            self.tmp |= (cwd & low_bits(t)) << self.used;
            self.used += t;
            cwd = if t >= 64 { 0 } else { cwd >> t };
            len -= t;
            if self.used >= self.max_bits {
                self.push(self.tmp as u8)?;
                self.max_bits = if self.tmp == FORWARD_STUFF_BYTE as u64 { 7 } else { 8 };
                self.tmp = 0;
                self.used = 0;
            }
        }
        Ok(())
    }

    fn push(&mut self, byte: u8) -> Result<(), HtError> {
        if self.buf.len() >= self.capacity {
            return Err(HtError::BufferFull);
        }
        self.buf.push(byte);
        Ok(())
    }

    /// MagSgn termination: pad with ones, and never end on 0xFF.
    pub fn finish_mag_sgn(mut self) -> Result<Vec<u8>, HtError> {
        if self.used > 0 {
            let pad = self.max_bits - self.used;
            self.tmp |= low_bits(pad) << self.used;
            if self.tmp != FORWARD_STUFF_BYTE as u64 {
                self.push(self.tmp as u8)?;
            }
        } else if self.max_bits == 7 {
            // a trailing 0xFF carries nothing the fill byte would not supply
            self.buf.pop();
        }
        Ok(self.buf)
    }

    /// SPP termination: pad with zeros and keep a stuffing byte after 0xFF.
    pub fn finish_sig_prop(mut self) -> Result<Vec<u8>, HtError> {
        if self.used > 0 {
            self.push(self.tmp as u8)?;
        }
        if self.buf.last() == Some(&FORWARD_STUFF_BYTE) {
            self.push(0)?;
        }
        Ok(self.buf)
    }
}

/// Backward writer for VLC and MRP; bytes are kept in emission order and
/// reversed when the segment is laid out.
pub struct BackwardWriter {
    buf: Vec<u8>,
    capacity: usize,
    tmp: u8,
    used: u32,
    last_gt: bool,
}

impl BackwardWriter {
    /// The first emitted byte is a placeholder for the interface locator and
    /// the low nibble of the second belongs to it as well.
    pub fn for_vlc(capacity: usize) -> Self {
        Self {
            buf: vec![0xFF],
            capacity,
            tmp: 0xF,
            used: 4,
            last_gt: true,
        }
    }

    pub fn for_mrp(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            tmp: 0,
            used: 0,
            last_gt: true,
        }
    }

    pub fn write(&mut self, mut cwd: u32, mut len: u32) -> Result<(), HtError> {
        while len > 0 {
            let mut avail = 8 - self.last_gt as u32 - self.used;
            let t = avail.min(len);
            self.tmp |= ((cwd as u64 & low_bits(t)) << self.used) as u8;
            self.used += t;
            avail -= t;
            len -= t;
            cwd = if t >= 32 { 0 } else { cwd >> t };
            if avail == 0 {
                if self.last_gt && self.tmp != 0x7F {
                    self.last_gt = false;
                    continue;
                }
                self.push(self.tmp)?;
                self.last_gt = self.tmp > BACKWARD_STUFF_THRESHOLD;
                self.tmp = 0;
                self.used = 0;
            }
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, byte: u8) -> Result<(), HtError> {
        if self.buf.len() >= self.capacity {
            return Err(HtError::BufferFull);
        }
        self.buf.push(byte);
        Ok(())
    }

    /// Partially filled byte and the number of bits in it.
    pub(crate) fn pending(&self) -> (u8, u32) {
        (self.tmp, self.used)
    }

    pub(crate) fn emitted(&self) -> usize {
        self.buf.len()
    }

    /// Bytes in emission order, without the pending partial byte.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn finish(mut self) -> Result<Vec<u8>, HtError> {
        if self.used > 0 {
            let tmp = self.tmp;
            self.push(tmp)?;
        }
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reader_unstuffs() {
        // 0xFF then a byte whose top bit is a stuffing zero
        let data = [0xFF, 0x01, 0xAA];
        let mut reader = ForwardReader::new(&data, 0);
        assert_eq!(reader.take(8), 0xFF);
        assert_eq!(reader.take(7), 0x01);
        assert_eq!(reader.take(8), 0xAA);
        assert_eq!(reader.take(8), 0);
    }

    #[test]
    fn test_forward_reader_fill() {
        let mut reader = ForwardReader::new(&[], 0xFF);
        assert_eq!(reader.take(8), 0xFF);
        // after a fill 0xFF the next fill byte is unstuffed to seven bits
        assert_eq!(reader.take(7), 0x7F);
    }

    #[test]
    fn test_forward_take_wide() {
        let data: Vec<u8> = (1..=9).collect();
        let mut reader = ForwardReader::new(&data, 0);
        let value = reader.take(64);
        assert_eq!(value, u64::from_le_bytes([1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(reader.take(8), 9);
    }

    #[test]
    fn test_forward_writer_round_trip() {
        let mut writer = ForwardWriter::new(64);
        let fields: [(u64, u32); 6] = [(0x7F, 7), (0x1, 1), (0xFF, 8), (0x3, 2), (0xDEAD_BEEF_1234, 48), (0, 3)];
        for &(value, len) in &fields {
            writer.write(value, len).unwrap();
        }
        let bytes = writer.finish_mag_sgn().unwrap();
        for pair in bytes.windows(2) {
            if pair[0] == 0xFF {
                assert!(pair[1] < 0x80);
            }
        }
        let mut reader = ForwardReader::new(&bytes, 0xFF);
        for &(value, len) in &fields {
            assert_eq!(reader.take(len), value);
        }
    }

    #[test]
    fn test_mag_sgn_never_ends_with_ff() {
        let mut writer = ForwardWriter::new(8);
        writer.write(0xFF, 8).unwrap();
        assert!(writer.finish_mag_sgn().unwrap().is_empty());

        let mut writer = ForwardWriter::new(8);
        writer.write(0x7F, 7).unwrap();
        assert!(writer.finish_mag_sgn().unwrap().is_empty());
    }

    #[test]
    fn test_sig_prop_termination() {
        let mut writer = ForwardWriter::new(8);
        writer.write(0xFF, 8).unwrap();
        assert_eq!(writer.finish_sig_prop().unwrap(), vec![0xFF, 0x00]);
    }

    #[test]
    fn test_forward_writer_capacity() {
        let mut writer = ForwardWriter::new(1);
        writer.write(0x12, 8).unwrap();
        assert_eq!(writer.write(0x34, 8), Err(HtError::BufferFull));
    }

    #[test]
    fn test_backward_mrp_round_trip() {
        let mut writer = BackwardWriter::for_mrp(64);
        let fields: [(u32, u32); 6] = [(0x7F, 7), (1, 1), (0xFF, 8), (0x7F, 7), (0x5, 3), (0x3FF, 10)];
        for &(value, len) in &fields {
            writer.write(value, len).unwrap();
        }
        let mut bytes = writer.finish().unwrap();
        bytes.reverse();
        for pair in bytes.windows(2) {
            if pair[1] > 0x8F {
                assert_ne!(pair[0], 0xFF);
            }
        }
        let mut reader = BackwardReader::for_mrp(&bytes, bytes.len());
        for &(value, len) in &fields {
            assert_eq!(reader.fetch() & low_bits(len), value as u64);
            reader.advance(len);
        }
    }

    struct XorShift(u32);

    impl XorShift {
        fn next(&mut self) -> u32 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 17;
            self.0 ^= self.0 << 5;
            self.0
        }

        /// Byte biased towards the values that trigger stuffing.
        fn byte(&mut self) -> u8 {
            let r = self.next();
            match r % 5 {
                0 => 0xFF,
                1 => 0x7F,
                2 => 0x90 | (r >> 8) as u8,
                _ => (r >> 8) as u8,
            }
        }
    }

    #[test]
    fn test_forward_restuffing_is_identity() {
        let mut rng = XorShift(0x2468_ACE1);
        for round in 0..50 {
            let mut data: Vec<u8> = Vec::new();
            let mut payload = 0;
            for _ in 0..(1 + round * 3) {
                let mut b = rng.byte();
                if data.last() == Some(&0xFF) {
                    b &= 0x7F;
                    payload += 7;
                } else {
                    payload += 8;
                }
                data.push(b);
            }
            if data.last() == Some(&0xFF) {
                data.push(0x12);
                payload += 7;
            }

            let mut reader = ForwardReader::new(&data, 0);
            let mut writer = ForwardWriter::new(data.len());
            let mut left = payload;
            while left > 0 {
                let n = (1 + rng.next() % 24).min(left);
                writer.write(reader.take(n), n).unwrap();
                left -= n;
            }
            assert_eq!(writer.finish_sig_prop().unwrap(), data, "round {}", round);
        }
    }

    #[test]
    fn test_backward_restuffing_is_identity() {
        let mut rng = XorShift(0x1357_9BDF);
        for round in 0..50 {
            // built in reading order, from the segment end towards its start
            let mut read_order: Vec<u8> = Vec::new();
            let mut payload = 0;
            let mut last_gt = true;
            for _ in 0..(1 + round * 3) {
                let mut b = rng.byte();
                if last_gt && b & 0x7F == 0x7F {
                    b = 0x7F;
                    payload += 7;
                } else {
                    payload += 8;
                }
                last_gt = b > BACKWARD_STUFF_THRESHOLD;
                read_order.push(b);
            }
            let mut data = read_order.clone();
            data.reverse();

            let mut reader = BackwardReader::for_mrp(&data, data.len());
            let mut writer = BackwardWriter::for_mrp(data.len());
            let mut left = payload;
            while left > 0 {
                let n = (1 + rng.next() % 24).min(left);
                writer.write((reader.fetch() & low_bits(n)) as u32, n).unwrap();
                reader.advance(n);
                left -= n;
            }
            assert_eq!(writer.finish().unwrap(), read_order, "round {}", round);
        }
    }

    #[test]
    fn test_backward_vlc_round_trip() {
        let mut writer = BackwardWriter::for_vlc(64);
        let fields: [(u32, u32); 5] = [(0x7, 3), (0x1, 1), (0x55, 7), (0x7F, 7), (0x2, 2)];
        for &(value, len) in &fields {
            writer.write(value, len).unwrap();
        }
        let mut bytes = writer.finish().unwrap();
        bytes.reverse();
        let lcup = bytes.len();
        let mut reader = BackwardReader::for_vlc(&bytes, lcup, lcup);
        for &(value, len) in &fields {
            assert_eq!(reader.fetch() & low_bits(len), value as u64);
            reader.advance(len);
        }
    }
}
