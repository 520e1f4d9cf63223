/// Magnitude Exponent Logic (MEL) coding.
/// Adaptive run-length coding of the significance of quads in zero context,
/// with the 13-state machine of ISO/IEC 15444-15.
use crate::constants::{MEL_EXP, MEL_MAX_RUNS, MEL_MAX_STATE};
use crate::error::HtError;
use std::collections::VecDeque;

/// A decoded MEL codeword: `zeros` insignificant events, optionally
/// followed by one significant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelRun {
    pub zeros: u32,
    pub one: bool,
}

pub struct MelDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: usize,
    /// Left aligned: the next bit is bit 63.
    tmp: u64,
    bits: u32,
    unstuff: bool,
    k: usize,
    runs: VecDeque<MelRun>,
}

impl<'a> MelDecoder<'a> {
    /// Reads the `scup - 1` bytes starting at `lcup - scup`; the caller has
    /// checked `2 <= scup <= lcup <= data.len()`.
    pub fn new(data: &'a [u8], lcup: usize, scup: usize) -> Self {
        let start = lcup.saturating_sub(scup).min(data.len());
        Self {
            data,
            pos: start,
            remaining: scup.saturating_sub(1).min(data.len() - start),
            tmp: 0,
            bits: 0,
            unstuff: false,
            k: 0,
            runs: VecDeque::with_capacity(MEL_MAX_RUNS),
        }
    }

    fn read_byte(&mut self) {
        let byte = if self.remaining > 0 {
            let mut b = self.data[self.pos];
            self.pos += 1;
            self.remaining -= 1;
            if self.remaining == 0 {
                // the low nibble of the last byte holds the interface locator
                b |= 0xF;
            }
            b
        } else {
            0xFF
        };
        let (val, width) = if self.unstuff { (byte & 0x7F, 7) } else { (byte, 8) };
        self.tmp |= (val as u64) << (64 - self.bits - width);
        self.bits += width;
        self.unstuff = byte == 0xFF;
    }

    fn decode_runs(&mut self) {
        while self.bits <= 56 {
            self.read_byte();
        }
        while self.bits >= 6 && self.runs.len() < MEL_MAX_RUNS {
            let e = MEL_EXP[self.k];
            if self.tmp >> 63 == 1 {
                self.runs.push_back(MelRun { zeros: 1 << e, one: false });
                self.k = (self.k + 1).min(MEL_MAX_STATE);
                self.tmp <<= 1;
                self.bits -= 1;
            } else {
                let zeros = if e == 0 { 0 } else { ((self.tmp << 1) >> (64 - e)) as u32 };
                self.runs.push_back(MelRun { zeros, one: true });
                self.k = self.k.saturating_sub(1);
                self.tmp <<= e + 1;
                self.bits -= e + 1;
            }
        }
    }

    /// Next decoded run, refilling the run queue as needed.
    pub fn next_run(&mut self) -> MelRun {
        loop {
            if let Some(run) = self.runs.pop_front() {
                return run;
            }
            self.decode_runs();
        }
    }

    /// Next MEL event: true for a significant quad (or pair).
    pub fn next_event(&mut self) -> bool {
        loop {
            let front = match self.runs.front_mut() {
                Some(run) => run,
                None => {
                    self.decode_runs();
                    continue;
                }
            };
            if front.zeros > 0 {
                front.zeros -= 1;
                return false;
            }
            let one = front.one;
            self.runs.pop_front();
            if one {
                return true;
            }
        }
    }
}

pub struct MelEncoder {
    buf: Vec<u8>,
    capacity: usize,
    tmp: u8,
    remaining: u32,
    run: u32,
    k: usize,
    threshold: u32,
}

impl MelEncoder {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            tmp: 0,
            remaining: 8,
            run: 0,
            k: 0,
            threshold: 1,
        }
    }

    fn emit_bit(&mut self, bit: u32) -> Result<(), HtError> {
        self.tmp = (self.tmp << 1) | bit as u8;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.push(self.tmp)?;
            self.remaining = if self.tmp == 0xFF { 7 } else { 8 };
            self.tmp = 0;
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

    pub fn encode(&mut self, significant: bool) -> Result<(), HtError> {
        if !significant {
            self.run += 1;
            if self.run >= self.threshold {
                self.emit_bit(1)?;
                self.run = 0;
                self.k = (self.k + 1).min(MEL_MAX_STATE);
                self.threshold = 1 << MEL_EXP[self.k];
            }
        } else {
            self.emit_bit(0)?;
            let mut t = MEL_EXP[self.k];
            while t > 0 {
                t -= 1;
                self.emit_bit((self.run >> t) & 1)?;
            }
            self.run = 0;
            self.k = self.k.saturating_sub(1);
            self.threshold = 1 << MEL_EXP[self.k];
        }
        Ok(())
    }

    /// Closes an unfinished run and left aligns the partial byte. Returns the
    /// partial byte and the mask of its bits that carry MEL data.
    pub(crate) fn flush(&mut self) -> Result<(u8, u8), HtError> {
        if self.run > 0 {
            self.emit_bit(1)?;
            self.run = 0;
        }
        let tmp = ((self.tmp as u32) << self.remaining) as u8;
        let mask = ((0xFFu32 << self.remaining) & 0xFF) as u8;
        Ok((tmp, mask))
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[cfg(test)]
    fn state(&self) -> usize {
        self.k
    }
}
