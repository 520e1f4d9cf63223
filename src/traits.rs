use std::fmt::Debug;

/// A sign-magnitude code-block sample word.
///
/// The most significant bit carries the sign and the remaining bits the
/// magnitude, left aligned so that the first coded bitplane sits right below
/// the sign bit when `missing_msbs` is zero. The block coder works on `u64`
/// internally, so an implementation only needs lossless conversions.
pub trait HtSample: Copy + Clone + Debug + Default + PartialEq + Eq + Send + Sync + 'static {
    const BITS: u32;

    fn to_u64(self) -> u64;
    fn from_u64(val: u64) -> Self;

    fn sign_mask() -> u64 {
        1u64 << (Self::BITS - 1)
    }

    fn magnitude_mask() -> u64 {
        Self::sign_mask() - 1
    }

    fn is_negative(self) -> bool {
        self.to_u64() & Self::sign_mask() != 0
    }

    fn magnitude(self) -> u64 {
        self.to_u64() & Self::magnitude_mask()
    }

    /// Least significant bitplane coded by the cleanup pass, or `None` when
    /// the word cannot hold the bin centre below it.
    fn cleanup_bitplane(missing_msbs: u32) -> Option<u32> {
        (Self::BITS - 2)
            .checked_sub(missing_msbs)
            .filter(|&p| p >= 1)
    }

    /// Places an integer coefficient with `k_max` magnitude bits so that a
    /// block coded with `missing_msbs = k_max - 1` carries it losslessly.
    fn from_coefficient(value: i64, k_max: u32) -> Self {
        debug_assert!(k_max >= 1 && k_max <= Self::BITS - 2);
        let shift = (Self::BITS - 1).saturating_sub(k_max);
        let magnitude = value.unsigned_abs().checked_shl(shift).unwrap_or(0) & Self::magnitude_mask();
        let sign = if value < 0 && magnitude != 0 { Self::sign_mask() } else { 0 };
        Self::from_u64(sign | magnitude)
    }

    /// Inverse of [`HtSample::from_coefficient`]; bits below the coded
    /// bitplane (bin centres) are dropped.
    fn to_coefficient(self, k_max: u32) -> i64 {
        let shift = (Self::BITS - 1).saturating_sub(k_max);
        let magnitude = (self.magnitude() >> shift) as i64;
        if self.is_negative() { -magnitude } else { magnitude }
    }
}

impl HtSample for u32 {
    const BITS: u32 = 32;
    fn to_u64(self) -> u64 {
        self as u64
    }
    fn from_u64(val: u64) -> Self {
        val as u32
    }
}

impl HtSample for u64 {
    const BITS: u32 = 64;
    fn to_u64(self) -> u64 {
        self
    }
    fn from_u64(val: u64) -> Self {
        val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_bitplane_limits() {
        assert_eq!(u32::cleanup_bitplane(0), Some(30));
        assert_eq!(u32::cleanup_bitplane(29), Some(1));
        assert_eq!(u32::cleanup_bitplane(30), None);
        assert_eq!(u32::cleanup_bitplane(31), None);
        assert_eq!(u64::cleanup_bitplane(0), Some(62));
        assert_eq!(u64::cleanup_bitplane(61), Some(1));
        assert_eq!(u64::cleanup_bitplane(62), None);
    }

    #[test]
    fn test_coefficient_placement() {
        let s = u32::from_coefficient(-5, 3);
        assert!(s.is_negative());
        assert_eq!(s.magnitude(), 5 << 28);
        assert_eq!(s.to_coefficient(3), -5);

        let w = u64::from_coefficient(1 << 40, 41);
        assert_eq!(w.magnitude(), 1 << 62);
        assert_eq!(w.to_coefficient(41), 1 << 40);
    }

    #[test]
    fn test_negative_zero_is_zero() {
        assert_eq!(u32::from_coefficient(0, 8), 0);
        // a bin centre below the coded plane does not change the integer
        let centre = u32::from_coefficient(7, 4) | (1 << 26);
        assert_eq!(centre.to_coefficient(4), 7);
    }
}
