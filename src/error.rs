use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtError {
    #[error("More than 3 coding passes are not supported")]
    TooManyPasses = 1,
    #[error("Cleanup segment is shorter than 2 bytes")]
    CleanupTooShort = 2,
    #[error("Invalid interface locator word")]
    InvalidLocator = 3,
    #[error("Coded data is shorter than the declared segment lengths")]
    TruncatedSegment = 4,
    #[error("Decoded exponent exceeds the bitplane budget")]
    ExponentOutOfRange = 5,
    #[error("Sample word too narrow for the number of missing MSBs")]
    InsufficientPrecision = 6,
    #[error("Invalid code-block dimensions")]
    InvalidDimensions = 7,
    #[error("Destination too small")]
    DestinationTooSmall = 8,
    #[error("Encoder buffer is full")]
    BufferFull = 9,
    #[error("Invalid VLC code table")]
    InvalidCodeTable = 10,
    #[error("Parameter value not supported")]
    InvalidParameter = 11,
}

impl HtError {
    /// True for failures caused by a corrupted or malformed code-block.
    pub fn is_malformed_input(self) -> bool {
        matches!(
            self,
            HtError::TooManyPasses
                | HtError::CleanupTooShort
                | HtError::InvalidLocator
                | HtError::TruncatedSegment
                | HtError::ExponentOutOfRange
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_classification() {
        assert!(HtError::InvalidLocator.is_malformed_input());
        assert!(HtError::ExponentOutOfRange.is_malformed_input());
        assert!(!HtError::InsufficientPrecision.is_malformed_input());
        assert!(!HtError::BufferFull.is_malformed_input());
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(HtError::TooManyPasses as i32, 1);
        assert_eq!(HtError::InvalidParameter as i32, 11);
    }
}
