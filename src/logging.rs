//! Once-per-condition warnings forwarded to the `log` crate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Conditions that put the decoder into a degraded but well-defined mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// More than one pass declared with an empty refinement segment.
    EmptyRefinementSegment,
    /// The cleanup bitplane is 1, so SPP and MRP have nowhere to go.
    RefinementBelowPrecision,
}

static EMPTY_REFINEMENT_REPORTED: AtomicBool = AtomicBool::new(false);
static REFINEMENT_PRECISION_REPORTED: AtomicBool = AtomicBool::new(false);

impl Degradation {
    fn flag(self) -> &'static AtomicBool {
        match self {
            Degradation::EmptyRefinementSegment => &EMPTY_REFINEMENT_REPORTED,
            Degradation::RefinementBelowPrecision => &REFINEMENT_PRECISION_REPORTED,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Degradation::EmptyRefinementSegment => {
                "malformed code-block: more than one coding pass but an empty refinement segment; decoding the cleanup pass only"
            }
            Degradation::RefinementBelowPrecision => {
                "not enough precision to decode the SigProp and MagRef passes; both are skipped"
            }
        }
    }

    /// Logs the warning the first time this condition is seen in the process.
    /// Returns true if this call emitted it.
    pub fn report(self) -> bool {
        let first = !self.flag().swap(true, Ordering::Relaxed);
        if first {
            log::warn!("{} (this message is shown once)", self.message());
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_only_once() {
        // The first call may already have happened in another test.
        Degradation::RefinementBelowPrecision.report();
        assert!(!Degradation::RefinementBelowPrecision.report());
        assert!(!Degradation::RefinementBelowPrecision.report());
    }
}
