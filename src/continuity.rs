//! Per-PID continuity counter tracking

use std::collections::HashMap;

use crate::constants::CC_MASK;

/// Outcome of checking one packet's continuity counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityStatus {
    /// First payload packet seen for this PID since tracking (re)started
    Initial,
    /// Counter matched expectation
    Ok,
    /// Same counter as the previous payload packet
    Duplicate,
    /// Gap in the sequence
    Discontinuity { expected: u8, actual: u8 },
    /// Stream flagged the break via `discontinuity_indicator`
    Signalled,
    /// Packet carries no payload; counter is neither checked nor advanced
    NoPayload,
}

impl ContinuityStatus {
    /// Whether a partially reassembled section on this PID must be discarded.
    pub fn breaks_section(self) -> bool {
        matches!(
            self,
            Self::Duplicate | Self::Discontinuity { .. } | Self::Signalled
        )
    }
}

/// Next expected counter per PID. A PID absent from the map is "unknown".
#[derive(Debug, Default)]
pub struct ContinuityTracker {
    expected: HashMap<u16, u8>,
}

impl ContinuityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `cc` to the expectation for `pid` and resynchronizes to
    /// `cc + 1` whatever the outcome.
    pub fn check(
        &mut self,
        pid: u16,
        cc: u8,
        has_payload: bool,
        discontinuity_indicator: bool,
    ) -> ContinuityStatus {
        if !has_payload {
            return ContinuityStatus::NoPayload;
        }

        let cc = cc & CC_MASK;
        match self.expected.insert(pid, (cc + 1) & CC_MASK) {
            None => ContinuityStatus::Initial,
            Some(_) if discontinuity_indicator => ContinuityStatus::Signalled,
            Some(expected) if expected == cc => ContinuityStatus::Ok,
            Some(expected) if (expected.wrapping_sub(1) & CC_MASK) == cc => {
                ContinuityStatus::Duplicate
            }
            Some(expected) => ContinuityStatus::Discontinuity {
                expected,
                actual: cc,
            },
        }
    }

    #[cfg(test)]
    pub fn expected(&self, pid: u16) -> Option<u8> {
        self.expected.get(&pid).copied()
    }

    pub fn forget(&mut self, pid: u16) {
        self.expected.remove(&pid);
    }

    pub fn clear(&mut self) {
        self.expected.clear();
    }
}
