//! Reassembly statistics and drop counters

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::DropReason;

/// Snapshot of the reassembler, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReassemblyStats {
    /// PIDs currently holding reassembly state
    pub total_buffers: usize,
    /// Live (table id, consumer) registrations
    pub total_consumers: usize,
    pub active_pids: BTreeSet<u16>,
}

/// Running totals of what happened on the packet path.
///
/// Survives `clear_buffers`; only `reset_counters` zeroes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounters {
    pub packets_processed: u64,
    pub packets_dropped: u64,
    pub discontinuities: u64,
    pub crc_errors: u64,
    pub length_errors: u64,
    pub sections_emitted: u64,
    pub sections_unclaimed: u64,
}

impl DropCounters {
    pub fn record(&mut self, reason: &DropReason) {
        match reason {
            DropReason::Discontinuity { .. } | DropReason::DuplicatePacket(_) => {
                self.discontinuities += 1
            }
            DropReason::CrcMismatch(_) => self.crc_errors += 1,
            DropReason::InvalidSectionLength(_) | DropReason::MissingSectionSyntax(_) => {
                self.length_errors += 1
            }
            DropReason::InvalidPacketSize(_)
            | DropReason::InvalidSyncByte(_)
            | DropReason::PidMismatch { .. }
            | DropReason::TransportError
            | DropReason::Scrambled(_)
            | DropReason::AdaptationFieldOverrun(_)
            | DropReason::PointerOutOfRange(_)
            | DropReason::NotSynchronized => self.packets_dropped += 1,
        }
    }
}
