//! Reasons a packet or section is dropped on the reassembly path.
//!
//! None of these ever reach a `process_packet` caller. They are logged,
//! folded into [`DropCounters`](crate::stats::DropCounters) and forgotten.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("invalid packet size {0}, expected 188")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte 0x{0:02X}")]
    InvalidSyncByte(u8),

    #[error("header PID 0x{header:04X} does not match routing PID 0x{routed:04X}")]
    PidMismatch { routed: u16, header: u16 },

    #[error("transport error indicator set")]
    TransportError,

    #[error("scrambled payload (scrambling control {0})")]
    Scrambled(u8),

    #[error("adaptation field length {0} overruns the packet")]
    AdaptationFieldOverrun(usize),

    #[error("pointer field {0} points beyond the payload")]
    PointerOutOfRange(usize),

    #[error("continuity break: expected {expected}, got {actual}")]
    Discontinuity { expected: u8, actual: u8 },

    #[error("duplicate packet with continuity counter {0}")]
    DuplicatePacket(u8),

    #[error("continuation payload without a section in progress")]
    NotSynchronized,

    #[error("section length {0} out of range")]
    InvalidSectionLength(u16),

    #[error("CRC-32 mismatch on table 0x{0:02X}")]
    CrcMismatch(u8),

    #[error("table 0x{0:02X} sent without section syntax")]
    MissingSectionSyntax(u8),
}

impl DropReason {
    /// Continuity breaks are routine on lossy links and logged one level up.
    pub fn is_continuity_break(&self) -> bool {
        matches!(self, Self::Discontinuity { .. } | Self::DuplicatePacket(_))
    }
}
