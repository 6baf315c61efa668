//! Transport packet validation and header decoding

use bitstream_io::{BigEndian, BitRead, BitReader};

use crate::constants::*;
use crate::error::DropReason;

/// Decoded 4-byte transport packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub transport_error_indicator: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl TsHeader {
    /// Validates size and sync byte, then decodes the header fields.
    pub fn parse(chunk: &[u8]) -> Result<Self, DropReason> {
        if chunk.len() != TS_PACKET_SIZE {
            return Err(DropReason::InvalidPacketSize(chunk.len()));
        }
        if chunk[0] != TS_SYNC_BYTE {
            return Err(DropReason::InvalidSyncByte(chunk[0]));
        }

        let mut br = BitReader::endian(&chunk[1..TS_HEADER_SIZE], BigEndian);
        Self::read_fields(&mut br).map_err(|_| DropReason::InvalidPacketSize(chunk.len()))
    }

    fn read_fields<R: std::io::Read>(br: &mut BitReader<R, BigEndian>) -> std::io::Result<Self> {
        Ok(Self {
            transport_error_indicator: br.read_bit()?,
            payload_unit_start: br.read_bit()?,
            transport_priority: br.read_bit()?,
            pid: br.read::<13, u16>()?,
            scrambling_control: br.read::<2, u8>()?,
            adaptation_field_control: br.read::<2, u8>()?,
            continuity_counter: br.read::<4, u8>()?,
        })
    }

    /// `01` and `11` carry a payload; `10` and the reserved `00` do not.
    pub fn has_payload(&self) -> bool {
        matches!(
            self.adaptation_field_control,
            AFC_PAYLOAD_ONLY | AFC_ADAPTATION_AND_PAYLOAD
        )
    }

    pub fn has_adaptation_field(&self) -> bool {
        matches!(
            self.adaptation_field_control,
            AFC_ADAPTATION_ONLY | AFC_ADAPTATION_AND_PAYLOAD
        )
    }
}

/// A validated packet borrowed from the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct TsPacket<'a> {
    pub header: TsHeader,
    /// `discontinuity_indicator` from the adaptation field, if one is present
    pub discontinuity_indicator: bool,
    /// Payload bytes after the optional adaptation field
    pub payload: Option<&'a [u8]>,
}

impl<'a> TsPacket<'a> {
    pub fn parse(chunk: &'a [u8]) -> Result<Self, DropReason> {
        let header = TsHeader::parse(chunk)?;

        let mut offset = TS_HEADER_SIZE;
        let mut discontinuity_indicator = false;
        if header.has_adaptation_field() {
            let af_len = chunk[offset] as usize;
            offset += 1;
            if offset + af_len > TS_PACKET_SIZE {
                return Err(DropReason::AdaptationFieldOverrun(af_len));
            }
            if af_len > 0 {
                discontinuity_indicator = chunk[offset] & 0x80 != 0;
            }
            offset += af_len;
        }

        let payload = if header.has_payload() && offset < TS_PACKET_SIZE {
            Some(&chunk[offset..])
        } else {
            None
        };

        Ok(Self {
            header,
            discontinuity_indicator,
            payload,
        })
    }
}

/// Reads the embedded PID without validating the rest of the packet.
/// Used by stream sources to route packets before handing them over.
pub fn peek_pid(chunk: &[u8]) -> Option<u16> {
    if chunk.len() < TS_HEADER_SIZE {
        return None;
    }
    Some((((chunk[1] & 0x1F) as u16) << 8) | (chunk[2] as u16))
}
