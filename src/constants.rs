//! Constants for MPEG-TS packet handling and PSI section reassembly

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_HEADER_SIZE: usize = 4;

/// Continuity counter is 4 bits wide
pub const CC_MASK: u8 = 0x0F;

/// Adaptation field control values
pub const AFC_PAYLOAD_ONLY: u8 = 0b01;
pub const AFC_ADAPTATION_ONLY: u8 = 0b10;
pub const AFC_ADAPTATION_AND_PAYLOAD: u8 = 0b11;

/// PSI section layout
pub const SECTION_HEADER_SIZE: usize = 3; // table_id + flags/section_length
pub const LONG_HEADER_SIZE: usize = 8; // + extension, version, section numbers
pub const CRC_SIZE: usize = 4;
/// Smallest section_length a syntax section may declare (5-byte extension + CRC)
pub const MIN_LONG_SECTION_LENGTH: u16 = 9;
/// Upper bound for private sections (AIT and other DVB/HbbTV tables)
pub const MAX_PRIVATE_SECTION_LENGTH: u16 = 4093;

/// Table ids
/// PAT, CAT, PMT and TSDT (0x00..=0x03) must use the long section form
pub const TABLE_ID_TSDT: u8 = 0x03;
pub const TABLE_ID_AIT: u8 = 0x74;
/// Reserved value: remaining bytes of the payload are stuffing
pub const TABLE_ID_STUFFING: u8 = 0xFF;

/// Report refresh default (seconds)
pub const DEFAULT_REFRESH_SECS: u64 = 2;
