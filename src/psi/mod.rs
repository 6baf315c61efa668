pub mod ait;
pub mod buffer;
pub mod section;

pub use ait::{AitConsumer, AitOutcome, AitTable, HbbTvApp, parse_ait};
pub use buffer::{Extraction, PidBuffer};
pub use section::{LongHeader, Section, SectionHeader, crc32_mpeg2, verify_crc};
