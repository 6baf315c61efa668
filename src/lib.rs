// src/lib.rs
pub mod inspector {
    pub use crate::types::{InputSource, Options};

    /// Async entry-point; returns on Ctrl-C, end of file input or socket error
    pub async fn run(opts: Options) -> anyhow::Result<()> {
        crate::core::run(opts).await
    }
}

pub mod config;
pub mod constants;
pub mod continuity;
pub mod error;
pub mod packet;
pub mod psi;
pub mod reassembler;
pub mod registry;
pub mod stats;

mod core;
mod network;
mod report;
mod types;

pub use config::ReassemblerConfig;
pub use error::DropReason;
pub use reassembler::PsiReassembler;
pub use registry::{ConsumerHandle, SectionConsumer};
pub use stats::{DropCounters, ReassemblyStats};
