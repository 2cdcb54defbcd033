#![deny(clippy::await_holding_refcell_ref)]

pub mod client;
pub mod common;
pub mod monitor;
pub mod slurm;
pub mod splitter;
pub mod submission;

pub type Error = crate::common::error::SbatchError;
pub type Result<T> = std::result::Result<T, Error>;

pub const SBATCH_COMMANDLIST_VERSION: &str = {
    match option_env!("SBATCH_COMMANDLIST_BUILD_VERSION") {
        Some(version) => version,
        None => const_format::concatcp!(env!("CARGO_PKG_VERSION"), "-dev"),
    }
};
