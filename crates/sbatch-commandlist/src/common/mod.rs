pub mod arraydef;
pub mod arrayparser;
pub mod cli;
pub mod error;
pub mod format;
pub mod memory;
pub mod parser;
pub mod setup;
pub mod utils;
