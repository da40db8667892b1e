//! CLI subcommands.

pub mod batch;
pub mod doctor;
pub mod process;
