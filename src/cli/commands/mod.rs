//! Command implementations

pub mod config;
pub mod job;
pub mod snapshot;
pub mod vm;
