//! CLI command implementations.

pub mod import;
pub mod serve;
pub mod train;
