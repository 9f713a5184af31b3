//! CLI command implementations.

pub mod blocks;
pub mod translate;
