//! Subcommand implementations
//!
//! Each returns its output instead of printing, so the binary decides
//! where it goes.

pub mod chapter;
pub mod codes;
pub mod figures;
