//! CLI command implementations.

pub mod common;
pub mod date;
pub mod info;
pub mod list;
pub mod warm;
