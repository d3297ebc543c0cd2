//! CLI command handlers

pub mod config;
pub mod listen;
pub mod select;
pub mod status;
