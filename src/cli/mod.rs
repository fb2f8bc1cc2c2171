//! Command-line interface
//!
//! Argument parsing for the device commands and the offline chunk manifest.

pub mod commands;

pub use commands::{Command, HexArg, Opt};
