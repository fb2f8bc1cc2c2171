//! Configuration management
//!
//! This module handles the settings for reaching a device and the budgets
//! that bound every block transfer.

pub mod settings;

pub use settings::{Config, Settings, GLOBAL_CONFIG};
