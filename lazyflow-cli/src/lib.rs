//! Command implementations behind the `lazyflow` binary.

pub mod commands;
pub mod config;
pub mod json;
pub mod logging;
