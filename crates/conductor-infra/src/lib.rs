//! Infrastructure layer for Conductor.
//!
//! Contains implementations of the ports defined in `conductor-core`:
//! the filesystem snapshot store and the TOML configuration loader.

pub mod config;
pub mod state;
