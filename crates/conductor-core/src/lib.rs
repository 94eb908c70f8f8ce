//! Workflow engine and state management for Conductor.
//!
//! This crate defines the `SnapshotStore` port that the infrastructure layer
//! implements. It depends only on `conductor-types`, never on
//! `conductor-infra` or any filesystem code.

pub mod state;
pub mod workflow;
