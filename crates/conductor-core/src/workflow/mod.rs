//! Workflow execution: step definitions, retries, validation and the engine.
//!
//! - `step` -- step definitions and the `StepAction` trait
//! - `retry` -- per-step retry policy
//! - `validation` -- pre-flight preconditions
//! - `engine` -- sequential executor with deadlines and cancellation

pub mod engine;
pub mod retry;
pub mod step;
pub mod validation;
