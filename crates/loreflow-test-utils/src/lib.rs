//! Testing utilities for Loreflow.
//!
//! This crate provides standardized testing utilities for the Loreflow
//! engine: an in-process fake world, a message-recording messenger, builders
//! for step trees and triggers, and logging setup helpers.

pub mod builders;
pub mod mocks;
pub mod util;

pub use builders::{StepTreeBuilder, TriggerBuilder};
pub use mocks::{MockWorld, RecordingMessenger};
pub use util::init_test_logging;
