//! Execution backend lifecycle.
//!
//! A [`RuntimeClient`] is started before a pipeline runs and stopped after
//! it. While started it hands out [`RuntimeHandle`]s, which the pipeline uses
//! to spawn batch work on a bounded number of worker slots.

pub mod client;

pub use client::{RuntimeClient, RuntimeError, RuntimeHandle, RuntimeStats};
