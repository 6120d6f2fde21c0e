//! Core request pipeline for AskData.
//!
//! This crate ties together schema introspection, query synthesis, execution,
//! interpretation and chart selection into one workflow ([`pipeline::answer_question`]),
//! driven by a shared [`context::AppContext`].

pub mod context;
pub mod interpreter;
pub mod pipeline;
pub mod synthesizer;
pub mod visualization;

#[cfg(test)]
mod testing;

pub use context::{AppContext, PipelineSettings};
pub use pipeline::{PipelineError, Stage, answer_question};
