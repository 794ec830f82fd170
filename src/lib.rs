//! modpilot - natural-language moderation commands turned into executable plans

pub mod actions;
pub mod approval;
pub mod command;
pub mod core;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod workflow;

pub use pipeline::{Outcome, Pipeline, PipelineReport};
