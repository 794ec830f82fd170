//! Plan generation
//!
//! Natural-language request -> model (or rule-based fallback) -> repaired
//! JSON -> [`Plan`](crate::plan::Plan).

pub mod client;
pub mod fallback;
pub mod generator;
pub mod parser;
pub mod prompt;
pub mod repair;

pub use client::{CompletionBackend, LlmClient};
pub use generator::{GenerationRequest, GenerationResult, GenerationSource, ResponseGenerator};
pub use parser::parse_plan;
pub use repair::repair_json;
