//! Plan data model
//!
//! A plan is produced from a natural-language request (by the generation
//! backend or the fallback synthesizer) and consumed by the workflow runner:
//! WirePlan (JSON) -> Plan -> WorkflowRunner

pub mod model;
pub mod wire;

pub use model::{Plan, Step, Strategy, DEFAULT_TOOL};
pub use wire::{WireMeta, WirePlan, WireStep};
