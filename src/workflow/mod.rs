//! Plan execution and workflow bookkeeping

pub mod record;
pub mod runner;

pub use record::{StepResult, WorkflowRecord, WorkflowRegistry, WorkflowStatus, WorkflowSummary};
pub use runner::WorkflowRunner;
