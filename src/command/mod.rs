//! Command resolution and execution boundary
//!
//! Turns raw plan steps into executable calls:
//! Step.action -> ActionResolver -> ResolvedAction -> ActionExecutor

pub mod alias;
pub mod dynamic;
pub mod executor;
pub mod fuzzy;
pub mod resolver;

pub use dynamic::{CompositePattern, DynamicResolution, Operation};
pub use executor::{ActionExecutor, DryRunExecutor, ExecutionContext, ExecutionOutcome};
pub use resolver::{ActionResolver, ContextualResolution, ResolutionSource, ResolvedAction};
