pub mod catalog;

pub use catalog::{Capability, CapabilityCategory};
