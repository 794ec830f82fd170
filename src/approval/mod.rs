//! Human confirmation for plans that need it

pub mod gate;

pub use gate::{AckStatus, Acknowledgement, ApprovalGate, ApprovalOutcome, ApprovalSession, ApprovalState};
