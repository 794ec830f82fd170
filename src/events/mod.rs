//! Event dispatch substrate shared by every pipeline component

pub mod bus;
pub mod event;

pub use bus::{EventBus, HandlerResult, SubscribeOptions};
pub use event::{topics, Event};
