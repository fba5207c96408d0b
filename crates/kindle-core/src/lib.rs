//! Core types shared across the Kindle crates.
//!
//! This crate provides:
//! - Window pixel dimensions
//! - The event bus used to broadcast window notifications (resize)

pub mod events;
pub mod types;

pub use events::{Event, EventBus, EventKind, ListenerId, Subscription};
pub use types::Dimensions;
