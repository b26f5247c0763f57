//! Normalized streaming: events, state machine, backpressure, cancellation

mod controller;
mod types;

pub use controller::StreamController;
pub use types::{StreamConfig, StreamEvent, StreamState};
