//! Host adapter: classifies raw engine events and routes them to the jobs core.
pub mod chat;
pub mod classifier;
pub mod listeners;

pub use classifier::{classify, ActionEvent, RawHostEvent};
pub use listeners::{handle, HostResponse};
