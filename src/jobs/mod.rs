//! Jobs module: catalog, memberships, reward evaluation and the plugin that
//! exposes them to the host.
pub mod catalog;
pub mod commands;
pub mod context;
pub mod errors;
pub mod evaluator;
pub mod events;
pub mod leveling;
pub mod membership;
pub mod messages;
pub mod plugin;
pub mod settings;
pub mod signs;
pub mod systems;
pub mod telemetry;
pub mod types;

pub use context::{ActionOutcome, JobsContext};
pub use plugin::JobsPlugin;
