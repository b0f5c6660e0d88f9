//! Interview report generation: claim, fetch, analyze, persist.

pub mod analyzer;
pub mod dispatcher;
pub mod handlers;
#[cfg(test)]
pub mod memory_store;
pub mod pipeline;
pub mod prompts;
pub mod state_machine;
pub mod store;
