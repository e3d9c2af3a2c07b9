//! SwingSense engine host: the analysis pipeline, error monitor, per-user
//! store, and the actor runtime that feeds them from the bus.

pub mod actors;
pub mod bus;
pub mod engine;
pub mod monitor;
pub mod state;
pub mod store;

#[cfg(test)]
mod testutil;
