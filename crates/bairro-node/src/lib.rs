//! Bairro node - a single-process governance chain.
//!
//! Loads configuration, persists the chain between invocations and
//! exposes every governance operation as a subcommand.

pub mod commands;
pub mod config;
pub mod store;
pub mod telemetry;
