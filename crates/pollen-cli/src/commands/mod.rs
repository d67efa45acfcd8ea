// crates/pollen-cli/src/commands/mod.rs
//
// Command module declarations for the Pollen CLI.

pub mod config;
pub mod schedule;
pub mod simulate;
