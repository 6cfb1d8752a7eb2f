//! Test infrastructure for the hostnet crates
//!
//! Provides:
//! - ARP table and local interface fixtures
//! - Scripted fakes for every external collaborator (command runner, ARP
//!   reader, interface enumerator, prober)
//! - Event replay helpers for checking diff output

pub mod fakes;
pub mod fixtures;
mod verification;

pub use fakes::*;
pub use fixtures::*;
pub use verification::*;
