//! rosterkit: synchronized hash and order indexes over tracked player records.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod cache;
pub mod config;
pub mod ds;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod order;
pub mod prelude;
pub mod search;
pub mod service;
pub mod traits;
