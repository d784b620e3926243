//! Pure domain logic for the batchpix image-processing service.
//!
//! Everything in this crate is side-effect free: batch intake
//! validation, result report rendering, and webhook payload signing.
//! No database, network, or filesystem access -- those live in the
//! `db`, `pipeline`, and `events` crates.

pub mod error;
pub mod intake;
pub mod report;
pub mod signing;
pub mod types;
