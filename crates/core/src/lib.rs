//! Core business logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence and external lookups are reached only through the traits
//! declared here.
//!
//! # Modules
//!
//! - `ledger` - Double-entry posting engine, account store seam, read model
//! - `conversion` - Foreign-currency (crypto) overlay on top of the ledger engine

pub mod conversion;
pub mod error;
pub mod ledger;

#[cfg(test)]
mod testing;
