//! Local storage: connection management and the versioned schema.
//!
//! The schema holds one table per entity kind plus the mutation queue.
//! Upgrades are additive only; new columns come with defaults that backfill
//! existing rows.

pub mod db;
pub mod migrations;

pub use db::LocalStorage;
