//! Repository layer for database operations.
//!
//! Repositories encapsulate queries behind static methods that work on any
//! `ConnectionTrait`, so the same call runs against the shared connection or
//! inside a transaction.

pub mod mutation;
pub mod record;

pub use mutation::{MutationRepository, NewMutation};
pub use record::RecordRepository;
