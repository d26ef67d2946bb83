//! fieldnote - offline-first replica and sync engine
//!
//! This library keeps a full local replica of a user's notes, checklists and
//! kanban boards, records every local write in a durable mutation queue, and
//! reconciles both with a remote REST store in the background.
//!
//! # Modules
//!
//! * [`config`] - Application configuration management
//! * [`entities`] - SeaORM models, one table per synchronized kind
//! * [`kinds`] - Registry describing how each kind syncs
//! * [`replica`] - The local replica and its change notifications
//! * [`queue`] - The mutation queue
//! * [`remote`] - Remote API abstraction and its HTTP client
//! * [`sync`] - Push and pull engines, local write path and scheduler
//! * [`storage`] - Database connection and schema migrations

/// Configuration module for managing application settings
pub mod config;

/// Application constants and default values
pub mod constants;

/// SeaORM entity models for database tables
pub mod entities;

/// Entity-kind registry
pub mod kinds;

/// Logging setup and the in-memory log ring
pub mod logger;

/// Durable queue of local writes awaiting confirmation
pub mod queue;

/// Remote store abstraction
pub mod remote;

/// Local replica access
pub mod replica;

/// Repository layer for database operations
pub mod repositories;

/// Authenticated user session
pub mod session;

/// Local storage layer
pub mod storage;

/// Synchronization engine for keeping local and remote data in sync
pub mod sync;

/// Utility functions for timestamps and other helpers
pub mod utils;

// Re-export entity models for convenient access
pub use entities::{board, board_card, board_column, checklist, checklist_item, container, document, label};
pub use kinds::EntityKind;
pub use sync::{SyncOutcome, SyncService};
