//! Leadboard - a lead pipeline board on top of a paged kanban collection
//!
//! This library provides:
//! - The board core: segment store, per-segment pager, scroll anchoring,
//!   optimistic mutations, gated transitions and search debouncing
//! - Data models for segments, entities, move intents and leads
//! - A SQLite reference backend (migrations, lead repository, board remote)
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use leadboard::board::{Board, BoardConfig};
//! use leadboard::db::DbConnection;
//! use leadboard::repo::SqliteRemote;
//!
//! let conn = DbConnection::connect().unwrap();
//! let mut board = Board::new(BoardConfig::default(), SqliteRemote::new(&conn));
//! let report = board.load_all();
//! assert!(report.is_complete());
//! ```

pub mod board;
pub mod config;
pub mod db;
pub mod models;
pub mod repo;
pub mod cli;
