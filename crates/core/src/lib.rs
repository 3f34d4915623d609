#![warn(clippy::all, missing_docs)]

//! Core domain logic for the shelfmark library tracker.
//!
//! This crate hosts the book/member/transaction models, the catalog and
//! lending ledger, configuration handling, and the persistence backends
//! used by the console frontend.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod storage;

pub use catalog::{
    BookFilter, BookListing, Catalog, CounterCorrection, DroppedLoan, Reconciliation,
};
pub use config::AppConfig;
pub use error::LibraryError;
pub use models::{Action, Book, BookId, Member, MemberId, Transaction};
pub use storage::{FlatFileStore, LoadReport, MemoryStore, Persistence};
