//! Shared domain models.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used when rendering and persisting transaction timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifier of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub u32);

/// Identifier of a registered member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u32);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog entry with copy-availability counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier, allocated by the catalog.
    pub id: BookId,
    /// Book title.
    pub title: String,
    /// Author credit.
    pub author: String,
    /// Number of copies owned by the library (at least one).
    pub total_copies: u32,
    /// Copies currently on the shelf.
    pub available_copies: u32,
}

impl Book {
    /// Whether at least one copy can be lent out.
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Number of copies currently out on loan.
    pub fn copies_on_loan(&self) -> u32 {
        self.total_copies.saturating_sub(self.available_copies)
    }
}

/// A registered library member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier in registration order.
    pub id: MemberId,
    /// Display name.
    pub name: String,
    /// Books currently held, in borrow order, without duplicates.
    pub borrowed_book_ids: Vec<BookId>,
}

impl Member {
    /// Whether the member currently holds the given book.
    pub fn holds(&self, book_id: BookId) -> bool {
        self.borrowed_book_ids.contains(&book_id)
    }
}

/// Kind of lending event recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A copy left the shelf.
    Borrow,
    /// A copy came back.
    Return,
}

impl Action {
    /// Past-tense verb used in audit lines.
    pub fn verb(self) -> &'static str {
        match self {
            Action::Borrow => "borrowed",
            Action::Return => "returned",
        }
    }

    /// Parse the past-tense verb back into an action.
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "borrowed" => Some(Action::Borrow),
            "returned" => Some(Action::Return),
            _ => None,
        }
    }
}

/// Immutable audit entry appended on every successful borrow or return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Member who borrowed or returned.
    pub member_id: MemberId,
    /// Member name at the time of the event.
    pub member_name: String,
    /// What happened.
    pub action: Action,
    /// Book involved.
    pub book_id: BookId,
    /// Book title at the time of the event.
    pub book_title: String,
    /// Local wall-clock time of the event.
    pub timestamp: NaiveDateTime,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ID: {}) {} '{}' at {}",
            self.member_name,
            self.member_id,
            self.action.verb(),
            self.book_title,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}
