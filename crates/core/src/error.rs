//! Error taxonomy for catalog, ledger and persistence operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{BookId, MemberId};

/// Domain failures surfaced to the operator.
///
/// None of these leave the catalog partially mutated: every check runs
/// before the first write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    /// No book carries the requested id.
    #[error("book {0} not found")]
    BookNotFound(BookId),
    /// No member carries the requested id.
    #[error("member {0} not found")]
    MemberNotFound(MemberId),
    /// Every copy of the book is out on loan.
    #[error("'{title}' (book {book_id}) is currently unavailable")]
    BookUnavailable {
        /// Requested book.
        book_id: BookId,
        /// Title, for the operator message.
        title: String,
    },
    /// The member already holds a copy of this book.
    #[error("member {member_id} already has book {book_id} on loan")]
    AlreadyBorrowed {
        /// Borrowing member.
        member_id: MemberId,
        /// Requested book.
        book_id: BookId,
    },
    /// The member tried to return a book they do not hold.
    #[error("member {member_id} has not borrowed book {book_id}")]
    NotBorrowedByMember {
        /// Returning member.
        member_id: MemberId,
        /// Book being returned.
        book_id: BookId,
    },
    /// A persisted line could not be decoded and was skipped.
    #[error("skipping malformed line {line_number} in {}: {reason} ({content:?})", .file.display())]
    MalformedLine {
        /// File the line came from.
        file: PathBuf,
        /// One-based line number.
        line_number: usize,
        /// Raw line content.
        content: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Operator input could not be interpreted.
    #[error("invalid {field}: {value:?}")]
    InvalidInput {
        /// Name of the prompted field.
        field: &'static str,
        /// Raw text that was entered.
        value: String,
    },
}

impl LibraryError {
    /// True for the unresolved-id family (book or member).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LibraryError::BookNotFound(_) | LibraryError::MemberNotFound(_)
        )
    }

    pub(crate) fn invalid_input(field: &'static str, value: impl Into<String>) -> Self {
        LibraryError::InvalidInput {
            field,
            value: value.into(),
        }
    }
}

/// Parse a positive integer typed by the operator.
pub fn parse_number(field: &'static str, raw: &str) -> Result<u32, LibraryError> {
    let trimmed = raw.trim();
    match trimmed.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(LibraryError::invalid_input(field, trimmed)),
    }
}

/// Require a non-empty line of text, trimmed.
pub fn require_text(field: &'static str, raw: &str) -> Result<String, LibraryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::invalid_input(field, raw));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_rejects_text_and_zero() {
        assert_eq!(parse_number("book id", " 12 "), Ok(12));
        assert_eq!(
            parse_number("book id", "twelve"),
            Err(LibraryError::InvalidInput {
                field: "book id",
                value: "twelve".to_string()
            })
        );
        assert!(parse_number("copies", "0").is_err());
        assert!(parse_number("copies", "-3").is_err());
    }

    #[test]
    fn not_found_groups_both_kinds() {
        assert!(LibraryError::BookNotFound(BookId(1)).is_not_found());
        assert!(LibraryError::MemberNotFound(MemberId(1)).is_not_found());
        assert!(!LibraryError::BookUnavailable {
            book_id: BookId(1),
            title: "Dune".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn require_text_trims() {
        assert_eq!(require_text("name", "  Asha \n"), Ok("Asha".to_string()));
        assert!(require_text("name", "   ").is_err());
    }
}
