//! Catalog store owning books, members and the audit log.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::{
    error::LibraryError,
    models::{Book, BookId, Member, MemberId, Transaction},
};

/// Optional predicates applied by [`Catalog::list_books`].
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Case-insensitive author equality.
    pub author: Option<String>,
    /// Only keep books with at least one copy on the shelf.
    pub available_only: bool,
}

impl BookFilter {
    /// Filter by author, ignoring blank input.
    pub fn by_author(mut self, author: impl AsRef<str>) -> Self {
        let author = author.as_ref().trim();
        self.author = (!author.is_empty()).then(|| author.to_string());
        self
    }

    /// Restrict to books that can currently be borrowed.
    pub fn available(mut self, available_only: bool) -> Self {
        self.available_only = available_only;
        self
    }

    fn matches(&self, book: &Book) -> bool {
        if self.available_only && !book.is_available() {
            return false;
        }
        match self.author.as_deref() {
            Some(author) => book.author.to_lowercase() == author.to_lowercase(),
            None => true,
        }
    }
}

/// Outcome of a listing, keeping "nothing matched" apart from "nothing exists".
#[derive(Debug, PartialEq, Eq)]
pub enum BookListing<'a> {
    /// The catalog holds no books at all.
    NoBooks,
    /// Books exist but none passed the filter.
    NoMatches,
    /// Matching books in catalog order.
    Books(Vec<&'a Book>),
}

/// A loan dropped while rebuilding a catalog from persisted parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedLoan {
    /// Member whose loan set referenced the book.
    pub member_id: MemberId,
    /// Book that could not be attributed.
    pub book_id: BookId,
    /// Why the loan was discarded.
    pub reason: &'static str,
}

/// A book whose lent-out count was lowered to match the members holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterCorrection {
    /// Book whose counter changed.
    pub book_id: BookId,
    /// Available copies as persisted.
    pub recorded_available: u32,
    /// Available copies after matching against member loans.
    pub corrected_available: u32,
}

/// Everything [`Catalog::from_parts`] had to change to restore consistency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Loans removed from member loan sets.
    pub dropped_loans: Vec<DroppedLoan>,
    /// Book counters returned to the shelf because no member holds those copies.
    pub corrections: Vec<CounterCorrection>,
}

/// In-memory catalog. Owns every record; ids are allocated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub(crate) books: Vec<Book>,
    pub(crate) members: Vec<Member>,
    pub(crate) transactions: Vec<Transaction>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a catalog from persisted records without registration side effects.
    ///
    /// Loans that point at unknown books, repeat a book, or exceed the copies
    /// recorded as lent out are dropped. Copies recorded as lent out that no
    /// member holds go back on the shelf. Afterwards every book's lent-out
    /// count equals the number of members holding it.
    pub fn from_parts(
        mut books: Vec<Book>,
        mut members: Vec<Member>,
        transactions: Vec<Transaction>,
    ) -> (Self, Reconciliation) {
        let mut dropped = Vec::new();
        let mut attributed: HashMap<BookId, u32> = HashMap::new();

        for member in &mut members {
            let mut kept = Vec::with_capacity(member.borrowed_book_ids.len());
            for &book_id in &member.borrowed_book_ids {
                let reason = match books.iter().find(|book| book.id == book_id) {
                    None => Some("book does not exist"),
                    Some(_) if kept.contains(&book_id) => Some("duplicate loan"),
                    Some(book) => {
                        let count = attributed.entry(book_id).or_insert(0);
                        if *count >= book.copies_on_loan() {
                            Some("more loans than copies lent out")
                        } else {
                            *count += 1;
                            None
                        }
                    }
                };

                match reason {
                    Some(reason) => {
                        warn!(
                            member = %member.id,
                            book = %book_id,
                            "dropping loan while loading catalog: {reason}"
                        );
                        dropped.push(DroppedLoan {
                            member_id: member.id,
                            book_id,
                            reason,
                        });
                    }
                    None => kept.push(book_id),
                }
            }
            member.borrowed_book_ids = kept;
        }

        let mut corrections = Vec::new();
        for book in &mut books {
            let holders = attributed.get(&book.id).copied().unwrap_or(0);
            if holders < book.copies_on_loan() {
                let corrected = book.total_copies - holders;
                warn!(
                    book = %book.id,
                    recorded = book.available_copies,
                    corrected,
                    "returning unattributed copies to the shelf"
                );
                corrections.push(CounterCorrection {
                    book_id: book.id,
                    recorded_available: book.available_copies,
                    corrected_available: corrected,
                });
                book.available_copies = corrected;
            }
        }

        let catalog = Self {
            books,
            members,
            transactions,
        };
        let reconciliation = Reconciliation {
            dropped_loans: dropped,
            corrections,
        };
        (catalog, reconciliation)
    }

    /// All books in insertion order.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// All members in registration order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Audit log, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Add a title with `copies` copies, all available.
    pub fn add_book(&mut self, title: &str, author: &str, copies: u32) -> &Book {
        let id = BookId(self.books.iter().map(|book| book.id.0).max().unwrap_or(0) + 1);
        let copies = copies.max(1);
        let book = Book {
            id,
            title: title.trim().to_string(),
            author: author.trim().to_string(),
            total_copies: copies,
            available_copies: copies,
        };
        info!(book = %id, title = %book.title, copies, "book added");
        self.books.push(book);
        &self.books[self.books.len() - 1]
    }

    /// Register a member with an empty loan set.
    pub fn register_member(&mut self, name: &str) -> &Member {
        let id = MemberId(
            self.members
                .iter()
                .map(|member| member.id.0)
                .max()
                .unwrap_or(0)
                + 1,
        );
        let member = Member {
            id,
            name: name.trim().to_string(),
            borrowed_book_ids: Vec::new(),
        };
        info!(member = %id, name = %member.name, "member registered");
        self.members.push(member);
        &self.members[self.members.len() - 1]
    }

    /// Look up a book by id.
    pub fn find_book(&self, id: BookId) -> Result<&Book, LibraryError> {
        self.books
            .iter()
            .find(|book| book.id == id)
            .ok_or(LibraryError::BookNotFound(id))
    }

    /// Look up a member by id.
    pub fn find_member(&self, id: MemberId) -> Result<&Member, LibraryError> {
        self.members
            .iter()
            .find(|member| member.id == id)
            .ok_or(LibraryError::MemberNotFound(id))
    }

    pub(crate) fn book_index(&self, id: BookId) -> Result<usize, LibraryError> {
        self.books
            .iter()
            .position(|book| book.id == id)
            .ok_or(LibraryError::BookNotFound(id))
    }

    pub(crate) fn member_index(&self, id: MemberId) -> Result<usize, LibraryError> {
        self.members
            .iter()
            .position(|member| member.id == id)
            .ok_or(LibraryError::MemberNotFound(id))
    }

    /// List books passing `filter`.
    pub fn list_books(&self, filter: &BookFilter) -> BookListing<'_> {
        if self.books.is_empty() {
            return BookListing::NoBooks;
        }
        let books: Vec<&Book> = self.books.iter().filter(|book| filter.matches(book)).collect();
        if books.is_empty() {
            BookListing::NoMatches
        } else {
            BookListing::Books(books)
        }
    }

    /// Case-insensitive substring search over title and author.
    pub fn search(&self, keyword: &str) -> Vec<&Book> {
        let needle = keyword.trim().to_lowercase();
        self.books
            .iter()
            .filter(|book| {
                book.title.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
            })
            .collect()
    }
}
