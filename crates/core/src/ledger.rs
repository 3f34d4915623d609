//! Lending ledger: borrow and return transitions with audit logging.
//!
//! Each (member, book) pair is either not borrowed or borrowed. A pair only
//! enters the borrowed state through [`Catalog::borrow`] and only leaves it
//! through [`Catalog::return_book`] by the same member.

use chrono::{Local, NaiveDateTime, Timelike};
use tracing::info;

use crate::{
    catalog::Catalog,
    error::LibraryError,
    models::{Action, BookId, MemberId, Transaction},
};

impl Catalog {
    /// Lend one copy of `book_id` to `member_id`.
    pub fn borrow(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Transaction, LibraryError> {
        self.borrow_at(member_id, book_id, now())
    }

    /// Take back a copy of `book_id` from `member_id`.
    pub fn return_book(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Transaction, LibraryError> {
        self.return_book_at(member_id, book_id, now())
    }

    pub(crate) fn borrow_at(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        timestamp: NaiveDateTime,
    ) -> Result<Transaction, LibraryError> {
        let member_idx = self.member_index(member_id)?;
        let book_idx = self.book_index(book_id)?;

        let book = &self.books[book_idx];
        if !book.is_available() {
            return Err(LibraryError::BookUnavailable {
                book_id,
                title: book.title.clone(),
            });
        }
        if self.members[member_idx].holds(book_id) {
            return Err(LibraryError::AlreadyBorrowed { member_id, book_id });
        }

        self.books[book_idx].available_copies -= 1;
        self.members[member_idx].borrowed_book_ids.push(book_id);
        Ok(self.record(member_idx, book_idx, Action::Borrow, timestamp))
    }

    pub(crate) fn return_book_at(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        timestamp: NaiveDateTime,
    ) -> Result<Transaction, LibraryError> {
        let member_idx = self.member_index(member_id)?;
        let book_idx = self.book_index(book_id)?;

        let loans = &self.members[member_idx].borrowed_book_ids;
        let Some(position) = loans.iter().position(|id| *id == book_id) else {
            return Err(LibraryError::NotBorrowedByMember { member_id, book_id });
        };

        self.members[member_idx].borrowed_book_ids.remove(position);
        let book = &mut self.books[book_idx];
        book.available_copies = (book.available_copies + 1).min(book.total_copies);
        Ok(self.record(member_idx, book_idx, Action::Return, timestamp))
    }

    fn record(
        &mut self,
        member_idx: usize,
        book_idx: usize,
        action: Action,
        timestamp: NaiveDateTime,
    ) -> Transaction {
        let member = &self.members[member_idx];
        let book = &self.books[book_idx];
        let transaction = Transaction {
            member_id: member.id,
            member_name: member.name.clone(),
            action,
            book_id: book.id,
            book_title: book.title.clone(),
            timestamp,
        };
        info!(
            member = %member.id,
            book = %book.id,
            available = book.available_copies,
            "{} '{}'",
            action.verb(),
            book.title
        );
        self.transactions.push(transaction.clone());
        transaction
    }
}

/// Audit timestamps are kept at whole-second precision, matching the log format.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;
    use proptest::prelude::*;

    fn dune_and_asha() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_book("Dune", "Herbert", 1);
        catalog.register_member("Asha");
        catalog
    }

    fn shelf(copies: &[u32], members: usize) -> Catalog {
        let mut catalog = Catalog::new();
        for (idx, copies) in copies.iter().enumerate() {
            catalog.add_book(&format!("Volume {}", idx + 1), "Anon", *copies);
        }
        for idx in 0..members {
            catalog.register_member(&format!("Reader {}", idx + 1));
        }
        catalog
    }

    /// Borrow when `borrow` is set, otherwise return. Ids may point past the catalog.
    fn apply(
        catalog: &mut Catalog,
        (borrow, member, book): (bool, u32, u32),
    ) -> Result<(), LibraryError> {
        let result = if borrow {
            catalog.borrow(MemberId(member), BookId(book))
        } else {
            catalog.return_book(MemberId(member), BookId(book))
        };
        result.map(|_| ())
    }

    fn operations() -> impl Strategy<Value = Vec<(bool, u32, u32)>> {
        prop::collection::vec((any::<bool>(), 1u32..=4, 1u32..=5), 0..200)
    }

    #[test]
    fn dune_lending_scenario() {
        let mut catalog = dune_and_asha();
        assert_eq!(catalog.books()[0].id, BookId(1));
        assert_eq!(catalog.members()[0].id, MemberId(1));

        let transaction = catalog.borrow(MemberId(1), BookId(1)).expect("first borrow");
        assert_eq!(transaction.action, Action::Borrow);
        assert_eq!(transaction.book_title, "Dune");
        assert_eq!(catalog.books()[0].available_copies, 0);
        assert_eq!(catalog.members()[0].borrowed_book_ids, vec![BookId(1)]);

        let snapshot = (catalog.books().to_vec(), catalog.members().to_vec());
        let err = catalog.borrow(MemberId(1), BookId(1)).unwrap_err();
        assert_eq!(
            err,
            LibraryError::BookUnavailable {
                book_id: BookId(1),
                title: "Dune".to_string()
            }
        );
        assert_eq!(snapshot, (catalog.books().to_vec(), catalog.members().to_vec()));
        assert_eq!(catalog.transactions().len(), 1);

        catalog.return_book(MemberId(1), BookId(1)).expect("return");
        assert_eq!(catalog.books()[0].available_copies, 1);
        assert!(catalog.members()[0].borrowed_book_ids.is_empty());
        assert_eq!(catalog.transactions().len(), 2);
        assert_eq!(catalog.transactions()[1].action, Action::Return);
    }

    #[test]
    fn single_copy_cannot_be_held_twice() {
        let mut catalog = dune_and_asha();
        catalog.register_member("Bo");

        catalog.borrow(MemberId(1), BookId(1)).expect("asha borrows");
        assert!(matches!(
            catalog.borrow(MemberId(2), BookId(1)),
            Err(LibraryError::BookUnavailable { .. })
        ));
        assert!(catalog.members()[1].borrowed_book_ids.is_empty());
    }

    #[test]
    fn member_cannot_hold_two_units_of_one_title() {
        let mut catalog = Catalog::new();
        catalog.add_book("Dune", "Herbert", 3);
        catalog.register_member("Asha");

        catalog.borrow(MemberId(1), BookId(1)).expect("borrow");
        assert_eq!(
            catalog.borrow(MemberId(1), BookId(1)),
            Err(LibraryError::AlreadyBorrowed {
                member_id: MemberId(1),
                book_id: BookId(1)
            })
        );
        assert_eq!(catalog.books()[0].available_copies, 2);
    }

    #[test]
    fn return_of_unborrowed_book_changes_nothing() {
        let mut catalog = dune_and_asha();
        let books_before = catalog.books().to_vec();

        assert_eq!(
            catalog.return_book(MemberId(1), BookId(1)),
            Err(LibraryError::NotBorrowedByMember {
                member_id: MemberId(1),
                book_id: BookId(1)
            })
        );
        assert_eq!(catalog.books(), books_before.as_slice());
        assert!(catalog.transactions().is_empty());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut catalog = dune_and_asha();
        assert_eq!(
            catalog.borrow(MemberId(1), BookId(2)),
            Err(LibraryError::BookNotFound(BookId(2)))
        );
        assert_eq!(
            catalog.borrow(MemberId(4), BookId(1)),
            Err(LibraryError::MemberNotFound(MemberId(4)))
        );
        assert_eq!(
            catalog.return_book(MemberId(1), BookId(2)),
            Err(LibraryError::BookNotFound(BookId(2)))
        );
        assert_eq!(catalog.books()[0].available_copies, 1);
    }

    #[test]
    fn borrow_then_return_restores_state() {
        let mut catalog = Catalog::new();
        catalog.add_book("Dune", "Herbert", 2);
        catalog.add_book("Hyperion", "Simmons", 1);
        catalog.register_member("Asha");
        catalog.borrow(MemberId(1), BookId(2)).expect("borrow hyperion");

        let books_before: Vec<Book> = catalog.books().to_vec();
        let loans_before = catalog.members()[0].borrowed_book_ids.clone();

        catalog.borrow(MemberId(1), BookId(1)).expect("borrow dune");
        catalog.return_book(MemberId(1), BookId(1)).expect("return dune");

        assert_eq!(catalog.books(), books_before.as_slice());
        assert_eq!(catalog.members()[0].borrowed_book_ids, loans_before);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn counters_match_holders_over_any_sequence(
            copies in prop::collection::vec(1u32..=3, 1..=4),
            members in 1usize..=3,
            ops in operations(),
        ) {
            let mut catalog = shelf(&copies, members);
            for op in ops {
                let before = catalog.clone();
                if apply(&mut catalog, op).is_err() {
                    prop_assert_eq!(&catalog, &before);
                }

                for book in catalog.books() {
                    prop_assert!(book.available_copies <= book.total_copies);
                    let holders = catalog
                        .members()
                        .iter()
                        .filter(|member| member.holds(book.id))
                        .count() as u32;
                    prop_assert_eq!(holders, book.copies_on_loan());
                }
            }
        }

        #[test]
        fn successful_borrow_is_undone_by_return(
            copies in prop::collection::vec(1u32..=3, 1..=4),
            members in 1usize..=3,
            prefix in operations(),
            member in 1u32..=3,
            book in 1u32..=4,
        ) {
            let mut catalog = shelf(&copies, members);
            for op in prefix {
                let _ = apply(&mut catalog, op);
            }
            let books_before = catalog.books().to_vec();
            let members_before = catalog.members().to_vec();

            if catalog.borrow(MemberId(member), BookId(book)).is_ok() {
                prop_assert!(catalog.return_book(MemberId(member), BookId(book)).is_ok());
                prop_assert_eq!(catalog.books(), books_before.as_slice());
                prop_assert_eq!(catalog.members(), members_before.as_slice());
            }
        }
    }
}
