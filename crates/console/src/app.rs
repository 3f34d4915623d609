use std::io::Write;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{error, info, warn};

use shelfmark_core::{
    error::{parse_number, require_text},
    BookFilter, BookId, BookListing, Catalog, LibraryError, LoadReport, MemberId, Persistence,
};

use crate::render::{self, Palette};

/// Raised when stdin closes while a prompt is waiting.
#[derive(Debug, Error)]
#[error("end of input")]
struct EndOfInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    RegisterMember,
    DisplayMembers,
    DisplayBooks,
    SearchBooks,
    FilterBooks,
    AddBook,
    BorrowBook,
    ReturnBook,
    TransactionHistory,
    Exit,
}

impl MenuChoice {
    fn parse(input: &str) -> Option<Self> {
        let choice = match input.trim() {
            "1" => Self::RegisterMember,
            "2" => Self::DisplayMembers,
            "3" => Self::DisplayBooks,
            "4" => Self::SearchBooks,
            "5" => Self::FilterBooks,
            "6" => Self::AddBook,
            "7" => Self::BorrowBook,
            "8" => Self::ReturnBook,
            "9" => Self::TransactionHistory,
            "0" | "q" | "quit" | "exit" => Self::Exit,
            _ => return None,
        };
        Some(choice)
    }
}

/// What the loop does after a command completes.
enum Step {
    Continue,
    Mutated,
    Exit,
}

/// Runtime switches for the console session.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleOptions {
    pub color: bool,
    pub autosave: bool,
}

/// Interactive menu loop over a line-oriented reader and a writer.
pub struct ConsoleApp<R, W> {
    catalog: Catalog,
    store: Box<dyn Persistence>,
    load_issues: Vec<String>,
    autosave: bool,
    palette: Palette,
    lines: Lines<R>,
    out: W,
}

impl<R, W> ConsoleApp<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        report: LoadReport,
        store: Box<dyn Persistence>,
        options: ConsoleOptions,
        input: R,
        out: W,
    ) -> Self {
        let load_issues = report.issues();
        Self {
            catalog: report.catalog,
            store,
            load_issues,
            autosave: options.autosave,
            palette: Palette::new(options.color),
            lines: input.lines(),
            out,
        }
    }

    #[cfg(test)]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn run(&mut self) -> Result<()> {
        self.greet()?;

        loop {
            let menu = render::menu(&self.palette);
            self.out.write_all(menu.as_bytes())?;
            let choice = match self.ask("Enter your choice: ").await {
                Ok(choice) => choice,
                Err(err) if err.is::<EndOfInput>() => break,
                Err(err) => return Err(err),
            };

            let Some(choice) = MenuChoice::parse(&choice) else {
                let message = self
                    .palette
                    .error(&format!("Invalid choice {:?}. Please try again.", choice.trim()));
                self.say(&message)?;
                continue;
            };

            match self.dispatch(choice).await {
                Ok(Step::Continue) => {}
                Ok(Step::Mutated) => self.autosave()?,
                Ok(Step::Exit) => break,
                Err(err) if err.is::<EndOfInput>() => break,
                Err(err) => match err.downcast_ref::<LibraryError>() {
                    Some(domain) => {
                        warn!("{choice:?} failed: {domain}");
                        let message = self.palette.error(&capitalise(&domain.to_string()));
                        self.say(&message)?;
                    }
                    None => return Err(err),
                },
            }
        }

        let farewell = self.palette.success("Exiting shelfmark. Goodbye!");
        self.say(&farewell)?;
        self.out.flush()?;
        Ok(())
    }

    fn greet(&mut self) -> Result<()> {
        let summary = format!(
            "Catalog loaded from {}: {} books, {} members, {} transactions.",
            self.store.describe(),
            self.catalog.books().len(),
            self.catalog.members().len(),
            self.catalog.transactions().len()
        );
        self.say(&summary)?;
        for issue in std::mem::take(&mut self.load_issues) {
            let line = self.palette.warning(&issue);
            self.say(&line)?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, choice: MenuChoice) -> Result<Step> {
        match choice {
            MenuChoice::RegisterMember => self.register_member().await,
            MenuChoice::DisplayMembers => {
                let table = render::members_table(&self.palette, &self.catalog);
                self.print(&table)?;
                Ok(Step::Continue)
            }
            MenuChoice::DisplayBooks => {
                self.show_listing(&BookFilter::default(), "No books match.")?;
                Ok(Step::Continue)
            }
            MenuChoice::SearchBooks => self.search_books().await,
            MenuChoice::FilterBooks => self.filter_books().await,
            MenuChoice::AddBook => self.add_book().await,
            MenuChoice::BorrowBook => self.borrow_book().await,
            MenuChoice::ReturnBook => self.return_book().await,
            MenuChoice::TransactionHistory => {
                let table =
                    render::transactions_table(&self.palette, self.catalog.transactions());
                self.print(&table)?;
                Ok(Step::Continue)
            }
            MenuChoice::Exit => Ok(Step::Exit),
        }
    }

    async fn register_member(&mut self) -> Result<Step> {
        let name = require_text("member name", &self.ask("Enter member name: ").await?)?;
        let member = self.catalog.register_member(&name);
        let message = format!(
            "Member '{}' registered successfully! Your Member ID is {}.",
            member.name, member.id
        );
        let message = self.palette.success(&message);
        self.say(&message)?;
        Ok(Step::Mutated)
    }

    async fn search_books(&mut self) -> Result<Step> {
        let keyword = self.ask("Enter keyword to search: ").await?;
        let output = {
            let found = self.catalog.search(&keyword);
            if found.is_empty() {
                self.palette.error("No matching books found.")
            } else {
                render::books_table(&self.palette, &found)
            }
        };
        self.say(&output)?;
        Ok(Step::Continue)
    }

    async fn filter_books(&mut self) -> Result<Step> {
        let author = self
            .ask("Enter author name (leave blank for all): ")
            .await?;
        let available = self.ask("Show only available books? (yes/no): ").await?;
        let available_only = matches!(available.trim().to_lowercase().as_str(), "yes" | "y");
        let filter = BookFilter::default()
            .by_author(&author)
            .available(available_only);
        self.show_listing(&filter, "No books match the filter criteria.")?;
        Ok(Step::Continue)
    }

    fn show_listing(&mut self, filter: &BookFilter, no_matches: &str) -> Result<()> {
        let output = match self.catalog.list_books(filter) {
            BookListing::NoBooks => self.palette.error("No books available in the library."),
            BookListing::NoMatches => self.palette.error(no_matches),
            BookListing::Books(books) => render::books_table(&self.palette, &books),
        };
        self.say(&output)
    }

    async fn add_book(&mut self) -> Result<Step> {
        let title = require_text("title", &self.ask("Enter the book title: ").await?)?;
        let author = require_text("author", &self.ask("Enter the author name: ").await?)?;
        let copies = parse_number(
            "number of copies",
            &self.ask("Enter the total number of copies: ").await?,
        )?;

        let book = self.catalog.add_book(&title, &author, copies);
        let message = format!("Book '{}' added successfully with ID {}.", book.title, book.id);
        let message = self.palette.success(&message);
        self.say(&message)?;
        Ok(Step::Mutated)
    }

    async fn borrow_book(&mut self) -> Result<Step> {
        let member_id = self.ask_member().await?;
        let book_id = self.ask_book("Enter the Book ID to borrow: ").await?;

        let transaction = self.catalog.borrow(member_id, book_id)?;
        let message = format!(
            "'{}' borrowed successfully by {}.",
            transaction.book_title, transaction.member_name
        );
        let message = self.palette.success(&message);
        self.say(&message)?;
        Ok(Step::Mutated)
    }

    async fn return_book(&mut self) -> Result<Step> {
        let member_id = self.ask_member().await?;
        let member = self.catalog.find_member(member_id)?;
        if member.borrowed_book_ids.is_empty() {
            let message = format!("{} has no borrowed books. Borrow a book first.", member.name);
            let message = self.palette.error(&message);
            self.say(&message)?;
            return Ok(Step::Continue);
        }

        let book_id = self.ask_book("Enter the Book ID to return: ").await?;
        let transaction = self.catalog.return_book(member_id, book_id)?;
        let message = format!(
            "Thank you {} for returning '{}'.",
            transaction.member_name, transaction.book_title
        );
        let message = self.palette.success(&message);
        self.say(&message)?;
        Ok(Step::Mutated)
    }

    async fn ask_member(&mut self) -> Result<MemberId> {
        let raw = self.ask("Enter your Member ID: ").await?;
        let id = MemberId(parse_number("member id", &raw)?);
        self.catalog.find_member(id)?;
        Ok(id)
    }

    async fn ask_book(&mut self, prompt: &str) -> Result<BookId> {
        let raw = self.ask(prompt).await?;
        Ok(BookId(parse_number("book id", &raw)?))
    }

    fn autosave(&mut self) -> Result<()> {
        if !self.autosave || !self.store.is_durable() {
            return Ok(());
        }
        match self.store.save(&self.catalog) {
            Ok(()) => info!("catalog saved to {}", self.store.describe()),
            Err(err) => {
                error!("failed to save catalog: {err:#}");
                let message = self.palette.error(&format!("Could not save catalog: {err:#}"));
                self.say(&message)?;
            }
        }
        Ok(())
    }

    async fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let line = self
            .lines
            .next_line()
            .await
            .context("failed to read from input")?;
        line.ok_or_else(|| EndOfInput.into())
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "\n\t{line}")?;
        Ok(())
    }

    fn print(&mut self, block: &str) -> Result<()> {
        self.out.write_all(block.as_bytes())?;
        Ok(())
    }
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::{FlatFileStore, MemoryStore};
    use tempfile::tempdir;

    const PLAIN: ConsoleOptions = ConsoleOptions {
        color: false,
        autosave: true,
    };

    async fn run_script(
        script: &'static str,
        store: Box<dyn Persistence>,
    ) -> Result<(Catalog, String)> {
        let report = store.load()?;
        let mut app = ConsoleApp::new(report, store, PLAIN, script.as_bytes(), Vec::new());
        app.run().await?;
        let catalog = app.catalog().clone();
        let output = String::from_utf8(app.into_output())?;
        Ok((catalog, output))
    }

    #[test]
    fn menu_choices_parse() {
        assert_eq!(MenuChoice::parse(" 7 "), Some(MenuChoice::BorrowBook));
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("quit"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("42"), None);
    }

    #[tokio::test]
    async fn lending_session_reports_unavailable_copy() -> Result<()> {
        let script = "6\nDune\nHerbert\n1\n\
                      1\nAsha\n\
                      7\n1\n1\n\
                      7\n1\n1\n\
                      8\n1\n1\n\
                      9\n\
                      0\n";
        let (catalog, output) = run_script(script, Box::new(MemoryStore)).await?;

        assert!(output.contains("Book 'Dune' added successfully with ID 1."));
        assert!(output.contains("Your Member ID is 1."));
        assert!(output.contains("'Dune' borrowed successfully by Asha."));
        assert!(output.contains("'Dune' (book 1) is currently unavailable"));
        assert!(output.contains("Thank you Asha for returning 'Dune'."));
        assert!(output.contains("Asha (ID: 1) returned 'Dune'"));
        assert!(output.contains("Goodbye"));

        assert_eq!(catalog.books()[0].available_copies, 1);
        assert!(catalog.members()[0].borrowed_book_ids.is_empty());
        assert_eq!(catalog.transactions().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn bad_input_is_reported_and_loop_continues() -> Result<()> {
        let script = "7\nabc\n\
                      42\n\
                      1\nAsha\n\
                      7\n1\nxyz\n\
                      8\n1\n\
                      6\nDune\nHerbert\nmany\n\
                      0\n";
        let (catalog, output) = run_script(script, Box::new(MemoryStore)).await?;

        assert!(output.contains("Invalid member id: \"abc\""));
        assert!(output.contains("Invalid choice \"42\""));
        assert!(output.contains("Invalid book id: \"xyz\""));
        assert!(output.contains("Asha has no borrowed books."));
        assert!(output.contains("Invalid number of copies: \"many\""));
        assert!(catalog.books().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() -> Result<()> {
        let script = "7\n3\n1\nAsha\n7\n1\n5\n0\n";
        let (_, output) = run_script(script, Box::new(MemoryStore)).await?;
        assert!(output.contains("Member 3 not found"));
        assert!(output.contains("Book 5 not found"));
        Ok(())
    }

    #[tokio::test]
    async fn listings_distinguish_empty_catalog_from_no_match() -> Result<()> {
        let script = "3\n\
                      6\nDune\nFrank Herbert\n2\n\
                      5\nLe Guin\nno\n\
                      5\nfrank herbert\nyes\n\
                      4\nsimmons\n\
                      0\n";
        let (_, output) = run_script(script, Box::new(MemoryStore)).await?;

        assert!(output.contains("No books available in the library."));
        assert!(output.contains("No books match the filter criteria."));
        assert!(output.contains("No matching books found."));
        assert!(output.lines().any(|line| line.starts_with("1 ") && line.contains("Dune")));
        Ok(())
    }

    #[tokio::test]
    async fn end_of_input_exits_cleanly() -> Result<()> {
        let (_, output) = run_script("2\n6\nDune\n", Box::new(MemoryStore)).await?;
        assert!(output.contains("No members found."));
        assert!(output.contains("Goodbye"));
        Ok(())
    }

    #[tokio::test]
    async fn mutations_are_saved_and_reloaded() -> Result<()> {
        let dir = tempdir()?;
        let script = "6\nEats, Shoots & Leaves\nTruss\n2\n1\nAsha\n7\n1\n1\n0\n";
        run_script(script, Box::new(FlatFileStore::new(dir.path()))).await?;

        let books = std::fs::read_to_string(dir.path().join("books.txt"))?;
        assert_eq!(books, "1,Eats%2C Shoots & Leaves,Truss,2,1\n");

        let (catalog, output) =
            run_script("0\n", Box::new(FlatFileStore::new(dir.path()))).await?;
        assert!(output.contains("1 books, 1 members, 1 transactions"));
        assert_eq!(catalog.members()[0].borrowed_book_ids, vec![BookId(1)]);
        Ok(())
    }

    #[tokio::test]
    async fn load_issues_are_shown_at_startup() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("books.txt"), "1,Dune,Herbert,1,0\n")?;
        std::fs::write(dir.path().join("members.txt"), "Asha,1\n")?;
        let (catalog, output) =
            run_script("0\n", Box::new(FlatFileStore::new(dir.path()))).await?;

        assert!(catalog.members().is_empty());
        assert_eq!(catalog.books()[0].available_copies, 1);
        assert!(output.contains("!! skipping malformed line 1"));
        assert!(output.contains("!! book 1 available copies corrected from 0 to 1"));
        Ok(())
    }
}
