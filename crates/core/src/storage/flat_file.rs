use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    catalog::Catalog,
    error::LibraryError,
    models::{Action, Book, BookId, Member, MemberId, Transaction, TIMESTAMP_FORMAT},
};

use super::{LoadReport, Persistence};

/// File holding `name,member_id,id;id;...` lines.
pub const MEMBERS_FILE: &str = "members.txt";
/// File holding `book_id,title,author,total_copies,available_copies` lines.
pub const BOOKS_FILE: &str = "books.txt";
/// Human-readable audit log.
pub const TRANSACTIONS_FILE: &str = "transactions.txt";

static TRANSACTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>.+) \(ID: (?P<member>\d+)\) (?P<verb>borrowed|returned) '(?P<title>.*)' at (?P<at>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})(?: \[book (?P<book>\d+)\])?$",
    )
    .expect("failed to compile transaction line regex")
});

/// Comma-separated text files in a single directory.
#[derive(Debug, Clone)]
pub struct FlatFileStore {
    root: PathBuf,
}

impl FlatFileStore {
    /// Create a store rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the data files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    fn read_lines(&self, file: &str) -> Result<Vec<(usize, String)>> {
        let path = self.path(file);
        if !path.exists() {
            debug!("{} missing; starting empty", path.display());
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r').to_string()))
            .collect())
    }

    fn write_atomic(&self, file: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.path(file);
        let mut staged = NamedTempFile::new_in(&self.root)
            .with_context(|| format!("failed to stage {}", path.display()))?;
        staged
            .write_all(contents.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        staged
            .as_file()
            .sync_all()
            .with_context(|| format!("failed to sync {}", path.display()))?;
        staged
            .persist(&path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }

    fn malformed(
        &self,
        file: &str,
        line_number: usize,
        content: &str,
        reason: String,
    ) -> LibraryError {
        let err = LibraryError::MalformedLine {
            file: self.path(file),
            line_number,
            content: content.to_string(),
            reason,
        };
        warn!("{err}");
        err
    }
}

impl Persistence for FlatFileStore {
    fn describe(&self) -> String {
        format!("flat files in {}", self.root.display())
    }

    fn load(&self) -> Result<LoadReport> {
        let mut malformed = Vec::new();

        let mut books: Vec<Book> = Vec::new();
        for (line_number, line) in self.read_lines(BOOKS_FILE)? {
            match parse_book(&line) {
                Ok(book) if books.iter().any(|known| known.id == book.id) => {
                    malformed.push(self.malformed(
                        BOOKS_FILE,
                        line_number,
                        &line,
                        format!("duplicate book id {}", book.id),
                    ))
                }
                Ok(book) => books.push(book),
                Err(reason) => {
                    malformed.push(self.malformed(BOOKS_FILE, line_number, &line, reason))
                }
            }
        }

        let mut members: Vec<Member> = Vec::new();
        for (line_number, line) in self.read_lines(MEMBERS_FILE)? {
            match parse_member(&line) {
                Ok(member) if members.iter().any(|known| known.id == member.id) => {
                    malformed.push(self.malformed(
                        MEMBERS_FILE,
                        line_number,
                        &line,
                        format!("duplicate member id {}", member.id),
                    ))
                }
                Ok(member) => members.push(member),
                Err(reason) => {
                    malformed.push(self.malformed(MEMBERS_FILE, line_number, &line, reason))
                }
            }
        }

        let mut transactions = Vec::new();
        for (line_number, line) in self.read_lines(TRANSACTIONS_FILE)? {
            match parse_transaction(&line, &books) {
                Ok(transaction) => transactions.push(transaction),
                Err(reason) => {
                    malformed.push(self.malformed(TRANSACTIONS_FILE, line_number, &line, reason))
                }
            }
        }

        debug!(
            books = books.len(),
            members = members.len(),
            transactions = transactions.len(),
            skipped = malformed.len(),
            "loaded catalog from {}",
            self.root.display()
        );

        let (catalog, reconciliation) = Catalog::from_parts(books, members, transactions);
        Ok(LoadReport {
            catalog,
            malformed,
            dropped_loans: reconciliation.dropped_loans,
            corrected_counters: reconciliation.corrections,
        })
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        let members: String = catalog.members().iter().map(format_member).collect();
        let books: String = catalog.books().iter().map(format_book).collect();
        let transactions: String = catalog
            .transactions()
            .iter()
            .map(format_transaction)
            .collect();

        self.write_atomic(MEMBERS_FILE, &members)?;
        self.write_atomic(BOOKS_FILE, &books)?;
        self.write_atomic(TRANSACTIONS_FILE, &transactions)?;
        debug!("saved catalog to {}", self.root.display());
        Ok(())
    }
}

fn format_member(member: &Member) -> String {
    let loans = member
        .borrowed_book_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";");
    format!("{},{},{}\n", escape_field(&member.name), member.id, loans)
}

fn format_book(book: &Book) -> String {
    format!(
        "{},{},{},{},{}\n",
        book.id,
        escape_field(&book.title),
        escape_field(&book.author),
        book.total_copies,
        book.available_copies
    )
}

fn format_transaction(transaction: &Transaction) -> String {
    format!(
        "{} (ID: {}) {} '{}' at {} [book {}]\n",
        escape_field(&transaction.member_name),
        transaction.member_id,
        transaction.action.verb(),
        escape_field(&transaction.book_title),
        transaction.timestamp.format(TIMESTAMP_FORMAT),
        transaction.book_id
    )
}

fn parse_member(line: &str) -> Result<Member, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    }
    let name = unescape_field(fields[0].trim());
    if name.is_empty() {
        return Err("member name is empty".to_string());
    }
    let id = parse_id(fields[1], "member id")?;

    let mut borrowed_book_ids = Vec::new();
    let loans = fields[2].trim();
    if !loans.is_empty() {
        for raw in loans.split(';') {
            borrowed_book_ids.push(BookId(parse_id(raw, "book id")?));
        }
    }

    Ok(Member {
        id: MemberId(id),
        name,
        borrowed_book_ids,
    })
}

fn parse_book(line: &str) -> Result<Book, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    }
    let id = parse_id(fields[0], "book id")?;
    let title = unescape_field(fields[1].trim());
    let author = unescape_field(fields[2].trim());
    if title.is_empty() || author.is_empty() {
        return Err("title and author must not be empty".to_string());
    }
    let total_copies = parse_id(fields[3], "total copies")?;
    let available_copies = fields[4]
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid available copies {:?}", fields[4]))?;
    if available_copies > total_copies {
        return Err(format!(
            "available copies {available_copies} exceed total {total_copies}"
        ));
    }

    Ok(Book {
        id: BookId(id),
        title,
        author,
        total_copies,
        available_copies,
    })
}

fn parse_transaction(line: &str, books: &[Book]) -> Result<Transaction, String> {
    let caps = TRANSACTION_RE
        .captures(line)
        .ok_or_else(|| "unrecognised audit line".to_string())?;

    let member_name = unescape_field(&caps["name"]);
    let member_id = MemberId(parse_id(&caps["member"], "member id")?);
    let action = Action::from_verb(&caps["verb"])
        .ok_or_else(|| format!("unknown action {:?}", &caps["verb"]))?;
    let book_title = unescape_field(&caps["title"]);
    let timestamp = NaiveDateTime::parse_from_str(&caps["at"], TIMESTAMP_FORMAT)
        .map_err(|err| format!("invalid timestamp: {err}"))?;

    // Older logs carry no book id; fall back to the title.
    let book_id = match caps.name("book") {
        Some(raw) => BookId(parse_id(raw.as_str(), "book id")?),
        None => books
            .iter()
            .find(|book| book.title == book_title)
            .map(|book| book.id)
            .ok_or_else(|| format!("no book titled {book_title:?}"))?,
    };

    Ok(Transaction {
        member_id,
        member_name,
        action,
        book_id,
        book_title,
        timestamp,
    })
}

fn parse_id(raw: &str, field: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("invalid {field} {raw:?}")),
    }
}

/// Percent-escape the characters that would break the line format.
fn escape_field(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' => result.push_str("%25"),
            ',' => result.push_str("%2C"),
            ';' => result.push_str("%3B"),
            '\n' => result.push_str("%0A"),
            '\r' => result.push_str("%0D"),
            other => result.push(other),
        }
    }
    result
}

fn unescape_field(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find('%') {
        result.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let decoded = match tail.get(..3) {
            Some("%25") => Some('%'),
            Some("%2C") => Some(','),
            Some("%3B") => Some(';'),
            Some("%0A") => Some('\n'),
            Some("%0D") => Some('\r'),
            _ => None,
        };
        match decoded {
            Some(ch) => {
                result.push(ch);
                rest = &tail[3..];
            }
            None => {
                result.push('%');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}
