//! Tables and status lines for the console.

use crossterm::style::{Attribute, Color, Stylize};
use shelfmark_core::{Book, Catalog, Member, Transaction};

const RULE_WIDTH: usize = 78;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn success(&self, text: &str) -> String {
        self.paint(&format!("=> {text}"), Color::Green)
    }

    pub fn error(&self, text: &str) -> String {
        if self.color {
            format!("=> {text}").with(Color::Red).attribute(Attribute::Italic).to_string()
        } else {
            format!("=> {text}")
        }
    }

    pub fn warning(&self, text: &str) -> String {
        self.paint(&format!("!! {text}"), Color::Yellow)
    }

    pub fn heading(&self, text: &str) -> String {
        if self.color {
            text.with(Color::Blue).attribute(Attribute::Bold).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn header_row(&self, text: &str) -> String {
        self.paint(text, Color::Yellow)
    }
}

pub fn menu(palette: &Palette) -> String {
    let rule = "=".repeat(41);
    let mut out = String::new();
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("|{}|\n", palette.heading(&format!("{:^39}", "shelfmark library"))));
    out.push_str(&rule);
    out.push('\n');
    for (key, label) in [
        ("1", "Register member"),
        ("2", "Display members"),
        ("3", "Display books"),
        ("4", "Search books"),
        ("5", "Filter books"),
        ("6", "Add book"),
        ("7", "Borrow book"),
        ("8", "Return book"),
        ("9", "Transaction history"),
        ("0", "Exit"),
    ] {
        out.push_str(&format!("| {key}. {label:<34} |\n"));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

pub fn books_table(palette: &Palette, books: &[&Book]) -> String {
    let mut out = table_open(palette, "BOOKS");
    out.push_str(&palette.header_row(&format!(
        "{:<8} {:<28} {:<20} {:>7} {:>10}",
        "Book ID", "Title", "Author", "Total", "Available"
    )));
    out.push('\n');
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    for book in books {
        out.push_str(&format!(
            "{:<8} {:<28} {:<20} {:>7} {:>10}\n",
            book.id,
            fit(&book.title, 28),
            fit(&book.author, 20),
            book.total_copies,
            book.available_copies
        ));
    }
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

pub fn members_table(palette: &Palette, catalog: &Catalog) -> String {
    let mut out = table_open(palette, "MEMBERS");
    out.push_str(&palette.header_row(&format!(
        "{:<10} {:<24} {}",
        "Member ID", "Name", "Borrowed books"
    )));
    out.push('\n');
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    if catalog.members().is_empty() {
        out.push_str("No members found.\n");
    }
    for member in catalog.members() {
        out.push_str(&format!(
            "{:<10} {:<24} {}\n",
            member.id,
            fit(&member.name, 24),
            loans_summary(catalog, member)
        ));
    }
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

pub fn transactions_table(palette: &Palette, transactions: &[Transaction]) -> String {
    let mut out = table_open(palette, "TRANSACTION HISTORY");
    if transactions.is_empty() {
        out.push_str("No transactions yet.\n");
    }
    for transaction in transactions {
        out.push_str(&transaction.to_string());
        out.push('\n');
    }
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

fn table_open(palette: &Palette, title: &str) -> String {
    format!(
        "\n{}\n{}\n{}\n",
        "=".repeat(RULE_WIDTH),
        palette.heading(&format!("{title:^width$}", width = RULE_WIDTH)),
        "=".repeat(RULE_WIDTH)
    )
}

fn loans_summary(catalog: &Catalog, member: &Member) -> String {
    if member.borrowed_book_ids.is_empty() {
        return "None".to_string();
    }
    member
        .borrowed_book_ids
        .iter()
        .map(|id| match catalog.find_book(*id) {
            Ok(book) => format!("{id} ({})", fit(&book.title, 20)),
            Err(_) => id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Clip `text` to `width` characters, marking the cut with an ellipsis.
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::{BookId, MemberId};

    #[test]
    fn fit_clips_long_text() {
        assert_eq!(fit("Dune", 10), "Dune");
        assert_eq!(fit("The Left Hand of Darkness", 10), "The Left …");
    }

    #[test]
    fn plain_palette_emits_no_escape_codes() {
        let palette = Palette::new(false);
        assert_eq!(palette.error("nope"), "=> nope");
        assert!(!menu(&palette).contains('\u{1b}'));

        let colored = Palette::new(true);
        assert!(colored.success("ok").contains('\u{1b}'));
    }

    #[test]
    fn member_table_names_borrowed_titles() {
        let mut catalog = Catalog::new();
        catalog.add_book("Dune", "Herbert", 1);
        catalog.register_member("Asha");
        catalog.register_member("Bo");
        catalog.borrow(MemberId(1), BookId(1)).expect("borrow");

        let table = members_table(&Palette::new(false), &catalog);
        assert!(table.contains("1 (Dune)"));
        assert!(table.lines().any(|line| line.starts_with("2 ") && line.ends_with("None")));
    }
}
