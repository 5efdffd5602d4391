use std::collections::{BTreeSet, HashMap};
use std::fs;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::catalog::Catalog;
use crate::cli::GoodreadsArgs;
use crate::model::{Book, GoodreadsBook, GoodreadsExport};
use crate::sources::{SourceParsers, parse_csv_rows};
use crate::util::{ensure_directory, load_json_or_default, write_json_pretty};

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

pub fn run(args: GoodreadsArgs) -> Result<()> {
    let goodreads_dir = args.data_root.join("goodreads");
    let export_path = args
        .export_path
        .clone()
        .unwrap_or_else(|| goodreads_dir.join("export.csv"));
    let out_path = goodreads_dir.join("goodreads.json");
    let books_path = args.data_root.join("books.json");

    if !export_path.is_file() {
        info!(path = %export_path.display(), "export not found, nothing to do");
        return Ok(());
    }

    let text = fs::read_to_string(&export_path)
        .with_context(|| format!("failed to read {}", export_path.display()))?;

    let parsers = SourceParsers::new()?;
    let export = normalize_export(&text, &parsers);

    ensure_directory(&goodreads_dir)?;
    write_json_pretty(&out_path, &export)?;
    info!(
        path = %out_path.display(),
        books = export.books.len(),
        "wrote normalized export"
    );

    if args.merge {
        let books: Vec<Book> = load_json_or_default(&books_path, Vec::new());
        let mut catalog = Catalog::from_books(books);

        let mut created = 0_usize;
        for record in &export.books {
            if catalog.apply_export_record(record) {
                created += 1;
            }
        }

        let total = catalog.len();
        write_json_pretty(&books_path, &catalog.into_books())?;
        info!(created, total, path = %books_path.display(), "enriched catalog");
    }

    Ok(())
}

/// Normalizes raw export rows into the persisted record shape. Fields are
/// keyed by header name, so column order in the export does not matter.
fn normalize_export(text: &str, parsers: &SourceParsers) -> GoodreadsExport {
    let rows = parse_csv_rows(text);
    let mut books = Vec::new();

    let Some((header, data)) = rows.split_first() else {
        return GoodreadsExport { books };
    };

    let columns: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim(), index))
        .collect();
    let field = |row: &[String], name: &str| -> String {
        columns
            .get(name)
            .and_then(|&index| row.get(index))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    for row in data {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let year = parse_int(&field(row, "Original Publication Year"))
            .or_else(|| parse_int(&field(row, "Year Published")));

        books.push(GoodreadsBook {
            goodreads_id: field(row, "Book Id"),
            title: field(row, "Title"),
            authors: split_authors(
                &field(row, "Author"),
                &field(row, "Additional Authors"),
                parsers,
            ),
            isbn: clean_excel_wrapping(&field(row, "ISBN")),
            isbn13: clean_excel_wrapping(&field(row, "ISBN13")),
            pages: parse_int(&field(row, "Number of Pages")),
            year,
            publisher: non_empty(field(row, "Publisher")),
            binding: non_empty(field(row, "Binding")),
            rating: parse_int(&field(row, "My Rating")),
            average_rating: parse_float(&field(row, "Average Rating")),
            shelves: collect_shelves(&field(row, "Bookshelves"), &field(row, "Exclusive Shelf")),
            date_read: normalize_date(&field(row, "Date Read")),
            date_added: normalize_date(&field(row, "Date Added")),
        });
    }

    GoodreadsExport { books }
}

fn split_authors(primary: &str, additional: &str, parsers: &SourceParsers) -> Vec<String> {
    let mut authors = Vec::new();
    if !primary.is_empty() {
        authors.push(primary.to_string());
    }
    for part in additional.split(',') {
        let cleaned = parsers.strip_role_suffix(part);
        if !cleaned.is_empty() && !authors.contains(&cleaned) {
            authors.push(cleaned);
        }
    }
    authors
}

fn collect_shelves(bookshelves: &str, exclusive: &str) -> Vec<String> {
    let mut shelves = BTreeSet::new();
    for raw in [bookshelves, exclusive] {
        for part in raw.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                shelves.insert(part.to_string());
            }
        }
    }
    shelves.into_iter().collect()
}

// The service wraps ISBN columns as ="0441013597" to stop spreadsheets
// from eating leading zeros.
fn clean_excel_wrapping(value: &str) -> Option<String> {
    let value = value.trim();
    let unwrapped = value
        .strip_prefix("=\"")
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
        .trim();
    if unwrapped.is_empty() {
        None
    } else {
        Some(unwrapped.to_string())
    }
}

// Dates in a recognized format come out ISO; anything else passes
// through untouched rather than being dropped.
fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.to_string());
        }
    }
    Some(value.to_string())
}

fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|parsed| parsed as i64))
}

fn parse_float(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
