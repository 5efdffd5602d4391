use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::cli::IngestArgs;
use crate::model::{Book, IngestSummary, Quote, QuoteLocation};
use crate::normalize::sanitize_quote_text;
use crate::quotes::{QuoteLedger, quote_id};
use crate::sources::SourceParsers;
use crate::util::{ensure_directory, load_json_or_default, today_utc_string, write_json_pretty};

pub fn run(args: IngestArgs) -> Result<()> {
    let raw_dir = args.data_root.join("raw");
    let books_path = args.data_root.join("books.json");
    let quotes_path = args.data_root.join("quotes.json");

    if !raw_dir.is_dir() {
        info!(raw_dir = %raw_dir.display(), "no raw directory, nothing to do");
        return Ok(());
    }

    ensure_directory(&args.data_root)?;

    let books: Vec<Book> = load_json_or_default(&books_path, Vec::new());
    let quotes: Vec<Quote> = load_json_or_default(&quotes_path, Vec::new());

    info!(
        raw_dir = %raw_dir.display(),
        books = books.len(),
        quotes = quotes.len(),
        "starting ingest"
    );

    let mut catalog = Catalog::from_books(books);
    let mut ledger = QuoteLedger::from_quotes(quotes);
    let today = today_utc_string();

    let summary = ingest_directory(&raw_dir, &mut catalog, &mut ledger, &today)?;

    write_json_pretty(&books_path, &catalog.into_books())?;
    write_json_pretty(&quotes_path, &ledger.into_quotes())?;

    info!(
        new_books = summary.new_books,
        new_quotes = summary.new_quotes,
        files_seen = summary.files_seen,
        files_skipped = summary.files_skipped,
        "ingest completed"
    );

    Ok(())
}

/// Runs the pipeline over every file in `raw_dir`, appending to the
/// catalog and quote ledger in place. Files are visited in sorted order
/// so identifier minting stays deterministic across runs.
pub fn ingest_directory(
    raw_dir: &Path,
    catalog: &mut Catalog,
    ledger: &mut QuoteLedger,
    today: &str,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    if !raw_dir.is_dir() {
        info!(raw_dir = %raw_dir.display(), "no raw directory, nothing to do");
        return Ok(summary);
    }

    let parsers = SourceParsers::new()?;

    let mut paths = Vec::new();
    let entries =
        fs::read_dir(raw_dir).with_context(|| format!("failed to read {}", raw_dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", raw_dir.display()))?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        summary.files_seen += 1;

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                summary.files_skipped += 1;
                continue;
            }
        };

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => {
                ingest_annotation_file(file_name, &text, &parsers, catalog, ledger, today, &mut summary)
            }
            "txt" => {
                ingest_bullet_file(file_name, &text, &parsers, catalog, ledger, today, &mut summary)
            }
            _ => {
                debug!(path = %path.display(), "skipping unsupported extension");
                summary.files_skipped += 1;
            }
        }
    }

    Ok(summary)
}

fn ingest_annotation_file(
    file_name: &str,
    text: &str,
    parsers: &SourceParsers,
    catalog: &mut Catalog,
    ledger: &mut QuoteLedger,
    today: &str,
    summary: &mut IngestSummary,
) {
    let parsed = parsers.parse_annotation_csv(text);
    if parsed.rows.is_empty() {
        debug!(file = file_name, "no highlight rows, skipping file");
        summary.files_skipped += 1;
        return;
    }

    let title = parsed
        .title
        .unwrap_or_else(|| parsers.title_from_filename(file_name));
    let author = parsed.author.unwrap_or_default();

    let (position, created) = catalog.resolve_or_create(&title, &author);
    if created {
        summary.new_books += 1;
    }
    let book_id = catalog.book(position).id.clone();

    for row in parsed.rows {
        append_quote(ledger, &book_id, &row.text, row.location, today, summary);
    }
}

fn ingest_bullet_file(
    file_name: &str,
    text: &str,
    parsers: &SourceParsers,
    catalog: &mut Catalog,
    ledger: &mut QuoteLedger,
    today: &str,
    summary: &mut IngestSummary,
) {
    let parsed = parsers.parse_bullet_list(text);
    if parsed.items.is_empty() {
        debug!(file = file_name, "no bullet items, skipping file");
        summary.files_skipped += 1;
        return;
    }

    let title = parsed
        .title
        .unwrap_or_else(|| parsers.title_from_filename(file_name));
    let author = parsed.author.unwrap_or_default();

    let (position, created) = catalog.resolve_or_create(&title, &author);
    if created {
        summary.new_books += 1;
    }
    let book_id = catalog.book(position).id.clone();

    for item in parsed.items {
        append_quote(ledger, &book_id, &item, None, today, summary);
    }
}

// The id is derived from the sanitized text, so duplicates within one
// file and across runs collapse to the same id.
fn append_quote(
    ledger: &mut QuoteLedger,
    book_id: &str,
    raw_text: &str,
    location: Option<String>,
    today: &str,
    summary: &mut IngestSummary,
) {
    let text = sanitize_quote_text(raw_text);
    if text.is_empty() {
        return;
    }

    let id = quote_id(book_id, &text);
    if ledger.contains(&id) {
        return;
    }

    ledger.push(Quote {
        id,
        book_id: book_id.to_string(),
        text,
        location: QuoteLocation { raw: location },
        tags: Vec::new(),
        added_at: today.to_string(),
    });
    summary.new_quotes += 1;
}
