use std::collections::{BTreeSet, HashMap};

use crate::model::{Book, GoodreadsBook};
use crate::normalize::{slug, strip_author_prefix};

/// Identity key for a work: title slug and primary-author slug. Two
/// ingested records with the same key refer to the same book.
pub fn book_key(title: &str, primary_author: &str) -> String {
    format!("{}|{}", slug(title), slug(primary_author))
}

/// The in-memory catalog plus its lookup indices. Built fresh from the
/// persisted collection at the start of every run and discarded with the
/// run; positions index into the append-only `books` vector.
#[derive(Debug, Default)]
pub struct Catalog {
    books: Vec<Book>,
    by_id: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_books(books: Vec<Book>) -> Self {
        let mut by_id = HashMap::with_capacity(books.len());
        let mut by_key = HashMap::with_capacity(books.len());

        for (position, book) in books.iter().enumerate() {
            let primary = book.authors.first().map(String::as_str).unwrap_or("");
            by_id.insert(book.id.clone(), position);
            by_key.insert(book_key(&book.title, primary), position);
        }

        Self {
            books,
            by_id,
            by_key,
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn book(&self, position: usize) -> &Book {
        &self.books[position]
    }

    pub fn into_books(self) -> Vec<Book> {
        self.books
    }

    /// Resolves a (title, author) pair to an existing book or mints a new
    /// record. Returns the book's position and whether it was created.
    pub fn resolve_or_create(&mut self, title: &str, author: &str) -> (usize, bool) {
        let title = title.trim();
        let title = if title.is_empty() { "Untitled" } else { title };
        let author = strip_author_prefix(author);

        let key = book_key(title, author);
        if let Some(&position) = self.by_key.get(&key) {
            return (position, false);
        }

        let authors = if author.is_empty() {
            Vec::new()
        } else {
            vec![author.to_string()]
        };
        let book = Book {
            id: self.mint_id(title),
            title: title.to_string(),
            authors,
            ..Book::default()
        };

        (self.insert(key, book), true)
    }

    /// Applies one normalized tracking-service record: an existing book is
    /// filled non-destructively, an unseen one is created with the full
    /// record. Returns true when a book was created.
    pub fn apply_export_record(&mut self, record: &GoodreadsBook) -> bool {
        let primary = record.authors.first().map(String::as_str).unwrap_or("");
        let key = book_key(&record.title, primary);

        if let Some(&position) = self.by_key.get(&key) {
            merge_export_fields(&mut self.books[position], record);
            return false;
        }

        let book = Book {
            id: self.mint_id(&record.title),
            title: record.title.clone(),
            authors: record.authors.clone(),
            year: record.year,
            pages: record.pages,
            genres: record.shelves.clone(),
            shelves: record.shelves.clone(),
            goodreads_id: non_empty(&record.goodreads_id),
            isbn: record.isbn.clone(),
            isbn13: record.isbn13.clone(),
            date_read: record.date_read.clone(),
            rating: record.rating,
        };
        self.insert(key, book);
        true
    }

    // Smallest unused numeric suffix >= 2 wins, so minting is
    // deterministic for a given catalog state.
    fn mint_id(&self, title: &str) -> String {
        let base = format!("bk_{}", slug(title));
        if !self.by_id.contains_key(&base) {
            return base;
        }

        let mut suffix = 2_usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.by_id.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn insert(&mut self, key: String, book: Book) -> usize {
        let position = self.books.len();
        self.by_id.insert(book.id.clone(), position);
        self.by_key.insert(key, position);
        self.books.push(book);
        position
    }
}

/// Sorted set union of two string sequences.
pub fn union_sorted(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: BTreeSet<&str> = existing.iter().map(String::as_str).collect();
    merged.extend(incoming.iter().map(String::as_str));
    merged.into_iter().map(ToOwned::to_owned).collect()
}

// Fill-if-absent for scalars, union for the shelf-valued fields. An
// existing populated field is never overwritten, so re-applying the same
// record is a no-op.
fn merge_export_fields(book: &mut Book, record: &GoodreadsBook) {
    if book.authors.is_empty() && !record.authors.is_empty() {
        book.authors = record.authors.clone();
    }
    if book.year.is_none() {
        book.year = record.year;
    }
    if book.pages.is_none() {
        book.pages = record.pages;
    }
    if book.goodreads_id.is_none() {
        book.goodreads_id = non_empty(&record.goodreads_id);
    }
    if is_blank(&book.isbn) {
        book.isbn = record.isbn.clone();
    }
    if is_blank(&book.isbn13) {
        book.isbn13 = record.isbn13.clone();
    }
    if is_blank(&book.date_read) {
        book.date_read = record.date_read.clone();
    }
    if book.rating.is_none() {
        book.rating = record.rating;
    }
    if !record.shelves.is_empty() {
        book.genres = union_sorted(&book.genres, &record.shelves);
        book.shelves = union_sorted(&book.shelves, &record.shelves);
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |value| value.trim().is_empty())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
