use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

/// One forwarded annotation-export row: highlight text plus the raw
/// location string when the export carried one.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    pub text: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAnnotations {
    pub title: Option<String>,
    pub author: Option<String>,
    pub rows: Vec<AnnotationRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBullets {
    pub title: Option<String>,
    pub author: Option<String>,
    pub items: Vec<String>,
}

/// Best-effort parsers for the raw highlight exports. Title and author
/// are scraped from free-text preambles; absent values stay `None` and
/// the caller decides on fallbacks.
pub struct SourceParsers {
    by_prefix: Regex,
    rule_line: Regex,
    eq_decoration: Regex,
    dash_decoration: Regex,
    filename_separators: Regex,
    role_suffix: Regex,
}

impl SourceParsers {
    pub fn new() -> Result<Self> {
        Ok(Self {
            by_prefix: Regex::new(r"(?i)^by\s+").context("failed to compile author prefix regex")?,
            rule_line: Regex::new(r"^-{5,}$").context("failed to compile rule line regex")?,
            eq_decoration: Regex::new(r"^=+\s*|\s*=+$")
                .context("failed to compile '=' decoration regex")?,
            dash_decoration: Regex::new(r"^-+\s*|\s*-+$")
                .context("failed to compile '-' decoration regex")?,
            filename_separators: Regex::new(r"[._-]+")
                .context("failed to compile filename separator regex")?,
            role_suffix: Regex::new(r"\s*\(.*?\)\s*$")
                .context("failed to compile author role suffix regex")?,
        })
    }

    /// Parses an e-reader annotation export: a free-text preamble naming
    /// the book, then a tabular section whose header mentions both
    /// "annotation type" and "location". Only non-empty highlight rows
    /// are forwarded.
    pub fn parse_annotation_csv(&self, text: &str) -> ParsedAnnotations {
        let lines: Vec<&str> = text.lines().collect();

        let mut title = None;
        let mut author = None;
        let mut header = None;

        for (index, raw) in lines.iter().enumerate() {
            let stripped = raw.trim_start_matches('\u{FEFF}').trim();
            if stripped.is_empty() {
                continue;
            }

            let raw_lower = stripped.to_lowercase();
            if raw_lower.contains("annotation type") && raw_lower.contains("location") {
                header = Some(index);
                break;
            }

            // Preamble lines carry CSV padding ("Dune",,,); take the first
            // cell rather than the raw line.
            let cell = parse_csv_line(stripped).into_iter().next().unwrap_or_default();
            let cell = clean_preamble_cell(&cell);
            if cell.is_empty() {
                continue;
            }

            let lower = cell.to_lowercase();
            if title.is_none()
                && !lower.starts_with("your kindle notes for")
                && !lower.starts_with("free kindle")
                && !lower.starts_with("http")
                && !self.rule_line.is_match(&cell)
            {
                title = Some(cell.clone());
            }
            if author.is_none() {
                if let Some(rest) = self.strip_by_prefix(&cell) {
                    author = Some(rest.to_string());
                }
            }
        }

        let mut rows = Vec::new();
        if let Some(header_index) = header {
            let body = lines[header_index + 1..].join("\n");
            for row in parse_csv_rows(&body) {
                if row.len() < 4 {
                    continue;
                }
                let annotation_type = row[0].trim();
                let location = row[1].trim();
                let annotation = row[3].trim();
                if !annotation_type.to_lowercase().contains("highlight") {
                    continue;
                }
                if annotation.is_empty() {
                    continue;
                }
                rows.push(AnnotationRow {
                    text: annotation.to_string(),
                    location: if location.is_empty() {
                        None
                    } else {
                        Some(location.to_string())
                    },
                });
            }
        }

        ParsedAnnotations {
            title,
            author,
            rows,
        }
    }

    /// Parses a plain bullet export: first non-empty line is the title
    /// (with `=`/`-` decorations stripped), an optional "by " line names
    /// the author, and every "- " line is one highlight.
    pub fn parse_bullet_list(&self, text: &str) -> ParsedBullets {
        let mut title = None;
        let mut author = None;
        let mut items = Vec::new();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if title.is_none() {
                title = Some(self.strip_title_decorations(line));
                continue;
            }
            if author.is_none() {
                if let Some(rest) = self.strip_by_prefix(line) {
                    author = Some(rest.to_string());
                    continue;
                }
            }
            if let Some(item) = line.strip_prefix("- ") {
                items.push(item.trim().to_string());
            }
        }

        ParsedBullets {
            title: title.filter(|title| !title.is_empty()),
            author,
            items,
        }
    }

    /// Title fallback when a preamble names no book: the file name with
    /// its extension dropped and separator runs turned into spaces.
    pub fn title_from_filename(&self, name: &str) -> String {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(name);
        self.filename_separators
            .replace_all(stem, " ")
            .trim()
            .to_string()
    }

    /// Drops a trailing parenthesized role marker ("Jane Doe (Editor)").
    pub fn strip_role_suffix(&self, name: &str) -> String {
        self.role_suffix.replace(name.trim(), "").trim().to_string()
    }

    fn strip_by_prefix<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.by_prefix
            .find(line)
            .map(|marker| line[marker.end()..].trim())
    }

    fn strip_title_decorations(&self, line: &str) -> String {
        let pass = self.eq_decoration.replace_all(line, "");
        let pass = self.dash_decoration.replace_all(&pass, "");
        pass.trim().to_string()
    }
}

/// Minimal CSV reader: quoted fields, doubled-quote escapes, embedded
/// newlines. Returns one record per row.
pub fn parse_csv_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Single-line variant used on preamble lines; fields come back trimmed.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    parse_csv_rows(line)
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|field| field.trim().to_string())
        .collect()
}

fn clean_preamble_cell(cell: &str) -> String {
    let cell = cell.trim().trim_matches('"');
    cell.trim_end_matches(',').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{SourceParsers, parse_csv_line, parse_csv_rows};

    fn parsers() -> SourceParsers {
        SourceParsers::new().expect("parsers should compile")
    }

    #[test]
    fn bullet_list_yields_title_author_and_items() {
        let text = "Dune\nby Frank Herbert\n\n- Fear is the mind-killer.\n- I must not fear.\n";
        let parsed = parsers().parse_bullet_list(text);
        assert_eq!(parsed.title.as_deref(), Some("Dune"));
        assert_eq!(parsed.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(
            parsed.items,
            vec![
                "Fear is the mind-killer.".to_string(),
                "I must not fear.".to_string()
            ]
        );
    }

    #[test]
    fn bullet_list_strips_title_decorations() {
        let text = "=== My Highlights ===\n- one\n";
        let parsed = parsers().parse_bullet_list(text);
        assert_eq!(parsed.title.as_deref(), Some("My Highlights"));
        assert_eq!(parsed.items, vec!["one".to_string()]);
    }

    #[test]
    fn bullet_list_without_items_is_empty_not_an_error() {
        let parsed = parsers().parse_bullet_list("Dune\nby Frank Herbert\nno bullets here\n");
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn annotation_export_scrapes_preamble_and_keeps_highlight_rows() {
        let text = concat!(
            "\"Your Kindle Notes For:\",,,\n",
            "\"Dune\",,,\n",
            "\"by Frank Herbert\",,,\n",
            "\"Free Kindle instant preview: https://a.co/x\",,,\n",
            "\"Annotation Type\",\"Location\",\"Starred?\",\"Annotation\"\n",
            "\"Highlight (Yellow)\",\"Location 837\",\"\",\"Fear is the mind-killer.\"\n",
            "\"Note\",\"Location 840\",\"\",\"my own note\"\n",
            "\"Highlight (Blue)\",\"Location 901\",\"\",\"\"\n",
        );

        let parsed = parsers().parse_annotation_csv(text);
        assert_eq!(parsed.title.as_deref(), Some("Dune"));
        assert_eq!(parsed.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].text, "Fear is the mind-killer.");
        assert_eq!(parsed.rows[0].location.as_deref(), Some("Location 837"));
    }

    #[test]
    fn annotation_export_without_header_yields_no_rows() {
        let parsed = parsers().parse_annotation_csv("Dune\nby Frank Herbert\n");
        assert_eq!(parsed.title.as_deref(), Some("Dune"));
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn csv_line_handles_quoted_fields_and_escapes() {
        assert_eq!(
            parse_csv_line(r#""Highlight","Location 10","","He said ""go""""#),
            vec![
                "Highlight".to_string(),
                "Location 10".to_string(),
                String::new(),
                "He said \"go\"".to_string()
            ]
        );
    }

    #[test]
    fn csv_rows_support_embedded_newlines() {
        let rows = parse_csv_rows("a,\"line one\nline two\",c\nd,e,f\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "line one\nline two");
        assert_eq!(rows[1], vec!["d".to_string(), "e".to_string(), "f".to_string()]);
    }

    #[test]
    fn title_from_filename_drops_extension_and_separators() {
        let parsers = parsers();
        assert_eq!(
            parsers.title_from_filename("the_old-man.and.the.sea.txt"),
            "the old man and the sea"
        );
        assert_eq!(parsers.title_from_filename("dune.csv"), "dune");
    }

    #[test]
    fn role_suffix_is_stripped_from_additional_authors() {
        let parsers = parsers();
        assert_eq!(parsers.strip_role_suffix("Jane Doe (Editor)"), "Jane Doe");
        assert_eq!(parsers.strip_role_suffix("Jane Doe"), "Jane Doe");
    }
}
