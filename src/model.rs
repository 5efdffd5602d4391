use serde::{Deserialize, Deserializer, Serialize};

/// One logical work in the catalog. `id` is assigned once at creation and
/// never reassigned; enrichment fills absent fields but never overwrites a
/// populated one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub pages: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shelves: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goodreads_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_empty"
    )]
    pub isbn: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_empty"
    )]
    pub isbn13: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_empty"
    )]
    pub date_read: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "int_or_empty"
    )]
    pub rating: Option<i64>,
}

/// One highlighted passage, owned by exactly one book. Immutable once
/// created; re-observing the same quote is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub book_id: String,
    pub text: String,
    #[serde(default)]
    pub location: QuoteLocation,
    #[serde(default)]
    pub tags: Vec<String>,
    pub added_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Normalized tracking-service export record, persisted separately from
/// the catalog before any enrichment runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodreadsBook {
    pub goodreads_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub isbn: Option<String>,
    pub isbn13: Option<String>,
    pub pages: Option<i64>,
    pub year: Option<i64>,
    pub publisher: Option<String>,
    pub binding: Option<String>,
    pub rating: Option<i64>,
    pub average_rating: Option<f64>,
    pub shelves: Vec<String>,
    pub date_read: Option<String>,
    pub date_added: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodreadsExport {
    pub books: Vec<GoodreadsBook>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub new_books: usize,
    pub new_quotes: usize,
}

// Source exports are inconsistent about empty fields: the same column may
// arrive as a missing key, null, or "". All three read back as None.
fn string_or_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}

fn int_or_empty<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Raw::Number(value)) => Some(value),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}
