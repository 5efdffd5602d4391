use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::model::Quote;

const QUOTE_ID_HEX_LEN: usize = 12;

/// Content-addressed quote identifier: the same (book id, sanitized text)
/// pair always maps to the same value, across runs and platforms.
pub fn quote_id(book_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(book_id.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("q_{}", &digest[..QUOTE_ID_HEX_LEN])
}

/// Append-only quote collection plus the id set used for deduplication.
/// Ids are registered as quotes are accepted, so duplicates within one
/// file are suppressed the same way as duplicates across runs.
#[derive(Debug, Default)]
pub struct QuoteLedger {
    quotes: Vec<Quote>,
    seen: HashSet<String>,
}

impl QuoteLedger {
    pub fn from_quotes(quotes: Vec<Quote>) -> Self {
        let seen = quotes.iter().map(|quote| quote.id.clone()).collect();
        Self { quotes, seen }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn push(&mut self, quote: Quote) {
        self.seen.insert(quote.id.clone());
        self.quotes.push(quote);
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn into_quotes(self) -> Vec<Quote> {
        self.quotes
    }
}

#[cfg(test)]
mod tests {
    use super::{QuoteLedger, quote_id};
    use crate::model::{Quote, QuoteLocation};

    #[test]
    fn quote_id_is_deterministic() {
        let id = quote_id("bk_dune", "Fear is the mind-killer.");
        assert_eq!(id, "q_e9d345f3ced0");
        assert_eq!(quote_id("bk_dune", "Fear is the mind-killer."), id);
    }

    #[test]
    fn quote_id_differs_by_text_and_by_book() {
        let a = quote_id("bk_dune", "Fear is the mind-killer.");
        let b = quote_id("bk_dune", "I must not fear.");
        let c = quote_id("bk_dune_2", "Fear is the mind-killer.");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(b, "q_a79ac6f5f69a");
    }

    #[test]
    fn ledger_registers_ids_as_quotes_are_accepted() {
        let mut ledger = QuoteLedger::default();
        let id = quote_id("bk_dune", "Fear is the mind-killer.");
        assert!(!ledger.contains(&id));

        ledger.push(Quote {
            id: id.clone(),
            book_id: "bk_dune".to_string(),
            text: "Fear is the mind-killer.".to_string(),
            location: QuoteLocation::default(),
            tags: Vec::new(),
            added_at: "2024-01-01".to_string(),
        });

        assert!(ledger.contains(&id));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ledger_seeds_seen_ids_from_persisted_quotes() {
        let persisted = vec![Quote {
            id: "q_existing00000".to_string(),
            book_id: "bk_dune".to_string(),
            text: "old".to_string(),
            location: QuoteLocation::default(),
            tags: Vec::new(),
            added_at: "2023-01-01".to_string(),
        }];

        let ledger = QuoteLedger::from_quotes(persisted);
        assert!(ledger.contains("q_existing00000"));
        assert!(!ledger.contains("q_other"));
    }
}
