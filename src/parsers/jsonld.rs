use crate::error::ParseSkipped;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#)
        .expect("constant selectors are valid CSS")
});

/// Parse one JSON-LD script body, returning the parse failure as text
pub fn parse_block(raw: &str) -> Result<serde_json::Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty block".to_string());
    }
    serde_json::from_str(trimmed).map_err(|e| e.to_string())
}

/// Parse every JSON-LD block in document order, keeping only the valid ones
pub fn parse_blocks(doc: &Html) -> (Vec<serde_json::Value>, Vec<ParseSkipped>) {
    let mut values = Vec::new();
    let mut skipped = Vec::new();

    for (index, script) in doc.select(&JSON_LD).enumerate() {
        let raw = script.text().collect::<String>();
        match parse_block(&raw) {
            Ok(value) => values.push(value),
            Err(reason) => skipped.push(ParseSkipped { index, reason }),
        }
    }

    (values, skipped)
}
