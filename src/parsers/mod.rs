//! HTML normalization: turns fetched markup into a [`NormalizedPage`].
//!
//! Normalization is a pure function of the markup. The only partial-failure
//! path is JSON-LD: a block that does not parse is dropped and reported as a
//! [`ParseSkipped`] record instead of failing the page.

pub mod html;
pub mod jsonld;
pub mod text;

#[cfg(test)]
mod tests;

use crate::error::{FetchError, ParseSkipped};
use crate::results::{ExtractedElement, NormalizedPage};
use scraper::Html;

/// Normalize a document, logging and discarding malformed JSON-LD blocks
pub fn normalize(html: &str) -> NormalizedPage {
    let (page, skipped) = normalize_with_report(html);
    for skip in &skipped {
        ::log::warn!(
            "Skipped JSON-LD block {}: {}",
            skip.index,
            skip.reason
        );
    }
    page
}

/// Normalize a document and return the JSON-LD blocks that were dropped
pub fn normalize_with_report(html: &str) -> (NormalizedPage, Vec<ParseSkipped>) {
    let doc = Html::parse_document(html);
    let (structured_data, skipped) = jsonld::parse_blocks(&doc);

    let page = NormalizedPage {
        title: html::title(&doc),
        meta_description: html::meta_description(&doc),
        body_text: html::body_text(&doc),
        links: html::links(&doc),
        images: html::images(&doc),
        structured_data,
        html: html.to_string(),
    };

    ::log::debug!(
        "Normalized page: {} chars of text, {} links, {} images, {} JSON-LD blocks",
        page.body_text.len(),
        page.links.len(),
        page.images.len(),
        page.structured_data.len()
    );

    (page, skipped)
}

/// Select elements by CSS selector, one entry per match in document order
///
/// A selector that matches nothing yields an empty vector. A selector that
/// does not parse is an [`FetchError::InvalidSelector`].
pub fn extract(html: &str, selector: &str) -> Result<Vec<ExtractedElement>, FetchError> {
    let selector = html::compile_selector(selector)?;
    let doc = Html::parse_document(html);
    Ok(html::select_elements(&doc, &selector))
}
