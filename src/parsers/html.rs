use crate::error::FetchError;
use crate::parsers::text::{collapse_whitespace, join_fragments};
use crate::results::{ExtractedElement, Image, Link};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

fn constant(css: &str) -> Selector {
    Selector::parse(css).expect("constant selectors are valid CSS")
}

static TITLE: LazyLock<Selector> = LazyLock::new(|| constant("title"));
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| constant(r#"meta[name="description"]"#));
static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| constant(r#"meta[property="og:description"]"#));
static BODY: LazyLock<Selector> = LazyLock::new(|| constant("body"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| constant("a"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| constant("img"));

/// Elements whose text never renders
const INVISIBLE: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Phrasing elements; text on either side of them runs together
const INLINE: [&str; 27] = [
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "font", "i", "kbd",
    "label", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u",
    "var", "wbr",
];

/// Compile a caller-supplied selector
pub fn compile_selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Text of the first `<title>`, or empty
pub fn title(doc: &Html) -> String {
    doc.select(&TITLE)
        .next()
        .map(|el| join_fragments(el.text()))
        .unwrap_or_default()
}

/// `content` of the description meta tag, falling back to Open Graph, or empty
pub fn meta_description(doc: &Html) -> String {
    [&*META_DESCRIPTION, &*OG_DESCRIPTION]
        .into_iter()
        .find_map(|selector| {
            doc.select(selector)
                .next()
                .and_then(|el| el.value().attr("content"))
        })
        .map(collapse_whitespace)
        .unwrap_or_default()
}

/// Visible text of the body, whitespace-collapsed
pub fn body_text(doc: &Html) -> String {
    let root = doc
        .select(&BODY)
        .next()
        .unwrap_or_else(|| doc.root_element());

    element_text(root)
}

/// Rendered text of an element, whitespace-collapsed
///
/// Block-level boundaries become a space; inline markup such as
/// `H<sub>2</sub>O` does not split the surrounding word.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    visible_text(element, &mut raw);
    collapse_whitespace(&raw)
}

fn visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if INVISIBLE.contains(&name) {
                continue;
            }
            let block = !INLINE.contains(&name);
            if block {
                out.push(' ');
            }
            visible_text(child_element, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// Every anchor in document order; a missing `href` becomes an empty string
pub fn links(doc: &Html) -> Vec<Link> {
    let links = doc
        .select(&ANCHOR)
        .map(|el| Link {
            href: el.value().attr("href").unwrap_or_default().to_string(),
            text: element_text(el),
        })
        .collect::<Vec<_>>();

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::debug!(
            "First few links: {:?}",
            links.iter().take(5).map(|l| &l.href).collect::<Vec<_>>()
        );
    }

    links
}

/// Every image in document order; missing attributes become empty strings
pub fn images(doc: &Html) -> Vec<Image> {
    doc.select(&IMAGE)
        .map(|el| Image {
            src: el.value().attr("src").unwrap_or_default().to_string(),
            alt: el.value().attr("alt").unwrap_or_default().to_string(),
        })
        .collect()
}

/// Text and inner markup of every element matching `selector`
pub fn select_elements(doc: &Html, selector: &Selector) -> Vec<ExtractedElement> {
    doc.select(selector)
        .map(|el| ExtractedElement {
            text: element_text(el),
            inner_html: el.inner_html(),
        })
        .collect()
}
