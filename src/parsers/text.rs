/// Collapses every whitespace run to a single space and trims both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Joins text fragments with a space, then collapses the result
pub fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut joined = String::new();
    for fragment in fragments {
        joined.push_str(fragment);
        joined.push(' ');
    }
    collapse_whitespace(&joined)
}

/// Whether the text looks like an empty shell that a script fills in later
pub fn looks_script_driven(html: &str, body_text: &str, min_text_len: usize) -> bool {
    if body_text.chars().count() < min_text_len {
        return true;
    }

    let js_hints = [
        "window.__NEXT_DATA__",
        "window.__NUXT__",
        "ng-app",
        "<div id=\"root\"></div>",
        "<div id=\"app\"></div>",
        "data-reactroot",
    ];
    if js_hints.iter().any(|hint| html.contains(hint)) {
        return true;
    }

    body_text.contains("Loading...") && body_text.len() < 5000
}
