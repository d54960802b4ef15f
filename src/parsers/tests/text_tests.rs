use crate::parsers::text;

#[test]
fn test_collapse_whitespace() {
    assert_eq!(text::collapse_whitespace("Hello   world!"), "Hello world!");
    assert_eq!(text::collapse_whitespace("  Trim  me  "), "Trim me");
    assert_eq!(text::collapse_whitespace("Tabs\tand\nlines"), "Tabs and lines");
    assert_eq!(text::collapse_whitespace(""), "");
    assert_eq!(text::collapse_whitespace("   "), "");
}

#[test]
fn test_join_fragments() {
    assert_eq!(text::join_fragments(["a", "b", " c "]), "a b c");
    assert_eq!(text::join_fragments(Vec::<&str>::new()), "");
}

#[test]
fn test_looks_script_driven() {
    let long_text = "word ".repeat(100);
    assert!(!text::looks_script_driven("<p>...</p>", &long_text, 200));
    assert!(text::looks_script_driven("<p>short</p>", "short", 200));
    assert!(text::looks_script_driven(
        "<body><div id=\"root\"></div></body>",
        &long_text,
        200
    ));
}
