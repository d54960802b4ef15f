//! Output conversion for extracted records and normalized pages.

use crate::results::NormalizedPage;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use std::io::Cursor;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Xml,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "xml" => Ok(OutputFormat::Xml),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            other => Err(ConvertError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV encoding failed: {0}")]
    Csv(String),
    #[error("XML encoding failed: {0}")]
    Xml(String),
}

/// Render a list of records in the requested format
///
/// Records are usually JSON objects; anything else is treated as a single
/// `value` field.
pub fn render_records(records: &[Value], format: OutputFormat) -> Result<String, ConvertError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Csv => to_csv(records),
        OutputFormat::Xml => to_xml(records),
        OutputFormat::Markdown => Ok(to_markdown_table(records)),
    }
}

/// Union of object keys across records, in first-seen order
fn columns(records: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        match record {
            Value::Object(map) => {
                for key in map.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
            _ => {
                if !columns.iter().any(|c| c == "value") {
                    columns.push("value".to_string());
                }
            }
        }
    }
    columns
}

fn field(record: &Value, column: &str) -> String {
    let value = match record {
        Value::Object(map) => map.get(column),
        other if column == "value" => Some(other),
        _ => None,
    };
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn to_csv(records: &[Value]) -> Result<String, ConvertError> {
    let columns = columns(records);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&columns)
        .map_err(|e| ConvertError::Csv(e.to_string()))?;
    for record in records {
        let row: Vec<String> = columns.iter().map(|c| field(record, c)).collect();
        writer
            .write_record(&row)
            .map_err(|e| ConvertError::Csv(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ConvertError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ConvertError::Csv(e.to_string()))
}

/// Make a string usable as an XML element name
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn to_xml(records: &[Value]) -> Result<String, ConvertError> {
    let xml_err = |e: std::io::Error| ConvertError::Xml(e.to_string());
    let columns = columns(records);
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("records")))
        .map_err(xml_err)?;
    for record in records {
        writer
            .write_event(Event::Start(BytesStart::new("record")))
            .map_err(xml_err)?;
        for column in &columns {
            let name = element_name(column);
            writer
                .write_event(Event::Start(BytesStart::new(name.as_str())))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&field(record, column))))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("record")))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("records")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| ConvertError::Xml(e.to_string()))
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn to_markdown_table(records: &[Value]) -> String {
    let columns = columns(records);
    if columns.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| markdown_cell(c)).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));
    for record in records {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| markdown_cell(&field(record, c)))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

/// Readable Markdown rendition of a normalized page
pub fn page_to_markdown(page: &NormalizedPage) -> String {
    let mut out = String::new();
    if !page.title.is_empty() {
        out.push_str(&format!("# {}\n\n", page.title));
    }
    if !page.meta_description.is_empty() {
        out.push_str(&format!("> {}\n\n", page.meta_description));
    }
    if !page.body_text.is_empty() {
        out.push_str(&page.body_text);
        out.push_str("\n\n");
    }

    if !page.links.is_empty() {
        out.push_str("## Links\n\n");
        for link in &page.links {
            let text = if link.text.is_empty() { &link.href } else { &link.text };
            out.push_str(&format!("- [{}]({})\n", text, link.href));
        }
        out.push('\n');
    }

    if !page.images.is_empty() {
        out.push_str("## Images\n\n");
        for image in &page.images {
            out.push_str(&format!("- ![{}]({})\n", image.alt, image.src));
        }
        out.push('\n');
    }

    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{Image, Link};
    use serde_json::json;

    fn records() -> Vec<Value> {
        vec![
            json!({"name": "Widget", "price": 9.5}),
            json!({"name": "Gadget | Pro", "tags": ["a", "b"]}),
        ]
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_csv_uses_union_of_keys() {
        let csv = render_records(&records(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "name,price,tags");
        assert_eq!(lines[1], "Widget,9.5,");
        assert_eq!(lines[2], "Gadget | Pro,,\"[\"\"a\"\",\"\"b\"\"]\"");
    }

    #[test]
    fn test_xml_escapes_text_and_names() {
        let records = vec![json!({"title": "Fish & Chips", "2nd key": "<b>"})];
        let xml = render_records(&records, OutputFormat::Xml).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<title>Fish &amp; Chips</title>"));
        assert!(xml.contains("<_2nd_key>&lt;b&gt;</_2nd_key>"));
    }

    #[test]
    fn test_markdown_table_escapes_pipes() {
        let table = render_records(&records(), OutputFormat::Markdown).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| name | price | tags |");
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| Widget | 9.5 |  |");
        assert!(lines[3].starts_with("| Gadget \\| Pro |"));
    }

    #[test]
    fn test_json_and_empty_input() {
        let json = render_records(&records(), OutputFormat::Json).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records());
        assert_eq!(render_records(&[], OutputFormat::Markdown).unwrap(), "");
    }

    #[test]
    fn test_page_to_markdown() {
        let page = NormalizedPage {
            title: "Hello".to_string(),
            meta_description: "A greeting".to_string(),
            body_text: "Hello world".to_string(),
            links: vec![Link {
                href: "/a".to_string(),
                text: String::new(),
            }],
            images: vec![Image {
                src: "/x.png".to_string(),
                alt: "X".to_string(),
            }],
            structured_data: vec![],
            html: String::new(),
        };
        let md = page_to_markdown(&page);
        assert_eq!(
            md,
            "# Hello\n\n> A greeting\n\nHello world\n\n## Links\n\n- [/a](/a)\n\n## Images\n\n- ![X](/x.png)\n"
        );
    }
}
