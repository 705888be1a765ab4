//! Minimal WordprocessingML package
//!
//! One paragraph holds a `<key>: <value>` run per top-level report key,
//! each followed by a line break, and ends with the generator trailer.
//! Entries use a fixed timestamp so identical reports zip identically.

use std::io::{Cursor, Write};

use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::ReportError;
use crate::report::NormalizedReport;

use super::{pretty_fields, GENERATED_BY};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

pub fn docx_bytes(report: &NormalizedReport) -> Result<Vec<u8>, ReportError> {
    let document = document_xml(report)?;

    let parts: [(&str, &str); 4] = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ("word/document.xml", &document),
    ];

    let fixed_time = zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
        .map_err(|_| ReportError::Serialization("invalid zip timestamp".into()))?;
    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(fixed_time)
        .unix_permissions(0o644);

    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zw.start_file(name, options)
            .map_err(|e| ReportError::Serialization(e.to_string()))?;
        zw.write_all(content.as_bytes())?;
    }
    let cursor = zw
        .finish()
        .map_err(|e| ReportError::Serialization(e.to_string()))?;

    Ok(cursor.into_inner())
}

fn document_xml(report: &NormalizedReport) -> Result<String, ReportError> {
    let mut runs = String::new();

    for (key, value) in pretty_fields(report)? {
        runs.push_str("<w:r>");
        let text = format!("{}: {}", key, value);
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                runs.push_str("<w:br/>");
            }
            runs.push_str(&text_element(line));
        }
        runs.push_str("<w:br/></w:r>");
    }
    runs.push_str("<w:r>");
    runs.push_str(&text_element(GENERATED_BY));
    runs.push_str("</w:r>");

    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body><w:p>{}</w:p></w:body></w:document>",
        runs
    ))
}

fn text_element(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    format!("<w:t xml:space=\"preserve\">{}</w:t>", escaped)
}
