//! Syntax-level markup check run before any invoice leaves the gateway
//!
//! This is a generic XML parse, not schema validation: any tag names are
//! accepted as long as the document is a single, properly nested element
//! tree.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ReportError;

/// Reject empty or syntactically broken markup
pub fn check(invoice: &str) -> Result<(), ReportError> {
    if invoice.is_empty() {
        return Err(ReportError::EmptyInput);
    }

    let mut reader = Reader::from_str(invoice);
    let decoder = reader.decoder();
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut roots = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ReportError::MalformedMarkup(e.to_string()))?;

        match event {
            Event::Start(tag) => {
                check_tag(&tag, decoder)?;
                if open.is_empty() {
                    roots += 1;
                    ensure_single_root(roots)?;
                }
                open.push(tag.name().as_ref().to_vec());
            }
            Event::Empty(tag) => {
                check_tag(&tag, decoder)?;
                if open.is_empty() {
                    roots += 1;
                    ensure_single_root(roots)?;
                }
            }
            Event::End(tag) => match open.pop() {
                Some(name) if name == tag.name().as_ref() => {}
                Some(name) => {
                    return Err(ReportError::MalformedMarkup(format!(
                        "expected </{}>, found </{}>",
                        String::from_utf8_lossy(&name),
                        String::from_utf8_lossy(tag.name().as_ref())
                    )));
                }
                None => {
                    return Err(ReportError::MalformedMarkup(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(tag.name().as_ref())
                    )));
                }
            },
            Event::Text(text) => {
                if open.is_empty() {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(ReportError::MalformedMarkup(
                            "text outside the root element".into(),
                        ));
                    }
                } else {
                    text.unescape()
                        .map_err(|e| ReportError::MalformedMarkup(e.to_string()))?;
                }
            }
            Event::CData(_) if open.is_empty() => {
                return Err(ReportError::MalformedMarkup(
                    "CDATA outside the root element".into(),
                ));
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(name) = open.last() {
        return Err(ReportError::MalformedMarkup(format!(
            "unterminated element <{}>",
            String::from_utf8_lossy(name)
        )));
    }
    if roots == 0 {
        return Err(ReportError::MalformedMarkup("no root element".into()));
    }

    Ok(())
}

fn check_tag(tag: &BytesStart<'_>, decoder: Decoder) -> Result<(), ReportError> {
    check_name(tag.name().as_ref())?;

    for attr in tag.attributes() {
        let attr = attr.map_err(|e| ReportError::MalformedMarkup(e.to_string()))?;
        check_name(attr.key.as_ref())?;
        if attr.value.contains(&b'<') {
            return Err(ReportError::MalformedMarkup(format!(
                "'<' in value of attribute '{}'",
                String::from_utf8_lossy(attr.key.as_ref())
            )));
        }
        attr.decode_and_unescape_value(decoder)
            .map_err(|e| ReportError::MalformedMarkup(e.to_string()))?;
    }
    Ok(())
}

fn check_name(name: &[u8]) -> Result<(), ReportError> {
    let invalid = || {
        ReportError::MalformedMarkup(format!("invalid name '{}'", String::from_utf8_lossy(name)))
    };
    let name = std::str::from_utf8(name).map_err(|_| invalid())?;

    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start(first) && chars.all(is_name_char) => Ok(()),
        _ => Err(invalid()),
    }
}

/// XML 1.0 NameStartChar
fn is_name_start(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

fn ensure_single_root(roots: usize) -> Result<(), ReportError> {
    if roots > 1 {
        return Err(ReportError::MalformedMarkup(
            "more than one root element".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_invoice_with_prolog() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- sample -->
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2">
  <cbc:ID xmlns:cbc="urn:cbc">INV-1</cbc:ID>
  <Note>Fish &amp; chips</Note>
  <Empty/>
</Invoice>
"#;
        assert!(check(xml).is_ok());
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(check(""), Err(ReportError::EmptyInput)));
    }

    #[test]
    fn test_whitespace_only_is_malformed() {
        assert!(matches!(
            check("   \n"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn test_mismatched_tags() {
        assert!(matches!(
            check("<Invoice><ID>1</Name></Invoice>"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn test_unterminated_root() {
        assert!(matches!(
            check("<Invoice><ID>1</ID>"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn test_stray_closing_tag() {
        assert!(matches!(
            check("</Invoice>"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn test_plain_text_is_malformed() {
        assert!(matches!(
            check("this is not xml"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn test_two_roots_are_malformed() {
        assert!(matches!(
            check("<a/><b/>"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn test_bad_attribute_values() {
        for xml in [r#"<a b="x<y"/>"#, r#"<a b="&bogus;"/>"#, r#"<a b="&amp"/>"#] {
            assert!(
                matches!(check(xml), Err(ReportError::MalformedMarkup(_))),
                "accepted {}",
                xml
            );
        }
    }

    #[test]
    fn test_unknown_entities_rejected_everywhere() {
        assert!(matches!(
            check("<a>&bogus;</a>"),
            Err(ReportError::MalformedMarkup(_))
        ));
        assert!(matches!(
            check(r#"<a b="&bogus;">x</a>"#),
            Err(ReportError::MalformedMarkup(_))
        ));
        assert!(check(r#"<a b="1 &lt; 2 &#38; &quot;ok&quot;"/>"#).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        for xml in ["<1a/>", "<-a></-a>", r#"<a 9b="x"/>"#, "<a.b><.c/></a.b>"] {
            assert!(
                matches!(check(xml), Err(ReportError::MalformedMarkup(_))),
                "accepted {}",
                xml
            );
        }
        assert!(check(r#"<cac:Party-1 xml:lang="en" _x.y="z"><Straße/></cac:Party-1>"#).is_ok());
    }

    #[test]
    fn test_broken_tag_syntax() {
        assert!(matches!(
            check("<Invoice"),
            Err(ReportError::MalformedMarkup(_))
        ));
    }
}
