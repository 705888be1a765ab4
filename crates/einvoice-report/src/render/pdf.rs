//! Single-page PDF rendering
//!
//! The page is US Letter width and grows in height so that every line of
//! the pretty-printed report fits on the one page. Lines wider than the
//! text area are wrapped, with continuation lines indented past the
//! original line's indentation. Pages taller than the PDF size limit keep
//! their layout and are scaled down with `/UserUnit`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::error::ReportError;
use crate::report::NormalizedReport;

use super::pretty;

const PAGE_WIDTH: i64 = 612;
const LETTER_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;
const FONT_SIZE: i64 = 15;
const LEADING: i64 = 18;

/// Largest page dimension, in default user space units
const MAX_PAGE_HEIGHT: f32 = 14_400.0;

/// Text area width in glyph space (1/1000 of the font size)
const MAX_LINE_UNITS: u32 = ((PAGE_WIDTH - 2 * MARGIN) * 1000 / FONT_SIZE) as u32;

const CONTINUATION_INDENT: usize = 4;
const MAX_CONTINUATION: usize = 40;

/// Helvetica advance widths for 0x20..=0x7E
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

pub fn pdf_bytes(report: &NormalizedReport) -> Result<Vec<u8>, ReportError> {
    let body = pretty(report)?;
    let lines: Vec<Vec<u8>> = body.lines().flat_map(|line| wrap(win_ansi(line))).collect();
    let height = (2 * MARGIN + LEADING * lines.len() as i64).max(LETTER_HEIGHT);

    let user_unit = height as f32 / MAX_PAGE_HEIGHT;
    let scaled = user_unit > 1.0;

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut operations = Vec::new();
    if scaled {
        let factor = 1.0 / user_unit;
        operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(factor),
                0.into(),
                0.into(),
                Object::Real(factor),
                0.into(),
                0.into(),
            ],
        ));
    }
    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (height - MARGIN - FONT_SIZE).into()]),
    ]);
    for line in lines {
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(line, StringFormat::Literal)],
        ));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations }
        .encode()
        .map_err(|e| ReportError::Serialization(format!("PDF content: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let media_box: Vec<Object> = if scaled {
        vec![
            0.into(),
            0.into(),
            Object::Real(PAGE_WIDTH as f32 / user_unit),
            Object::Real(MAX_PAGE_HEIGHT),
        ]
    } else {
        vec![0.into(), 0.into(), PAGE_WIDTH.into(), height.into()]
    };

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => media_box,
    };
    if scaled {
        page.set("UserUnit", Object::Real(user_unit));
    }
    let page_id = doc.add_object(page);

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ReportError::Serialization(format!("PDF save failed: {}", e)))?;
    Ok(buffer)
}

/// Helvetica with WinAnsiEncoding: Latin-1 plus the CP1252 punctuation
/// block; anything else becomes `?`
fn win_ansi(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => cp1252(c).unwrap_or(b'?'),
        })
        .collect()
}

fn cp1252(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Outside printable ASCII every glyph is costed as a full em
fn glyph_width(byte: u8) -> u32 {
    match byte {
        0x20..=0x7E => u32::from(HELVETICA_WIDTHS[usize::from(byte - 0x20)]),
        _ => 1000,
    }
}

fn text_width(bytes: &[u8]) -> u32 {
    bytes.iter().map(|&b| glyph_width(b)).sum()
}

fn trim_spaces(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(start, |i| i + 1);
    &bytes[start..end.max(start)]
}

/// Split an encoded line into pieces no wider than the text area, breaking
/// at spaces where possible
fn wrap(line: Vec<u8>) -> Vec<Vec<u8>> {
    if text_width(&line) <= MAX_LINE_UNITS {
        return vec![line];
    }

    let indent = line.iter().take_while(|&&b| b == b' ').count();
    let continuation = vec![b' '; (indent + CONTINUATION_INDENT).min(MAX_CONTINUATION)];

    let mut wrapped = Vec::new();
    let mut prefix: &[u8] = &[];
    let mut rest: &[u8] = &line;
    // Spaces at or before this index are indentation, not break points
    let mut floor = indent;

    loop {
        let budget = MAX_LINE_UNITS - text_width(prefix);
        if text_width(rest) <= budget {
            wrapped.push([prefix, rest].concat());
            break;
        }

        let mut used = 0;
        let mut fit = 0;
        for &byte in rest {
            let width = glyph_width(byte);
            if used + width > budget {
                break;
            }
            used += width;
            fit += 1;
        }
        let fit = fit.max(1);

        let cut = rest[..fit]
            .iter()
            .rposition(|&b| b == b' ')
            .filter(|&i| i > floor)
            .unwrap_or(fit);

        let (head, tail) = rest.split_at(cut);
        let head = if prefix.is_empty() {
            &head[..head.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1)]
        } else {
            trim_spaces(head)
        };
        wrapped.push([prefix, head].concat());

        rest = trim_spaces(tail);
        if rest.is_empty() {
            break;
        }
        prefix = continuation.as_slice();
        floor = 0;
    }

    wrapped
}
