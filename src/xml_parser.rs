//! XML Parser Module
//!
//! This module turns a DMARC aggregate report into flat records. The document is
//! first read into a small element tree with quick-xml; any well-formedness
//! problem ends parsing with `ParseOutcome::Malformed`, which callers treat as a
//! clean stop rather than an error. Fields are then pulled out of the tree by
//! walking the path tables below, substituting `"none"` for anything absent.
//!
//! Before parsing, callers run `contains_injection_marker` over the raw text.
//! It rejects any document mentioning "entity" or "system" in any letter case,
//! which rules out DTD entity declarations and external identifiers outright.

use crate::models::{DkimRecord, FlatRecord, MISSING};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Substrings that make a report unacceptable, compared ASCII case-insensitively.
pub const INJECTION_MARKERS: [&str; 2] = ["entity", "system"];

/// One output field: where it comes from and what it falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub path: &'static str,
    pub default: &'static str,
}

const fn field(key: &'static str, path: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        path,
        default: MISSING,
    }
}

/// Report-level fields, resolved against the document root.
pub const METADATA_FIELDS: [FieldSpec; 2] = [
    field("org_name", "report_metadata/org_name"),
    field("report_id", "report_metadata/report_id"),
];

/// Per-record fields, resolved against each `record` element.
pub const RECORD_FIELDS: [FieldSpec; 13] = [
    field("source_ip", "row/source_ip"),
    field("count", "row/count"),
    field("disposition", "row/policy_evaluated/disposition"),
    field("policy_dkim", "row/policy_evaluated/dkim"),
    field("policy_spf", "row/policy_evaluated/spf"),
    field("type", "row/policy_evaluated/reason/type"),
    field("header_from", "identifiers/header_from"),
    field("envelope_from", "identifiers/envelope_from"),
    field("envelope_to", "identifiers/envelope_to"),
    field("human_result", "auth_results/dkim/human_result"),
    field("spf_domain", "auth_results/spf/domain"),
    field("spf_result", "auth_results/spf/result"),
    field("spf_scope", "auth_results/spf/scope"),
];

/// Per-signature fields, resolved against each `auth_results/dkim` element.
pub const DKIM_FIELDS: [FieldSpec; 3] = [
    field("dkim_domain", "domain"),
    field("dkim_result", "result"),
    field("dkim_selector", "selector"),
];

pub const RECORD_PATH: &str = "record";
pub const DKIM_PATH: &str = "auth_results/dkim";

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Records(Vec<FlatRecord>),
    /// The document is not well-formed; carries the parser's reason.
    Malformed(String),
}

/// Returns true when the raw report bytes contain any of the injection markers.
pub fn contains_injection_marker(raw: impl AsRef<[u8]>) -> bool {
    let lowered = raw.as_ref().to_ascii_lowercase();
    INJECTION_MARKERS.iter().any(|marker| {
        lowered
            .windows(marker.len())
            .any(|window| window == marker.as_bytes())
    })
}

/// Decodes raw report bytes as UTF-8 and parses them.
///
/// Bytes that are not valid UTF-8 make the report malformed.
pub fn parse_dmarc_bytes(raw: &[u8], file_name: &str, processed_at: &str) -> ParseOutcome {
    match std::str::from_utf8(raw) {
        Ok(xml_content) => parse_dmarc_xml(xml_content, file_name, processed_at),
        Err(e) => ParseOutcome::Malformed(format!("not valid UTF-8: {}", e)),
    }
}

/// Parses a DMARC report and flattens it, one record per `record` element.
///
/// # Arguments
///
/// * `xml_content` - The report text.
/// * `file_name` - Source filename stamped into every record.
/// * `processed_at` - Processing timestamp stamped into every record's `date`.
pub fn parse_dmarc_xml(xml_content: &str, file_name: &str, processed_at: &str) -> ParseOutcome {
    let root = match Element::parse(xml_content) {
        Ok(root) => root,
        Err(reason) => return ParseOutcome::Malformed(reason),
    };

    let mut metadata = vec![("date", processed_at.to_string())];
    metadata.extend(METADATA_FIELDS.iter().map(|spec| root.extract(spec)));
    metadata.push(("file_name", file_name.to_string()));

    let records = root
        .find_all(RECORD_PATH)
        .into_iter()
        .map(|record| flatten_record(record, &metadata))
        .collect();
    ParseOutcome::Records(records)
}

fn flatten_record(record: &Element, metadata: &[(&'static str, String)]) -> FlatRecord {
    let mut fields = metadata.to_vec();
    fields.extend(RECORD_FIELDS.iter().map(|spec| record.extract(spec)));

    let dkim = record
        .find_all(DKIM_PATH)
        .into_iter()
        .map(|signature| DkimRecord::new(DKIM_FIELDS.iter().map(|spec| signature.extract(spec)).collect()))
        .collect();

    FlatRecord::new(fields, dkim)
}

/// Minimal element tree: name, leading text and child elements.
#[derive(Debug, Default)]
struct Element {
    name: String,
    /// Text before the first child element, if any.
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn new(name: &[u8]) -> Self {
        Element {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Element::default()
        }
    }

    /// Builds the tree for a whole document, returning a reason when it is not well-formed.
    fn parse(xml_content: &str) -> Result<Element, String> {
        let mut reader = Reader::from_str(xml_content);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
            match event {
                Event::Start(e) => {
                    if stack.is_empty() && root.is_some() {
                        return Err("more than one root element".into());
                    }
                    check_attributes(&e)?;
                    stack.push(Element::new(e.local_name().as_ref()));
                }
                Event::Empty(e) => {
                    check_attributes(&e)?;
                    let element = Element::new(e.local_name().as_ref());
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(e) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| "closing tag without an open element".to_string())?;
                    if e.local_name().as_ref() != element.name.as_bytes() {
                        return Err(format!("mismatched closing tag for <{}>", element.name));
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(e) => {
                    let raw = e.into_inner();
                    let text = std::str::from_utf8(&raw).map_err(|e| e.to_string())?;
                    append_text(&mut stack, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }
        root.ok_or_else(|| "no root element".to_string())
    }

    /// All elements matching a `/`-separated child path, in document order.
    fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for step in path.split('/') {
            current = current
                .into_iter()
                .flat_map(|element| element.children.iter().filter(move |c| c.name == step))
                .collect();
        }
        current
    }

    /// Text of the first match; an element without text yields an empty string.
    fn find_text(&self, path: &str) -> Option<String> {
        self.find_all(path)
            .first()
            .map(|element| element.text.clone().unwrap_or_default())
    }

    fn extract(&self, spec: &FieldSpec) -> (&'static str, String) {
        let value = self
            .find_text(spec.path)
            .unwrap_or_else(|| spec.default.to_string());
        (spec.key, value)
    }
}

/// Attribute syntax is only checked when attributes are iterated.
fn check_attributes(start: &BytesStart<'_>) -> Result<(), String> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        attribute.unescape_value().map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err("more than one root element".into()),
        None => *root = Some(element),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), String> {
    match stack.last_mut() {
        // Text after a child element is tail text and never read.
        Some(element) if element.children.is_empty() => {
            element.text.get_or_insert_with(String::new).push_str(text);
        }
        Some(_) => {}
        None if text.trim().is_empty() => {}
        None => return Err("text outside the root element".into()),
    }
    Ok(())
}
