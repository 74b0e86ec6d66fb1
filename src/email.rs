//! Report Email Module
//!
//! Parses the raw email object and pulls out the report attachment, which is
//! expected at top-level body part index 1. Messages with any other number of
//! top-level parts are not processed.

use crate::error::Result;
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};

/// Number of top-level body parts a processable report email has.
pub const EXPECTED_PART_COUNT: usize = 2;

/// One MIME body part with its payload already transfer-decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportAttachment {
    /// Lowercased `type/subtype`.
    pub content_type: String,
    /// Declared filename, or empty when the part declares none.
    pub file_name: String,
    /// The raw `Content-Disposition` header value, if present.
    pub content_disposition: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentLookup {
    Found(ReportAttachment),
    WrongPartCount(usize),
}

/// Parses a raw RFC 822 message and returns its second top-level part.
pub fn find_report_attachment(raw: &[u8]) -> Result<AttachmentLookup> {
    let mail = parse_mail(raw)?;
    let parts = mail.subparts.len();
    if parts != EXPECTED_PART_COUNT {
        return Ok(AttachmentLookup::WrongPartCount(parts));
    }
    let attachment = ReportAttachment::from_part(&mail.subparts[1])?;
    Ok(AttachmentLookup::Found(attachment))
}

impl ReportAttachment {
    fn from_part(part: &ParsedMail<'_>) -> Result<Self> {
        let disposition = part.get_content_disposition();
        let file_name = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned()
            .unwrap_or_default();

        Ok(ReportAttachment {
            content_type: part.ctype.mimetype.to_lowercase(),
            file_name,
            content_disposition: part.headers.get_first_value("Content-Disposition"),
            payload: part.get_body_raw()?,
        })
    }
}
