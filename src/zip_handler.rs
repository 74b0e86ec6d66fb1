//! Attachment Decoder Module
//!
//! This module turns the report attachment of a DMARC email into XML files in
//! the invocation's scratch area. Providers label attachments inconsistently, so
//! the compression scheme is guessed from the content type and the filename:
//! gzip indicators are checked before zip indicators, anything else is skipped.
//! Decompressed sizes and zip member counts are bounded by the configuration.

use crate::config::Config;
use crate::email::ReportAttachment;
use crate::error::{DmarcError, Result};
use crate::scratch::ScratchArea;
use flate2::read::MultiGzDecoder;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Gzip,
    Zip,
    Unrecognized,
}

impl AttachmentKind {
    /// Classifies by substring match on the content type or the filename.
    pub fn classify(content_type: &str, file_name: &str) -> Self {
        if content_type.contains("gzip") || file_name.contains("gzip") {
            AttachmentKind::Gzip
        } else if content_type.contains("zip") || file_name.contains("zip") {
            AttachmentKind::Zip
        } else {
            AttachmentKind::Unrecognized
        }
    }
}

#[derive(Debug)]
pub enum DecodeOutcome {
    Decoded(ScratchArea),
    Unrecognized { content_type: String },
}

/// Decodes one attachment into a fresh scratch area.
pub fn decode_attachment(attachment: &ReportAttachment, config: &Config) -> Result<DecodeOutcome> {
    let kind = AttachmentKind::classify(&attachment.content_type, &attachment.file_name);
    debug!(
        content_type = %attachment.content_type,
        file_name = %attachment.file_name,
        kind = ?kind,
        "Classified attachment"
    );
    let scratch = match kind {
        AttachmentKind::Gzip => extract_gzip(attachment, config)?,
        AttachmentKind::Zip => extract_zip(&attachment.payload, config)?,
        AttachmentKind::Unrecognized => {
            return Ok(DecodeOutcome::Unrecognized {
                content_type: attachment.content_type.clone(),
            })
        }
    };
    Ok(DecodeOutcome::Decoded(scratch))
}

/// Decompresses a gzip attachment into a single scratch entry.
///
/// The entry name is the Content-Disposition filename with its last three
/// characters removed, which assumes a `.gz` suffix, and flattened to its
/// final path component.
fn extract_gzip(attachment: &ReportAttachment, config: &Config) -> Result<ScratchArea> {
    let header = attachment.content_disposition.as_deref().ok_or_else(|| {
        DmarcError::Attachment("gzip attachment has no Content-Disposition header".into())
    })?;
    let original = disposition_filename(header).ok_or_else(|| {
        DmarcError::Attachment(format!("no filename parameter in {:?}", header))
    })?;
    if !original.ends_with(".gz") {
        warn!(file_name = %original, "gzip attachment name lacks a .gz suffix; trimming anyway");
    }
    // Keys stay directly under the output prefix, as with zip members.
    let xml_name = flattened_name(&gzip_report_name(&original))
        .unwrap_or_default()
        .to_string();

    let decoder = MultiGzDecoder::new(Cursor::new(attachment.payload.as_slice()));
    let contents = read_limited(decoder, config.max_decompressed_size, &original)?;
    debug!(file_name = %xml_name, bytes = contents.len(), "Decompressed gzip attachment");

    let mut scratch = ScratchArea::new();
    scratch.insert(xml_name, contents);
    Ok(scratch)
}

/// Unpacks every member of a zip attachment, flattened to its final path component.
fn extract_zip(payload: &[u8], config: &Config) -> Result<ScratchArea> {
    let mut archive = ZipArchive::new(Cursor::new(payload))?;
    if archive.len() > config.max_files_in_zip {
        return Err(DmarcError::FileTooLarge(format!(
            "zip holds {} members, limit is {}",
            archive.len(),
            config.max_files_in_zip
        )));
    }

    let mut scratch = ScratchArea::new();
    let mut remaining = config.max_decompressed_size;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.is_dir() {
            continue;
        }
        let inner_name = member.name().to_string();
        let Some(name) = flattened_name(&inner_name) else {
            debug!(member = %inner_name, "Skipping zip member without a usable name");
            continue;
        };
        let contents = read_limited(&mut member, remaining, &inner_name)?;
        remaining -= contents.len();
        debug!(member = %inner_name, file_name = %name, bytes = contents.len(), "Unpacked zip member");
        scratch.insert(name, contents);
    }
    Ok(scratch)
}

/// Takes the filename out of a raw Content-Disposition value: the text after
/// the first `=` up to the next `=`, with double quotes removed.
pub fn disposition_filename(header: &str) -> Option<String> {
    header.split('=').nth(1).map(|value| value.replace('"', ""))
}

/// Drops the last three characters of `name`.
pub fn gzip_report_name(name: &str) -> String {
    let keep = name.chars().count().saturating_sub(3);
    name.chars().take(keep).collect()
}

fn flattened_name(member_path: &str) -> Option<&str> {
    let name = member_path.rsplit(|c| c == '/' || c == '\\').next()?;
    match name {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

fn read_limited<R: Read>(reader: R, limit: usize, label: &str) -> Result<Vec<u8>> {
    let mut contents = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut contents)?;
    if contents.len() > limit {
        return Err(DmarcError::FileTooLarge(format!(
            "{} decompresses beyond {} bytes",
            label, limit
        )));
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zip_of(members: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn attachment(content_type: &str, file_name: &str, payload: Vec<u8>) -> ReportAttachment {
        ReportAttachment {
            content_type: content_type.to_string(),
            file_name: file_name.to_string(),
            content_disposition: Some(format!("attachment; filename=\"{}\"", file_name)),
            payload,
        }
    }

    fn names(scratch: &ScratchArea) -> Vec<&str> {
        scratch.names().collect()
    }

    #[test]
    fn test_gzip_checked_before_zip() {
        assert_eq!(
            AttachmentKind::classify("application/gzip", "r.zip"),
            AttachmentKind::Gzip
        );
        assert_eq!(
            AttachmentKind::classify("application/x-gzip", ""),
            AttachmentKind::Gzip
        );
        assert_eq!(
            AttachmentKind::classify("application/octet-stream", "report.gzip"),
            AttachmentKind::Gzip
        );
        assert_eq!(
            AttachmentKind::classify("application/x-zip-compressed", "r"),
            AttachmentKind::Zip
        );
        assert_eq!(
            AttachmentKind::classify("application/octet-stream", "google.com!example.com.zip"),
            AttachmentKind::Zip
        );
        assert_eq!(
            AttachmentKind::classify("text/plain", "readme.txt"),
            AttachmentKind::Unrecognized
        );
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename("attachment; filename=\"report.xml.gz\"").as_deref(),
            Some("report.xml.gz")
        );
        assert_eq!(
            disposition_filename("attachment;\r\n filename=r.xml.gz").as_deref(),
            Some("r.xml.gz")
        );
        assert_eq!(disposition_filename("attachment"), None);
    }

    #[test]
    fn test_gzip_report_name_trims_three_chars() {
        assert_eq!(gzip_report_name("report.xml.gz"), "report.xml");
        assert_eq!(gzip_report_name("report.xml.gzip"), "report.xml.g");
        assert_eq!(gzip_report_name("gz"), "");
        assert_eq!(gzip_report_name("rapport-é.gz"), "rapport-é");
    }

    #[test]
    fn test_gzip_attachment() -> Result<()> {
        let xml = b"<feedback><record/></feedback>";
        let att = attachment("application/gzip", "report.xml.gz", gzip(xml));
        let DecodeOutcome::Decoded(scratch) = decode_attachment(&att, &Config::default())? else {
            panic!("expected decoded output");
        };
        assert_eq!(names(&scratch), vec!["report.xml"]);
        assert_eq!(scratch.xml_files().next().unwrap().contents, xml.to_vec());
        Ok(())
    }

    #[test]
    fn test_gzip_name_is_flattened() -> Result<()> {
        for file_name in ["dir/r.xml.gz", "../../r.xml.gz", "a\\b\\r.xml.gz"] {
            let att = attachment("application/gzip", file_name, gzip(b"<feedback/>"));
            let DecodeOutcome::Decoded(scratch) = decode_attachment(&att, &Config::default())? else {
                panic!("expected decoded output");
            };
            assert_eq!(names(&scratch), vec!["r.xml"], "for {:?}", file_name);
        }
        Ok(())
    }

    #[test]
    fn test_concatenated_gzip_members() -> Result<()> {
        let mut payload = gzip(b"<feedback><record/>");
        payload.extend(gzip(b"<record/></feedback>"));
        let att = attachment("application/gzip", "split.xml.gz", payload);
        let DecodeOutcome::Decoded(scratch) = decode_attachment(&att, &Config::default())? else {
            panic!("expected decoded output");
        };
        assert_eq!(
            scratch.xml_files().next().unwrap().contents,
            b"<feedback><record/><record/></feedback>".to_vec()
        );
        Ok(())
    }

    #[test]
    fn test_gzip_without_disposition_fails() {
        let mut att = attachment("application/gzip", "report.xml.gz", gzip(b"<a/>"));
        att.content_disposition = None;
        assert!(matches!(
            decode_attachment(&att, &Config::default()),
            Err(DmarcError::Attachment(_))
        ));
    }

    #[test]
    fn test_zip_extracts_every_member() -> Result<()> {
        let payload = zip_of(&[
            ("a.xml", "<a/>"),
            ("b.xml", "<b/>"),
            ("c.txt", "not a report"),
        ]);
        let att = attachment("application/zip", "reports.zip", payload);
        let DecodeOutcome::Decoded(scratch) = decode_attachment(&att, &Config::default())? else {
            panic!("expected decoded output");
        };
        assert_eq!(names(&scratch), vec!["a.xml", "b.xml", "c.txt"]);
        let swept: Vec<&str> = scratch.xml_files().map(|f| f.name.as_str()).collect();
        assert_eq!(swept, vec!["a.xml", "b.xml"]);
        Ok(())
    }

    #[test]
    fn test_zip_members_are_flattened() -> Result<()> {
        let payload = zip_of(&[("nested/dir/report.xml", "<r/>"), ("../../evil.xml", "<e/>")]);
        let scratch = extract_zip(&payload, &Config::default())?;
        assert_eq!(names(&scratch), vec!["report.xml", "evil.xml"]);
        Ok(())
    }

    #[test]
    fn test_unrecognized_attachment() -> Result<()> {
        let att = attachment("text/plain", "notes.txt", b"hello".to_vec());
        match decode_attachment(&att, &Config::default())? {
            DecodeOutcome::Unrecognized { content_type } => assert_eq!(content_type, "text/plain"),
            other => panic!("expected unrecognized, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_decompressed_size_limit() {
        let config = Config {
            max_decompressed_size: 16,
            ..Config::default()
        };
        let att = attachment("application/gzip", "big.xml.gz", gzip(&[b'A'; 64]));
        assert!(matches!(
            decode_attachment(&att, &config),
            Err(DmarcError::FileTooLarge(_))
        ));

        let payload = zip_of(&[("a.xml", "AAAAAAAAAA"), ("b.xml", "BBBBBBBBBB")]);
        assert!(matches!(
            extract_zip(&payload, &config),
            Err(DmarcError::FileTooLarge(_))
        ));
    }

    #[test]
    fn test_member_count_limit() {
        let config = Config {
            max_files_in_zip: 1,
            ..Config::default()
        };
        let payload = zip_of(&[("a.xml", "<a/>"), ("b.xml", "<b/>")]);
        assert!(matches!(
            extract_zip(&payload, &config),
            Err(DmarcError::FileTooLarge(_))
        ));
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let att = attachment("application/gzip", "r.xml.gz", b"not gzip at all".to_vec());
        assert!(decode_attachment(&att, &Config::default()).is_err());
    }
}
