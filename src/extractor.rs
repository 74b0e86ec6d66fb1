//! Extractor Entry Point
//!
//! Fetches a raw report email, decodes its attachment and uploads every
//! resulting `.xml` file to `{destination}/xml/{name}`.

use crate::config::Config;
use crate::email::{find_report_attachment, AttachmentLookup};
use crate::error::{DmarcError, Result};
use crate::event::{ObjectCreatedEvent, ObjectRef};
use crate::scratch::ScratchArea;
use crate::storage::ObjectStore;
use crate::zip_handler::{decode_attachment, DecodeOutcome};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Key prefix for extracted reports in the destination bucket.
pub const OUTPUT_PREFIX: &str = "xml/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Keys written to the destination bucket, in upload order.
    Extracted { bucket: String, keys: Vec<String> },
    /// The email did not have exactly two top-level parts.
    WrongPartCount(usize),
    UnrecognizedAttachment { content_type: String },
}

/// Runs the Extractor for one object-created event under the configured deadline.
pub async fn run_extractor(
    event: &ObjectCreatedEvent,
    store: &dyn ObjectStore,
    config: &Config,
) -> Result<ExtractOutcome> {
    let target = event.target()?;
    let span = info_span!(
        "extract",
        invocation = %Uuid::new_v4(),
        bucket = %target.bucket,
        key = %target.key
    );
    let deadline = config.invocation_timeout;
    tokio::time::timeout(deadline, extract(&target, store, config).instrument(span))
        .await
        .map_err(|_| DmarcError::DeadlineExceeded(deadline))?
}

async fn extract(target: &ObjectRef, store: &dyn ObjectStore, config: &Config) -> Result<ExtractOutcome> {
    let destination = match &config.output_bucket {
        Some(bucket) => bucket.clone(),
        None => {
            info!("No destination configured; writing back to the source bucket");
            target.bucket.clone()
        }
    };

    debug!(state = "fetch", "Waiting for source object");
    store
        .wait_until_exists(&target.bucket, &target.key, &config.wait)
        .await?;
    let raw = store.get(&target.bucket, &target.key).await?;
    if raw.len() > config.max_file_size {
        return Err(DmarcError::FileTooLarge(format!(
            "{} is {} bytes, limit is {}",
            target,
            raw.len(),
            config.max_file_size
        )));
    }

    debug!(state = "classify-and-decode", bytes = raw.len(), "Parsing email");
    let attachment = match find_report_attachment(&raw)? {
        AttachmentLookup::Found(attachment) => attachment,
        AttachmentLookup::WrongPartCount(parts) => {
            info!(parts, state = "done", "Could not see file/attachment; skipping email");
            return Ok(ExtractOutcome::WrongPartCount(parts));
        }
    };
    let scratch = match decode_attachment(&attachment, config)? {
        DecodeOutcome::Decoded(scratch) => scratch,
        DecodeOutcome::Unrecognized { content_type } => {
            info!(content_type = %content_type, state = "done", "Skipping unrecognized attachment");
            return Ok(ExtractOutcome::UnrecognizedAttachment { content_type });
        }
    };

    debug!(state = "upload", entries = scratch.len(), "Sweeping scratch area");
    let keys = upload_xml_files(&scratch, store, &destination).await?;
    info!(state = "done", uploaded = keys.len(), destination = %destination, "Extraction complete");
    Ok(ExtractOutcome::Extracted {
        bucket: destination,
        keys,
    })
}

/// Uploads every `.xml` scratch entry under `xml/`, stopping at the first failure.
pub async fn upload_xml_files(
    scratch: &ScratchArea,
    store: &dyn ObjectStore,
    bucket: &str,
) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for file in scratch.xml_files() {
        let key = format!("{}{}", OUTPUT_PREFIX, file.name);
        info!(bucket, key = %key, bytes = file.contents.len(), "Uploading");
        store.put(bucket, &key, file.contents.clone()).await?;
        keys.push(key);
    }
    Ok(keys)
}
