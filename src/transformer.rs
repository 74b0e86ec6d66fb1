//! Transformer Entry Point
//!
//! Fetches one extracted XML report, refuses it if it trips the injection guard,
//! flattens it and writes the records as newline-delimited JSON to
//! `{destination}/{filename}.json`.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{DmarcError, Result};
use crate::event::{ObjectCreatedEvent, ObjectRef};
use crate::models::to_ndjson;
use crate::storage::ObjectStore;
use crate::xml_parser::{contains_injection_marker, parse_dmarc_bytes, ParseOutcome};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Written {
        bucket: String,
        key: String,
        records: usize,
    },
    /// The report was not well-formed XML; nothing was written.
    SkippedMalformed { reason: String },
}

/// Runs the Transformer for one object-created event under the configured deadline.
pub async fn run_transformer(
    event: &ObjectCreatedEvent,
    store: &dyn ObjectStore,
    config: &Config,
    clock: &dyn Clock,
) -> Result<TransformOutcome> {
    let target = event.target()?;
    let span = info_span!(
        "transform",
        invocation = %Uuid::new_v4(),
        bucket = %target.bucket,
        key = %target.key
    );
    let deadline = config.invocation_timeout;
    tokio::time::timeout(deadline, transform(&target, store, config, clock).instrument(span))
        .await
        .map_err(|_| DmarcError::DeadlineExceeded(deadline))?
}

async fn transform(
    target: &ObjectRef,
    store: &dyn ObjectStore,
    config: &Config,
    clock: &dyn Clock,
) -> Result<TransformOutcome> {
    let destination = config.require_output_bucket()?;
    let file_name = report_file_name(&target.key);

    debug!(state = "fetch", "Getting report content");
    let raw = store.get(&target.bucket, &target.key).await?;

    debug!(state = "validate", bytes = raw.len(), "Checking for injection markers");
    if contains_injection_marker(&raw) {
        return Err(DmarcError::InjectionAttempt {
            bucket: target.bucket.clone(),
            key: target.key.clone(),
        });
    }

    debug!(state = "parse", "Parsing XML into records");
    let records = match parse_dmarc_bytes(&raw, &file_name, &clock.timestamp()) {
        ParseOutcome::Records(records) => records,
        ParseOutcome::Malformed(reason) => {
            warn!(file_name = %file_name, reason = %reason, state = "done", "Not well formed; skipping report");
            return Ok(TransformOutcome::SkippedMalformed { reason });
        }
    };

    let key = format!("{}.json", file_name);
    debug!(state = "upload", records = records.len(), key = %key, "Uploading records");
    store.put(destination, &key, to_ndjson(&records)?).await?;
    info!(state = "done", records = records.len(), destination, key = %key, "Transformation complete");

    Ok(TransformOutcome::Written {
        bucket: destination.to_string(),
        key,
        records: records.len(),
    })
}

/// Source filename without its extension: everything after the last `.` of the
/// key is dropped, then the last `/` segment is kept.
pub fn report_file_name(key: &str) -> String {
    let stem = key.rsplit_once('.').map_or(key, |(stem, _)| stem);
    stem.rsplit('/').next().unwrap_or(stem).to_string()
}
