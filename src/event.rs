//! Trigger Event Module
//!
//! Both stages are invoked with an object-created notification. Only the first
//! record's bucket name and object key are used; the key arrives form-escaped.

use crate::error::{DmarcError, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub s3: EventEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntity {
    pub bucket: EventBucket,
    pub object: EventObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventObject {
    pub key: String,
}

/// A fully unescaped object location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

impl ObjectCreatedEvent {
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| DmarcError::Event(e.to_string()))
    }

    /// Builds a single-record event for `bucket`/`key`, escaping nothing.
    pub fn for_object(bucket: &str, key: &str) -> Self {
        ObjectCreatedEvent {
            records: vec![EventRecord {
                s3: EventEntity {
                    bucket: EventBucket {
                        name: bucket.to_string(),
                    },
                    object: EventObject {
                        key: key.to_string(),
                    },
                },
            }],
        }
    }

    /// The object named by the first record, with its key unescaped.
    pub fn target(&self) -> Result<ObjectRef> {
        let record = self
            .records
            .first()
            .ok_or_else(|| DmarcError::Event("event carries no records".into()))?;
        Ok(ObjectRef {
            bucket: record.s3.bucket.name.clone(),
            key: unquote_plus(&record.s3.object.key)?,
        })
    }
}

/// Form-style unescaping: `+` is a space, then `%XX` sequences are decoded as UTF-8.
pub fn unquote_plus(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|e| DmarcError::Event(format!("object key is not UTF-8 after unescaping: {}", e)))
}
