//! Data Models Module
//!
//! Flat output records produced by the transformer. Field order is fixed and
//! every field is always present, so records are stored as ordered
//! `(key, value)` lists and serialized by hand rather than through derive.

use crate::error::Result;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Value used for any field whose XML path is absent.
pub const MISSING: &str = "none";

/// One DKIM signature evaluation inside a record's `dkim` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimRecord {
    fields: Vec<(&'static str, String)>,
}

/// One authentication-evaluation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    fields: Vec<(&'static str, String)>,
    dkim: Vec<DkimRecord>,
}

impl DkimRecord {
    pub fn new(fields: Vec<(&'static str, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.fields, key)
    }
}

impl FlatRecord {
    pub fn new(fields: Vec<(&'static str, String)>, dkim: Vec<DkimRecord>) -> Self {
        Self { fields, dkim }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.fields, key)
    }

    pub fn dkim(&self) -> &[DkimRecord] {
        &self.dkim
    }

    /// Output keys in serialization order, `dkim` last.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .map(|(key, _)| *key)
            .chain(std::iter::once("dkim"))
    }
}

fn lookup<'a>(fields: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.as_str())
}

impl Serialize for DkimRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for FlatRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("dkim", &self.dkim)?;
        map.end()
    }
}

/// Serializes records as newline-delimited JSON, one `\n`-terminated line each.
pub fn to_ndjson(records: &[FlatRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buffer, record)?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}
