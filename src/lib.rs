//! DMARC Ingest Library
//!
//! This library implements a two-stage pipeline for DMARC aggregate reports kept
//! in a bucket-style object store. The extractor unpacks the gzip or zip report
//! attached to a raw email into XML objects; the transformer flattens each XML
//! report into newline-delimited JSON records, one per evaluated source and
//! DKIM signatures nested per record.

pub mod clock;
pub mod config;
pub mod email;
pub mod error;
pub mod event;
pub mod extractor;
pub mod models;
pub mod scratch;
pub mod storage;
pub mod transformer;
pub mod xml_parser;
pub mod zip_handler;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{DmarcError, Result};
pub use event::{ObjectCreatedEvent, ObjectRef};
pub use extractor::{run_extractor, ExtractOutcome};
pub use storage::{LocalStore, MemoryStore, ObjectStore, WaitPolicy};
pub use transformer::{run_transformer, TransformOutcome};
pub use xml_parser::{parse_dmarc_bytes, parse_dmarc_xml, ParseOutcome};
