//! Scratch Area Module
//!
//! Invocation-local buffer between decoding an attachment and uploading its
//! reports. It is owned by a single invocation, so concurrent invocations never
//! share scratch state. Entries behave like files in one flat directory: a
//! later entry with the same name replaces the earlier one.

/// Suffix an entry must carry to be uploaded.
pub const XML_SUFFIX: &str = ".xml";

/// A named byte sequence produced by the attachment decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedXmlFile {
    pub name: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ScratchArea {
    entries: Vec<ExtractedXmlFile>,
}

impl ScratchArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: Vec<u8>) {
        let name = name.into();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(existing) => existing.contents = contents,
            None => self.entries.push(ExtractedXmlFile { name, contents }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Entries the upload sweep picks up: names ending in `.xml`, case-sensitive.
    pub fn xml_files(&self) -> impl Iterator<Item = &ExtractedXmlFile> {
        self.entries
            .iter()
            .filter(|entry| entry.name.ends_with(XML_SUFFIX))
    }
}
