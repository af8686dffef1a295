//! In-memory corpus collection.
//!
//! The processed corpus is a JSON array produced by the offline packaging
//! step; each record carries the passage text plus sura/ayah metadata and a
//! `kaynak_tipi` of "Meal" (translation) or "Tefsir" (commentary). Loaded
//! once at startup, read-only afterwards.

use std::path::Path;

use serde::Deserialize;

use crate::canon;
use crate::error::CorpusError;
use crate::models::{SourceKind, VerseDocument};

#[derive(Debug, Deserialize)]
struct RawRecord {
    page_content: String,
    metadata: RawMetadata,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    sure_name: String,
    ayet_no: u32,
    kaynak_tipi: String,
}

#[derive(Clone)]
pub struct CorpusStore {
    documents: Vec<VerseDocument>,
}

impl CorpusStore {
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        if !path.exists() {
            return Err(CorpusError::NotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path)?;
        let records: Vec<RawRecord> = serde_json::from_str(&raw)?;
        if records.is_empty() {
            return Err(CorpusError::Empty);
        }

        let documents = records
            .into_iter()
            .map(|record| VerseDocument {
                content: record.page_content,
                sura_name: record.metadata.sure_name.to_lowercase(),
                ayah_number: record.metadata.ayet_no,
                kind: SourceKind::from_label(&record.metadata.kaynak_tipi),
            })
            .collect();

        Ok(Self { documents })
    }

    pub fn from_documents(documents: Vec<VerseDocument>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[VerseDocument] {
        &self.documents
    }

    /// Translation documents of `sura` within `start..=end`, ascending by
    /// ayah with one document per ayah.
    pub fn translation_slice(&self, sura: &str, start: u32, end: u32) -> Vec<VerseDocument> {
        let key = canon::fold(sura);

        let mut slice: Vec<VerseDocument> = self
            .documents
            .iter()
            .filter(|doc| {
                doc.kind == SourceKind::Translation
                    && canon::fold(&doc.sura_name) == key
                    && doc.ayah_number >= start
                    && doc.ayah_number <= end
            })
            .cloned()
            .collect();

        slice.sort_by_key(|doc| doc.ayah_number);
        slice.dedup_by_key(|doc| doc.ayah_number);
        slice
    }

    /// Translation documents carrying `ayah` in any sura. Deliberately
    /// ambiguous: the generation stage disambiguates using context.
    pub fn translations_by_ayah(&self, ayah: u32) -> Vec<VerseDocument> {
        self.documents
            .iter()
            .filter(|doc| doc.kind == SourceKind::Translation && doc.ayah_number == ayah)
            .cloned()
            .collect()
    }
}
