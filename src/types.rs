use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::genre::IndexGenre;

/// One visually contiguous line of glyphs on a page, with its position
/// and extent in page coordinates. Produced by the upstream page decoder;
/// consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionedTextLine {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
}

/// All positioned lines on a single page. Page numbers are 1-based;
/// parity (odd/even) selects which column-start set applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub lines: Vec<PositionedTextLine>,
}

/// A line that matched no known column and was not appended anywhere.
/// Kept for quality evaluation, never silently dropped.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSpan {
    /// Number of records already closed when this line was skipped.
    pub after_record: usize,
    pub text: String,
}

/// A confidence-scored link to an external knowledge base, attached to a
/// record by a later disambiguation stage. This core only carries them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    pub uri: String,
    pub source: String,
    pub confidence: f64,
}

/// A parsed bibliographic reference.
#[derive(Debug, Clone, Serialize)]
pub struct BibliographicReference {
    pub uuid: Uuid,
    pub text: String,
    /// 1-based position within the extracted reference list.
    pub ref_num: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_by_doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_by_zip: Option<String>,
    /// Index of the preceding reference this entry's repetition marker
    /// ("——.") stands in for. A non-owning handle, not a live pointer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follows: Option<usize>,
    pub external_links: Vec<ExternalLink>,
}

/// One semantic unit inside a (possibly multi-entry) index line.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexEntryPart {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locus: Option<String>,
    pub occurrences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub is_bold: bool,
    pub is_footnote: bool,
}

/// A parsed index entry. OCR/typeset index lines often pack several
/// logical entries per physical block, so one reference owns 1..n parts.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReference {
    pub uuid: Uuid,
    pub text: String,
    pub ref_num: usize,
    pub types: Vec<IndexGenre>,
    pub parts: Vec<IndexEntryPart>,
    pub external_links: Vec<ExternalLink>,
}
