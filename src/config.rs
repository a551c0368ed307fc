use serde::{Deserialize, Serialize};

/// Knobs for the indentation-based layout analyzer and segmenter.
/// All defaults are overridable per call; nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Maximal horizontal offset for a line to count as a continuation
    /// of the previous one. Also the minimal separation between two
    /// accepted column starts.
    pub indent: i64,
    /// Per-page frequency floor for an offset to count as a column start.
    /// Removes running heads, page numbers, footnotes.
    pub noise: usize,
    /// Minimal record length, to exclude page numbers, titles, etc.
    pub min_length: usize,
    /// Maximal record length, to exclude mis-segmented article content.
    pub max_length: usize,
    /// Minimal number of words in a record.
    pub min_words: usize,
    /// Maximal number of words in a record.
    pub max_words: usize,
    /// How many leading lines to sample when probing for the
    /// dot-terminated convention.
    pub sample_lines: usize,
    /// How many sampled lines must end with a full stop before the
    /// document is treated as dot-terminated.
    pub dot_majority: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            indent: 150,
            noise: 3,
            min_length: 30,
            max_length: 300,
            min_words: 3,
            max_words: 100,
            sample_lines: 500,
            dot_majority: 100,
        }
    }
}
