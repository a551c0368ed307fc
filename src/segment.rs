use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::layout::ColumnStarts;
use crate::types::{Page, SkippedSpan};

/// Private-use-area range some source encodings remap digits into
/// (superscripts, footnote markers).
const PUA_DIGIT_FIRST: u32 = 0xF643;
const PUA_DIGIT_LAST: u32 = 0xF64C;

/// Second-pass output: raw record strings plus the diagnostic
/// side-channels. Nothing that entered the pass vanishes silently.
#[derive(Debug, Clone, Serialize)]
pub struct Segmentation {
    pub records: Vec<String>,
    pub skipped: Vec<SkippedSpan>,
    /// How many buffers were closed while looking unfinished.
    pub flagged_incomplete: usize,
    /// How many closed records fell outside the configured length or
    /// word-count bounds.
    pub filtered_out: usize,
}

/// Probe the leading lines of the document for the dot-terminated
/// convention: when enough of them end with a full stop, a buffer that
/// closes without one is flagged incomplete (otherwise a trailing comma
/// or dash is the incompleteness signal).
pub fn detect_dot_terminated(pages: &[Page], config: &ParserConfig) -> bool {
    let dots = pages
        .iter()
        .flat_map(|p| &p.lines)
        .take(config.sample_lines)
        .filter(|l| l.text.trim_end().ends_with('.'))
        .count();
    debug!(dots, sampled = config.sample_lines, "dot-termination probe");
    dots >= config.dot_majority
}

/// Walk all pages a second time, deciding per line whether it starts a
/// new record, continues the current one, re-stitches a record that
/// closed incomplete, or matches no known column at all.
pub fn segment(pages: &[Page], starts: &ColumnStarts, config: &ParserConfig) -> Segmentation {
    let dot_mode = detect_dot_terminated(pages, config);
    let columns = starts.odd.len().min(starts.even.len());

    let mut buffers: Vec<String> = vec![String::new(); columns];
    let mut records: Vec<String> = Vec::new();
    let mut skipped: Vec<SkippedSpan> = Vec::new();
    let mut incomplete: VecDeque<usize> = VecDeque::new();
    let mut flagged_incomplete = 0usize;

    for page in pages {
        let page_starts = if page.number % 2 == 1 { &starts.odd } else { &starts.even };
        for line in &page.lines {
            let x = line.x.round() as i64;
            let col = page_starts.iter().filter(|&&s| x >= s + config.indent).count();
            if col >= columns {
                skipped.push(SkippedSpan { after_record: records.len(), text: line.text.clone() });
                continue;
            }
            let base = page_starts[col];
            if x == base && !buffers[col].trim().is_empty() {
                // The buffer closes as a completed record; flag it first
                // so a later stray continuation can be merged back in.
                let closed = std::mem::replace(&mut buffers[col], line.text.clone());
                if looks_incomplete(&closed, dot_mode) {
                    incomplete.push_back(records.len());
                    flagged_incomplete += 1;
                }
                records.push(closed);
            } else if x >= base && x < base + config.indent {
                if let Some(idx) = incomplete.pop_front() {
                    append_line(&mut records[idx], &line.text);
                } else {
                    append_line(&mut buffers[col], &line.text);
                }
            } else {
                skipped.push(SkippedSpan { after_record: records.len(), text: line.text.clone() });
            }
        }
    }

    for buffer in buffers {
        if !buffer.trim().is_empty() {
            records.push(buffer);
        }
    }

    let decoded: Vec<String> = records.iter().map(|r| decode_private_use(r)).collect();
    let total = decoded.len();
    let records: Vec<String> = decoded
        .into_iter()
        .filter(|r| {
            let len = r.chars().count();
            let words = r.split_whitespace().count();
            config.min_length <= len
                && len <= config.max_length
                && config.min_words <= words
                && words <= config.max_words
        })
        .collect();
    let filtered_out = total - records.len();
    if filtered_out > 0 {
        warn!(filtered_out, "records outside configured length or word bounds");
    }

    Segmentation { records, skipped, flagged_incomplete, filtered_out }
}

/// Index files often wrap occurrence lists onto digit-leading lines that
/// the indent rules close as separate records; fold those back into
/// their predecessor.
pub fn merge_digit_continuations(items: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut current = String::new();
    for item in items {
        let item = item.trim();
        if item.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            append_line(&mut current, item);
        } else {
            if !current.is_empty() {
                merged.push(std::mem::take(&mut current));
            }
            current = item.to_string();
        }
    }
    if !current.is_empty() {
        merged.push(current);
    }
    merged
}

fn looks_incomplete(record: &str, dot_mode: bool) -> bool {
    let trimmed = record.trim_end();
    if dot_mode {
        !trimmed.ends_with('.')
    } else {
        trimmed.ends_with(',') || trimmed.ends_with('–')
    }
}

fn append_line(buffer: &mut String, text: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(text);
}

/// Convert remapped private-use-area code points back to the decimal
/// digits they represent.
fn decode_private_use(text: &str) -> String {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if (PUA_DIGIT_FIRST..=PUA_DIGIT_LAST).contains(&cp) {
                char::from_u32('0' as u32 + (cp - PUA_DIGIT_FIRST)).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositionedTextLine;

    fn line(x: f32, text: &str) -> PositionedTextLine {
        PositionedTextLine { x, y: 0.0, width: 300.0, height: 10.0, text: text.to_string() }
    }

    fn starts(odd: &[i64], even: &[i64]) -> ColumnStarts {
        ColumnStarts { odd: odd.to_vec(), even: even.to_vec(), warnings: Vec::new() }
    }

    fn loose_config() -> ParserConfig {
        ParserConfig { min_length: 1, max_length: 1000, ..Default::default() }
    }

    #[test]
    fn new_record_opens_at_column_start() {
        let pages = vec![Page {
            number: 1,
            lines: vec![
                line(10.0, "Alpha, B. 1990. First title of suitable length."),
                line(60.0, "continuation of the first entry."),
                line(10.0, "Gamma, D. 1991. Second title of suitable length."),
            ],
        }];
        let seg = segment(&pages, &starts(&[10], &[10]), &loose_config());
        assert_eq!(seg.records.len(), 2);
        assert_eq!(
            seg.records[0],
            "Alpha, B. 1990. First title of suitable length. continuation of the first entry."
        );
        assert!(seg.skipped.is_empty());
    }

    #[test]
    fn incomplete_record_is_restitched() {
        // Few lines, so the dot probe stays below the majority and the
        // trailing-comma signal applies.
        let pages = vec![Page {
            number: 1,
            lines: vec![
                line(10.0, "Alpha, B. 1990. A title cut off mid,"),
                line(10.0, "Gamma, D. 1991. An unrelated entry."),
                line(60.0, "phrase that finishes the first one."),
            ],
        }];
        let seg = segment(&pages, &starts(&[10], &[10]), &loose_config());
        assert_eq!(seg.flagged_incomplete, 1);
        assert_eq!(
            seg.records[0],
            "Alpha, B. 1990. A title cut off mid, phrase that finishes the first one."
        );
        assert_eq!(seg.records[1], "Gamma, D. 1991. An unrelated entry.");
    }

    #[test]
    fn fully_irregular_page_yields_only_skips() {
        let pages = vec![Page {
            number: 1,
            lines: vec![line(400.0, "way out"), line(520.0, "also out"), line(610.0, "still out")],
        }];
        let seg = segment(&pages, &starts(&[10], &[10]), &loose_config());
        assert!(seg.records.is_empty());
        assert_eq!(seg.skipped.len(), 3);
    }

    #[test]
    fn every_line_is_accounted_for() {
        let pages = vec![Page {
            number: 1,
            lines: vec![
                line(10.0, "first record text"),
                line(60.0, "continues"),
                line(700.0, "stray"),
                line(10.0, "second record text"),
            ],
        }];
        let seg = segment(&pages, &starts(&[10], &[10]), &loose_config());
        let in_records: usize = seg.records.iter().map(|r| r.split(' ').count()).sum();
        let line_words = 3 + 1 + 1 + 3;
        assert_eq!(in_records + seg.skipped.iter().map(|s| s.text.split(' ').count()).sum::<usize>(), line_words);
        assert_eq!(seg.skipped.len(), 1);
        // The first record was still open when the stray line appeared.
        assert_eq!(seg.skipped[0].after_record, 0);
    }

    #[test]
    fn length_filter_is_idempotent() {
        let config = ParserConfig { min_length: 5, max_length: 20, ..Default::default() };
        let records = vec!["ok".to_string(), "just right here".to_string(), "x".repeat(30)];
        let once: Vec<String> = records
            .into_iter()
            .filter(|r| config.min_length <= r.chars().count() && r.chars().count() <= config.max_length)
            .collect();
        let twice: Vec<String> = once
            .iter()
            .cloned()
            .filter(|r| config.min_length <= r.chars().count() && r.chars().count() <= config.max_length)
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn private_use_digits_are_decoded() {
        let remapped: String = char::from_u32(0xF643).into_iter().chain("12".chars()).collect();
        assert_eq!(decode_private_use(&remapped), "012");
    }

    #[test]
    fn dot_mode_flags_records_without_final_stop() {
        let mut lines = Vec::new();
        for i in 0..6 {
            lines.push(line(10.0, &format!("Entry number {i} closes with a stop.")));
        }
        lines.push(line(10.0, "Entry that does not close"));
        lines.push(line(10.0, "Final entry with a stop."));
        let pages = vec![Page { number: 1, lines }];
        let config = ParserConfig { dot_majority: 3, min_length: 1, max_length: 1000, ..Default::default() };
        let seg = segment(&pages, &starts(&[10], &[10]), &config);
        assert_eq!(seg.flagged_incomplete, 1);
        assert_eq!(seg.records.len(), 8);
    }

    #[test]
    fn digit_leading_items_merge_into_predecessor() {
        let items = vec![
            "Agamemnon 42–4 591, 593".to_string(),
            "48 130".to_string(),
            "Aeschines 2.157 291".to_string(),
        ];
        let merged = merge_digit_continuations(&items);
        assert_eq!(merged, vec![
            "Agamemnon 42–4 591, 593 48 130".to_string(),
            "Aeschines 2.157 291".to_string(),
        ]);
    }
}
