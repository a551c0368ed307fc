use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::config::ParserConfig;
use crate::types::Page;

/// Which side of a facing-page spread a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageParity {
    Odd,
    Even,
}

/// Non-fatal layout findings. Processing always continues with
/// best-effort columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LayoutWarning {
    /// More than two accepted starts: multi-column or unusual format.
    MultiColumn { parity: PageParity, starts: Vec<i64> },
    /// Every surviving offset was accepted: no discernible indent-based
    /// structure; segmentation will mostly concatenate page text.
    NoIndent { parity: PageParity },
    /// Odd and even pages disagree on the number of columns.
    ParityMismatch { odd: usize, even: usize },
}

/// Detected record-start offsets, one set per page parity. Derived once
/// per document and treated as read-only by the segmenter.
///
/// Invariant: each set is strictly increasing and consecutive offsets are
/// more than `indent` apart.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStarts {
    pub odd: Vec<i64>,
    pub even: Vec<i64>,
    pub warnings: Vec<LayoutWarning>,
}

/// First pass over the whole document: build per-parity histograms of
/// rounded line origins and reduce them to accepted column starts.
pub fn compute_column_starts(pages: &[Page], config: &ParserConfig) -> ColumnStarts {
    let mut odd_counter: BTreeMap<i64, usize> = BTreeMap::new();
    let mut even_counter: BTreeMap<i64, usize> = BTreeMap::new();

    for page in pages {
        let counter = if page.number % 2 == 1 {
            &mut odd_counter
        } else {
            &mut even_counter
        };
        for line in &page.lines {
            *counter.entry(line.x.round() as i64).or_insert(0) += 1;
        }
    }

    let mut warnings = Vec::new();
    let odd = accept_starts(&odd_counter, pages.len(), config, PageParity::Odd, &mut warnings);
    let even = accept_starts(&even_counter, pages.len(), config, PageParity::Even, &mut warnings);

    if odd.len() > 2 || even.len() > 2 {
        warn!(odd = ?odd, even = ?even, "multi-column or unusual format");
        if odd.len() > 2 {
            warnings.push(LayoutWarning::MultiColumn { parity: PageParity::Odd, starts: odd.clone() });
        }
        if even.len() > 2 {
            warnings.push(LayoutWarning::MultiColumn { parity: PageParity::Even, starts: even.clone() });
        }
    }
    if odd.len() != even.len() {
        warn!(odd = odd.len(), even = even.len(), "layout differs for odd and even pages");
        warnings.push(LayoutWarning::ParityMismatch { odd: odd.len(), even: even.len() });
    }

    ColumnStarts { odd, even, warnings }
}

/// Keep offsets that recur more often than `noise` times per page, then
/// walk them in ascending order, accepting an offset only when it lies
/// more than `indent` past every previously accepted start. Offsets
/// closer than that are character-width jitter within one column.
fn accept_starts(
    counter: &BTreeMap<i64, usize>,
    page_count: usize,
    config: &ParserConfig,
    parity: PageParity,
    warnings: &mut Vec<LayoutWarning>,
) -> Vec<i64> {
    let surviving: Vec<i64> = counter
        .iter()
        .filter(|&(_, &freq)| freq > config.noise * page_count)
        .map(|(&offset, _)| offset)
        .collect();

    let mut starts: Vec<i64> = Vec::new();
    for &offset in &surviving {
        if starts.iter().all(|&s| offset > s + config.indent) {
            starts.push(offset);
        }
    }

    if !surviving.is_empty() && surviving.len() == starts.len() {
        warn!(?parity, "no-indent formatting");
        warnings.push(LayoutWarning::NoIndent { parity });
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositionedTextLine;

    fn line(x: f32, text: &str) -> PositionedTextLine {
        PositionedTextLine { x, y: 0.0, width: 200.0, height: 10.0, text: text.to_string() }
    }

    fn single_page(xs: &[f32]) -> Vec<Page> {
        vec![Page { number: 1, lines: xs.iter().map(|&x| line(x, "text")).collect() }]
    }

    #[test]
    fn jitter_collapses_into_one_column() {
        // 90 and 95 are within `indent` of 88: one physical column.
        let xs: Vec<f32> = [88.0, 90.0, 95.0].repeat(10).to_vec();
        let starts = compute_column_starts(&single_page(&xs), &ParserConfig { noise: 1, ..Default::default() });
        assert_eq!(starts.odd, vec![88]);
    }

    #[test]
    fn noise_threshold_drops_rare_offsets() {
        let mut xs = vec![90.0; 20];
        xs.extend([500.0; 2]); // page number: recurs below the noise floor
        let starts = compute_column_starts(&single_page(&xs), &ParserConfig { noise: 3, ..Default::default() });
        assert_eq!(starts.odd, vec![90]);
    }

    #[test]
    fn accepted_starts_separated_by_more_than_indent() {
        let xs: Vec<f32> = [60.0, 120.0, 260.0, 430.0].repeat(10).to_vec();
        let config = ParserConfig { noise: 1, indent: 150, ..Default::default() };
        let starts = compute_column_starts(&single_page(&xs), &config);
        for pair in starts.odd.windows(2) {
            assert!(pair[1] - pair[0] > config.indent);
        }
    }

    #[test]
    fn more_than_two_starts_is_a_warning_not_an_error() {
        let xs: Vec<f32> = [10.0, 200.0, 400.0, 600.0].repeat(10).to_vec();
        let starts = compute_column_starts(&single_page(&xs), &ParserConfig { noise: 1, ..Default::default() });
        assert_eq!(starts.odd.len(), 4);
        assert!(starts
            .warnings
            .iter()
            .any(|w| matches!(w, LayoutWarning::MultiColumn { parity: PageParity::Odd, .. })));
    }

    #[test]
    fn parity_mismatch_is_reported() {
        let odd_page = Page { number: 1, lines: (0..10).map(|_| line(90.0, "r")).collect() };
        let even_lines = (0..10).flat_map(|_| [line(90.0, "r"), line(400.0, "r")]).collect();
        let even_page = Page { number: 2, lines: even_lines };
        let starts = compute_column_starts(&[odd_page, even_page], &ParserConfig { noise: 1, ..Default::default() });
        assert!(starts
            .warnings
            .iter()
            .any(|w| matches!(w, LayoutWarning::ParityMismatch { odd: 1, even: 2 })));
    }
}
