use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::genre::IndexGenre;
use crate::types::{IndexEntryPart, IndexReference};

/// Shorter than a real entry can be.
const MIN_TEXT_LEN: usize = 5;
/// Longer than a real entry can be; usually a page merge error upstream.
const MAX_TEXT_LEN: usize = 3000;

/// Punctuation allowed inside label tokens alongside alphabetic
/// characters. Digits never appear in a label token.
const LABEL_PUNCT: &str = "\"'.’-—:“”‘’&()/«»?,;";

/// One grammar match: an entry plus the unconsumed remainder, which the
/// entry loop feeds back in until the string is exhausted.
struct EntryMatch {
    label: String,
    locus: Option<String>,
    occurrences: Vec<String>,
    rest: String,
    note: Option<String>,
}

/// Parse a raw index-section string under its genre's grammar.
///
/// Genres without a reliable grammar (bibliographicus, epigraphic,
/// museum, unknown) are reported unparsed rather than guessed at.
/// The `inline` flag selects the simpler free-text citation grammar
/// used for citations embedded in running prose.
pub fn parse_index_text(text: &str, genres: &[IndexGenre], inline: bool) -> Vec<IndexEntryPart> {
    let text = normalize_whitespace(text);
    let len = text.chars().count();
    if len < MIN_TEXT_LEN {
        warn!(%text, "index text is too short");
        return Vec::new();
    }
    if len > MAX_TEXT_LEN {
        warn!(len, "index text is too long");
        return Vec::new();
    }
    let Some(genre) = genres.first() else {
        warn!(%text, "unclassified index");
        return Vec::new();
    };

    let mut parts = Vec::new();
    let parsed = match genre {
        IndexGenre::Locorum => {
            if inline {
                parse_locorum_inline(&text, &mut parts)
            } else {
                parse_entry_loop(&text, parse_locorum_entry, &mut parts)
            }
        }
        IndexGenre::Rerum | IndexGenre::Verborum | IndexGenre::Geographicus => {
            parse_entry_loop(&text, parse_generic_entry, &mut parts)
        }
        IndexGenre::NominumAncient | IndexGenre::NominumModern => {
            parse_generic_single(&text, &mut parts)
        }
        IndexGenre::Bibliographicus
        | IndexGenre::Epigraphic
        | IndexGenre::Museum
        | IndexGenre::Unknown => {
            warn!(genre = genre.as_str(), %text, "no grammar for index genre");
            false
        }
    };
    if !parsed && parts.is_empty() {
        warn!(genre = genre.as_str(), %text, "failed to parse index text");
    }
    parts
}

/// Parse raw segmented items into index references, one per item.
pub fn build_index_references(
    items: &[String],
    genres: &[IndexGenre],
    inline: bool,
) -> Vec<IndexReference> {
    items
        .iter()
        .enumerate()
        .map(|(idx, text)| {
            let parts = parse_index_text(text, genres, inline);
            if parts.is_empty() {
                warn!(%text, "unparsed index reference");
            }
            IndexReference {
                uuid: Uuid::new_v4(),
                text: text.clone(),
                ref_num: idx + 1,
                types: genres.to_vec(),
                parts,
                external_links: Vec::new(),
            }
        })
        .collect()
}

/// Match one entry at a time, continuing on the unconsumed remainder
/// until the string is exhausted. A remainder that matches no entry is
/// attached to the final part as its note.
fn parse_entry_loop(
    text: &str,
    entry: fn(&str) -> Option<EntryMatch>,
    parts: &mut Vec<IndexEntryPart>,
) -> bool {
    let mut remaining = text.trim().to_string();
    loop {
        let Some(m) = entry(&remaining) else {
            if parts.is_empty() {
                return false;
            }
            if let Some(last) = parts.last_mut() {
                last.note = Some(remaining);
            }
            return true;
        };
        push_part(parts, m.label, m.locus, m.occurrences, m.note);
        let rest = m.rest.trim();
        if rest.is_empty() {
            return true;
        }
        if rest == remaining {
            // No forward progress; bail out instead of spinning.
            if let Some(last) = parts.last_mut() {
                last.note = Some(rest.to_string());
            }
            return true;
        }
        remaining = rest.to_string();
    }
}

/// Nominum entries are single-headed: one label, its occurrences, and
/// whatever trails becomes the note.
fn parse_generic_single(text: &str, parts: &mut Vec<IndexEntryPart>) -> bool {
    match parse_generic_entry(text) {
        Some(m) => {
            let note = if m.rest.trim().is_empty() { m.note } else { Some(m.rest.trim().to_string()) };
            push_part(parts, m.label, m.locus, m.occurrences, note);
            true
        }
        None => false,
    }
}

fn push_part(
    parts: &mut Vec<IndexEntryPart>,
    label: String,
    locus: Option<String>,
    occurrences: Vec<String>,
    note: Option<String>,
) {
    let mut label = label.trim().to_string();
    if label.ends_with(',') {
        label.pop();
    }
    let is_footnote = occurrences.iter().any(|o| o.contains('n'));
    parts.push(IndexEntryPart {
        label,
        locus,
        occurrences,
        note: note.filter(|n| !n.trim().is_empty()),
        is_bold: false,
        is_footnote,
    });
}

/// Locorum grammar: `label := run of alphabetic/punctuation tokens`,
/// `locus := numeric fragment, optionally "ff."-suffixed or slash-joined
/// for nested citation`, `occurrences := comma-delimited page numbers`.
fn parse_locorum_entry(text: &str) -> Option<EntryMatch> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut i = 0;

    let label = take_label(&tokens, &mut i);
    if i == tokens.len() {
        if label.is_empty() {
            return None;
        }
        return Some(EntryMatch { label, locus: None, occurrences: Vec::new(), rest: String::new(), note: None });
    }

    let locus_start = i;
    let locus = take_locus(&tokens, &mut i);
    let occurrences = locus.is_some().then(|| take_comma_numbers(&tokens, &mut i)).flatten();

    match (locus, occurrences) {
        (Some(locus), Some(occurrences)) => Some(EntryMatch {
            label,
            locus: Some(locus),
            occurrences,
            rest: tokens[i..].join(" "),
            note: None,
        }),
        // Locus-and-occurrences group failed as a whole: keep the label
        // and surface the remainder as the note instead of dropping it.
        _ => {
            if label.is_empty() {
                return None;
            }
            Some(EntryMatch {
                label,
                locus: None,
                occurrences: Vec::new(),
                rest: String::new(),
                note: Some(tokens[locus_start..].join(" ")),
            })
        }
    }
}

/// Generic grammar (rerum / nominum / verborum / geographicus):
/// `label := alphabetic tokens with embedded punctuation`, then page
/// numbers/ranges (en-dash ranges, "n" footnote suffix), then an optional
/// `see`/`see also` alias list which is consumed but not retained.
fn parse_generic_entry(text: &str) -> Option<EntryMatch> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut i = 0;

    let label = take_label(&tokens, &mut i);
    if label.is_empty() {
        return None;
    }

    let mut occurrences = Vec::new();
    while i < tokens.len() {
        let token = tokens[i];
        if token == "," || token == ";" || token == "f." {
            i += 1;
            continue;
        }
        let core = token.trim_end_matches([',', ';']);
        if is_page_run(core) {
            occurrences.push(core.to_string());
            i += 1;
        } else {
            break;
        }
    }

    skip_alias_list(&tokens, &mut i);

    Some(EntryMatch {
        label,
        locus: None,
        occurrences,
        rest: tokens[i..].join(" "),
        note: None,
    })
}

/// Inline citation grammar for free-text references in running prose:
/// semicolon-delimited `work, locus(-locus)` citations, where the comma
/// or dot separates the hierarchical levels of the cited work.
fn parse_locorum_inline(text: &str, parts: &mut Vec<IndexEntryPart>) -> bool {
    static INLINE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?x)
            ^\s*
            (?P<label>(?:[\p{L}.]+[\s,]+)*)
            (?:(?P<l1>\d+)[,.])?(?P<n1>\d+)
            (?:
                \s*-\s*(?:(?P<e1>\d+)[,.])?(?P<e2>\d+)
              | \s+(?P<sq>s\.)
            )?
            \s*$",
        )
        .unwrap()
    });

    let mut matched = Vec::new();
    for citation in text.split(';') {
        let Some(caps) = INLINE_RE.captures(citation) else {
            return false;
        };
        let label = caps["label"].trim_end_matches([' ', ',']).trim().to_string();
        let mut locus = match caps.name("l1") {
            Some(l1) => format!("{}.{}", l1.as_str(), &caps["n1"]),
            None => caps["n1"].to_string(),
        };
        if let Some(e2) = caps.name("e2") {
            locus.push('-');
            if let Some(e1) = caps.name("e1") {
                locus.push_str(e1.as_str());
                locus.push('.');
            }
            locus.push_str(e2.as_str());
        } else if caps.name("sq").is_some() {
            locus.push_str(" s.");
        }
        matched.push((label, locus));
    }
    for (label, locus) in matched {
        parts.push(IndexEntryPart { label, locus: Some(locus), ..Default::default() });
    }
    true
}

fn take_label(tokens: &[&str], i: &mut usize) -> String {
    let start = *i;
    while *i < tokens.len() && is_label_token(tokens[*i]) {
        *i += 1;
    }
    tokens[start..*i].join(" ")
}

fn is_label_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| c.is_alphabetic() || LABEL_PUNCT.contains(c))
}

/// A locus fragment: digits with `.`, `–`, `=` or an embedded slash for
/// nested citation. A spaced "ff." suffix or "/" joiner is fused in.
fn take_locus(tokens: &[&str], i: &mut usize) -> Option<String> {
    if *i >= tokens.len() || !is_locus_fragment(tokens[*i]) {
        return None;
    }
    let mut locus = tokens[*i].to_string();
    *i += 1;
    if *i < tokens.len() && tokens[*i] == "ff." {
        locus.push_str("ff.");
        *i += 1;
    }
    if *i + 1 < tokens.len() && tokens[*i] == "/" && is_locus_fragment(tokens[*i + 1]) {
        locus.push('/');
        locus.push_str(tokens[*i + 1]);
        *i += 2;
        if *i < tokens.len() && tokens[*i] == "ff." {
            locus.push_str("ff.");
            *i += 1;
        }
    }
    Some(locus)
}

fn is_locus_fragment(token: &str) -> bool {
    !token.is_empty()
        && token.chars().any(|c| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '–' | '=' | '/'))
}

/// Comma-delimited page numbers: the first stands alone, successors only
/// count when joined by a comma.
fn take_comma_numbers(tokens: &[&str], i: &mut usize) -> Option<Vec<String>> {
    let mut numbers = Vec::new();
    while *i < tokens.len() {
        let token = tokens[*i];
        let joined = token.ends_with(',');
        let core = token.trim_end_matches(',');
        if core.is_empty() || !core.chars().all(|c| c.is_ascii_digit()) {
            break;
        }
        numbers.push(core.to_string());
        *i += 1;
        if !joined {
            if *i < tokens.len() && tokens[*i] == "," {
                *i += 1;
            } else {
                break;
            }
        }
    }
    if numbers.is_empty() { None } else { Some(numbers) }
}

/// A page number or en-dash range, optionally carrying the "n" footnote
/// suffix (e.g. "196n", "89–92").
fn is_page_run(token: &str) -> bool {
    !token.is_empty()
        && token.chars().next().is_some_and(|c| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_digit() || c == 'n' || c == '–')
}

/// Consume a `see` / `see also` cross-reference alias list. The aliases
/// themselves are not retained.
fn skip_alias_list(tokens: &[&str], i: &mut usize) {
    if *i >= tokens.len() || !tokens[*i].eq_ignore_ascii_case("see") {
        return;
    }
    *i += 1;
    if *i < tokens.len() && tokens[*i].eq_ignore_ascii_case("also") {
        *i += 1;
    }
    while *i < tokens.len() {
        let token = tokens[*i];
        if token == "," || token == ";" {
            *i += 1;
            continue;
        }
        let core = token.trim_end_matches([',', ';']);
        if !core.is_empty() && core.chars().all(|c| c.is_alphabetic()) {
            *i += 1;
        } else {
            break;
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
