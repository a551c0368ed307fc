use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::types::BibliographicReference;

/// A 4-digit year, optionally suffixed with a letter or joined into a
/// range ("1923-1930", "1988a").
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}[a-z]?(?:[,–-]\d{4})?").unwrap());

/// Primary citation grammar: an author list (`FamilyName, I.` repeatable,
/// or an em-dash run standing for "same as previous entry's author",
/// optionally marked `ed`/`eds`), a year, then free text.
static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (?P<author>
            (?:
                (?:
                    \p{L}[\p{L}’'\-]+ ,\s*                 # family name
                    (?:\p{L}\.(?:-\p{L}\.)? ,?\s*)+        # initials
                  | —+ \.?,?\s*                            # repetition marker
                )
                (?:(?i:eds?)\.? ,?\s*)?
            )+
        )
        (?P<year>\d{4}[a-z]?(?:[,–-]\d{4})?)
        [.,]?\s*
        (?P<rest>.*)
        $",
    )
    .unwrap()
});

/// First curly-quoted span; the preferred source for a title.
static QUOTED_TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"“(.*?)”").unwrap());

/// Author/year/title extracted from one raw reference string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFields {
    pub author: Option<String>,
    pub year: Option<String>,
    pub title: Option<String>,
}

/// Parse a raw reference string, grammar first, heuristics second.
/// Every input yields some author/title split; nothing here fails.
pub fn parse_reference(raw: &str) -> ParsedFields {
    let text = raw.replace('\n', " ").replace('"', "”");
    let year_anywhere = YEAR_RE.find(&text).map(|m| m.as_str().to_string());

    let mut fields = match CITATION_RE.captures(&text) {
        Some(caps) => ParsedFields {
            author: Some(trim_author(&caps["author"])),
            year: Some(caps["year"].to_string()),
            title: Some(title_from_rest(&caps["rest"])),
        },
        None => fallback_parse(&text, year_anywhere.as_deref()),
    };

    if fields.year.is_none() {
        fields.year = year_anywhere;
    }
    if let Some(title) = &mut fields.title {
        *title = title.trim().to_string();
    }
    debug!(?fields, "parsed bibliographic reference");
    fields
}

/// Parse all raw segments into references, numbering them and linking
/// repetition-marker entries back to their predecessor.
pub fn build_references(records: &[String]) -> Vec<BibliographicReference> {
    let mut refs: Vec<BibliographicReference> = Vec::with_capacity(records.len());
    for (idx, text) in records.iter().enumerate() {
        let fields = parse_reference(text);
        let follows = (idx > 0 && text.starts_with("——")).then(|| idx - 1);
        refs.push(BibliographicReference {
            uuid: Uuid::new_v4(),
            text: text.clone(),
            ref_num: idx + 1,
            author: fields.author,
            title: fields.title,
            year: fields.year,
            cited_by_doi: None,
            cited_by_zip: None,
            follows,
            external_links: Vec::new(),
        });
    }
    refs
}

/// Resolve the actual author of a reference whose author field is only a
/// repetition marker, walking the `follows` chain to the nearest
/// preceding entry with a real author. The traversal is capped at the
/// list length, so a malformed chain cannot loop.
pub fn resolve_derived_author(refs: &[BibliographicReference], idx: usize) -> Option<String> {
    let mut current = idx;
    for _ in 0..refs.len() {
        let r = refs.get(current)?;
        match (&r.author, r.follows) {
            (Some(author), _) if !is_repetition_marker(author) => return Some(author.clone()),
            (_, Some(prev)) if prev < current => current = prev,
            (author, _) => return author.clone(),
        }
    }
    None
}

/// Displayable text with the repetition marker replaced by the resolved
/// author.
pub fn derived_text(refs: &[BibliographicReference], idx: usize) -> Option<String> {
    let r = refs.get(idx)?;
    let author = r.author.as_deref()?;
    let derived = resolve_derived_author(refs, idx)?;
    if author == derived {
        return Some(r.text.clone());
    }
    Some(r.text.replacen(author, &derived, 1).replace("..", "."))
}

/// Rewrite repetition-marker entries in place: the author becomes the
/// resolved one and the text shows the substitution. Runs front to back,
/// so later chain members resolve in a single hop.
pub fn apply_derived_authors(refs: &mut [BibliographicReference]) {
    for idx in 0..refs.len() {
        if refs[idx].follows.is_none() {
            continue;
        }
        let Some(author) = resolve_derived_author(refs, idx) else {
            continue;
        };
        if let Some(text) = derived_text(refs, idx) {
            refs[idx].text = text;
        }
        refs[idx].author = Some(author);
    }
}

pub fn is_repetition_marker(author: &str) -> bool {
    let trimmed = author.trim().trim_end_matches([',', '.']).trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '—')
}

fn trim_author(author: &str) -> String {
    author.trim().trim_end_matches(',').trim().to_string()
}

/// Title from the post-year text: the first quoted span if any, else
/// everything up to the first period.
fn title_from_rest(rest: &str) -> String {
    if let Some(caps) = QUOTED_TITLE_RE.captures(rest) {
        return caps[1].trim().trim_end_matches(['.', ',']).to_string();
    }
    rest.split('.').next().unwrap_or(rest).trim().to_string()
}

/// Grammar failure is common with irregular punctuation, missing years,
/// or non-Latin name order. Remove any year found by pattern search,
/// prefer a quoted span as title, else take the longest clause between
/// separators; the text before the title becomes the author string.
fn fallback_parse(text: &str, year_anywhere: Option<&str>) -> ParsedFields {
    if text.chars().count() <= 10 {
        return ParsedFields::default();
    }
    let to_parse = match year_anywhere {
        Some(year) => text.replacen(year, "", 1),
        None => text.to_string(),
    };

    if let Some(m) = QUOTED_TITLE_RE.captures(&to_parse) {
        let title = m[1].replace('.', "");
        let quote_start = m.get(0).map(|g| g.start()).unwrap_or(0);
        let author = to_parse[..quote_start].replace('“', "");
        return ParsedFields {
            author: non_empty(trim_author(&author)),
            year: None,
            title: Some(title.trim().to_string()),
        };
    }

    let (start, title) = longest_fragment(&to_parse);
    let author = to_parse[..start].replace('“', "");
    ParsedFields {
        author: non_empty(trim_author(&author)),
        year: None,
        title: non_empty(title.trim().to_string()),
    }
}

/// Split on `; , . ( )` and return the byte offset and text of the
/// longest fragment; titles are typically the longest clause.
fn longest_fragment(text: &str) -> (usize, &str) {
    let mut best: (usize, &str) = (0, "");
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        if matches!(ch, ';' | ',' | '.' | '(' | ')') {
            let fragment = &text[start..pos];
            if fragment.chars().count() > best.1.chars().count() {
                best = (start, fragment);
            }
            start = pos + ch.len_utf8();
        }
    }
    let tail = &text[start..];
    if tail.chars().count() > best.1.chars().count() {
        best = (start, tail);
    }
    best
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}
