use serde::Serialize;

/// Closed set of index genres. The genre gates which grammar the entry
/// parser applies; `Unknown` always reports unparsed rather than guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexGenre {
    Verborum,
    Locorum,
    NominumAncient,
    NominumModern,
    Rerum,
    Geographicus,
    Bibliographicus,
    Museum,
    Epigraphic,
    Unknown,
}

impl IndexGenre {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexGenre::Verborum => "verborum",
            IndexGenre::Locorum => "locorum",
            IndexGenre::NominumAncient => "nominum_ancient",
            IndexGenre::NominumModern => "nominum_modern",
            IndexGenre::Rerum => "rerum",
            IndexGenre::Geographicus => "geographicus",
            IndexGenre::Bibliographicus => "bibliographicus",
            IndexGenre::Museum => "museum",
            IndexGenre::Epigraphic => "epigraphic",
            IndexGenre::Unknown => "unknown",
        }
    }
}

/// Keyword lists used to score section titles against genres, English,
/// French, German and Latin variants included. Built once at startup and
/// passed by reference into the classifier.
pub struct GenreLexicon {
    keywords: Vec<(IndexGenre, &'static [&'static str])>,
}

impl Default for GenreLexicon {
    fn default() -> Self {
        Self {
            keywords: vec![
                (IndexGenre::Verborum, &[
                    "general", "verborum", "verborvm", "abstract", "word", "words", "term",
                    "terms", "termes", "wort", "sachindex", "général", "generalis", "mots",
                ]),
                (IndexGenre::Locorum, &[
                    "locorum", "loco", "rum", "locorvm", "biblical", "non-biblical", "quran",
                    "biblicum", "citation", "citations", "quotation", "quotations", "source",
                    "sources", "reference", "references", "scripture", "scriptures", "verse",
                    "verses", "passage", "passages", "line", "lines", "cited", "textes",
                    "cités", "papyri", "fragmentorum",
                ]),
                (IndexGenre::NominumAncient, &[
                    "nominum", "nominvm", "propriorvm", "name", "names", "proper", "person",
                    "persons", "personal", "people", "writer", "writers", "poet", "poets",
                    "author", "authors", "ancient", "antique", "classical", "medieval",
                    "greek", "egyptian", "latin", "auteur", "auteurs", "anciens",
                    "eigennamen", "noms", "propres", "personnages",
                ]),
                (IndexGenre::NominumModern, &[
                    "modern", "author", "authors", "editor", "editors", "scholar", "scholars",
                    "auteur", "auteurs", "modernes",
                ]),
                (IndexGenre::Rerum, &[
                    "rerum", "rervm", "subject", "subjects", "theme", "themes", "topic",
                    "topics", "thématique", "thematic",
                ]),
                (IndexGenre::Geographicus, &[
                    "geographicus", "geographic", "geographical", "géographique", "place",
                    "places", "location", "locations", "site", "sites", "topographical",
                ]),
                (IndexGenre::Bibliographicus, &[
                    "bibliographicus", "bibliographique", "bibliographical", "bibliographic",
                    "manuscript", "manuscripts", "collections", "ventes",
                ]),
                (IndexGenre::Museum, &[
                    "museum", "museums", "meseums", "musées", "collections",
                ]),
                (IndexGenre::Epigraphic, &[
                    "epigraphic", "epigraphical", "inscriptionum", "inscriptions",
                ]),
            ],
        }
    }
}

/// Guess the genre(s) of an index section from its title. Tokens of three
/// characters or fewer carry no signal and are dropped; a single-word
/// title ("Index") most often denotes a general word index. Every genre
/// tied for the maximum keyword score is returned.
pub fn classify_title(title: &str, lexicon: &GenreLexicon) -> Vec<IndexGenre> {
    let title = title.to_lowercase();
    let terms: Vec<&str> = title
        .split_whitespace()
        .filter(|t| t.trim().chars().count() > 3)
        .collect();
    if terms.len() == 1 {
        return vec![IndexGenre::Verborum];
    }

    let mut hits: Vec<(IndexGenre, usize)> = Vec::new();
    for term in &terms {
        for (genre, keywords) in &lexicon.keywords {
            if keywords.contains(term) {
                match hits.iter_mut().find(|(g, _)| g == genre) {
                    Some(entry) => entry.1 += 1,
                    None => hits.push((*genre, 1)),
                }
            }
        }
    }

    let max_hit = hits.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if max_hit == 0 {
        return vec![IndexGenre::Unknown];
    }
    hits.into_iter().filter(|(_, n)| *n == max_hit).map(|(g, _)| g).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(title: &str) -> Vec<IndexGenre> {
        classify_title(title, &GenreLexicon::default())
    }

    #[test]
    fn single_word_title_defaults_to_verborum() {
        assert_eq!(classify("Index"), vec![IndexGenre::Verborum]);
    }

    #[test]
    fn locorum_keywords_win() {
        assert_eq!(classify("Index of passages cited"), vec![IndexGenre::Locorum]);
        assert_eq!(classify("Index locorum"), vec![IndexGenre::Locorum]);
    }

    #[test]
    fn short_tokens_are_ignored(){
        // "of" and "the" never score; "places" does.
        assert_eq!(classify("Index of the places"), vec![IndexGenre::Geographicus]);
    }

    #[test]
    fn ties_return_every_genre_at_max() {
        let genres = classify("Index of ancient and modern authors");
        assert!(genres.contains(&IndexGenre::NominumAncient));
        assert!(genres.contains(&IndexGenre::NominumModern));
    }

    #[test]
    fn no_keyword_hits_is_unknown() {
        assert_eq!(classify("Tabula gratulatoria omnibus"), vec![IndexGenre::Unknown]);
    }

    #[test]
    fn case_is_normalized() {
        assert_eq!(classify("INDEX VERBORVM GRAECORUM"), vec![IndexGenre::Verborum]);
    }
}
