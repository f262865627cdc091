//! Embedded stopword lists for keyword extraction and token reduction.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

const EN: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "an", "and", "any", "are", "as", "at", "be", "because", "been",
    "before", "being", "below", "between", "both", "but", "by", "can", "could", "did", "do", "does", "down", "during",
    "each", "few", "for", "from", "further", "had", "has", "have", "he", "her", "here", "hers", "him", "his", "how",
    "if", "in", "into", "is", "it", "its", "just", "may", "might", "more", "most", "must", "no", "nor", "not", "now",
    "of", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same", "shall", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "why", "will", "with", "would", "you", "your",
];

const DE: &[&str] = &[
    "aber", "als", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "das", "dass", "dem", "den", "der", "des",
    "die", "doch", "durch", "ein", "eine", "einem", "einen", "einer", "eines", "er", "es", "für", "hat", "hatte",
    "ich", "ihr", "im", "in", "ist", "kann", "mit", "nach", "nicht", "noch", "nur", "oder", "sich", "sie", "sind",
    "so", "über", "um", "und", "uns", "vom", "von", "vor", "war", "was", "wenn", "werden", "wie", "wir", "wird", "zu",
    "zum", "zur",
];

const ES: &[&str] = &[
    "a", "al", "algo", "ante", "antes", "como", "con", "contra", "de", "del", "desde", "donde", "durante", "e", "el",
    "ella", "ellas", "ellos", "en", "entre", "era", "es", "esa", "ese", "eso", "esta", "este", "esto", "fue", "ha",
    "hay", "la", "las", "le", "les", "lo", "los", "más", "me", "mi", "muy", "no", "nos", "o", "para", "pero", "por",
    "que", "se", "sin", "sobre", "su", "sus", "también", "te", "tiene", "un", "una", "uno", "y", "ya", "yo",
];

const FR: &[&str] = &[
    "à", "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux", "il", "ils", "je",
    "la", "le", "les", "leur", "lui", "ma", "mais", "me", "même", "mes", "moi", "mon", "ne", "nos", "notre", "nous",
    "on", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi",
    "ton", "tu", "un", "une", "vos", "votre", "vous",
];

static STOPWORDS: Lazy<HashMap<&'static str, HashSet<&'static str>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("en", EN.iter().copied().collect());
    map.insert("de", DE.iter().copied().collect());
    map.insert("es", ES.iter().copied().collect());
    map.insert("fr", FR.iter().copied().collect());
    map
});

/// Stopword set for a language code; unknown languages get an empty set.
pub fn stopwords_for(language: &str) -> &'static HashSet<&'static str> {
    static EMPTY: Lazy<HashSet<&'static str>> = Lazy::new(HashSet::new);
    STOPWORDS.get(language).unwrap_or(&EMPTY)
}

pub fn is_stopword(word: &str, language: &str) -> bool {
    stopwords_for(language).contains(word.to_lowercase().as_str())
}

pub fn supported_languages() -> Vec<&'static str> {
    let mut languages: Vec<_> = STOPWORDS.keys().copied().collect();
    languages.sort_unstable();
    languages
}
