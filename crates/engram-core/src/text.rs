//! Shared text and distance primitives.
//!
//! The term index, MMR and the cluster analyzer all go through
//! [`tokenize`] so there is a single notion of what a term is.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Tokens with this many characters or fewer are dropped.
pub const MIN_TOKEN_CHARS: usize = 3;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").unwrap());

/// Multilingual stop words (English, Spanish, French, German, Portuguese,
/// Italian). Only entries longer than two characters matter since shorter
/// tokens are dropped anyway.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
        "was", "one", "our", "out", "has", "have", "him", "his", "how", "its", "may", "who",
        "did", "does", "get", "got", "let", "she", "too", "use", "this", "that", "with",
        "from", "they", "them", "their", "there", "then", "than", "these", "those", "what",
        "when", "where", "which", "while", "will", "would", "should", "could", "been",
        "being", "were", "into", "onto", "about", "above", "below", "after", "before",
        "again", "also", "just", "more", "most", "some", "such", "only", "own", "same",
        "very", "your", "yours", "here", "each", "both", "few", "other", "over", "under",
        "because", "between", "through", "during", "until", "why", "yet", "nor", "off",
        // Spanish
        "los", "las", "del", "por", "para", "con", "una", "uno", "unos", "unas", "que",
        "como", "pero", "sus", "esta", "este", "esto", "estos", "estas", "ese", "esa",
        "eso", "son", "ser", "fue", "hay", "muy", "sin", "sobre", "entre", "cuando",
        "donde", "porque", "tambien", "también", "todo", "todos", "nos", "ella", "ellos",
        "mas", "más", "hasta", "desde",
        // French
        "les", "des", "une", "est", "pas", "pour", "sur", "dans", "avec", "qui", "par",
        "mais", "ces", "cette", "sont", "aux", "comme", "leur", "leurs", "nous", "vous",
        "ils", "elles", "elle", "lui", "tout", "tous", "être", "avoir", "fait", "ont",
        "sans", "sous", "entre", "donc", "car",
        // German
        "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "einen", "einem",
        "einer", "den", "dem", "des", "mit", "auf", "für", "von", "zum", "zur", "sich",
        "auch", "wie", "als", "aber", "oder", "wenn", "noch", "nach", "bei", "aus",
        "sind", "wird", "werden", "wurde", "hat", "haben", "ich", "sie", "wir", "ihr",
        "dass", "über", "unter", "durch",
        // Portuguese
        "não", "nao", "uma", "com", "por", "para", "mais", "como", "mas", "dos", "das",
        "nos", "nas", "seu", "sua", "seus", "suas", "ele", "ela", "eles", "elas", "isso",
        "isto", "este", "esta", "muito", "quando", "também", "foi", "são", "ser", "tem",
        "pelo", "pela", "entre", "sobre",
        // Italian
        "che", "non", "per", "con", "una", "uno", "del", "della", "dei", "delle", "nel",
        "nella", "sono", "come", "anche", "questo", "questa", "quello", "quella", "gli",
        "lei", "loro", "suo", "sua", "molto", "quando", "perché", "perche", "tra", "fra",
        "più", "essere", "stato", "hanno", "alla", "allo", "agli",
    ]
    .into_iter()
    .collect()
});

/// Lowercase and replace punctuation with whitespace.
pub fn normalize(text: &str) -> String {
    PUNCTUATION.replace_all(&text.to_lowercase(), " ").into_owned()
}

/// Whether `token` (already lowercased) is a stop word.
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Normalize and split `text` into index terms, preserving order and
/// duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

/// Distinct terms of `text`.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard similarity of two term sets. Two empty sets share nothing.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

/// `1 - jaccard_similarity`.
pub fn jaccard_distance(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    1.0 - jaccard_similarity(a, b)
}

/// Cosine similarity. Mismatched lengths or zero vectors yield 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// `1 - cosine_similarity`, in [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
