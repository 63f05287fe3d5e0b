//! Text canonicalization for fuzzy matching of remote-party messages.
//!
//! The remote party rewords, bolds and re-punctuates its prompts freely, so
//! wait conditions compare canonical forms and test for containment rather
//! than equality.

use unicode_normalization::UnicodeNormalization;

/// Markdown emphasis markers removed before comparison.
const EMPHASIS_MARKERS: [char; 4] = ['*', '_', '`', '~'];

fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

fn is_kept(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(c, 'ñ' | 'á' | 'é' | 'í' | 'ó' | 'ú' | 'ü' | '¿' | '?')
}

/// Canonicalizes `s`: strips diacritics and emphasis markers, lowercases,
/// replaces everything outside the kept alphabet with a space, and collapses
/// whitespace.
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .nfd()
        .filter(|c| !is_combining_diacritic(*c))
        .filter(|c| !EMPHASIS_MARKERS.contains(c))
        .flat_map(char::to_lowercase)
        .map(|c| if is_kept(c) { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle` occurs in `haystack` once both are normalized.
pub fn matches(haystack: &str, needle: &str) -> bool {
    normalize(haystack).contains(&normalize(needle))
}

/// Strips combining diacritics but keeps everything else as written.
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_diacritic(*c)).nfc().collect()
}

/// Expands a prompt into the spellings the remote party is known to use:
/// as written, without accents, and wrapped in bold markers.
pub fn prompt_variants(prompt: &str) -> Vec<String> {
    let plain = strip_accents(prompt);
    let mut variants = Vec::with_capacity(4);
    for candidate in [
        prompt.to_string(),
        plain.clone(),
        format!("*{prompt}*"),
        format!("*{plain}*"),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}
