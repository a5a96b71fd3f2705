use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Recomposes accents that PDF text layers emit as base letter plus combining mark.
pub fn compose(input: &str) -> String {
    input.nfc().collect()
}

/// Lower-cases and strips diacritics, for containment checks against accent-free stems.
pub fn fold(input: &str) -> String {
    input
        .nfd()
        .filter(|character| !is_combining_mark(*character))
        .collect::<String>()
        .to_lowercase()
}

pub fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
