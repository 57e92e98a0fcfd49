use once_cell::sync::Lazy;
use regex::Regex;

pub const SYMBOL_NOISE_RANGES: &[(char, char)] = &[
    ('\u{2600}', '\u{27BF}'),
    ('\u{10000}', '\u{10FFFF}'),
];

pub const TITLE_MARKERS: &[&str] = &["(Option)", "(Scale)", "(Question)", "Intro"];

pub const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', ':'];

pub const CONTINUATION_PUNCTUATION: &[char] = &['"', ',', ';', ':'];

pub const NUMBER_RUN_PATTERN: &str = r"(?:\d+\s+){3,}\d*[\])]?";
pub const TRAILING_ABBREVIATION_PATTERN: &str = r"^[a-z]{1,3}\.\s*$";
pub const WORD_CHAR_PATTERN: &str = r"[a-zA-ZÀ-ÿ0-9]";
pub const BULLET_PATTERN: &str = r"^[+#\-•*◦▪▫]\s+|^[a-z]\s+";
pub const LIST_ITEM_PATTERN: &str = r"^[+#\-•*◦▪▫$]\s+";
pub const NUMBERED_TITLE_PATTERN: &str = r"^\d+\s*-";
pub const SIGNATURE_PATTERN: &str =
    r"(?i),\s+[A-Z][a-z]+.*(?:contact|representative|team|support)$";

pub const SCALE_MAX_LETTERS: usize = 2;
pub const SCALE_MIN_WORDS: usize = 5;
pub const SCALE_SHORT_WORD_RATIO: f64 = 0.8;
pub const GARBAGE_MAX_CHARS: usize = 15;

static RE_NUMBER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(NUMBER_RUN_PATTERN).unwrap());
static RE_TRAILING_ABBREVIATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(TRAILING_ABBREVIATION_PATTERN).unwrap());
static RE_WORD_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(WORD_CHAR_PATTERN).unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(BULLET_PATTERN).unwrap());
static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(LIST_ITEM_PATTERN).unwrap());
static RE_NUMBERED_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(NUMBERED_TITLE_PATTERN).unwrap());
static RE_SIGNATURE: Lazy<Regex> = Lazy::new(|| Regex::new(SIGNATURE_PATTERN).unwrap());

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn is_symbol_noise(ch: char) -> bool {
    SYMBOL_NOISE_RANGES
        .iter()
        .any(|(start, end)| (*start..=*end).contains(&ch))
}

pub fn strip_symbol_noise(text: &str) -> String {
    text.chars().filter(|ch| !is_symbol_noise(*ch)).collect()
}

fn ascii_letters(text: &str) -> usize {
    text.chars().filter(char::is_ascii_alphabetic).count()
}

// Uppercase in the "has a cased letter and no lowercase ones" sense.
fn is_upper_token(word: &str) -> bool {
    word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase)
}

pub fn has_word_char(line: &str) -> bool {
    RE_WORD_CHAR.is_match(line)
}

pub fn is_scale_artifact(line: &str) -> bool {
    if RE_NUMBER_RUN.is_match(line) && ascii_letters(line) <= SCALE_MAX_LETTERS {
        return true;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() >= SCALE_MIN_WORDS {
        let short_upper = words
            .iter()
            .filter(|word| char_len(word) <= 3 && is_upper_token(word))
            .count();
        if short_upper as f64 >= words.len() as f64 * SCALE_SHORT_WORD_RATIO {
            return true;
        }
    }
    false
}

pub fn is_garbage_line(line: &str) -> bool {
    if char_len(line) >= GARBAGE_MAX_CHARS {
        return false;
    }
    let letters = ascii_letters(line);
    let special = line
        .chars()
        .filter(|ch| !ch.is_ascii_alphanumeric() && !ch.is_whitespace())
        .count();
    special > letters || RE_TRAILING_ABBREVIATION.is_match(line)
}

pub fn is_bullet(line: &str) -> bool {
    RE_BULLET.is_match(line)
}

pub fn is_list_item(line: &str) -> bool {
    RE_LIST_ITEM.is_match(line)
}

pub fn has_title_marker(line: &str) -> bool {
    TITLE_MARKERS.iter().any(|marker| line.contains(marker))
}

pub fn is_numbered_title(line: &str) -> bool {
    RE_NUMBERED_TITLE.is_match(line)
}

pub fn is_title(line: &str) -> bool {
    is_numbered_title(line) || has_title_marker(line)
}

pub fn is_signature(line: &str) -> bool {
    RE_SIGNATURE.is_match(line)
}

pub fn is_quoted_option(line: &str) -> bool {
    line.starts_with('"') && char_len(line) < 80
}

pub fn ends_with_terminal(text: &str) -> bool {
    text.trim_end().ends_with(TERMINAL_PUNCTUATION)
}

pub fn starts_as_continuation(line: &str) -> bool {
    line.chars()
        .next()
        .is_some_and(|ch| ch.is_lowercase() || CONTINUATION_PUNCTUATION.contains(&ch))
}
