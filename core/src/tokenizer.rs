use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer as SnowballStemmer};

lazy_static! {
    static ref STEMMER: SnowballStemmer = SnowballStemmer::create(Algorithm::English);
}

/// Maps a surface word to the canonical stem used as a dictionary key.
///
/// Implemented for plain closures so callers can swap the algorithm out.
pub trait Stemmer {
    fn stem(&self, word: &str) -> String;
}

impl<F> Stemmer for F
where
    F: Fn(&str) -> String,
{
    fn stem(&self, word: &str) -> String {
        self(word)
    }
}

/// English Porter-family stemmer backed by `rust-stemmers`.
///
/// A stem that still ends in a hyphen has its hyphens removed and is stemmed again.
#[derive(Debug, Clone, Copy, Default)]
pub struct PorterStemmer;

impl Stemmer for PorterStemmer {
    fn stem(&self, word: &str) -> String {
        let stemmed = STEMMER.stem(word).into_owned();
        if stemmed.ends_with('-') {
            self.stem(&stemmed.replace('-', ""))
        } else {
            stemmed
        }
    }
}

fn is_let_or_num(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// Normalize one line of text before it is split into terms.
///
/// Rules, applied per character of the lowercased line:
/// letters, digits and spaces are kept; a hyphen is kept between two
/// letters/digits, becomes a space when another hyphen follows it and is
/// dropped otherwise; a comma is kept only between two digits; an apostrophe
/// is deleted so contractions merge; anything else becomes a space.
pub fn normalize_line(line: &str) -> String {
    let chars: Vec<char> = line.to_lowercase().chars().collect();
    let mut out = String::with_capacity(chars.len());

    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();
        match c {
            ' ' => out.push(c),
            c if is_let_or_num(c) => out.push(c),
            '-' => match (prev, next) {
                (Some(p), Some(n)) if is_let_or_num(p) && is_let_or_num(n) => out.push('-'),
                (Some(_), Some('-')) => out.push(' '),
                _ => {}
            },
            ',' => {
                if let (Some(p), Some(n)) = (prev, next) {
                    if p.is_ascii_digit() && n.is_ascii_digit() {
                        out.push(',');
                    }
                }
            }
            '\'' => {}
            _ => out.push(' '),
        }
    }
    out
}

/// Normalize `text` and split it into surface terms.
pub fn terms(text: &str) -> Vec<String> {
    normalize_line(text).split_whitespace().map(str::to_string).collect()
}

/// Tokenize text into (surface term, position), numbering positions from `start`.
pub fn tokenize(text: &str, start: u32) -> Vec<(String, u32)> {
    terms(text).into_iter().zip(start..).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apostrophes_merge_contractions() {
        assert_eq!(normalize_line("Don't STOP"), "dont stop");
    }

    #[test]
    fn hyphen_rules() {
        assert_eq!(normalize_line("well-known"), "well-known");
        assert_eq!(normalize_line("word--word"), "word word");
        assert_eq!(terms("-start end- a - b"), vec!["start", "end", "a", "b"]);
    }

    #[test]
    fn comma_kept_only_between_digits() {
        assert_eq!(terms("1,000 apples, pears"), vec!["1,000", "apples", "pears"]);
    }

    #[test]
    fn other_punctuation_splits_words() {
        assert_eq!(terms("Hello, World!(again)"), vec!["hello", "world", "again"]);
        assert_eq!(terms("a,b"), vec!["ab"]);
        assert_eq!(terms("naïve"), vec!["na", "ve"]);
    }

    #[test]
    fn positions_continue_from_start() {
        let toks = tokenize("the cat sat", 4);
        let expected = vec![("the".to_string(), 4), ("cat".to_string(), 5), ("sat".to_string(), 6)];
        assert_eq!(toks, expected);
    }

    #[test]
    fn closures_are_stemmers() {
        let upper = |w: &str| w.to_uppercase();
        assert_eq!(upper.stem("cat"), "CAT");
    }

    #[test]
    fn porter_reduces_plurals() {
        assert_eq!(PorterStemmer.stem("cats"), "cat");
        assert_eq!(PorterStemmer.stem("running"), "run");
    }
}
