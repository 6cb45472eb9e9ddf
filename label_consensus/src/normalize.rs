//! Cleanup of the raw answers before they are compared.
//!
//! Two forms are computed for an answer:
//! - the lossless form, which is what gets grouped and eventually becomes the
//! consensus value. By default it is the raw answer itself.
//! - the lossy form, only used to compare answers during the lossy pass. By
//! default the punctuation is removed and the case is folded.

use log::debug;
use regex::RegexSet;
use std::collections::HashMap;

/// Cleans the answers of a label.
///
/// Both functions must be deterministic and idempotent.
pub trait Normalizer {
    /// Lossless cleanup. `label` is the name of the label the answer was
    /// submitted for, since some cleanups are specific to a label.
    fn clean(&self, label: &str, value: &str) -> String;

    /// Lossy cleanup, used to compare two lossless forms.
    fn lossy_clean(&self, value: &str) -> String;
}

/// The canonical form of all the placeholder answers.
pub const DEFAULT_RESPONSE: &str = "unknown";

const DEFAULT_RESPONSES: &[&str] = &[
    "placeholder",
    "unknown",
    "Unknown",
    "not given",
    "n/a",
    "no data",
    "nil",
];

const DEFAULT_RESPONSE_PATTERNS: &[&str] = &[
    // a single lower case letter or symbol
    r#"^[-!?'".a-z]$"#,
    r"^[uU]nknown .+$",
    // s.n., sn
    r"^[sS][. ]?[nN][.]?$",
    // n/a, n.a., na
    r"^[nN][./ ]?[aA][./]?$",
    r"^[Nn][Oo][Nn][Ee][ ]?[\w?]*$",
    // only punctuation
    r#"^[-!?'"., ]+$"#,
];

const STOPWORDS: &[&str] = &["a", "an", "if", "it", "its", "of", "than", "that", "the", "to"];

// Always removed by the lossy cleanup. '.' and '/' are handled separately.
const STRIPPED_PUNCTUATION: &[char] = &[
    '\\', ',', '&', '"', '(', '#', ')', '!', '?', '$', ':', ';', '\'', '-',
];

// Removed before a translation lookup and put back afterwards.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ')', ']'];

/// Options of the default normalizer. Everything is off by default, which
/// makes the lossless cleanup the identity.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct NormalizerSettings {
    /// Applies the translation table of the label, if it has one.
    pub use_translation: bool,
    /// Label name -> (lowercase word -> replacement).
    pub translation_tables: HashMap<String, HashMap<String, String>>,
    /// Replaces placeholder answers ("n/a", "none", "???", ...) by `unknown`.
    pub replace_defaults: bool,
    /// Drops common english stopwords in the lossy form.
    pub strip_stopwords: bool,
}

impl NormalizerSettings {
    /// Adds a word substitution table for the label with the given name.
    pub fn with_translation_table(
        mut self,
        label: &str,
        entries: &[(&str, &str)],
    ) -> NormalizerSettings {
        let table = self
            .translation_tables
            .entry(label.to_string())
            .or_default();
        for (word, replacement) in entries {
            table.insert(word.to_lowercase(), replacement.to_string());
        }
        self.use_translation = true;
        self
    }
}

/// The normalizer used unless another one is provided to the engine.
#[derive(Debug, Clone)]
pub struct DefaultNormalizer {
    settings: NormalizerSettings,
    default_patterns: RegexSet,
}

impl DefaultNormalizer {
    pub fn new(settings: &NormalizerSettings) -> DefaultNormalizer {
        let mut settings = settings.clone();
        // Lookups are done on lowercase words.
        for table in settings.translation_tables.values_mut() {
            *table = table
                .drain()
                .map(|(word, replacement)| (word.to_lowercase(), replacement))
                .collect();
        }
        DefaultNormalizer {
            settings,
            default_patterns: RegexSet::new(DEFAULT_RESPONSE_PATTERNS)
                .expect("default response patterns are valid"),
        }
    }

    pub fn settings(&self) -> &NormalizerSettings {
        &self.settings
    }

    /// True for the answers that only say that the worker did not know.
    pub fn is_default_response(&self, value: &str) -> bool {
        DEFAULT_RESPONSES.contains(&value)
            || self.default_patterns.is_match(value)
            || is_repeated_character(value)
    }

    /// Substitutes the words of the value with the translation table of the
    /// label. Words are split on whitespace and joined with a single space.
    pub fn translate(&self, label: &str, value: &str) -> String {
        let table = match self.settings.translation_tables.get(label) {
            Some(t) => t,
            None => return value.to_string(),
        };
        let parts: Vec<String> = value
            .split_whitespace()
            .map(|part| translate_word(table, part))
            .collect();
        let res = parts.join(" ");
        if res != value {
            debug!("translate: label {:?}: {:?} -> {:?}", label, value, res);
        }
        res
    }
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        DefaultNormalizer::new(&NormalizerSettings::default())
    }
}

impl Normalizer for DefaultNormalizer {
    fn clean(&self, label: &str, value: &str) -> String {
        let mut res = value.to_string();
        if self.settings.replace_defaults && self.is_default_response(&res) {
            res = DEFAULT_RESPONSE.to_string();
        }
        if self.settings.use_translation {
            res = self.translate(label, &res);
        }
        res
    }

    fn lossy_clean(&self, value: &str) -> String {
        let res = strip_punctuation(value).to_lowercase();
        if self.settings.strip_stopwords {
            res.split_whitespace()
                .filter(|w| !STOPWORDS.contains(w))
                .collect::<Vec<&str>>()
                .join(" ")
        } else {
            res
        }
    }
}

fn translate_word(table: &HashMap<String, String>, word: &str) -> String {
    let (stem, tail) = match word.char_indices().last() {
        Some((idx, c)) if idx > 0 && TRAILING_PUNCTUATION.contains(&c) => {
            (&word[..idx], &word[idx..])
        }
        _ => (word, ""),
    };
    match table.get(&stem.to_lowercase()) {
        Some(replacement) => format!("{}{}", replacement, tail),
        None => word.to_string(),
    }
}

/// Removes the punctuation. Periods and slashes are kept when they are
/// directly followed by a digit, so that numbers like 20.99 or 1/4 survive.
pub fn strip_punctuation(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|(idx, c)| match c {
            '.' | '/' => chars
                .get(idx + 1)
                .map(|next| next.is_ascii_digit())
                .unwrap_or(false),
            c => !STRIPPED_PUNCTUATION.contains(c),
        })
        .map(|(_, c)| *c)
        .collect()
}

// "xx", "---": the same non-digit character, at least twice.
fn is_repeated_character(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => {
            let mut count = 1;
            for c in chars {
                if c != first {
                    return false;
                }
                count += 1;
            }
            count >= 2
        }
        _ => false,
    }
}
