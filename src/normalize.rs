//! Artist-credit normalization.
//!
//! A raw credit such as "Ella Fitzgerald & Louis Armstrong" or
//! "Louis Armstrong and his Hot Five" is turned into the ordered list of
//! canonical performer names used for per-artist counting and for the
//! unplayed-artist set difference. Song identity never goes through here.
//!
//! The rewrite steps run in the order of [`CREDIT_PIPELINE`]; every step is a
//! plain `&str -> String` function with its own tests. Extra noise patterns
//! from a rules file run after the built-in stripping steps.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// ", jr." / " sr" generational suffix (input is already lower-cased)
pub static GENERATIONAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*,\s*|\s+)(jr|sr)\b\.?").unwrap());

pub static BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()\[\]{}]").unwrap());

/// Punctuation connectors: "a/b", "a, b", "a & b", "a; b"
pub static CONNECTOR_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/,&;]").unwrap());

/// Word connectors delimited by whitespace: feat, feat., featuring, ft, ft.,
/// with, vs, vs. ("feat-man" is a name, not a connector)
pub static CONNECTOR_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(?:featuring|feat\.?|ft\.?|vs\.?|with)(?:\s|$)").unwrap()
});

/// "and his Hot Five", "and the Famous Orchestra" up to the end of the credit
pub static BACKING_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+and\s+(?:his|her|the)\b.*$").unwrap());

pub static VOCAL_CREDIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bvocals?\s+by\b").unwrap());

pub static ENSEMBLE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(?:trio|quartet|quintet|sextet|septet)\b").unwrap());

/// Backing-band noise: "Louis Armstrong All Stars", "... All-Stars"
pub static ALL_STARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+all[\s-]?stars\b").unwrap());

/// Apostrophe, whitespace, letter: "o' day". The letter before the apostrophe
/// is checked separately so back-to-back gaps ("a' b' c") all close.
pub static APOSTROPHE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(['’])\s+\p{L}").unwrap());

// ============================================================================
// PIPELINE STEPS
// ============================================================================

/// Compose to NFC and lower-case.
/// "Beyonce\u{301} & JAY-Z" → "beyoncé & jay-z"
pub fn fold_case(s: &str) -> String {
    s.nfc().collect::<String>().to_lowercase()
}

/// Turn a comma-separated generational suffix into part of the name so the
/// comma splitter does not see a collaborator.
/// "smith, jr." → "smith jr"
pub fn guard_generational_suffix(s: &str) -> String {
    GENERATIONAL_SUFFIX.replace_all(s, " $1").into_owned()
}

/// Brackets carry no meaning once connectors are unified.
/// "a (feat. b)" → "a  feat. b "
pub fn drop_brackets(s: &str) -> String {
    BRACKETS.replace_all(s, " ").into_owned()
}

/// Every collaboration connector becomes " and ".
/// "a & b / c feat. d" → "a  and  b  and  c and d"
pub fn unify_connectors(s: &str) -> String {
    let s = CONNECTOR_CHARS.replace_all(s, " and ");
    CONNECTOR_WORDS.replace_all(&s, " and ").into_owned()
}

/// "louis armstrong and his hot five" → "louis armstrong"
pub fn strip_backing_clause(s: &str) -> String {
    BACKING_CLAUSE.replace(s, "").into_owned()
}

/// The singer stays a separate performer.
/// "artie shaw vocal by helen forrest" → "artie shaw  and  helen forrest"
pub fn strip_vocal_credit(s: &str) -> String {
    VOCAL_CREDIT.replace_all(s, " and ").into_owned()
}

/// "benny goodman quartet" → "benny goodman"
pub fn strip_ensemble_size(s: &str) -> String {
    ENSEMBLE_SIZE.replace_all(s, "").into_owned()
}

/// "louis armstrong all stars" → "louis armstrong"
pub fn strip_all_stars(s: &str) -> String {
    ALL_STARS.replace_all(s, "").into_owned()
}

/// Named rewrite step of the credit pipeline
pub struct Step {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// Rewrite steps applied before splitting, in order.
pub const CREDIT_PIPELINE: &[Step] = &[
    Step { name: "fold_case", apply: fold_case },
    Step { name: "guard_generational_suffix", apply: guard_generational_suffix },
    Step { name: "drop_brackets", apply: drop_brackets },
    Step { name: "unify_connectors", apply: unify_connectors },
    Step { name: "strip_backing_clause", apply: strip_backing_clause },
    Step { name: "strip_vocal_credit", apply: strip_vocal_credit },
    Step { name: "strip_ensemble_size", apply: strip_ensemble_size },
    Step { name: "strip_all_stars", apply: strip_all_stars },
];

/// Split on whitespace-delimited "and", preserving order. Whitespace inside a
/// fragment collapses to single spaces; empty fragments are kept here and
/// dropped by [`clean_fragment`].
/// "a  and  b and  and c" → ["a", "b", "", "c"]
pub fn split_credit(s: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut words: Vec<&str> = Vec::new();
    for word in s.split_whitespace() {
        if word == "and" {
            fragments.push(words.join(" "));
            words.clear();
        } else {
            words.push(word);
        }
    }
    fragments.push(words.join(" "));
    fragments
}

/// "o' day" → "o'day"
pub fn close_apostrophe_gap(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in APOSTROPHE_GAP.captures_iter(s) {
        let (Some(gap), Some(mark)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let after_letter = s[..gap.start()]
            .chars()
            .next_back()
            .is_some_and(char::is_alphabetic);
        if !after_letter {
            continue;
        }
        // keep up to the apostrophe, resume at the letter
        let letter = gap.end() - gap.as_str().chars().next_back().map_or(0, char::len_utf8);
        out.push_str(&s[last..mark.end()]);
        last = letter;
    }
    out.push_str(&s[last..]);
    out
}

/// Upper-case every letter that follows a non-letter, lower-case the rest.
/// "o'day" → "O'Day", "count basie" → "Count Basie"
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Trim, skip empties, close apostrophe gaps, title-case.
pub fn clean_fragment(fragment: &str) -> Option<String> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(title_case(&close_apostrophe_gap(trimmed)))
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Rules file contents: `{ "noise_patterns": ["\\s+orchestra$"] }`
#[derive(Debug, Default, Deserialize)]
pub struct NormalizerRules {
    #[serde(default)]
    pub noise_patterns: Vec<String>,
}

impl NormalizerRules {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse rules file {}", path.display()))
    }
}

/// Built-in pipeline plus optional extra noise patterns.
#[derive(Debug, Clone, Default)]
pub struct ArtistNormalizer {
    extra_noise: Vec<Regex>,
}

impl ArtistNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra patterns are matched against the lower-cased credit after the
    /// built-in stripping steps and removed.
    pub fn from_rules(rules: &NormalizerRules) -> Result<Self> {
        let extra_noise = rules
            .noise_patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", p))
                    .with_context(|| format!("Invalid noise pattern '{}'", p))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { extra_noise })
    }

    pub fn extra_pattern_count(&self) -> usize {
        self.extra_noise.len()
    }

    /// Canonical artists of a raw credit, in credit order. `None` or a credit
    /// with nothing left after stripping yields an empty list.
    pub fn normalize(&self, raw: Option<&str>) -> Vec<String> {
        let Some(raw) = raw else {
            return Vec::new();
        };

        let mut result = raw.to_string();
        for step in CREDIT_PIPELINE {
            result = (step.apply)(&result);
        }
        for pattern in &self.extra_noise {
            result = pattern.replace_all(&result, "").into_owned();
        }

        split_credit(&result)
            .iter()
            .filter_map(|f| clean_fragment(f))
            .collect()
    }

    /// Intermediate credit after every pipeline step that changed it.
    pub fn trace(&self, raw: &str) -> Vec<(&'static str, String)> {
        let mut steps = Vec::new();
        let mut result = raw.to_string();
        for step in CREDIT_PIPELINE {
            let next = (step.apply)(&result);
            if next != result {
                steps.push((step.name, next.clone()));
            }
            result = next;
        }
        for pattern in &self.extra_noise {
            let next = pattern.replace_all(&result, "").into_owned();
            if next != result {
                steps.push(("extra_noise", next.clone()));
            }
            result = next;
        }
        steps
    }
}

static DEFAULT_NORMALIZER: Lazy<ArtistNormalizer> = Lazy::new(ArtistNormalizer::new);

/// Normalize with the built-in rules only.
pub fn normalize_artist_credit(raw: &str) -> Vec<String> {
    DEFAULT_NORMALIZER.normalize(Some(raw))
}

// ============================================================================
// TESTS
// ============================================================================
