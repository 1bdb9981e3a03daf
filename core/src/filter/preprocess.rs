//! Rule text preprocessing.
//!
//! Rule files are free-form: comments, one item archetype per line, and
//! `OpenPrefixCount()`/`OpenSuffixCount()` comparisons that the boolean
//! filter grammar cannot evaluate safely on every item. Preprocessing turns
//! such text into one canonical expression plus numeric thresholds:
//!
//! ```text
//! // rares with room to craft
//! Rarity == "Rare" && OpenPrefixCount() >= 1
//! BaseName == "Stellar Amulet"
//! ```
//!
//! becomes `Rarity == "Rare" && true || BaseName == "Stellar Amulet"` with a
//! minimum of one open prefix.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static OPEN_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"OpenPrefixCount\s*\(\)\s*(==|>=|<=|>|<)\s*(\d+)").expect("valid prefix regex")
});

static OPEN_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"OpenSuffixCount\s*\(\)\s*(==|>=|<=|>|<)\s*(\d+)").expect("valid suffix regex")
});

/// Line starts that continue the previous line instead of starting a new alternative.
const CONTINUATION_PREFIXES: &[&str] = &["&&", "||", ")", "]", ",", "}", "."];

/// Characters after which the next line is always a continuation.
const OPENERS: &[char] = &['(', '{', '[', ',', '&', '|'];

/// Output of [`preprocess`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preprocessed {
    /// Canonical single-line boolean expression
    pub expression: String,
    pub min_open_prefixes: Option<u32>,
    pub min_open_suffixes: Option<u32>,
}

impl Preprocessed {
    pub fn has_thresholds(&self) -> bool {
        self.min_open_prefixes.is_some() || self.min_open_suffixes.is_some()
    }
}

/// Strip comments, join lines and extract open affix thresholds.
pub fn preprocess(raw: &str) -> Preprocessed {
    let normalized = normalize_expression(&strip_comments(raw));

    let mut prefixes = ThresholdFold::default();
    let expression = replace_comparisons(&OPEN_PREFIX_RE, &normalized, &mut prefixes);

    let mut suffixes = ThresholdFold::default();
    let expression = replace_comparisons(&OPEN_SUFFIX_RE, &expression, &mut suffixes);

    Preprocessed {
        expression,
        min_open_prefixes: prefixes.finish(),
        min_open_suffixes: suffixes.finish(),
    }
}

/// Remove `// line` and `/* block */` comments outside of string literals.
///
/// A `"` toggles string mode unless the preceding character is `\`. The
/// newline that terminates a line comment is kept.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut in_block = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if in_block {
            if c == '*' && next == Some('/') {
                in_block = false;
                i += 1;
            }
            i += 1;
            continue;
        }

        if !in_string && c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if !in_string && c == '/' && next == Some('*') {
            in_block = true;
            i += 2;
            continue;
        }

        if c == '"' {
            let escaped = i > 0 && chars[i - 1] == '\\';
            if !escaped {
                in_string = !in_string;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

/// Join non-empty trimmed lines into one expression.
///
/// Lines are alternatives (`||`) unless the new line starts with a
/// continuation token or the text so far ends with an opener/separator.
pub fn normalize_expression(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len() + 32);

    for line in unified.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        if !out.is_empty() {
            let continues = CONTINUATION_PREFIXES.iter().any(|p| line.starts_with(p));
            let after_opener = out.ends_with(OPENERS);
            if continues || after_opener {
                out.push(' ');
            } else {
                out.push_str(" || ");
            }
        }
        out.push_str(line);
    }

    out
}

fn replace_comparisons(re: &Regex, text: &str, fold: &mut ThresholdFold) -> String {
    re.replace_all(text, |caps: &Captures<'_>| {
        // Digits only; an absurdly long literal saturates instead of failing.
        let value = caps[2].parse::<u32>().unwrap_or(u32::MAX);
        fold.add(&caps[1], value);
        "true"
    })
    .into_owned()
}

/// Accumulates comparisons of one kind into a single minimum.
///
/// `>= n` and `> n` raise the minimum (most restrictive wins), `<`/`<=` do
/// not constrain it, and `== n` pins it to exactly `n` no matter what else
/// appears.
#[derive(Debug, Default)]
struct ThresholdFold {
    minimum: Option<u32>,
    exact: Option<u32>,
}

impl ThresholdFold {
    fn add(&mut self, op: &str, value: u32) {
        let raised = match op {
            "==" => {
                self.exact = Some(value);
                return;
            }
            ">=" => value,
            ">" => value.saturating_add(1),
            _ => return,
        };
        self.minimum = Some(self.minimum.map_or(raised, |m| m.max(raised)));
    }

    fn finish(self) -> Option<u32> {
        self.exact.or(self.minimum)
    }
}
