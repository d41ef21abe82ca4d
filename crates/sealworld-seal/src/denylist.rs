//! Identifying-pattern denylist
//!
//! Regex classes for high-entropy identifiers that must never reach a public
//! record. [`Denylist::redact`] replaces each match with a class placeholder;
//! [`Denylist::scan`] is the post-seal gate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::Range;

/// Denylisted pattern class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenylistClass {
    /// Web address
    Url,
    /// Digital object identifier
    Doi,
    /// arXiv identifier
    Arxiv,
    /// Email address
    Email,
    /// Five or more consecutive digits
    LongDigitRun,
    /// Decimal with three or more fractional digits
    PreciseDecimal,
}

impl DenylistClass {
    /// Every class, in matching priority order
    pub const ALL: [Self; 6] = [
        Self::Url,
        Self::Doi,
        Self::Arxiv,
        Self::Email,
        Self::LongDigitRun,
        Self::PreciseDecimal,
    ];

    /// Stable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Doi => "doi",
            Self::Arxiv => "arxiv",
            Self::Email => "email",
            Self::LongDigitRun => "long_digit_run",
            Self::PreciseDecimal => "precise_decimal",
        }
    }

    /// Replacement text
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Url => "[URL]",
            Self::Doi => "[DOI]",
            Self::Arxiv => "[ARXIV]",
            Self::Email => "[EMAIL]",
            Self::LongDigitRun => "[DIGITS]",
            Self::PreciseDecimal => "[NUM]",
        }
    }

    const fn pattern(self) -> &'static str {
        match self {
            Self::Url => r#"(?i)\b(?:https?://|ftp://|www\.)[^\s<>"'\]\)]+"#,
            Self::Doi => r#"(?i)(?:\bdoi:\s*)?\b10\.\d+/[^\s,;"'\]\)]+"#,
            Self::Arxiv => r"(?i)\barxiv:\s*\d{4}\.\d{4,5}(?:v\d+)?|\b\d{4}\.\d{4,5}(?:v\d+)?\b",
            Self::Email => r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            Self::LongDigitRun => r"\d{5,}",
            Self::PreciseDecimal => r"\b\d+\.\d{3,}\b",
        }
    }
}

impl Display for DenylistClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenylistHit {
    /// Pattern class
    pub class: DenylistClass,
    /// Byte range in the scanned text
    pub span: Range<usize>,
}

/// Compiled denylist
#[derive(Debug)]
pub struct Denylist {
    patterns: Vec<(DenylistClass, Regex)>,
}

static STANDARD: Lazy<Denylist> = Lazy::new(|| Denylist {
    patterns: DenylistClass::ALL
        .iter()
        .map(|class| {
            let regex = Regex::new(class.pattern()).expect("denylist pattern is valid");
            (*class, regex)
        })
        .collect(),
});

impl Denylist {
    /// The built-in pattern set
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Non-overlapping matches, leftmost first, longest on ties
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<DenylistHit> {
        let mut candidates: Vec<DenylistHit> = self
            .patterns
            .iter()
            .flat_map(|(class, regex)| {
                regex.find_iter(text).map(move |m| DenylistHit {
                    class: *class,
                    span: m.range(),
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| b.span.end.cmp(&a.span.end))
                .then_with(|| a.class.cmp(&b.class))
        });

        let mut hits: Vec<DenylistHit> = Vec::with_capacity(candidates.len());
        for hit in candidates {
            if hits.last().map_or(true, |prev| hit.span.start >= prev.span.end) {
                hits.push(hit);
            }
        }
        hits
    }

    /// No pattern matches
    #[must_use]
    pub fn is_clean(&self, text: &str) -> bool {
        self.patterns.iter().all(|(_, regex)| !regex.is_match(text))
    }

    /// Replace every match with its class placeholder
    ///
    /// Returns the rewritten text and the class of each redaction in order.
    #[must_use]
    pub fn redact(&self, text: &str) -> (String, Vec<DenylistClass>) {
        let hits = self.scan(text);
        if hits.is_empty() {
            return (text.to_string(), Vec::new());
        }
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut classes = Vec::with_capacity(hits.len());
        for hit in hits {
            out.push_str(&text[cursor..hit.span.start]);
            out.push_str(hit.class.placeholder());
            cursor = hit.span.end;
            classes.push(hit.class);
        }
        out.push_str(&text[cursor..]);
        (out, classes)
    }

    /// Byte spans covered by any match, for callers that must skip them
    #[must_use]
    pub fn masked_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.scan(text).into_iter().map(|hit| hit.span).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classes(text: &str) -> Vec<DenylistClass> {
        Denylist::standard()
            .scan(text)
            .into_iter()
            .map(|h| h.class)
            .collect()
    }

    #[test]
    fn each_class_is_detected() {
        assert_eq!(classes("see https://example.org/paper"), vec![DenylistClass::Url]);
        assert_eq!(classes("DOI:10.1/xyz"), vec![DenylistClass::Doi]);
        assert_eq!(classes("arXiv:1706.03762"), vec![DenylistClass::Arxiv]);
        assert_eq!(classes("mail a.b@lab.edu now"), vec![DenylistClass::Email]);
        assert_eq!(classes("grant 1234567"), vec![DenylistClass::LongDigitRun]);
        assert_eq!(classes("scored 0.9137"), vec![DenylistClass::PreciseDecimal]);
    }

    #[test]
    fn ordinary_numbers_pass() {
        assert!(Denylist::standard().is_clean("acc 0.91 on 1000 images in 2017"));
    }

    #[test]
    fn overlapping_matches_keep_the_longest() {
        let text = "https://arxiv.org/abs/1706.03762";
        let hits = Denylist::standard().scan(text);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].class, DenylistClass::Url);
        assert_eq!(hits[0].span, 0..text.len());
    }

    #[test]
    fn redaction_replaces_with_placeholders() {
        let (out, redacted) =
            Denylist::standard().redact("uses a Transformer on ImageNet, DOI:10.1/xyz");
        assert_eq!(out, "uses a Transformer on ImageNet, [DOI]");
        assert_eq!(redacted, vec![DenylistClass::Doi]);
        assert!(Denylist::standard().is_clean(&out));
    }
}
