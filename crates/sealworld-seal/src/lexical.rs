//! Free-text sealing
//!
//! Pipeline for one text:
//! 1. long quotations become `[QUOTE]`
//! 2. codebook terms and years are substituted, longest match first
//! 3. denylisted patterns are redacted, or the text is rejected
//! 4. numbers that restate one of the record's own metric values become
//!    `[NUM]` (level 1 and up)
//! 5. optionally, remaining standalone numbers become `[NUM]`

use crate::codebook::{apply_case, Codebook};
use crate::denylist::{Denylist, DenylistClass};
use crate::knob::{DenylistAction, LexicalConfig};
use crate::matcher::TermMatcher;
use crate::text::{as_year, word_spans};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Replacement for stripped quotations
pub const QUOTE_PLACEHOLDER: &str = "[QUOTE]";
/// Replacement for in-text numbers
pub const NUMBER_PLACEHOLDER: &str = "[NUM]";

static QUOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|“[^”]*”"#).expect("quotation regex is valid"));
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*%?").expect("number regex is valid"));

/// Result of sealing one text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LexicalOutcome {
    /// Sealed text
    pub text: String,
    /// Term and year substitutions made
    pub substitutions: usize,
    /// Denylist redactions, in order
    pub redactions: Vec<DenylistClass>,
    /// Quotations replaced
    pub quotes_stripped: usize,
    /// Numbers replaced
    pub numbers_redacted: usize,
}

/// A denylisted pattern found under [`DenylistAction::Reject`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("denylisted {class} pattern at byte {offset}")]
pub struct DenylistRejection {
    /// Pattern class
    pub class: DenylistClass,
    /// Byte offset in the substituted text
    pub offset: usize,
}

/// Seals free text against one codebook
#[derive(Debug)]
pub struct LexicalSealer<'a> {
    config: &'a LexicalConfig,
    codebook: &'a Codebook,
    matcher: TermMatcher,
}

impl<'a> LexicalSealer<'a> {
    /// Build the term matcher once for a whole record set
    #[must_use]
    pub fn new(config: &'a LexicalConfig, codebook: &'a Codebook) -> Self {
        let matcher = TermMatcher::new(codebook, config.case_insensitive, config.match_plurals);
        Self {
            config,
            codebook,
            matcher,
        }
    }

    /// Seal one text
    ///
    /// # Errors
    /// Returns [`DenylistRejection`] when the action is
    /// [`DenylistAction::Reject`] and a pattern survives substitution
    pub fn seal(&self, text: &str) -> Result<LexicalOutcome, DenylistRejection> {
        self.seal_with_metrics(text, &[])
    }

    /// Seal one text of a record whose raw metric values are `metrics`
    ///
    /// In-text restatements of those values (`91.2%` for `0.912`) are
    /// redacted along with the terms.
    ///
    /// # Errors
    /// As [`seal`](Self::seal)
    pub fn seal_with_metrics(
        &self,
        text: &str,
        metrics: &[f64],
    ) -> Result<LexicalOutcome, DenylistRejection> {
        let mut outcome = LexicalOutcome::default();

        let mut current = match self.config.max_quote_words {
            Some(limit) => strip_quotes(text, limit, &mut outcome.quotes_stripped),
            None => text.to_string(),
        };

        if self.config.enabled {
            current = self.substitute(&current, &mut outcome.substitutions);
        }

        let denylist = Denylist::standard();
        current = match self.config.denylist_action {
            DenylistAction::Reject => {
                if let Some(hit) = denylist.scan(&current).into_iter().next() {
                    return Err(DenylistRejection {
                        class: hit.class,
                        offset: hit.span.start,
                    });
                }
                current
            }
            DenylistAction::Redact => {
                let (redacted, classes) = denylist.redact(&current);
                outcome.redactions = classes;
                redacted
            }
        };

        if self.config.enabled && !metrics.is_empty() {
            current = redact_metric_echoes(&current, metrics, &mut outcome.numbers_redacted);
        }

        if self.config.redact_numbers_in_text {
            current = redact_numbers(&current, &mut outcome.numbers_redacted);
        }

        outcome.text = current;
        Ok(outcome)
    }

    fn substitute(&self, text: &str, count: &mut usize) -> String {
        let mut replacements: Vec<(Range<usize>, String)> = self
            .matcher
            .find(text)
            .into_iter()
            .filter_map(|m| {
                let pseudonym = self.codebook.lookup(&m.term)?;
                let mut sealed = apply_case(&text[m.span.clone()], pseudonym);
                if let Some(suffix) = &m.plural_suffix {
                    sealed.push_str(suffix);
                }
                Some((m.span, sealed))
            })
            .collect();

        if self.config.seal_years {
            for span in word_spans(text) {
                let covered = replacements
                    .iter()
                    .any(|(r, _)| r.start < span.end && span.start < r.end);
                if covered {
                    continue;
                }
                if let Some(era) = as_year(&text[span.clone()]).and_then(|y| self.codebook.era(y)) {
                    replacements.push((span, era.to_string()));
                }
            }
        }

        replacements.sort_by_key(|(r, _)| r.start);
        *count += replacements.len();
        splice(text, &replacements)
    }
}

fn splice(text: &str, replacements: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, sealed) in replacements {
        out.push_str(&text[cursor..range.start]);
        out.push_str(sealed);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn strip_quotes(text: &str, limit: usize, count: &mut usize) -> String {
    QUOTATION
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let quoted = &caps[0];
            if quoted.split_whitespace().count() > limit {
                *count += 1;
                QUOTE_PLACEHOLDER.to_string()
            } else {
                quoted.to_string()
            }
        })
        .into_owned()
}

/// Numbers not glued to a word (`ResNet-50`, `era-2` are skipped)
fn standalone_numbers(text: &str) -> impl Iterator<Item = regex::Match<'_>> {
    NUMBER.find_iter(text).filter(move |m| {
        let before = text[..m.start()].chars().last();
        let after = text[m.end()..].chars().next();
        let glued_before = before.is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_'));
        let glued_after = after.is_some_and(char::is_alphanumeric);
        !glued_before && !glued_after
    })
}

/// Replace every standalone number
fn redact_numbers(text: &str, count: &mut usize) -> String {
    let replacements: Vec<(Range<usize>, String)> = standalone_numbers(text)
        .map(|m| (m.range(), NUMBER_PLACEHOLDER.to_string()))
        .collect();
    *count += replacements.len();
    splice(text, &replacements)
}

/// Replace standalone numbers that equal a metric value at the precision
/// written, read either as-is or as a percentage
fn redact_metric_echoes(text: &str, metrics: &[f64], count: &mut usize) -> String {
    let replacements: Vec<(Range<usize>, String)> = standalone_numbers(text)
        .filter(|m| echoes_metric(m.as_str(), metrics))
        .map(|m| (m.range(), NUMBER_PLACEHOLDER.to_string()))
        .collect();
    *count += replacements.len();
    splice(text, &replacements)
}

fn echoes_metric(token: &str, metrics: &[f64]) -> bool {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if digits.chars().filter(char::is_ascii_digit).count() < 2 {
        return false;
    }
    let Ok(value) = digits.parse::<f64>() else {
        return false;
    };
    let decimals = digits.split_once('.').map_or(0, |(_, frac)| frac.len());
    let tolerance = 0.5 * 10f64.powi(-i32::try_from(decimals).unwrap_or(i32::MAX));
    metrics.iter().any(|metric| {
        (value - metric).abs() <= tolerance || (value - metric * 100.0).abs() <= tolerance
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knob::DefenseKnobController;
    use sealworld_core::{BuildScope, Seed};
    use std::collections::BTreeSet;

    fn codebook(terms: &[&str], years: &[u16]) -> Codebook {
        let vocab: BTreeSet<String> = terms.iter().map(|t| (*t).to_string()).collect();
        let years: BTreeSet<u16> = years.iter().copied().collect();
        Codebook::generate(&BuildScope::new("t", "s", Seed::new(42)), &vocab, &years).unwrap()
    }

    fn seal(level: u8, book: &Codebook, text: &str) -> LexicalOutcome {
        let config = DefenseKnobController::level_to_config(level).unwrap();
        LexicalSealer::new(&config.lexical, book).seal(text).unwrap()
    }

    #[test]
    fn scenario_background_is_fully_sealed() {
        let book = codebook(&["Transformer", "ImageNet"], &[]);
        let out = seal(2, &book, "uses a Transformer on ImageNet, DOI:10.1/xyz");
        assert!(!out.text.contains("Transformer"));
        assert!(!out.text.contains("ImageNet"));
        assert!(!out.text.contains("10.1/xyz"));
        assert!(out.text.contains("[DOI]"));
        assert_eq!(out.substitutions, 2);
        assert_eq!(out.redactions, vec![DenylistClass::Doi]);
    }

    #[test]
    fn exact_case_misses_variants_that_level_two_catches() {
        let book = codebook(&["ImageNet"], &[]);
        let low = seal(1, &book, "trained on imagenet");
        assert!(low.text.contains("imagenet"));
        let high = seal(2, &book, "trained on imagenet");
        assert!(!high.text.contains("imagenet"));
    }

    #[test]
    fn capitalisation_and_plurals_follow_the_surface() {
        let book = codebook(&["transformer"], &[]);
        let pseudonym = book.lookup("transformer").unwrap().to_string();
        let out = seal(2, &book, "Transformers beat transformer baselines");
        let expected = format!(
            "{}s beat {} baselines",
            crate::text::capitalize(&pseudonym),
            pseudonym
        );
        assert_eq!(out.text, expected);
    }

    #[test]
    fn years_become_eras_and_numbers_are_redacted_at_the_top() {
        let book = codebook(&["ResNet-50"], &[2015]);
        let out = seal(4, &book, "ResNet-50 from 2015 reached 76 percent");
        assert!(out.text.contains("era-1"));
        assert!(out.text.contains("[NUM] percent"));
        assert!(!out.text.contains("2015"));
        assert!(!out.text.contains("ResNet"));
    }

    #[test]
    fn restated_metric_values_are_redacted_from_level_one() {
        let book = codebook(&["BERT"], &[]);
        let text = "BERT reaches 91.2% accuracy with 12 layers and a 0.31 loss";
        let metrics = [0.912, 0.31];

        let config = DefenseKnobController::level_to_config(1).unwrap();
        let out = LexicalSealer::new(&config.lexical, &book)
            .seal_with_metrics(text, &metrics)
            .unwrap();
        assert!(!out.text.contains("91.2"), "{}", out.text);
        assert!(!out.text.contains("0.31"), "{}", out.text);
        assert!(out.text.contains("12 layers"));
        assert_eq!(out.numbers_redacted, 2);

        let config = DefenseKnobController::level_to_config(0).unwrap();
        let out = LexicalSealer::new(&config.lexical, &book)
            .seal_with_metrics(text, &metrics)
            .unwrap();
        assert!(out.text.contains("91.2%"));
    }

    #[test]
    fn long_quotes_are_stripped() {
        let book = codebook(&["BERT"], &[]);
        let text = "they wrote \"a b c d e f g h\" and \"short one\"";
        let out = seal(4, &book, text);
        assert!(out.text.contains(QUOTE_PLACEHOLDER));
        assert!(out.text.contains("\"short one\""));
        assert_eq!(out.quotes_stripped, 1);
    }

    #[test]
    fn reject_action_fails_on_surviving_patterns() {
        let book = codebook(&["BERT"], &[]);
        let mut config = DefenseKnobController::level_to_config(2).unwrap();
        config.lexical.denylist_action = DenylistAction::Reject;
        let err = LexicalSealer::new(&config.lexical, &book)
            .seal("see https://example.org")
            .unwrap_err();
        assert_eq!(err.class, DenylistClass::Url);
    }

    #[test]
    fn level_zero_only_redacts() {
        let book = Codebook::empty(&BuildScope::new("t", "s", Seed::new(1)));
        let out = seal(0, &book, "ImageNet at https://image-net.org");
        assert_eq!(out.text, "ImageNet at [URL]");
        assert_eq!(out.substitutions, 0);
    }
}
