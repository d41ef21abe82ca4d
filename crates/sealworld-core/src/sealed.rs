//! Public sealed records
//!
//! The exported counterpart of [`PaperRecord`](crate::PaperRecord). Keys and
//! dependency edges are carried verbatim; every other field kind is replaced
//! by its sealed form.

use crate::formula::FormulaGraph;
use crate::record::{FieldKind, PaperKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sealed numeric representation
///
/// Serialized externally tagged: `{"bin": 3}`, `{"value": 0.41}`,
/// `{"raw": 0.91}` (unsealed baseline only).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealedValue {
    /// Unsealed value, level-0 baseline
    Raw(f64),
    /// Quantile bin index
    Bin(u32),
    /// Monotonically perturbed value
    Value(f64),
}

impl SealedValue {
    /// Order two values of the same representation; `None` across kinds
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) | (Self::Value(a), Self::Value(b)) => a.partial_cmp(b),
            (Self::Bin(a), Self::Bin(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Numeric view used by rank-based consumers
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Raw(v) | Self::Value(v) => *v,
            Self::Bin(b) => f64::from(*b),
        }
    }

    /// Compact token form (`bin:3`, `value:0.410000`, `raw:0.91`)
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Raw(v) => format!("raw:{v}"),
            Self::Bin(b) => format!("bin:{b}"),
            Self::Value(v) => format!("value:{v:.6}"),
        }
    }
}

impl PartialOrd for SealedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

/// One sealed metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SealedMetric {
    /// Sealed value
    pub sealed: SealedValue,
    /// Direction of improvement, public
    pub higher_is_better: bool,
}

/// Sealed field contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SealedField {
    /// Sealed prose
    FreeText(String),
    /// Relabelled, rearranged graph
    FormulaGraph(FormulaGraph),
    /// Sealed metric table
    NumericMetric(BTreeMap<String, SealedMetric>),
    /// Dependency keys, verbatim
    DependencyList(Vec<PaperKey>),
}

impl SealedField {
    /// Kind tag
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::FreeText(_) => FieldKind::FreeText,
            Self::FormulaGraph(_) => FieldKind::FormulaGraph,
            Self::NumericMetric(_) => FieldKind::NumericMetric,
            Self::DependencyList(_) => FieldKind::DependencyList,
        }
    }
}

/// Exported sealed record; one JSONL line in `public_records.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicSealedRecord {
    /// Canonical key, verbatim
    pub paper_key: PaperKey,
    /// Sealed fields
    pub fields: BTreeMap<String, SealedField>,
}

impl PublicSealedRecord {
    /// Sealed prose fields in name order
    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            SealedField::FreeText(text) => Some((name.as_str(), text.as_str())),
            _ => None,
        })
    }

    /// Sealed graphs in name order
    pub fn formula_fields(&self) -> impl Iterator<Item = (&str, &FormulaGraph)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            SealedField::FormulaGraph(graph) => Some((name.as_str(), graph)),
            _ => None,
        })
    }

    /// Sealed metric lookup by metric name across tables
    #[must_use]
    pub fn metric(&self, metric: &str) -> Option<SealedMetric> {
        self.fields.values().find_map(|value| match value {
            SealedField::NumericMetric(table) => table.get(metric).copied(),
            _ => None,
        })
    }

    /// Every sealed metric, keyed `(field, metric)`
    pub fn metrics(&self) -> impl Iterator<Item = (&str, &str, SealedMetric)> {
        self.fields.iter().flat_map(|(field, value)| {
            let entries: Vec<(&str, &str, SealedMetric)> = match value {
                SealedField::NumericMetric(table) => table
                    .iter()
                    .map(|(metric, v)| (field.as_str(), metric.as_str(), *v))
                    .collect(),
                _ => Vec::new(),
            };
            entries
        })
    }

    /// Union of dependency lists
    pub fn dependencies(&self) -> impl Iterator<Item = &PaperKey> {
        self.fields
            .values()
            .flat_map(|value| -> &[PaperKey] {
                match value {
                    SealedField::DependencyList(deps) => deps.as_slice(),
                    _ => &[],
                }
            })
    }
}
