//! Raw paper records
//!
//! A [`PaperRecord`] is keyed by a canonical [`PaperKey`] and holds a small
//! closed set of field kinds. Sealers dispatch on [`FieldValue`] variants,
//! never on field-name strings.

use crate::error::ConfigError;
use crate::formula::FormulaGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Canonical paper identifier, unique within a `(track, subset)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperKey(String);

impl PaperKey {
    /// Wrap a key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PaperKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One reported metric value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Raw value
    pub value: f64,
    /// Direction of improvement
    #[serde(default = "default_higher_is_better")]
    pub higher_is_better: bool,
}

fn default_higher_is_better() -> bool {
    true
}

impl MetricValue {
    /// Metric whose direction is inferred from its name
    #[must_use]
    pub fn inferred(name: &str, value: f64) -> Self {
        Self {
            value,
            higher_is_better: !is_lower_better_name(name),
        }
    }
}

/// Metric name → value
pub type MetricTable = BTreeMap<String, MetricValue>;

const LOWER_IS_BETTER_HINTS: &[&str] = &[
    "loss", "error", "err", "perplexity", "ppl", "latency", "wer", "cer",
];

fn is_lower_better_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|part| LOWER_IS_BETTER_HINTS.contains(&part))
}

/// The closed set of field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Prose such as background or mechanism description
    FreeText,
    /// Mechanism / formula graph
    FormulaGraph,
    /// Metric table
    NumericMetric,
    /// Dependency keys
    DependencyList,
}

/// Field contents, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Prose
    FreeText(String),
    /// Formula graph
    FormulaGraph(FormulaGraph),
    /// Metric table
    NumericMetric(MetricTable),
    /// Dependency keys
    DependencyList(Vec<PaperKey>),
}

impl FieldValue {
    /// Kind tag of this value
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

/// Normalized raw record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Canonical key
    pub paper_key: PaperKey,
    /// Named fields
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl PaperRecord {
    /// Empty record
    #[must_use]
    pub fn new(paper_key: impl Into<PaperKey>) -> Self {
        Self {
            paper_key: paper_key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style free-text field
    #[must_use]
    pub fn with_text(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_field(name, FieldValue::FreeText(text.into()))
    }

    /// Builder-style single metric, merged into the `results` table
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        let metric = MetricValue::inferred(&name, value);
        match self.fields.get_mut("results") {
            Some(FieldValue::NumericMetric(table)) => {
                table.insert(name, metric);
            }
            _ => {
                let mut table = MetricTable::new();
                table.insert(name, metric);
                self.fields
                    .insert("results".to_string(), FieldValue::NumericMetric(table));
            }
        }
        self
    }

    /// Builder-style dependency list
    #[must_use]
    pub fn with_dependencies<I, K>(self, deps: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PaperKey>,
    {
        let deps = deps.into_iter().map(Into::into).collect();
        self.with_field("dependencies", FieldValue::DependencyList(deps))
    }

    /// Free-text fields in name order
    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            FieldValue::FreeText(text) => Some((name.as_str(), text.as_str())),
            _ => None,
        })
    }

    /// Formula graphs in name order
    pub fn formula_fields(&self) -> impl Iterator<Item = (&str, &FormulaGraph)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            FieldValue::FormulaGraph(graph) => Some((name.as_str(), graph)),
            _ => None,
        })
    }

    /// Every metric across all metric tables, keyed `(field, metric)`
    pub fn metrics(&self) -> impl Iterator<Item = (&str, &str, MetricValue)> {
        self.fields.iter().flat_map(|(field, value)| {
            let entries: Vec<(&str, &str, MetricValue)> = match value {
                FieldValue::NumericMetric(table) => table
                    .iter()
                    .map(|(metric, v)| (field.as_str(), metric.as_str(), *v))
                    .collect(),
                _ => Vec::new(),
            };
            entries
        })
    }

    /// Union of all dependency lists
    pub fn dependencies(&self) -> impl Iterator<Item = &PaperKey> {
        self.fields
            .values()
            .flat_map(|value| -> &[PaperKey] {
                match value {
                    FieldValue::DependencyList(deps) => deps.as_slice(),
                    _ => &[],
                }
            })
    }

    /// Import the legacy flat layout
    ///
    /// `paper_key` (or `paper_id`) names the key; every other entry is
    /// classified by shape: string → free text, array of strings →
    /// dependency list, object with `nodes`/`edges` → formula graph,
    /// object of numbers → metric table, bare number → one-metric table.
    ///
    /// # Errors
    /// Returns [`ConfigError::MalformedRecord`] for any other shape
    pub fn from_flat_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ConfigError::MalformedRecord("record is not an object".into()))?;

        let key = ["paper_key", "paper_id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(serde_json::Value::as_str))
            .ok_or_else(|| ConfigError::MalformedRecord("missing paper_key/paper_id".into()))?;

        let mut record = Self::new(key);
        for (name, raw) in obj {
            if name == "paper_key" || name == "paper_id" || raw.is_null() {
                continue;
            }
            let field = classify_flat_value(name, raw)?;
            record.fields.insert(name.clone(), field);
        }
        Ok(record)
    }
}

fn classify_flat_value(name: &str, raw: &serde_json::Value) -> Result<FieldValue, ConfigError> {
    use serde_json::Value;

    match raw {
        Value::String(text) => Ok(FieldValue::FreeText(text.clone())),
        Value::Number(n) => {
            let value = n.as_f64().ok_or_else(|| {
                ConfigError::MalformedRecord(format!("field {name}: number out of range"))
            })?;
            let mut table = MetricTable::new();
            table.insert(name.to_string(), MetricValue::inferred(name, value));
            Ok(FieldValue::NumericMetric(table))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(PaperKey::from).ok_or_else(|| {
                    ConfigError::MalformedRecord(format!(
                        "field {name}: arrays must hold dependency keys"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::DependencyList),
        Value::Object(map) if map.contains_key("nodes") && map.contains_key("edges") => {
            serde_json::from_value::<FormulaGraph>(raw.clone())
                .map(FieldValue::FormulaGraph)
                .map_err(|e| ConfigError::MalformedRecord(format!("field {name}: {e}")))
        }
        Value::Object(map) => {
            let mut table = MetricTable::new();
            for (metric, v) in map {
                let parsed = match v {
                    Value::Number(n) => n.as_f64().map(|x| MetricValue::inferred(metric, x)),
                    Value::Object(_) => serde_json::from_value::<MetricValue>(v.clone()).ok(),
                    _ => None,
                };
                let parsed = parsed.ok_or_else(|| {
                    ConfigError::MalformedRecord(format!(
                        "field {name}: metric {metric} is not numeric"
                    ))
                })?;
                table.insert(metric.clone(), parsed);
            }
            Ok(FieldValue::NumericMetric(table))
        }
        Value::Bool(_) | Value::Null => Err(ConfigError::MalformedRecord(format!(
            "field {name}: unsupported value"
        ))),
    }
}
