//! Deterministic manifest serialization.
//!
//! Emitted manifests must be byte-identical across runs regardless of
//! insertion order, so every JSON array is sorted before output. Maps are
//! already deterministic (`serde_json` with `preserve_order` off keys its
//! maps with a `BTreeMap`). Array elements compare by JSON type first, then
//! by a registered named rule, then by a `name`/`id` member, and as a last
//! resort by their serialized form.

use crdgen_core::Version;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

/// Errors from rendering a document.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The document could not be represented as JSON
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The document could not be rendered as YAML
    #[error("yaml serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A named comparison rule for array elements of a recognized shape.
///
/// `matches` is probed against the first element of an array; when it
/// accepts, `compare` orders the whole array.
#[derive(Clone, Copy)]
pub struct SortRule {
    /// Rule name, for trace output
    pub name: &'static str,
    /// Whether this rule understands elements of this shape
    pub matches: fn(&Value) -> bool,
    /// Total order over matched elements
    pub compare: fn(&Value, &Value) -> Ordering,
}

/// Serializer that renders documents with all arrays sorted.
pub struct DeterministicSerializer {
    rules: Vec<SortRule>,
}

impl Default for DeterministicSerializer {
    fn default() -> Self {
        Self::crd_defaults()
    }
}

impl DeterministicSerializer {
    /// A serializer with no named rules
    pub fn new() -> Self {
        DeterministicSerializer { rules: Vec::new() }
    }

    /// A serializer with the stock CRD rules: version entries ordered by
    /// descending Kubernetes version priority, printer columns by name.
    pub fn crd_defaults() -> Self {
        Self::new()
            .with_rule(SortRule {
                name: "versions",
                matches: |v| {
                    has_keys(v, &["name", "served", "storage"])
                },
                compare: |a, b| {
                    let a = Version::parse(member_str(a, "name"));
                    let b = Version::parse(member_str(b, "name"));
                    b.cmp(&a)
                },
            })
            .with_rule(SortRule {
                name: "printer columns",
                matches: |v| has_keys(v, &["name", "jsonPath"]),
                compare: |a, b| member_str(a, "name").cmp(member_str(b, "name")),
            })
    }

    /// Register an additional named rule
    #[must_use]
    pub fn with_rule(mut self, rule: SortRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Render `doc` to a [`Value`] with every array sorted
    pub fn to_value<T: Serialize>(&self, doc: &T) -> Result<Value, SerializeError> {
        let mut value = serde_json::to_value(doc)?;
        self.sort_arrays(&mut value);
        Ok(value)
    }

    /// Render `doc` as a YAML document
    pub fn to_yaml<T: Serialize>(&self, doc: &T) -> Result<String, SerializeError> {
        Ok(serde_yaml::to_string(&self.to_value(doc)?)?)
    }

    /// Render `doc` as pretty-printed JSON
    pub fn to_json<T: Serialize>(&self, doc: &T) -> Result<String, SerializeError> {
        Ok(serde_json::to_string_pretty(&self.to_value(doc)?)?)
    }

    fn sort_arrays(&self, value: &mut Value) {
        match value {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.sort_arrays(item);
                }
                items.sort_by(|a, b| self.compare(a, b));
            }
            Value::Object(members) => {
                for (_, member) in members.iter_mut() {
                    self.sort_arrays(member);
                }
            }
            _ => {}
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let rank = type_rank(a).cmp(&type_rank(b));
        if rank != Ordering::Equal {
            return rank;
        }
        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => self.compare_structured(a, b),
        }
    }

    fn compare_structured(&self, a: &Value, b: &Value) -> Ordering {
        if let Some(rule) = self.rules.iter().find(|r| (r.matches)(a)) {
            tracing::trace!(rule = rule.name, "ordering array elements");
            return (rule.compare)(a, b);
        }
        for key in ["name", "id"] {
            if let (Some(Value::String(x)), Some(Value::String(y))) = (a.get(key), b.get(key)) {
                return x.cmp(y);
            }
        }
        tracing::warn!("ordering array elements by serialized form");
        a.to_string().cmp(&b.to_string())
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn has_keys(value: &Value, keys: &[&str]) -> bool {
    keys.iter().all(|k| value.get(k).is_some())
}

fn member_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}
