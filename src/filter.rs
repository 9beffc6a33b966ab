//! Declarative boolean filters over JSON records.
//!
//! A filter description arrives in its wire shape, a leaf
//! `{ "key": "system.level", "value": 3, "operator": "gte" }`, where the
//! boolean connectives reuse the same shape with the nested description(s)
//! as the value:
//!
//! ```json
//! { "operator": "or", "value": [
//!     { "key": "type", "value": "spell" },
//!     { "operator": "not", "value": { "key": "system.rare", "value": true } }
//! ] }
//! ```
//!
//! [`Filter::parse`] turns that shape into a typed tree, rejecting unknown
//! operator names up front. A bare array is an implicit AND.
//!
//! ```
//! use compendium::filter::{perform_check, unique_keys, Filter};
//! use serde_json::json;
//! let record = json!({"name": "Fireball", "system": {"level": 3}});
//! let filter = json!([{"key": "system.level", "value": 2, "operator": "gt"},
//!                     {"key": "name", "value": "fire", "operator": "icontains"}]);
//! assert!(perform_check(&record, &filter).unwrap());
//! let keys = unique_keys(&[Filter::parse(&filter).unwrap()]);
//! assert!(keys.contains("system.level"));
//! ```

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::compare::Comparison;
use crate::error::{CompendiumError, Result};
use crate::locale::Locale;

/// Computes a leaf's subject from the whole record, in place of the key lookup.
pub type Getter = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Boolean connectives, written as operator names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Not,
}

impl Connective {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AND" => Some(Connective::And),
            "NAND" => Some(Connective::Nand),
            "OR" => Some(Connective::Or),
            "NOR" => Some(Connective::Nor),
            "XOR" => Some(Connective::Xor),
            "NOT" => Some(Connective::Not),
            _ => None,
        }
    }
}

/// The right-hand side of a comparison.
#[derive(Clone)]
pub enum Operand {
    Value(Value),
    /// A nested description that members of the subject collection are tested against.
    Filter(Box<Filter>),
    /// The operand list of `hasany` / `hasall`.
    List(Vec<Operand>),
}

impl Operand {
    fn parse(comparison: Comparison, value: &Value) -> Result<Self> {
        if !comparison.takes_filters() {
            return Ok(Operand::Value(value.clone()));
        }
        match (comparison, value) {
            (Comparison::Has, single) => Self::parse_member(single),
            (_, Value::Array(values)) => Ok(Operand::List(
                values.iter().map(Self::parse_member).collect::<Result<_>>()?,
            )),
            (_, single) => Ok(Operand::List(vec![Self::parse_member(single)?])),
        }
    }

    fn parse_member(value: &Value) -> Result<Self> {
        if is_description(value) {
            Ok(Operand::Filter(Box::new(Filter::parse(value)?)))
        } else {
            Ok(Operand::Value(value.clone()))
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Operand::Value(v) => v.clone(),
            Operand::Filter(f) => f.to_value(),
            Operand::List(items) => Value::Array(items.iter().map(Operand::to_value).collect()),
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

// An object naming a key or an operator is read as a nested description.
fn is_description(value: &Value) -> bool {
    value.as_object().is_some_and(|o| {
        o.get("operator").is_some_and(Value::is_string) || o.get("key").is_some_and(Value::is_string)
    })
}

/// A single comparison against one field of the record.
#[derive(Clone)]
pub struct Leaf {
    pub key: String,
    pub comparison: Comparison,
    pub operand: Operand,
    getter: Option<Getter>,
}

impl Leaf {
    pub fn getter(&self) -> Option<&Getter> {
        self.getter.as_ref()
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("key", &self.key)
            .field("comparison", &self.comparison)
            .field("operand", &self.operand)
            .field("getter", &self.getter.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Compare(Leaf),
    And(Vec<Filter>),
    Nand(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Xor(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Leaf comparing the field at `key` with `value`.
    pub fn leaf(key: impl Into<String>, comparison: Comparison, value: Value) -> Result<Self> {
        Ok(Filter::Compare(Leaf {
            key: key.into(),
            comparison,
            operand: Operand::parse(comparison, &value)?,
            getter: None,
        }))
    }

    /// Leaf using the default exact comparison.
    pub fn exact(key: impl Into<String>, value: Value) -> Self {
        Filter::Compare(Leaf {
            key: key.into(),
            comparison: Comparison::Exact,
            operand: Operand::Value(value),
            getter: None,
        })
    }

    /// Leaf that is true when any member of the collection at `key` passes `filter`.
    pub fn has_matching(key: impl Into<String>, filter: Filter) -> Self {
        Filter::Compare(Leaf {
            key: key.into(),
            comparison: Comparison::Has,
            operand: Operand::Filter(Box::new(filter)),
            getter: None,
        })
    }

    /// Replace a leaf's key lookup with `getter`. Composites are returned unchanged.
    pub fn with_getter<F>(self, getter: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        match self {
            Filter::Compare(leaf) => Filter::Compare(Leaf { getter: Some(Arc::new(getter)), ..leaf }),
            other => other,
        }
    }

    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Parse the wire shape. Arrays are implicit ANDs.
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Filter::And(Self::parse_all(items)?)),
            Value::Object(object) => Self::parse_object(object),
            other => Err(CompendiumError::InvalidFilter(format!(
                "expected an object or an array, got {other}"
            ))),
        }
    }

    fn parse_all(items: &[Value]) -> Result<Vec<Filter>> {
        items.iter().map(Filter::parse).collect()
    }

    fn parse_object(object: &Map<String, Value>) -> Result<Self> {
        let operator = match object.get("operator") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                return Err(CompendiumError::InvalidFilter(format!(
                    "operator must be a string, got {other}"
                )));
            }
        };
        let value = object.get("value").cloned().unwrap_or(Value::Null);

        if let Some(connective) = operator.and_then(Connective::parse) {
            let nested = match &value {
                Value::Array(items) => Self::parse_all(items)?,
                single => vec![Filter::parse(single)?],
            };
            return Ok(match connective {
                Connective::And => Filter::And(nested),
                Connective::Nand => Filter::Nand(nested),
                Connective::Or => Filter::Or(nested),
                Connective::Nor => Filter::Nor(nested),
                Connective::Xor => Filter::Xor(nested),
                Connective::Not => match nested.len() {
                    1 => Filter::not(nested.into_iter().next().unwrap_or(Filter::And(vec![]))),
                    _ => Filter::not(Filter::And(nested)),
                },
            });
        }

        let comparison = match operator {
            Some(name) => name.parse::<Comparison>()?,
            None => Comparison::Exact,
        };
        let key = match object.get("key") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(CompendiumError::InvalidFilter(format!(
                    "key must be a string, got {other}"
                )));
            }
        };
        Filter::leaf(key, comparison, value)
    }

    /// Back to the wire shape. Getters do not survive.
    pub fn to_value(&self) -> Value {
        let composite = |name: &str, nested: &[Filter]| {
            serde_json::json!({
                "operator": name,
                "value": nested.iter().map(Filter::to_value).collect::<Vec<_>>(),
            })
        };
        match self {
            Filter::Compare(leaf) => serde_json::json!({
                "key": leaf.key,
                "operator": leaf.comparison.name(),
                "value": leaf.operand.to_value(),
            }),
            Filter::And(nested) => composite("AND", nested),
            Filter::Nand(nested) => composite("NAND", nested),
            Filter::Or(nested) => composite("OR", nested),
            Filter::Nor(nested) => composite("NOR", nested),
            Filter::Xor(nested) => composite("XOR", nested),
            Filter::Not(inner) => serde_json::json!({ "operator": "NOT", "value": inner.to_value() }),
        }
    }

    /// Dotted keys referenced by this filter's leaves, recursing through
    /// connectives but not into comparison operands.
    pub fn collect_keys(&self, keys: &mut BTreeSet<String>) {
        match self {
            Filter::Compare(leaf) => {
                if !leaf.key.is_empty() {
                    keys.insert(leaf.key.clone());
                }
            }
            Filter::And(nested)
            | Filter::Nand(nested)
            | Filter::Or(nested)
            | Filter::Nor(nested)
            | Filter::Xor(nested) => nested.iter().for_each(|f| f.collect_keys(keys)),
            Filter::Not(inner) => inner.collect_keys(keys),
        }
    }
}

// Equal when the wire shapes are equal; getters are not compared.
impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.to_value() == other.to_value()
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Filter::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Resolve a dotted path (`"system.level.value"`) in `record`. Numeric
/// segments index into arrays. An empty path resolves to nothing.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(record, |current, segment| match current {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Evaluates filters under an explicit locale.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    locale: Locale,
}

impl FilterEngine {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// True when `record` passes every filter in `filters`.
    pub fn check(&self, record: &Value, filters: &[Filter]) -> bool {
        filters.iter().all(|f| self.evaluate(record, f))
    }

    /// Parse the wire shape and evaluate it; unknown operators are errors.
    pub fn check_json(&self, record: &Value, filter: &Value) -> Result<bool> {
        let filter = Filter::parse(filter)?;
        Ok(self.evaluate(record, &filter))
    }

    /// The subset of `records` that pass `filters`, in their original order.
    pub fn filter_records<I, R>(&self, records: I, filters: &[Filter]) -> Vec<R>
    where
        I: IntoIterator<Item = R>,
        R: Borrow<Value>,
    {
        let mut candidates = 0usize;
        let matches: Vec<R> = records
            .into_iter()
            .inspect(|_| candidates += 1)
            .filter(|r| self.check(r.borrow(), filters))
            .collect();
        debug!(candidates, matches = matches.len(), "filtered records");
        matches
    }

    /// Evaluate one filter. Sub-filters run strictly left to right; AND and
    /// OR stop at the first deciding result, XOR visits every operand.
    pub fn evaluate(&self, record: &Value, filter: &Filter) -> bool {
        match filter {
            Filter::Compare(leaf) => self.compare(record, leaf),
            Filter::And(nested) => nested.iter().all(|f| self.evaluate(record, f)),
            Filter::Nand(nested) => !nested.iter().all(|f| self.evaluate(record, f)),
            Filter::Or(nested) => nested.iter().any(|f| self.evaluate(record, f)),
            Filter::Nor(nested) => !nested.iter().any(|f| self.evaluate(record, f)),
            Filter::Xor(nested) => nested
                .iter()
                .fold(false, |acc, f| acc ^ self.evaluate(record, f)),
            Filter::Not(inner) => !self.evaluate(record, inner),
        }
    }

    fn compare(&self, record: &Value, leaf: &Leaf) -> bool {
        let computed;
        let subject = match &leaf.getter {
            Some(getter) => {
                computed = getter(record);
                computed.as_ref()
            }
            None => lookup(record, &leaf.key),
        };
        self.apply(leaf.comparison, subject, &leaf.operand)
    }

    fn apply(&self, comparison: Comparison, subject: Option<&Value>, operand: &Operand) -> bool {
        match (comparison, operand) {
            (_, Operand::Value(value)) => comparison.apply(subject, value, &self.locale),
            (_, Operand::Filter(filter)) => self.has_matching(subject, filter),
            (Comparison::HasAll, Operand::List(items)) => {
                items.iter().all(|item| self.apply(Comparison::Has, subject, item))
            }
            (_, Operand::List(items)) => {
                items.iter().any(|item| self.apply(Comparison::Has, subject, item))
            }
        }
    }

    fn has_matching(&self, subject: Option<&Value>, filter: &Filter) -> bool {
        match subject {
            Some(Value::Array(members)) => members.iter().any(|m| self.evaluate(m, filter)),
            _ => false,
        }
    }
}

/// Evaluate a filter in its wire shape (a description or an implicit-AND
/// array) under the default locale.
pub fn perform_check(record: &Value, filter: &Value) -> Result<bool> {
    FilterEngine::default().check_json(record, filter)
}

/// Every dotted key referenced anywhere in `filters`.
pub fn unique_keys(filters: &[Filter]) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for filter in filters {
        filter.collect_keys(&mut keys);
    }
    keys
}
