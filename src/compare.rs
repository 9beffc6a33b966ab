//! The comparison function library used by filter leaves.
//!
//! Every comparison takes the subject resolved from the record first and the
//! filter's value second. A subject of `None` stands for a field the record
//! does not have. Coercions follow the host's loose rules: string
//! comparisons stringify both sides (`null` becomes `"null"`, a missing
//! field `"undefined"`) and ordering comparisons fall back to numbers, where
//! anything unparseable is NaN and therefore compares false.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::CompendiumError;
use crate::locale::Locale;

/// A registered comparison, selected by a leaf's `operator` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Exact,
    Contains,
    IContains,
    IContainsAny,
    IContainsAll,
    StartsWith,
    IStartsWith,
    EndsWith,
    Has,
    HasAny,
    HasAll,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub const ALL: [Comparison; 16] = [
        Comparison::Exact,
        Comparison::Contains,
        Comparison::IContains,
        Comparison::IContainsAny,
        Comparison::IContainsAll,
        Comparison::StartsWith,
        Comparison::IStartsWith,
        Comparison::EndsWith,
        Comparison::Has,
        Comparison::HasAny,
        Comparison::HasAll,
        Comparison::In,
        Comparison::Gt,
        Comparison::Gte,
        Comparison::Lt,
        Comparison::Lte,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Comparison::Exact => "exact",
            Comparison::Contains => "contains",
            Comparison::IContains => "icontains",
            Comparison::IContainsAny => "icontainsany",
            Comparison::IContainsAll => "icontainsall",
            Comparison::StartsWith => "startswith",
            Comparison::IStartsWith => "istartswith",
            Comparison::EndsWith => "endswith",
            Comparison::Has => "has",
            Comparison::HasAny => "hasany",
            Comparison::HasAll => "hasall",
            Comparison::In => "in",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
        }
    }

    /// Comparisons whose operand may itself be a filter description.
    pub fn takes_filters(&self) -> bool {
        matches!(self, Comparison::Has | Comparison::HasAny | Comparison::HasAll)
    }

    /// Apply a comparison whose operand is a plain value.
    ///
    /// `Has`, `HasAny` and `HasAll` are answered here only for scalar
    /// operands; nested filter operands are dispatched by the filter engine.
    pub fn apply(&self, subject: Option<&Value>, value: &Value, locale: &Locale) -> bool {
        match self {
            Comparison::Exact => strict_equal(subject, value),
            Comparison::Contains => contains(subject, value),
            Comparison::IContains => icontains(subject, value, locale),
            Comparison::IContainsAny => icontains_any(subject, value, locale),
            Comparison::IContainsAll => icontains_all(subject, value, locale),
            Comparison::StartsWith => starts_with(subject, value),
            Comparison::IStartsWith => istarts_with(subject, value, locale),
            Comparison::EndsWith => ends_with(subject, value),
            Comparison::Has => has(subject, value),
            Comparison::HasAny => operands(value).any(|v| has(subject, v)),
            Comparison::HasAll => operands(value).all(|v| has(subject, v)),
            Comparison::In => in_(subject, value),
            Comparison::Gt => ordered(subject, value, |o| o == Ordering::Greater),
            Comparison::Gte => ordered(subject, value, |o| o != Ordering::Less),
            Comparison::Lt => ordered(subject, value, |o| o == Ordering::Less),
            Comparison::Lte => ordered(subject, value, |o| o != Ordering::Greater),
        }
    }
}

impl FromStr for Comparison {
    type Err = CompendiumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Comparison::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lowered)
            .ok_or_else(|| CompendiumError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// An array operand yields its members, anything else yields itself.
fn operands(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(values) => Box::new(values.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

/// The host's string conversion.
pub fn js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => number_string(f),
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

// Plain decimals between 1e-6 and 1e21, exponent notation (`1e-7`, `1e+21`)
// outside that range.
fn number_string(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    let magnitude = f.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let exponential = format!("{f:e}");
        return match exponential.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
            _ => exponential,
        };
    }
    format!("{f}")
}

/// The host's numeric conversion; NaN for anything without a numeric reading.
pub fn js_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(values)) => match values.as_slice() {
            [] => 0.0,
            [single] => parse_number(&js_string(Some(single))),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings the host does not
        t if t.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Strict equality. Numbers compare by value, so `5` equals `5.0`.
pub fn strict_equal(subject: Option<&Value>, value: &Value) -> bool {
    match (subject, value) {
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Some(a), b) => a == b,
    }
}

pub fn contains(subject: Option<&Value>, value: &Value) -> bool {
    js_string(subject).contains(&js_string(Some(value)))
}

pub fn icontains(subject: Option<&Value>, value: &Value, locale: &Locale) -> bool {
    locale
        .to_lowercase(&js_string(subject))
        .contains(&locale.to_lowercase(&js_string(Some(value))))
}

pub fn icontains_any(subject: Option<&Value>, value: &Value, locale: &Locale) -> bool {
    let haystack = locale.to_lowercase(&js_string(subject));
    operands(value).any(|v| haystack.contains(&locale.to_lowercase(&js_string(Some(v)))))
}

pub fn icontains_all(subject: Option<&Value>, value: &Value, locale: &Locale) -> bool {
    let haystack = locale.to_lowercase(&js_string(subject));
    operands(value).all(|v| haystack.contains(&locale.to_lowercase(&js_string(Some(v)))))
}

pub fn starts_with(subject: Option<&Value>, value: &Value) -> bool {
    js_string(subject).starts_with(&js_string(Some(value)))
}

pub fn istarts_with(subject: Option<&Value>, value: &Value, locale: &Locale) -> bool {
    locale
        .to_lowercase(&js_string(subject))
        .starts_with(&locale.to_lowercase(&js_string(Some(value))))
}

pub fn ends_with(subject: Option<&Value>, value: &Value) -> bool {
    js_string(subject).ends_with(&js_string(Some(value)))
}

/// Membership of a scalar operand in the subject collection; `in_` with its
/// arguments reversed. A string subject is searched for the operand as a
/// substring.
pub fn has(subject: Option<&Value>, value: &Value) -> bool {
    match subject {
        Some(Value::Array(members)) => members.iter().any(|m| strict_equal(Some(m), value)),
        Some(Value::String(s)) => s.contains(&js_string(Some(value))),
        _ => false,
    }
}

/// The subject is a member of the operand (an array, or a string searched
/// for the stringified subject).
pub fn in_(subject: Option<&Value>, value: &Value) -> bool {
    match value {
        Value::Array(members) => members.iter().any(|m| strict_equal(subject, m)),
        Value::String(s) => s.contains(&js_string(subject)),
        _ => false,
    }
}

fn ordered(subject: Option<&Value>, value: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let ordering = match (subject, value) {
        (Some(Value::String(a)), Value::String(b)) => Some(a.cmp(b)),
        (a, b) => js_number(a).partial_cmp(&js_number(Some(b))),
    };
    // NaN on either side orders nothing
    ordering.is_some_and(accept)
}
