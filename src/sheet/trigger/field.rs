// Trigger fields - typed values, coercion and domain constraints

use crate::sheet::trigger::notation;
use crate::sheet::tstamp::Tstamp;
use serde_json::Value;
use std::fmt;

/// Value type of a trigger field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    /// Finite real number
    Real,
    Bool,
    Tstamp,
    /// Pitch in cents relative to A4, stored as a real
    Note,
    /// Short key name such as a generator variable
    Identifier,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int => "integer",
            FieldType::Real => "real",
            FieldType::Bool => "boolean",
            FieldType::Tstamp => "timestamp",
            FieldType::Note => "note",
            FieldType::Identifier => "identifier",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            FieldType::Int,
            FieldType::Real,
            FieldType::Bool,
            FieldType::Tstamp,
            FieldType::Note,
            FieldType::Identifier,
        ]
        .into_iter()
        .find(|ty| ty.name() == name)
    }

    /// Coerce raw input to this type
    ///
    /// Returns `None` when the input cannot be read as this type at all;
    /// the caller substitutes the field default in that case.
    pub fn construct(&self, raw: &Value) -> Option<FieldValue> {
        match self {
            FieldType::Int => construct_int(raw).map(FieldValue::Int),
            FieldType::Real => construct_real(raw).map(FieldValue::Real),
            FieldType::Note => match raw {
                Value::String(s) => notation::parse_note(s)
                    .or_else(|| s.trim().parse::<f64>().ok())
                    .map(FieldValue::Real),
                _ => construct_real(raw).map(FieldValue::Real),
            },
            FieldType::Bool => construct_bool(raw).map(FieldValue::Bool),
            FieldType::Tstamp => construct_tstamp(raw).map(FieldValue::Tstamp),
            FieldType::Identifier => match raw {
                Value::String(s) => Some(FieldValue::Str(s.clone())),
                _ => None,
            },
        }
    }
}

fn construct_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn construct_real(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn construct_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn construct_tstamp(raw: &Value) -> Option<Tstamp> {
    match raw {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Tstamp::from_f64),
        _ => serde_json::from_value(raw.clone()).ok(),
    }
}

/// A stored field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    Tstamp(Tstamp),
    Str(String),
    /// Uninterpreted value of a trigger whose kind is not registered
    Raw(Value),
}

impl FieldValue {
    /// Stored (JSON) form of the value
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::Real(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Tstamp(ts) => {
                Value::Array(vec![Value::from(ts.beats()), Value::from(ts.rem())])
            }
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Raw(v) => v.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            FieldValue::Tstamp(ts) => Some(ts.as_f64()),
            _ => None,
        }
    }

    /// Canonical text shown in the sheet for a field of type `ty`
    pub fn display_text(&self, ty: Option<FieldType>) -> String {
        match (self, ty) {
            (FieldValue::Real(cents), Some(FieldType::Note)) => notation::format_note(*cents),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{:.1}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Tstamp(ts) => write!(f, "{:.2}", ts.as_f64()),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Raw(v) => write!(f, "{}", v),
        }
    }
}

/// Allowed domain of a field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// Any value of the field type (reals must still be finite)
    Any,
    /// `lo <= x < hi`
    IntRange(i64, i64),
    /// `lo <= x <= hi`
    RealRange(f64, f64),
    /// `x >= 0`
    NonNegative,
    /// `x > 0`
    Positive,
    /// Lowercase key name characters only
    Key,
}

impl Constraint {
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Int(v) => match *self {
                Constraint::Any => true,
                Constraint::IntRange(lo, hi) => lo <= *v && *v < hi,
                Constraint::NonNegative => *v >= 0,
                Constraint::Positive => *v > 0,
                Constraint::RealRange(lo, hi) => lo <= *v as f64 && *v as f64 <= hi,
                Constraint::Key => false,
            },
            FieldValue::Real(v) => {
                v.is_finite()
                    && match *self {
                        Constraint::Any => true,
                        Constraint::RealRange(lo, hi) => lo <= *v && *v <= hi,
                        Constraint::NonNegative => *v >= 0.0,
                        Constraint::Positive => *v > 0.0,
                        Constraint::IntRange(lo, hi) => lo as f64 <= *v && *v < hi as f64,
                        Constraint::Key => false,
                    }
            }
            FieldValue::Tstamp(ts) => match *self {
                Constraint::Any => true,
                Constraint::NonNegative => !ts.is_negative(),
                Constraint::Positive => *ts > Tstamp::ZERO,
                Constraint::RealRange(lo, hi) => lo <= ts.as_f64() && ts.as_f64() <= hi,
                _ => false,
            },
            FieldValue::Bool(_) => matches!(self, Constraint::Any),
            FieldValue::Str(s) => match self {
                Constraint::Any => true,
                Constraint::Key => s.chars().all(is_key_char),
                _ => false,
            },
            FieldValue::Raw(_) => false,
        }
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '/')
}

/// Positional field descriptor: constructor (the type), predicate, default
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub constraint: Constraint,
    pub default: FieldValue,
}

impl FieldSpec {
    pub fn new(name: &'static str, ty: FieldType, constraint: Constraint, default: FieldValue) -> Self {
        Self {
            name,
            ty,
            constraint,
            default,
        }
    }

    /// Coerce and validate one raw value, falling back to the default
    pub fn normalize(&self, raw: Option<&Value>) -> FieldValue {
        raw.and_then(|v| self.ty.construct(v))
            .filter(|v| self.constraint.accepts(v))
            .unwrap_or_else(|| self.default.clone())
    }
}
