// Trigger - one normalized event stored in a trigger row

use crate::sheet::SheetError;
use crate::sheet::trigger::field::{FieldType, FieldValue};
use crate::sheet::trigger::schema::{KindSpec, schema};
use serde_json::Value;
use std::fmt;

/// An event `(kind, [fields])`
///
/// Registered kinds always carry exactly the fields their schema lists, each
/// accepted by its constraint. Unknown kinds are kept with their raw fields
/// and `valid == false`; they are shown but never played.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    kind: String,
    fields: Vec<FieldValue>,
    valid: bool,
}

impl Trigger {
    /// Build a trigger from raw input, normalizing every field
    pub fn new(kind: &str, raw_fields: &[Value]) -> Self {
        match schema().get(kind) {
            Some(spec) => Self {
                kind: kind.to_string(),
                fields: spec
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| field.normalize(raw_fields.get(i)))
                    .collect(),
                valid: true,
            },
            None => Self {
                kind: kind.to_string(),
                fields: raw_fields.iter().cloned().map(FieldValue::Raw).collect(),
                valid: false,
            },
        }
    }

    /// A trigger of `kind` with every field at its default
    pub fn with_defaults(kind: &str) -> Self {
        Self::new(kind, &[])
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn spec(&self) -> Option<&'static KindSpec> {
        schema().get(&self.kind)
    }

    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.spec().and_then(|spec| spec.field_type(index))
    }

    /// Cursor stops: the type head plus one per field
    pub fn slot_count(&self) -> usize {
        1 + self.fields.len()
    }

    /// Fields in stored form
    pub fn raw_fields(&self) -> Vec<Value> {
        self.fields.iter().map(FieldValue::to_json).collect()
    }

    /// Re-run construction on the stored form
    pub fn normalized(&self) -> Self {
        Self::new(&self.kind, &self.raw_fields())
    }

    /// Replace one field, applying the same coercion and default policy as construction
    pub fn replace_field(&mut self, index: usize, raw: &Value) -> Result<(), SheetError> {
        if index >= self.fields.len() {
            return Err(SheetError::NoSuchField { index });
        }

        self.fields[index] = match self.spec() {
            Some(spec) => spec.fields[index].normalize(Some(raw)),
            None => FieldValue::Raw(raw.clone()),
        };
        Ok(())
    }

    /// Reset one field to its schema default
    pub fn reset_field(&mut self, index: usize) -> Result<(), SheetError> {
        let spec = self.spec().ok_or(SheetError::NoSuchField { index })?;
        let field = spec.fields.get(index).ok_or(SheetError::NoSuchField { index })?;
        self.fields[index] = field.default.clone();
        Ok(())
    }

    /// Same fields under a different kind
    ///
    /// Fields that the new kind cannot accept fall back to its defaults.
    pub fn with_kind(&self, kind: &str) -> Self {
        Self::new(kind, &self.raw_fields())
    }

    /// Stored form `[kind, [fields...]]`
    pub fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.kind.clone()),
            Value::Array(self.raw_fields()),
        ])
    }

    /// Parse the stored form; `None` if the shape is not `[kind, [fields...]]`
    pub fn from_json(value: &Value) -> Option<Self> {
        let parts = value.as_array()?;
        let kind = parts.first()?.as_str()?;
        let fields = match parts.get(1) {
            Some(Value::Array(fields)) => fields.as_slice(),
            None => &[],
            Some(_) => return None,
        };
        Some(Self::new(kind, fields))
    }

    /// Text of the slot at `index` within this trigger (0 is the type head)
    pub fn slot_text(&self, index: usize) -> Option<String> {
        if index == 0 {
            return Some(self.kind.clone());
        }
        let field = self.fields.get(index - 1)?;
        Some(field.display_text(self.field_type(index - 1)))
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for index in 0..self.fields.len() {
            if let Some(text) = self.slot_text(index + 1) {
                write!(f, " {}", text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::tstamp::Tstamp;
    use serde_json::json;

    #[test]
    fn test_out_of_range_substituted() {
        let trigger = Trigger::new("C.i", &[json!("-1")]);
        assert!(trigger.is_valid());
        assert_eq!(trigger.fields(), &[FieldValue::Int(0)]);
    }

    #[test]
    fn test_unknown_kind_kept() {
        let trigger = Trigger::new("zzz", &[json!(1), json!(2)]);
        assert!(!trigger.is_valid());
        assert_eq!(trigger.raw_fields(), vec![json!(1), json!(2)]);
        assert_eq!(trigger.slot_count(), 3);
    }

    #[test]
    fn test_extra_and_missing_fields() {
        let extra = Trigger::new("n+", &[json!(300), json!("ignored")]);
        assert_eq!(extra.fields(), &[FieldValue::Real(300.0)]);

        let missing = Trigger::new("G.F", &[json!("cutoff")]);
        assert_eq!(
            missing.fields(),
            &[FieldValue::Str("cutoff".into()), FieldValue::Real(0.0)]
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            ("n+", vec![json!("C5")]),
            ("C.i", vec![json!(1000)]),
            ("C.P", vec![json!(-3.0)]),
            ("W/=t", vec![json!([2, 17])]),
            ("cp", vec![json!("yes")]),
            ("I.B", vec![json!("Bad Key"), json!(true)]),
            ("zzz", vec![json!({"a": 1}), json!(null)]),
            ("Cn-", vec![json!(1)]),
        ];
        for (kind, raw) in samples {
            let once = Trigger::new(kind, &raw);
            assert_eq!(once.normalized(), once, "kind {}", kind);
        }
    }

    #[test]
    fn test_tstamp_field() {
        let trigger = Trigger::new("W/=t", &[json!([2, 17])]);
        assert_eq!(trigger.fields(), &[FieldValue::Tstamp(Tstamp::new(2, 17))]);
    }

    #[test]
    fn test_replace_field() {
        let mut trigger = Trigger::new("C.P", &[json!(0.5)]);
        trigger.replace_field(0, &json!(2.0)).unwrap();
        assert_eq!(trigger.fields(), &[FieldValue::Real(0.0)]);
        trigger.replace_field(0, &json!("-0.25")).unwrap();
        assert_eq!(trigger.fields(), &[FieldValue::Real(-0.25)]);
        assert!(trigger.replace_field(1, &json!(0)).is_err());
    }

    #[test]
    fn test_stored_form() {
        let trigger = Trigger::new("n+", &[json!(300)]);
        assert_eq!(trigger.to_json(), json!(["n+", [300.0]]));
        assert_eq!(Trigger::from_json(&json!(["n+", [300.0]])), Some(trigger));
        assert_eq!(Trigger::from_json(&json!(["n-"])), Some(Trigger::new("n-", &[])));
        assert_eq!(Trigger::from_json(&json!({"kind": "n+"})), None);
    }

    #[test]
    fn test_display() {
        let trigger = Trigger::new("n+", &[json!(300)]);
        assert_eq!(trigger.to_string(), "n+ C5");
        assert_eq!(Trigger::new(".i", &[json!(3)]).to_string(), ".i 3");
    }
}
