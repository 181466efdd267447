//! GraphQL input values.
//!
//! A [`Value`] is the uniform container for everything that can appear in
//! an argument position: scalars, enums, null, variables, lists and input
//! objects. Values are produced by the query parser, round-tripped through
//! the bytecode stream, and consumed by argument coercion.

pub mod coercion;

use indexmap::IndexMap;
use serde_json::Number;

use crate::error::QueryError;

/// An ordered map from argument name to value. Order is the declaration
/// order in the query; it only matters for stable error paths.
pub type Arguments = IndexMap<String, Value>;

/// The scalar-tag set of a [`Value`]. `Null`, `Variable` and `Enum` are
/// flags rather than kinds and deliberately have no entry here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    String,
    Boolean,
    List,
    Object,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Int => "Int",
            ValueKind::Float => "Float",
            ValueKind::String => "String",
            ValueKind::Boolean => "Boolean",
            ValueKind::List => "List",
            ValueKind::Object => "Object",
        };
        f.write_str(name)
    }
}

/// A GraphQL input value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    /// An unbound variable reference; binding happens at resolve time.
    Variable(String),
    /// A bare identifier that is neither `true`, `false` nor `null`.
    Enum(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    List(Vec<Value>),
    Object(Arguments),
}

impl Value {
    /// The scalar tag, or `None` for the `Null`/`Variable`/`Enum` flags.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Int(_) => Some(ValueKind::Int),
            Value::Float(_) => Some(ValueKind::Float),
            Value::String(_) => Some(ValueKind::String),
            Value::Boolean(_) => Some(ValueKind::Boolean),
            Value::List(_) => Some(ValueKind::List),
            Value::Object(_) => Some(ValueKind::Object),
            Value::Null | Value::Variable(_) | Value::Enum(_) => None,
        }
    }

    /// Replaces `self` with `other`, requiring `other` to carry the
    /// expected scalar tag. Used to bind variable values into argument
    /// positions.
    pub fn copy_from(&mut self, other: &Value, expected: ValueKind) -> Result<(), QueryError> {
        if other.kind() != Some(expected) {
            return Err(QueryError::TypeMismatch { expected });
        }
        *self = other.clone();
        Ok(())
    }

    /// Converts a `serde_json::Value`, the transport format for variable
    /// bindings.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::from_number(&n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn from_number(n: &Number) -> Value {
        match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_from_binds_matching_kinds() {
        let mut target = Value::Null;
        target
            .copy_from(&Value::String("hello".into()), ValueKind::String)
            .unwrap();
        assert_eq!(target, Value::String("hello".into()));
    }

    #[test]
    fn copy_from_rejects_kind_mismatch() {
        let mut target = Value::Null;
        let err = target
            .copy_from(&Value::Int(3), ValueKind::String)
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::TypeMismatch {
                expected: ValueKind::String
            }
        );
        assert_eq!(target, Value::Null);
    }

    #[test]
    fn flags_have_no_kind() {
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::Variable("v".into()).kind(), None);
        assert_eq!(Value::Enum("RED".into()).kind(), None);
        assert_eq!(Value::Int(1).kind(), Some(ValueKind::Int));
    }

    #[test]
    fn json_numbers_split_into_int_and_float() {
        assert_eq!(Value::from_json(serde_json::json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
    }
}
