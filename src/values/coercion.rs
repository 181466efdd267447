//! Coercion of parsed argument values onto declared input shapes.
//!
//! Runs once per method invocation: variables are bound, integer widths
//! are range-checked, `Id`-wrapped shapes accept JSON strings and coerce
//! them onto their underlying type, `Time` strings are parsed, and the
//! `File` scalar is swapped for the uploaded file handle. Any failure
//! aborts the whole invocation with a single error and the field
//! resolves to `null`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::QueryError;
use crate::execution::GetFormFile;
use crate::schema::host::FormFile;
use crate::schema::shape::{InputObjectShape, IntWidth, TypeShape};
use crate::values::{Value, ValueKind};

/// A fully coerced argument value as handed to a method shim.
#[derive(Clone, Debug)]
pub enum ArgValue {
    Null,
    Boolean(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Enum(String),
    Time(DateTime<Utc>),
    File(Arc<FormFile>),
    List(Vec<ArgValue>),
    Object(IndexMap<String, ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) | ArgValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            ArgValue::Uint(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ArgValue::Uint(u) => Some(*u),
            ArgValue::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Float(f) => Some(*f),
            ArgValue::Int(i) => Some(*i as f64),
            ArgValue::Uint(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            ArgValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<FormFile>> {
        match self {
            ArgValue::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, ArgValue>> {
        match self {
            ArgValue::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

/// The coerced arguments of one method invocation. Arguments the query
/// did not provide are simply absent.
#[derive(Clone, Debug, Default)]
pub struct ResolvedArgs {
    values: IndexMap<String, ArgValue>,
}

impl ResolvedArgs {
    pub(crate) fn new(values: IndexMap<String, ArgValue>) -> Self {
        ResolvedArgs { values }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        match self.values.get(name) {
            Some(ArgValue::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(ArgValue::as_u64)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_f64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    pub fn time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(ArgValue::as_time)
    }

    pub fn file(&self, name: &str) -> Option<&Arc<FormFile>> {
        self.get(name).and_then(ArgValue::as_file)
    }

    pub fn list(&self, name: &str) -> Option<&[ArgValue]> {
        self.get(name).and_then(ArgValue::as_list)
    }

    pub fn object(&self, name: &str) -> Option<&IndexMap<String, ArgValue>> {
        self.get(name).and_then(ArgValue::as_object)
    }
}

pub(crate) struct CoercionCtx<'a> {
    pub(crate) variables: &'a HashMap<String, Value>,
    pub(crate) enums: &'a BTreeMap<String, Vec<String>>,
    pub(crate) get_form_file: Option<&'a GetFormFile>,
}

/// Coerces the provided arguments onto a declared input shape. Declared
/// arguments the query omits stay absent; provided arguments the shape
/// does not declare are dropped.
pub(crate) fn coerce_arguments(
    cc: &CoercionCtx<'_>,
    shape: &InputObjectShape,
    provided: &IndexMap<String, Value>,
) -> Result<ResolvedArgs, QueryError> {
    let mut out = IndexMap::with_capacity(provided.len());
    for field in &shape.fields {
        if let Some(value) = provided.get(&field.name) {
            out.insert(field.name.clone(), coerce_input(cc, &field.shape, value)?);
        }
    }
    Ok(ResolvedArgs::new(out))
}

pub(crate) fn coerce_input(
    cc: &CoercionCtx<'_>,
    shape: &TypeShape,
    value: &Value,
) -> Result<ArgValue, QueryError> {
    let bound;
    let value = match value {
        Value::Variable(name) => {
            bound = bind_variable(shape, cc.variables.get(name).unwrap_or(&Value::Null))?;
            &bound
        }
        v => v,
    };

    if let TypeShape::Nullable(inner) = shape {
        return match value {
            Value::Null => Ok(ArgValue::Null),
            _ => coerce_input(cc, inner, value),
        };
    }
    if let Value::Null = value {
        return Ok(ArgValue::Null);
    }

    match shape {
        TypeShape::Nullable(_) => unreachable!("handled above"),
        TypeShape::Boolean => match value {
            Value::Boolean(b) => Ok(ArgValue::Boolean(*b)),
            other => Err(mismatch(other, "Boolean")),
        },
        TypeShape::Int(width) => match value {
            Value::Int(i) if width.fits(*i) => Ok(int_value(*width, *i)),
            Value::Int(i) => Err(QueryError::Coercion(format!(
                "value {} is out of range for {}",
                i,
                width.name()
            ))),
            other => Err(mismatch(other, "Int")),
        },
        TypeShape::Float | TypeShape::Float32 => match value {
            Value::Float(f) => Ok(ArgValue::Float(*f)),
            Value::Int(i) => Ok(ArgValue::Float(*i as f64)),
            other => Err(mismatch(other, "Float")),
        },
        TypeShape::String => match value {
            Value::String(s) => Ok(ArgValue::String(s.clone())),
            other => Err(mismatch(other, "String")),
        },
        TypeShape::Time => match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| ArgValue::Time(t.into()))
                .map_err(|_| {
                    QueryError::Coercion(format!("cannot parse {:?} as an RFC 3339 time", s))
                }),
            other => Err(mismatch(other, "Time")),
        },
        TypeShape::File => match value {
            Value::String(key) => match cc.get_form_file {
                Some(get) => match get(key) {
                    Ok(Some(file)) => Ok(ArgValue::File(file)),
                    Ok(None) => Ok(ArgValue::Null),
                    Err(e) => Err(QueryError::Coercion(e.to_string())),
                },
                None => Ok(ArgValue::Null),
            },
            other => Err(mismatch(other, "File")),
        },
        TypeShape::Id(inner) => coerce_id(inner, value),
        TypeShape::Enum(name) => {
            let given = match value {
                Value::Enum(v) | Value::String(v) => v,
                other => return Err(mismatch(other, name)),
            };
            match cc.enums.get(name) {
                Some(values) if values.iter().any(|v| v == given) => {
                    Ok(ArgValue::Enum(given.clone()))
                }
                _ => Err(QueryError::Coercion(format!(
                    "{} is not a value of enum {}",
                    given, name
                ))),
            }
        }
        TypeShape::List(inner) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| coerce_input(cc, inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::List),
            other => Err(mismatch(other, "a list")),
        },
        TypeShape::InputObject(input) => match value {
            Value::Object(fields) => {
                let mut out = IndexMap::with_capacity(fields.len());
                for field in &input.fields {
                    if let Some(v) = fields.get(&field.name) {
                        out.insert(field.name.clone(), coerce_input(cc, &field.shape, v)?);
                    }
                }
                Ok(ArgValue::Object(out))
            }
            other => Err(mismatch(other, "an input object")),
        },
        TypeShape::Object(shape) => Err(QueryError::Coercion(format!(
            "object type {} is not usable as an input",
            shape.name
        ))),
    }
}

/// IDs arrive as JSON strings and coerce onto their underlying type:
/// numeric targets reject non-numeric strings, unsigned targets reject
/// negative values. Plain integers are accepted for numeric targets.
fn coerce_id(inner: &TypeShape, value: &Value) -> Result<ArgValue, QueryError> {
    match inner {
        TypeShape::String => match value {
            Value::String(s) => Ok(ArgValue::String(s.clone())),
            other => Err(mismatch(other, "ID")),
        },
        TypeShape::Int(width) => {
            let num: i64 = match value {
                Value::Int(i) => *i,
                Value::String(s) => s.parse().map_err(|_| {
                    QueryError::Coercion(format!("id value {:?} is not a number", s))
                })?,
                other => return Err(mismatch(other, "ID")),
            };
            if width.is_unsigned() && num < 0 {
                return Err(QueryError::Coercion(format!(
                    "id value {} may not be negative",
                    num
                )));
            }
            if !width.fits(num) {
                return Err(QueryError::Coercion(format!(
                    "id value {} is out of range for {}",
                    num,
                    width.name()
                )));
            }
            Ok(int_value(*width, num))
        }
        other => Err(QueryError::Coercion(format!(
            "ID fields must be backed by strings or integers, not {:?}",
            other
        ))),
    }
}

fn int_value(width: IntWidth, v: i64) -> ArgValue {
    if width.is_unsigned() {
        ArgValue::Uint(v as u64)
    } else {
        ArgValue::Int(v)
    }
}

/// Binds a variable value into an argument position, checking the tag
/// the declared shape expects.
fn bind_variable(shape: &TypeShape, value: &Value) -> Result<Value, QueryError> {
    if matches!(value, Value::Null) {
        return Ok(Value::Null);
    }
    let expected = match expected_kind(shape) {
        Some(k) => k,
        None => return Ok(value.clone()),
    };
    let mut slot = Value::Null;
    match slot.copy_from(value, expected) {
        Ok(()) => Ok(slot),
        // Int-valued variables are acceptable where a float is expected.
        Err(_) if expected == ValueKind::Float && value.kind() == Some(ValueKind::Int) => {
            Ok(value.clone())
        }
        Err(e) => Err(e),
    }
}

fn expected_kind(shape: &TypeShape) -> Option<ValueKind> {
    match shape {
        TypeShape::Boolean => Some(ValueKind::Boolean),
        TypeShape::Int(_) => Some(ValueKind::Int),
        TypeShape::Float | TypeShape::Float32 => Some(ValueKind::Float),
        TypeShape::String | TypeShape::Time | TypeShape::File | TypeShape::Enum(_) => {
            Some(ValueKind::String)
        }
        TypeShape::Id(_) => Some(ValueKind::String),
        TypeShape::List(_) => Some(ValueKind::List),
        TypeShape::InputObject(_) => Some(ValueKind::Object),
        TypeShape::Nullable(inner) => expected_kind(inner),
        TypeShape::Object(_) => None,
    }
}

fn mismatch(value: &Value, want: &str) -> QueryError {
    let got = match value {
        Value::Null => "null",
        Value::Variable(_) => "a variable",
        Value::Enum(_) => "an enum value",
        Value::Int(_) => "an int",
        Value::Float(_) => "a float",
        Value::String(_) => "a string",
        Value::Boolean(_) => "a boolean",
        Value::List(_) => "a list",
        Value::Object(_) => "an object",
    };
    QueryError::Coercion(format!("cannot use {} where {} is expected", got, want))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::shape::arg;

    fn cc<'a>(
        variables: &'a HashMap<String, Value>,
        enums: &'a BTreeMap<String, Vec<String>>,
    ) -> CoercionCtx<'a> {
        CoercionCtx {
            variables,
            enums,
            get_form_file: None,
        }
    }

    fn coerce(shape: &TypeShape, value: &Value) -> Result<ArgValue, QueryError> {
        let variables = HashMap::new();
        let enums = BTreeMap::new();
        coerce_input(&cc(&variables, &enums), shape, value)
    }

    #[test]
    fn int_widths_are_range_checked() {
        assert!(coerce(&TypeShape::Int(IntWidth::I8), &Value::Int(127)).is_ok());
        assert!(coerce(&TypeShape::Int(IntWidth::I8), &Value::Int(128)).is_err());
        assert!(coerce(&TypeShape::Int(IntWidth::U8), &Value::Int(-1)).is_err());
    }

    #[test]
    fn ids_coerce_strings_onto_numeric_targets() {
        let shape = TypeShape::id(TypeShape::Int(IntWidth::U64));
        assert!(matches!(
            coerce(&shape, &Value::String("42".into())),
            Ok(ArgValue::Uint(42))
        ));
        assert!(coerce(&shape, &Value::String("not a number".into())).is_err());
        assert!(coerce(&shape, &Value::String("-10".into())).is_err());
    }

    #[test]
    fn floats_accept_ints() {
        assert!(matches!(
            coerce(&TypeShape::Float, &Value::Int(3)),
            Ok(ArgValue::Float(f)) if f == 3.0
        ));
    }

    #[test]
    fn variables_bind_with_tag_checks() {
        let mut variables = HashMap::new();
        variables.insert("v".to_owned(), Value::String("hi".into()));
        let enums = BTreeMap::new();
        let ctx = cc(&variables, &enums);

        let ok = coerce_input(&ctx, &TypeShape::String, &Value::Variable("v".into()));
        assert!(matches!(ok, Ok(ArgValue::String(s)) if s == "hi"));

        let err = coerce_input(
            &ctx,
            &TypeShape::Int(IntWidth::I64),
            &Value::Variable("v".into()),
        );
        assert!(matches!(
            err,
            Err(QueryError::TypeMismatch {
                expected: ValueKind::Int
            })
        ));
    }

    #[test]
    fn unbound_variables_resolve_to_null() {
        let variables = HashMap::new();
        let enums = BTreeMap::new();
        let got = coerce_input(
            &cc(&variables, &enums),
            &TypeShape::String,
            &Value::Variable("missing".into()),
        );
        assert!(matches!(got, Ok(ArgValue::Null)));
    }

    #[test]
    fn input_objects_coerce_declared_fields_only() {
        let shape = crate::schema::shape::input_object(vec![arg("B", TypeShape::String)]);
        let mut provided = IndexMap::new();
        provided.insert("b".to_owned(), Value::String("foo".into()));
        provided.insert("undeclared".to_owned(), Value::Int(1));
        let got = coerce(&shape, &Value::Object(provided)).unwrap();
        let fields = got.as_object().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["b"].as_str(), Some("foo"));
    }

    #[test]
    fn enums_validate_against_registration() {
        let variables = HashMap::new();
        let mut enums = BTreeMap::new();
        enums.insert("Color".to_owned(), vec!["RED".to_owned(), "BLUE".to_owned()]);
        let ctx = cc(&variables, &enums);
        let shape = TypeShape::Enum("Color".to_owned());

        assert!(coerce_input(&ctx, &shape, &Value::Enum("RED".into())).is_ok());
        assert!(coerce_input(&ctx, &shape, &Value::Enum("GREEN".into())).is_err());
    }
}
