//! Type descriptors for host-provided data.
//!
//! A [`TypeShape`] plays the role reflection plays in dynamic runtimes:
//! it tells the engine, per field, what the declared type is before any
//! value exists. Plain values are wrapped `NON_NULL` in the schema graph;
//! [`TypeShape::Nullable`] marks the pointer-like nullable case, and
//! [`TypeShape::Id`] marks a field as an `ID` scalar carried over its
//! underlying string or integer type.

use std::sync::Arc;

use crate::schema::naming;

/// Integer widths, used for input range checks and signedness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    pub(crate) fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntWidth::U8 | IntWidth::U16 | IntWidth::U32 | IntWidth::U64
        )
    }

    pub(crate) fn fits(self, v: i64) -> bool {
        match self {
            IntWidth::I8 => i8::try_from(v).is_ok(),
            IntWidth::I16 => i16::try_from(v).is_ok(),
            IntWidth::I32 => i32::try_from(v).is_ok(),
            IntWidth::I64 => true,
            IntWidth::U8 => u8::try_from(v).is_ok(),
            IntWidth::U16 => u16::try_from(v).is_ok(),
            IntWidth::U32 => u32::try_from(v).is_ok(),
            IntWidth::U64 => v >= 0,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "int8",
            IntWidth::I16 => "int16",
            IntWidth::I32 => "int32",
            IntWidth::I64 => "int64",
            IntWidth::U8 => "uint8",
            IntWidth::U16 => "uint16",
            IntWidth::U32 => "uint32",
            IntWidth::U64 => "uint64",
        }
    }
}

/// Declared type of a field, argument or method return value.
#[derive(Clone)]
pub enum TypeShape {
    Boolean,
    Int(IntWidth),
    Float32,
    Float,
    String,
    Time,
    /// The form-file scalar; only meaningful in argument positions.
    File,
    /// An `ID` scalar backed by the wrapped string or integer shape.
    Id(Box<TypeShape>),
    /// A registered enum, referenced by name.
    Enum(String),
    List(Box<TypeShape>),
    /// The pointer-like nullable wrapper.
    Nullable(Box<TypeShape>),
    Object(Arc<ObjectShape>),
    InputObject(Arc<InputObjectShape>),
}

impl std::fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeShape::Boolean => f.write_str("Boolean"),
            TypeShape::Int(w) => write!(f, "Int({})", w.name()),
            TypeShape::Float32 => f.write_str("Float32"),
            TypeShape::Float => f.write_str("Float"),
            TypeShape::String => f.write_str("String"),
            TypeShape::Time => f.write_str("Time"),
            TypeShape::File => f.write_str("File"),
            TypeShape::Id(inner) => write!(f, "Id({:?})", inner),
            TypeShape::Enum(name) => write!(f, "Enum({})", name),
            TypeShape::List(inner) => write!(f, "List({:?})", inner),
            TypeShape::Nullable(inner) => write!(f, "Nullable({:?})", inner),
            TypeShape::Object(shape) => write!(f, "Object({})", shape.name),
            TypeShape::InputObject(shape) => write!(f, "InputObject({})", shape.name),
        }
    }
}

impl TypeShape {
    pub fn list(inner: TypeShape) -> TypeShape {
        TypeShape::List(Box::new(inner))
    }

    pub fn nullable(inner: TypeShape) -> TypeShape {
        TypeShape::Nullable(Box::new(inner))
    }

    pub fn id(inner: TypeShape) -> TypeShape {
        TypeShape::Id(Box::new(inner))
    }
}

/// The descriptor of a host object type: its GraphQL name and ordered
/// field list.
pub struct ObjectShape {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldShape>,
}

impl std::fmt::Debug for ObjectShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectShape({})", self.name)
    }
}

pub struct FieldShape {
    /// GraphQL field name, after the naming rules have been applied.
    pub(crate) name: String,
    pub(crate) shape: TypeShape,
    /// Declared arguments; `Some` only for method fields with arguments.
    pub(crate) args: Option<Arc<InputObjectShape>>,
}

/// The descriptor of an input object (a method's argument struct or a
/// nested input). An empty name is auto-assigned `__UnknownInput<N>` when
/// the schema graph is built.
pub struct InputObjectShape {
    pub(crate) name: String,
    pub(crate) fields: Vec<InputField>,
}

impl std::fmt::Debug for InputObjectShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InputObjectShape({})", self.name)
    }
}

#[derive(Debug)]
pub struct InputField {
    pub(crate) name: String,
    pub(crate) shape: TypeShape,
}

/// Declares one method argument; the host-side name is converted to its
/// GraphQL form.
pub fn arg(name: &str, shape: TypeShape) -> InputField {
    InputField {
        name: naming::field_name(name),
        shape,
    }
}

/// Declares one method argument under the exact given name.
pub fn arg_exact(name: &str, shape: TypeShape) -> InputField {
    InputField {
        name: name.to_owned(),
        shape,
    }
}

/// An anonymous input object shape, auto-named at schema build.
pub fn input_object(fields: Vec<InputField>) -> TypeShape {
    TypeShape::InputObject(Arc::new(InputObjectShape {
        name: String::new(),
        fields,
    }))
}

/// A named input object shape.
pub fn named_input_object(name: &str, fields: Vec<InputField>) -> TypeShape {
    TypeShape::InputObject(Arc::new(InputObjectShape {
        name: name.to_owned(),
        fields,
    }))
}
