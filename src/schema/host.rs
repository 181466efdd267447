//! Host-provided data.
//!
//! The engine never sees the host's own types; it walks [`Object`]s whose
//! fields are either plain [`HostValue`]s or method shims invoked with
//! coerced arguments. An [`ObjectBuilder`] captures both the values and
//! the declared [`TypeShape`]s in one pass, mirroring what reflection
//! over a struct would yield: an ordered field list with per-field type
//! metadata and method-invocation shims.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::execution::Ctx;
use crate::schema::naming;
use crate::schema::shape::{
    FieldShape, InputField, InputObjectShape, IntWidth, ObjectShape, TypeShape,
};
use crate::values::coercion::ResolvedArgs;

/// A file uploaded alongside the query, handed to resolvers through the
/// `File` scalar.
#[derive(Clone, Debug)]
pub struct FormFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

/// A resolved host value, the uniform output-side data representation.
#[derive(Clone, Debug)]
pub enum HostValue {
    /// A nil pointer, nil slice, or absent value at any nesting level.
    Null,
    Boolean(bool),
    Int(i64),
    Uint(u64),
    Float32(f32),
    Float(f64),
    String(String),
    /// A value of a registered enum.
    Enum(String),
    Time(DateTime<Utc>),
    List(Vec<HostValue>),
    Object(Object),
}

/// Conversion of host data into a [`HostValue`] together with its
/// statically-known [`TypeShape`]. The shape is type-level, not
/// value-level, so empty vectors and `None` still describe themselves.
pub trait HostScalar {
    fn type_shape() -> TypeShape;
    fn into_host(self) -> HostValue;
}

macro_rules! impl_host_scalars {
    ($(($T:ty, $shape:expr, $conv:expr)),* $(,)?) => {
        $(
            impl HostScalar for $T {
                fn type_shape() -> TypeShape {
                    $shape
                }
                fn into_host(self) -> HostValue {
                    $conv(self)
                }
            }
        )*
    };
}

impl_host_scalars![
    (bool, TypeShape::Boolean, HostValue::Boolean),
    (i8, TypeShape::Int(IntWidth::I8), |v| HostValue::Int(v as i64)),
    (i16, TypeShape::Int(IntWidth::I16), |v| HostValue::Int(
        v as i64
    )),
    (i32, TypeShape::Int(IntWidth::I32), |v| HostValue::Int(
        v as i64
    )),
    (i64, TypeShape::Int(IntWidth::I64), HostValue::Int),
    (u8, TypeShape::Int(IntWidth::U8), |v| HostValue::Uint(
        v as u64
    )),
    (u16, TypeShape::Int(IntWidth::U16), |v| HostValue::Uint(
        v as u64
    )),
    (u32, TypeShape::Int(IntWidth::U32), |v| HostValue::Uint(
        v as u64
    )),
    (u64, TypeShape::Int(IntWidth::U64), HostValue::Uint),
    (f32, TypeShape::Float32, HostValue::Float32),
    (f64, TypeShape::Float, HostValue::Float),
    (String, TypeShape::String, HostValue::String),
    (&str, TypeShape::String, |v: &str| HostValue::String(
        v.to_owned()
    )),
    (DateTime<Utc>, TypeShape::Time, HostValue::Time),
];

impl<T: HostScalar> HostScalar for Option<T> {
    fn type_shape() -> TypeShape {
        TypeShape::nullable(T::type_shape())
    }
    fn into_host(self) -> HostValue {
        match self {
            Some(v) => v.into_host(),
            None => HostValue::Null,
        }
    }
}

impl<T: HostScalar> HostScalar for Vec<T> {
    fn type_shape() -> TypeShape {
        TypeShape::list(T::type_shape())
    }
    fn into_host(self) -> HostValue {
        HostValue::List(self.into_iter().map(HostScalar::into_host).collect())
    }
}

pub(crate) type MethodFn =
    dyn Fn(&mut Ctx, ResolvedArgs) -> Result<HostValue, anyhow::Error> + Send + Sync;

/// A method-invocation shim: the host closure plus nothing else; the
/// declared argument and return shapes live on the field.
#[derive(Clone)]
pub struct Method {
    pub(crate) run: Arc<MethodFn>,
}

#[derive(Clone)]
pub(crate) enum FieldBinding {
    Value(HostValue),
    Method(Method),
}

/// A host object instance: its shape plus one binding per field, in
/// shape order.
#[derive(Clone)]
pub struct Object {
    pub(crate) shape: Arc<ObjectShape>,
    pub(crate) fields: Vec<FieldBinding>,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object({})", self.shape.name)
    }
}

impl Object {
    /// Starts building an object type with the given GraphQL type name.
    /// An empty name is auto-assigned `__UnknownType<N>` at schema build.
    pub fn build(name: &str) -> ObjectBuilder {
        ObjectBuilder {
            name: name.to_owned(),
            shapes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.shape.name
    }

    pub fn shape(&self) -> &Arc<ObjectShape> {
        &self.shape
    }

    /// Locates a field by GraphQL name: exact match first, then the
    /// first case-insensitive match.
    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        let fields = &self.shape.fields;
        fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)))
    }
}

/// Builds an [`Object`] and its [`ObjectShape`] together.
pub struct ObjectBuilder {
    name: String,
    shapes: Vec<FieldShape>,
    bindings: Vec<FieldBinding>,
}

impl ObjectBuilder {
    /// A plain data field. The host-side name is converted to its
    /// GraphQL form; the shape is inferred from the value's type.
    pub fn field<T: HostScalar>(self, name: &str, value: T) -> Self {
        self.push(
            naming::field_name(name),
            T::type_shape(),
            None,
            FieldBinding::Value(value.into_host()),
        )
    }

    /// A field holding a nested object.
    pub fn object(self, name: &str, value: Object) -> Self {
        let shape = TypeShape::Object(value.shape.clone());
        self.push(
            naming::field_name(name),
            shape,
            None,
            FieldBinding::Value(HostValue::Object(value)),
        )
    }

    /// A field holding a list of objects sharing `shape`. The shape is
    /// passed explicitly so empty lists still describe their element
    /// type.
    pub fn objects(self, name: &str, shape: &Arc<ObjectShape>, items: Vec<Object>) -> Self {
        let list = TypeShape::list(TypeShape::Object(shape.clone()));
        let values = items.into_iter().map(HostValue::Object).collect();
        self.push(
            naming::field_name(name),
            list,
            None,
            FieldBinding::Value(HostValue::List(values)),
        )
    }

    /// A field with an explicitly declared shape: nil lists, nullable
    /// objects, enums, IDs and other cases inference cannot see.
    pub fn typed(self, name: &str, shape: TypeShape, value: HostValue) -> Self {
        self.push(
            naming::field_name(name),
            shape,
            None,
            FieldBinding::Value(value),
        )
    }

    /// Like [`ObjectBuilder::typed`] but keeps the field name verbatim,
    /// the rename-tag analogue.
    pub fn typed_exact(self, name: &str, shape: TypeShape, value: HostValue) -> Self {
        self.push(name.to_owned(), shape, None, FieldBinding::Value(value))
    }

    /// A method field. A leading `Resolve` prefix is stripped from the
    /// name, which is then converted to its GraphQL form.
    pub fn resolver<F>(
        self,
        name: &str,
        returns: TypeShape,
        args: Vec<InputField>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut Ctx, ResolvedArgs) -> Result<HostValue, anyhow::Error>
            + Send
            + Sync
            + 'static,
    {
        let args = if args.is_empty() {
            None
        } else {
            Some(Arc::new(InputObjectShape {
                name: String::new(),
                fields: args,
            }))
        };
        self.push(
            naming::method_name(name),
            returns,
            args,
            FieldBinding::Method(Method { run: Arc::new(f) }),
        )
    }

    /// A method field whose arguments form a named input object.
    pub fn resolver_with_input<F>(
        self,
        name: &str,
        returns: TypeShape,
        args: Arc<InputObjectShape>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut Ctx, ResolvedArgs) -> Result<HostValue, anyhow::Error>
            + Send
            + Sync
            + 'static,
    {
        self.push(
            naming::method_name(name),
            returns,
            Some(args),
            FieldBinding::Method(Method { run: Arc::new(f) }),
        )
    }

    pub fn build(self) -> Object {
        Object {
            shape: Arc::new(ObjectShape {
                name: self.name,
                fields: self.shapes,
            }),
            fields: self.bindings,
        }
    }

    fn push(
        mut self,
        name: String,
        shape: TypeShape,
        args: Option<Arc<InputObjectShape>>,
        binding: FieldBinding,
    ) -> Self {
        self.shapes.push(FieldShape { name, shape, args });
        self.bindings.push(binding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_naming_rules() {
        let obj = Object::build("Data")
            .field("A", "x")
            .field("FooBar", 1i64)
            .field("BAR", true)
            .build();
        let names: Vec<&str> = obj.shape.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "fooBar", "BAR"]);
    }

    #[test]
    fn field_lookup_falls_back_to_case_insensitive() {
        let obj = Object::build("Data").field("FooBar", 1i64).build();
        assert_eq!(obj.field_index("fooBar"), Some(0));
        assert_eq!(obj.field_index("foobar"), Some(0));
        assert_eq!(obj.field_index("other"), None);
    }

    #[test]
    fn option_and_vec_shapes_are_type_level() {
        let shape = <Option<Vec<String>>>::type_shape();
        assert!(matches!(shape, TypeShape::Nullable(inner)
            if matches!(*inner, TypeShape::List(_))));
        assert!(matches!(
            <Option<String>>::into_host(None),
            HostValue::Null
        ));
    }
}
