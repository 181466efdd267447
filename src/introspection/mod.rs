//! Schema introspection.
//!
//! `__schema` and `__type(name:)` are answered by re-entering the normal
//! resolver against an in-memory value tree describing the schema. The
//! tree is built once per schema and memoized; `__type` lookups build a
//! single entry on demand. The `types` list is ASCII-sorted by name,
//! which the registry's ordering provides for free.

use std::sync::Arc;

use crate::schema::host::{HostValue, Object};
use crate::schema::shape::{FieldShape, InputObjectShape, ObjectShape, TypeShape};
use crate::schema::{Schema, TypeEntry, TypeKind};

const TYPE_KIND_VALUES: [&str; 8] = [
    "SCALAR",
    "OBJECT",
    "INTERFACE",
    "UNION",
    "ENUM",
    "INPUT_OBJECT",
    "LIST",
    "NON_NULL",
];

const DIRECTIVE_LOCATIONS: [&str; 19] = [
    "QUERY",
    "MUTATION",
    "SUBSCRIPTION",
    "FIELD",
    "FRAGMENT_DEFINITION",
    "FRAGMENT_SPREAD",
    "INLINE_FRAGMENT",
    "VARIABLE_DEFINITION",
    "SCHEMA",
    "SCALAR",
    "OBJECT",
    "FIELD_DEFINITION",
    "ARGUMENT_DEFINITION",
    "INTERFACE",
    "UNION",
    "ENUM",
    "ENUM_VALUE",
    "INPUT_OBJECT",
    "INPUT_FIELD_DEFINITION",
];

/// Field lists of the introspection meta objects, in declaration order.
/// Types are written in GraphQL notation and expanded by `meta_ref`.
const META_OBJECT_FIELDS: [(&str, &[(&str, &str)]); 6] = [
    (
        "__Schema",
        &[
            ("types", "[__Type!]!"),
            ("queryType", "__Type!"),
            ("mutationType", "__Type!"),
            ("subscriptionType", "__Type"),
            ("directives", "[__Directive!]!"),
        ],
    ),
    (
        "__Type",
        &[
            ("kind", "__TypeKind!"),
            ("name", "String"),
            ("description", "String"),
            ("fields", "[__Field!]"),
            ("interfaces", "[__Type!]"),
            ("possibleTypes", "[__Type!]"),
            ("enumValues", "[__EnumValue!]"),
            ("inputFields", "[__InputValue!]"),
            ("ofType", "__Type"),
        ],
    ),
    (
        "__Field",
        &[
            ("name", "String!"),
            ("description", "String"),
            ("args", "[__InputValue!]!"),
            ("type", "__Type!"),
            ("isDeprecated", "Boolean!"),
            ("deprecationReason", "String"),
        ],
    ),
    (
        "__InputValue",
        &[
            ("name", "String!"),
            ("description", "String"),
            ("type", "__Type!"),
            ("defaultValue", "String"),
        ],
    ),
    (
        "__EnumValue",
        &[
            ("name", "String!"),
            ("description", "String"),
            ("isDeprecated", "Boolean!"),
            ("deprecationReason", "String"),
        ],
    ),
    (
        "__Directive",
        &[
            ("name", "String!"),
            ("description", "String"),
            ("locations", "[__DirectiveLocation!]!"),
            ("args", "[__InputValue!]!"),
        ],
    ),
];

/// The memoized `__schema` value tree.
pub(crate) fn schema_value(schema: &Schema) -> &HostValue {
    schema
        .introspection
        .get_or_init(|| HostValue::Object(build_schema_object(schema)))
}

/// A full `__Type` entry for `__type(name:)`.
pub(crate) fn type_by_name(schema: &Schema, name: &str) -> Option<Object> {
    schema
        .registry
        .get(name)
        .map(|entry| full_type_object(schema, name, entry))
}

fn build_schema_object(schema: &Schema) -> Object {
    let types: Vec<HostValue> = schema
        .registry
        .entries
        .iter()
        .map(|(name, entry)| HostValue::Object(full_type_object(schema, name, entry)))
        .collect();

    let subscription = match &schema.subscription {
        Some(root) => HostValue::Object(named_ref("OBJECT", root.type_name())),
        None => HostValue::Null,
    };

    Object::build("__Schema")
        .typed("types", object_list_shape(), HostValue::List(types))
        .object("queryType", named_ref("OBJECT", &schema.query.shape.name))
        .object(
            "mutationType",
            named_ref("OBJECT", &schema.mutation.shape.name),
        )
        .typed("subscriptionType", nullable_object_shape(), subscription)
        .typed(
            "directives",
            object_list_shape(),
            HostValue::List(vec![
                HostValue::Object(directive_object(
                    "skip",
                    "Directs the executor to skip this field or fragment when the `if` \
                     argument is true.",
                )),
                HostValue::Object(directive_object(
                    "include",
                    "Directs the executor to include this field or fragment only when \
                     the `if` argument is true.",
                )),
            ]),
        )
        .build()
}

fn full_type_object(schema: &Schema, name: &str, entry: &TypeEntry) -> Object {
    match entry {
        TypeEntry::Scalar => simple_type_object("SCALAR", name),
        TypeEntry::Enum(values) => enum_type_object(name, values),
        TypeEntry::Object(shape) => object_type_object(schema, name, shape),
        TypeEntry::InputObject(shape) => input_type_object(schema, name, shape),
        TypeEntry::Meta(TypeKind::Enum) => match name {
            "__TypeKind" => enum_type_object(name, &owned(&TYPE_KIND_VALUES)),
            _ => enum_type_object(name, &owned(&DIRECTIVE_LOCATIONS)),
        },
        TypeEntry::Meta(_) => meta_object_type_object(name),
    }
}

/// The common nine-field `__Type` skeleton; callers fill in the parts
/// their kind has.
fn type_object(
    kind: &str,
    name: Option<&str>,
    fields: HostValue,
    enum_values: HostValue,
    input_fields: HostValue,
    of_type: HostValue,
) -> Object {
    let name_value = match name {
        Some(n) => HostValue::String(n.to_owned()),
        None => HostValue::Null,
    };
    let interfaces = match kind {
        "OBJECT" => HostValue::List(Vec::new()),
        _ => HostValue::Null,
    };
    Object::build("__Type")
        .field("kind", kind)
        .typed("name", TypeShape::nullable(TypeShape::String), name_value)
        .typed(
            "description",
            TypeShape::nullable(TypeShape::String),
            HostValue::Null,
        )
        .typed("fields", nullable_object_list_shape(), fields)
        .typed("interfaces", nullable_object_list_shape(), interfaces)
        .typed(
            "possibleTypes",
            nullable_object_list_shape(),
            HostValue::Null,
        )
        .typed("enumValues", nullable_object_list_shape(), enum_values)
        .typed("inputFields", nullable_object_list_shape(), input_fields)
        .typed("ofType", nullable_object_shape(), of_type)
        .build()
}

fn simple_type_object(kind: &str, name: &str) -> Object {
    type_object(
        kind,
        Some(name),
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
    )
}

fn enum_type_object(name: &str, values: &[String]) -> Object {
    let entries = values
        .iter()
        .map(|value| {
            HostValue::Object(
                Object::build("__EnumValue")
                    .field("name", value.as_str())
                    .typed(
                        "description",
                        TypeShape::nullable(TypeShape::String),
                        HostValue::Null,
                    )
                    .field("isDeprecated", false)
                    .typed(
                        "deprecationReason",
                        TypeShape::nullable(TypeShape::String),
                        HostValue::Null,
                    )
                    .build(),
            )
        })
        .collect();
    type_object(
        "ENUM",
        Some(name),
        HostValue::Null,
        HostValue::List(entries),
        HostValue::Null,
        HostValue::Null,
    )
}

fn object_type_object(schema: &Schema, name: &str, shape: &Arc<ObjectShape>) -> Object {
    let mut fields = Vec::new();
    // The root query type carries the introspection entry points.
    if Arc::ptr_eq(shape, &schema.query.shape) {
        fields.push(HostValue::Object(field_object(
            "__schema",
            wrapper_ref("NON_NULL", named_ref("OBJECT", "__Schema")),
            Vec::new(),
        )));
        fields.push(HostValue::Object(field_object(
            "__type",
            named_ref("OBJECT", "__Type"),
            vec![input_value_object(
                "name",
                wrapper_ref("NON_NULL", named_ref("SCALAR", "String")),
            )],
        )));
    }
    for field in &shape.fields {
        fields.push(HostValue::Object(host_field_object(schema, field)));
    }
    type_object(
        "OBJECT",
        Some(name),
        HostValue::List(fields),
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
    )
}

fn input_type_object(schema: &Schema, name: &str, shape: &Arc<InputObjectShape>) -> Object {
    let fields = shape
        .fields
        .iter()
        .map(|field| {
            HostValue::Object(input_value_object(&field.name, type_ref(schema, &field.shape)))
        })
        .collect();
    type_object(
        "INPUT_OBJECT",
        Some(name),
        HostValue::Null,
        HostValue::Null,
        HostValue::List(fields),
        HostValue::Null,
    )
}

fn meta_object_type_object(name: &str) -> Object {
    let fields = META_OBJECT_FIELDS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, fields)| *fields)
        .unwrap_or(&[]);
    let entries = fields
        .iter()
        .map(|(field_name, type_text)| {
            HostValue::Object(field_object(field_name, meta_ref(type_text), Vec::new()))
        })
        .collect();
    type_object(
        "OBJECT",
        Some(name),
        HostValue::List(entries),
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
    )
}

fn host_field_object(schema: &Schema, field: &FieldShape) -> Object {
    let args = match &field.args {
        Some(input) => input
            .fields
            .iter()
            .map(|arg| input_value_object(&arg.name, type_ref(schema, &arg.shape)))
            .collect(),
        None => Vec::new(),
    };
    field_object(&field.name, type_ref(schema, &field.shape), args)
}

fn field_object(name: &str, type_ref: Object, args: Vec<Object>) -> Object {
    let args = args.into_iter().map(HostValue::Object).collect();
    Object::build("__Field")
        .field("name", name)
        .typed(
            "description",
            TypeShape::nullable(TypeShape::String),
            HostValue::Null,
        )
        .typed("args", object_list_shape(), HostValue::List(args))
        .object("type", type_ref)
        .field("isDeprecated", false)
        .typed(
            "deprecationReason",
            TypeShape::nullable(TypeShape::String),
            HostValue::Null,
        )
        .build()
}

fn input_value_object(name: &str, type_ref: Object) -> Object {
    Object::build("__InputValue")
        .field("name", name)
        .typed(
            "description",
            TypeShape::nullable(TypeShape::String),
            HostValue::Null,
        )
        .object("type", type_ref)
        .typed(
            "defaultValue",
            TypeShape::nullable(TypeShape::String),
            HostValue::Null,
        )
        .build()
}

fn directive_object(name: &str, description: &str) -> Object {
    let locations = ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"]
        .iter()
        .map(|&l| HostValue::String(l.to_owned()))
        .collect();
    Object::build("__Directive")
        .field("name", name)
        .field("description", description)
        .typed(
            "locations",
            TypeShape::list(TypeShape::String),
            HostValue::List(locations),
        )
        .typed(
            "args",
            object_list_shape(),
            HostValue::List(vec![HostValue::Object(input_value_object(
                "if",
                wrapper_ref("NON_NULL", named_ref("SCALAR", "Boolean")),
            ))]),
        )
        .build()
}

/// The type-reference form of a declared shape: plain shapes are
/// `NON_NULL` wrapped, `Nullable` strips the wrapper, lists nest.
fn type_ref(schema: &Schema, shape: &TypeShape) -> Object {
    match shape {
        TypeShape::Nullable(inner) => base_ref(schema, inner),
        _ => wrapper_ref("NON_NULL", base_ref(schema, shape)),
    }
}

fn base_ref(schema: &Schema, shape: &TypeShape) -> Object {
    match shape {
        TypeShape::Nullable(inner) => base_ref(schema, inner),
        TypeShape::List(inner) => wrapper_ref("LIST", type_ref(schema, inner)),
        TypeShape::Object(object) => named_ref("OBJECT", schema.registry.object_name(object)),
        TypeShape::InputObject(input) => {
            named_ref("INPUT_OBJECT", schema.registry.input_name(input))
        }
        TypeShape::Enum(name) => named_ref("ENUM", name),
        TypeShape::Boolean => named_ref("SCALAR", "Boolean"),
        TypeShape::Int(_) => named_ref("SCALAR", "Int"),
        TypeShape::Float | TypeShape::Float32 => named_ref("SCALAR", "Float"),
        TypeShape::String => named_ref("SCALAR", "String"),
        TypeShape::Time => named_ref("SCALAR", "Time"),
        TypeShape::File => named_ref("SCALAR", "File"),
        TypeShape::Id(_) => named_ref("SCALAR", "ID"),
    }
}

/// Expands GraphQL type notation (`[__Field!]!`) into reference objects
/// for the static meta-field tables.
fn meta_ref(text: &str) -> Object {
    if let Some(inner) = text.strip_suffix('!') {
        return wrapper_ref("NON_NULL", meta_ref(inner));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return wrapper_ref("LIST", meta_ref(inner));
    }
    let kind = match text {
        "String" | "Boolean" => "SCALAR",
        "__TypeKind" | "__DirectiveLocation" => "ENUM",
        _ => "OBJECT",
    };
    named_ref(kind, text)
}

fn named_ref(kind: &str, name: &str) -> Object {
    Object::build("__Type")
        .field("kind", kind)
        .typed(
            "name",
            TypeShape::nullable(TypeShape::String),
            HostValue::String(name.to_owned()),
        )
        .typed("ofType", nullable_object_shape(), HostValue::Null)
        .build()
}

fn wrapper_ref(kind: &str, of_type: Object) -> Object {
    Object::build("__Type")
        .field("kind", kind)
        .typed("name", TypeShape::nullable(TypeShape::String), HostValue::Null)
        .object("ofType", of_type)
        .build()
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|&v| v.to_owned()).collect()
}

/// Placeholder element shape for lists of introspection objects; the
/// resolver dispatches on each instance's own shape.
fn object_list_shape() -> TypeShape {
    TypeShape::list(TypeShape::Object(
        Object::build("__Type").build().shape().clone(),
    ))
}

fn nullable_object_list_shape() -> TypeShape {
    TypeShape::nullable(object_list_shape())
}

fn nullable_object_shape() -> TypeShape {
    TypeShape::nullable(TypeShape::Object(
        Object::build("__Type").build().shape().clone(),
    ))
}
