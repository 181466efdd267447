//! Introspection tests: the playground schema query, `__type(name:)`
//! lookups and `__typename`.

use pretty_assertions::assert_eq;
use serde::Deserialize;

use graphlet::prelude::*;

/// The query GraphQL Playground sends to fetch the schema.
const SCHEMA_QUERY: &str = r#"
query IntrospectionQuery {
    __schema {
        queryType {
            name
        }
        mutationType {
            name
        }
        subscriptionType {
            name
        }
        types {
            ...FullType
        }
        directives {
            name
            description
            locations
            args {
                ...InputValue
            }
        }
    }
}

fragment FullType on __Type {
    kind
    name
    description
    fields(includeDeprecated: true) {
        name
        description
        args {
            ...InputValue
        }
        type {
            ...TypeRef
        }
        isDeprecated
        deprecationReason
    }
    inputFields {
        ...InputValue
    }
    interfaces {
        ...TypeRef
    }
    enumValues(includeDeprecated: true) {
        name
        description
        isDeprecated
        deprecationReason
    }
    possibleTypes {
        ...TypeRef
    }
}

fragment InputValue on __InputValue {
    name
    description
    type {
        ...TypeRef
    }
    defaultValue
}

fragment TypeRef on __Type {
    kind
    name
    ofType {
        kind
        name
        ofType {
            kind
            name
            ofType {
                kind
                name
                ofType {
                    kind
                    name
                    ofType {
                        kind
                        name
                        ofType {
                            kind
                            name
                            ofType {
                                kind
                                name
                            }
                        }
                    }
                }
            }
        }
    }
}
"#;

#[derive(Deserialize)]
struct IntroResponse {
    #[serde(rename = "__schema")]
    schema: IntroSchema,
}

#[derive(Deserialize)]
struct IntroSchema {
    #[serde(rename = "queryType")]
    query_type: IntroNamed,
    #[serde(rename = "mutationType")]
    mutation_type: IntroNamed,
    #[serde(rename = "subscriptionType")]
    subscription_type: Option<IntroNamed>,
    types: Vec<IntroType>,
    directives: Vec<IntroDirective>,
}

#[derive(Deserialize)]
struct IntroNamed {
    name: String,
}

#[derive(Deserialize)]
struct IntroType {
    kind: String,
    name: Option<String>,
    fields: Option<Vec<IntroField>>,
    #[serde(rename = "inputFields")]
    input_fields: Option<Vec<IntroInputValue>>,
    #[serde(rename = "enumValues")]
    enum_values: Option<Vec<IntroEnumValue>>,
}

#[derive(Deserialize)]
struct IntroField {
    name: String,
    #[serde(rename = "type")]
    type_ref: IntroTypeRef,
    args: Vec<IntroInputValue>,
}

#[derive(Deserialize)]
struct IntroInputValue {
    name: String,
}

#[derive(Deserialize)]
struct IntroEnumValue {
    name: String,
}

#[derive(Deserialize)]
struct IntroTypeRef {
    kind: String,
    name: Option<String>,
    #[serde(rename = "ofType")]
    of_type: Option<Box<IntroTypeRef>>,
}

#[derive(Deserialize)]
struct IntroDirective {
    name: String,
    locations: Vec<String>,
    args: Vec<IntroInputValue>,
}

fn introspect(schema: &Schema) -> IntroSchema {
    let res = schema.resolve(SCHEMA_QUERY, ResolveOptions::default());
    assert_eq!(res.errors, vec![], "introspection query reported errors");
    let parsed: IntroResponse = serde_json::from_str(&res.body)
        .unwrap_or_else(|e| panic!("introspection body failed to parse: {}\n{}", e, res.body));
    parsed.schema
}

fn assert_types(types: &[IntroType], expected: &[(&str, &str)]) {
    let got: Vec<(String, String)> = types
        .iter()
        .map(|t| {
            (
                t.kind.clone(),
                t.name.clone().unwrap_or_else(|| "<unnamed>".to_owned()),
            )
        })
        .collect();
    let want: Vec<(String, String)> = expected
        .iter()
        .map(|(kind, name)| (kind.to_string(), name.to_string()))
        .collect();
    assert_eq!(want, got);
}

#[test]
fn simple_schema_reports_builtins_and_meta_types() {
    let root = Object::build("SchemaSimpleData").build();
    let schema = Schema::build(root, None, None).unwrap();
    let intro = introspect(&schema);

    assert_eq!(intro.query_type.name, "SchemaSimpleData");
    assert_eq!(intro.mutation_type.name, "M");
    assert!(intro.subscription_type.is_none());

    assert_types(
        &intro.types,
        &[
            ("SCALAR", "Boolean"),
            ("SCALAR", "File"),
            ("SCALAR", "Float"),
            ("SCALAR", "ID"),
            ("SCALAR", "Int"),
            ("OBJECT", "M"),
            ("OBJECT", "SchemaSimpleData"),
            ("SCALAR", "String"),
            ("SCALAR", "Time"),
            ("OBJECT", "__Directive"),
            ("ENUM", "__DirectiveLocation"),
            ("OBJECT", "__EnumValue"),
            ("OBJECT", "__Field"),
            ("OBJECT", "__InputValue"),
            ("OBJECT", "__Schema"),
            ("OBJECT", "__Type"),
            ("ENUM", "__TypeKind"),
        ],
    );

    let directives: Vec<&str> = intro.directives.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(directives, vec!["skip", "include"]);
    for directive in &intro.directives {
        assert_eq!(
            directive.locations,
            vec!["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"]
        );
        assert_eq!(directive.args.len(), 1);
        assert_eq!(directive.args[0].name, "if");
    }
}

#[test]
fn registered_enums_join_the_type_list() {
    let root = Object::build("SchemaSimpleData")
        .typed(
            "E",
            TypeShape::Enum("TestEnum2".to_owned()),
            HostValue::Enum("A".to_owned()),
        )
        .build();
    let schema = Schema::builder()
        .register_enum("TestEnum2", &["A", "B"])
        .unwrap()
        .finish(root, None, None)
        .unwrap();
    let intro = introspect(&schema);

    let entry = intro
        .types
        .iter()
        .find(|t| t.name.as_deref() == Some("TestEnum2"))
        .expect("TestEnum2 missing from the type list");
    assert_eq!(entry.kind, "ENUM");
    let values: Vec<&str> = entry
        .enum_values
        .as_ref()
        .unwrap()
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(values, vec!["A", "B"]);
}

fn fields_schema() -> Schema {
    let widget = Object::build("WidgetData")
        .field("Foo", None::<String>)
        .field("Bar", "bar")
        .build();
    let widget_shape = widget.shape().clone();

    let b = Object::build("").field("Baz", "baz").build();
    let c = Object::build("")
        .objects("FooBar", &widget_shape, vec![])
        .build();

    let widget_for_d = widget.clone();
    let root = Object::build("SchemaRequestData")
        .object("A", widget)
        .object("B", b)
        .object("C", c)
        .resolver(
            "ResolveD",
            TypeShape::Object(widget_shape),
            vec![arg("Foo", input_object(vec![arg("Bar", TypeShape::String)]))],
            move |_, _| Ok(HostValue::Object(widget_for_d.clone())),
        )
        .build();
    Schema::build(root, None, None).unwrap()
}

#[test]
fn anonymous_shapes_get_assigned_names() {
    let schema = fields_schema();
    let intro = introspect(&schema);

    assert_types(
        &intro.types,
        &[
            ("SCALAR", "Boolean"),
            ("SCALAR", "File"),
            ("SCALAR", "Float"),
            ("SCALAR", "ID"),
            ("SCALAR", "Int"),
            ("OBJECT", "M"),
            ("OBJECT", "SchemaRequestData"),
            ("SCALAR", "String"),
            ("SCALAR", "Time"),
            ("OBJECT", "WidgetData"),
            ("OBJECT", "__Directive"),
            ("ENUM", "__DirectiveLocation"),
            ("OBJECT", "__EnumValue"),
            ("OBJECT", "__Field"),
            ("OBJECT", "__InputValue"),
            ("OBJECT", "__Schema"),
            ("OBJECT", "__Type"),
            ("ENUM", "__TypeKind"),
            ("INPUT_OBJECT", "__UnknownInput1"),
            ("OBJECT", "__UnknownType1"),
            ("OBJECT", "__UnknownType2"),
        ],
    );

    let query_type = intro
        .types
        .iter()
        .find(|t| t.name.as_deref() == Some("SchemaRequestData"))
        .unwrap();
    let fields = query_type.fields.as_ref().unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["__schema", "__type", "a", "b", "c", "d"]);

    for field in fields {
        if field.name == "__type" {
            assert_eq!(field.type_ref.kind, "OBJECT");
        } else {
            assert_eq!(field.type_ref.kind, "NON_NULL", "field {}", field.name);
            assert_eq!(
                field.type_ref.of_type.as_ref().unwrap().kind,
                "OBJECT",
                "field {}",
                field.name
            );
        }
    }

    let d = fields.iter().find(|f| f.name == "d").unwrap();
    assert_eq!(d.args.len(), 1);
    assert_eq!(d.args[0].name, "foo");

    let input = intro
        .types
        .iter()
        .find(|t| t.name.as_deref() == Some("__UnknownInput1"))
        .unwrap();
    assert_eq!(input.input_fields.as_ref().unwrap().len(), 1);
    assert_eq!(input.input_fields.as_ref().unwrap()[0].name, "bar");
}

#[test]
fn nullable_fields_skip_the_non_null_wrapper() {
    let schema = fields_schema();
    let intro = introspect(&schema);

    let widget = intro
        .types
        .iter()
        .find(|t| t.name.as_deref() == Some("WidgetData"))
        .unwrap();
    let fields = widget.fields.as_ref().unwrap();

    let foo = fields.iter().find(|f| f.name == "foo").unwrap();
    assert_eq!(foo.type_ref.kind, "SCALAR");
    assert_eq!(foo.type_ref.name.as_deref(), Some("String"));

    let bar = fields.iter().find(|f| f.name == "bar").unwrap();
    assert_eq!(bar.type_ref.kind, "NON_NULL");
    let inner = bar.type_ref.of_type.as_ref().unwrap();
    assert_eq!(inner.kind, "SCALAR");
    assert_eq!(inner.name.as_deref(), Some("String"));
}

#[test]
fn type_by_name() {
    let schema = fields_schema();
    let res = schema.resolve(
        r#"{__type(name: "WidgetData") {kind name}}"#,
        ResolveOptions::default(),
    );
    assert_eq!(res.errors, vec![]);
    assert_eq!(res.body, r#"{"__type":{"kind":"OBJECT","name":"WidgetData"}}"#);

    let res = schema.resolve(
        r#"{__type(name: "NoSuchType") {kind name}}"#,
        ResolveOptions::default(),
    );
    assert_eq!(res.errors, vec![]);
    assert_eq!(res.body, r#"{"__type":null}"#);
}

#[test]
fn typename_reports_the_static_type_name() {
    let schema = fields_schema();
    let res = schema.resolve("{a {__typename}}", ResolveOptions::default());
    assert_eq!(res.errors, vec![]);
    assert_eq!(res.body, r#"{"a":{"__typename":"WidgetData"}}"#);
}

#[test]
fn typename_at_the_root() {
    let schema = fields_schema();
    let res = schema.resolve("{__typename}", ResolveOptions::default());
    assert_eq!(res.errors, vec![]);
    assert_eq!(res.body, r#"{"__typename":"SchemaRequestData"}"#);
}

#[test]
fn meta_types_enumerate_their_own_fields() {
    let root = Object::build("SchemaSimpleData").build();
    let schema = Schema::build(root, None, None).unwrap();
    let intro = introspect(&schema);

    let type_type = intro
        .types
        .iter()
        .find(|t| t.name.as_deref() == Some("__Type"))
        .unwrap();
    let names: Vec<&str> = type_type
        .fields
        .as_ref()
        .unwrap()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "kind",
            "name",
            "description",
            "fields",
            "interfaces",
            "possibleTypes",
            "enumValues",
            "inputFields",
            "ofType",
        ]
    );

    let kind_values: Vec<&str> = intro
        .types
        .iter()
        .find(|t| t.name.as_deref() == Some("__TypeKind"))
        .unwrap()
        .enum_values
        .as_ref()
        .unwrap()
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(
        kind_values,
        vec![
            "SCALAR",
            "OBJECT",
            "INTERFACE",
            "UNION",
            "ENUM",
            "INPUT_OBJECT",
            "LIST",
            "NON_NULL",
        ]
    );
}
