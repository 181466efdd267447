//! Schema construction.
//!
//! [`Schema::build`] takes the host's root objects, walks every reachable
//! shape once, and produces the type registry that powers field errors,
//! `__typename` and introspection. The registry is ordered by name
//! (ASCII-ascending), which is also the order `__schema { types }`
//! reports.

pub mod host;
pub mod shape;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use slog::{o, Discard, Logger};

use crate::error::SchemaError;
use crate::schema::host::{HostValue, Object};
use crate::schema::shape::{InputObjectShape, ObjectShape, TypeShape};

/// The GraphQL type kinds of the schema graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object,
    InputObject,
    Enum,
    List,
    NonNull,
    Interface,
    Union,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Scalar => "SCALAR",
            TypeKind::Object => "OBJECT",
            TypeKind::InputObject => "INPUT_OBJECT",
            TypeKind::Enum => "ENUM",
            TypeKind::List => "LIST",
            TypeKind::NonNull => "NON_NULL",
            TypeKind::Interface => "INTERFACE",
            TypeKind::Union => "UNION",
        }
    }
}

/// Built-in scalar names, always present in the type registry.
pub(crate) const BUILTIN_SCALARS: [&str; 7] =
    ["Boolean", "File", "Float", "ID", "Int", "String", "Time"];

/// Introspection meta types, always present in the type registry.
pub(crate) const META_TYPES: [(&str, TypeKind); 8] = [
    ("__Directive", TypeKind::Object),
    ("__DirectiveLocation", TypeKind::Enum),
    ("__EnumValue", TypeKind::Object),
    ("__Field", TypeKind::Object),
    ("__InputValue", TypeKind::Object),
    ("__Schema", TypeKind::Object),
    ("__Type", TypeKind::Object),
    ("__TypeKind", TypeKind::Enum),
];

lazy_static! {
    static ref DEFAULT_MAX_DEPTH: u8 = std::env::var("GRAPHLET_MAX_DEPTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(255);
}

pub(crate) enum TypeEntry {
    Scalar,
    Object(Arc<ObjectShape>),
    InputObject(Arc<InputObjectShape>),
    Enum(Vec<String>),
    /// An introspection meta type; its details live in static tables.
    Meta(TypeKind),
}

/// All named types reachable from the schema roots, keyed by name.
pub(crate) struct TypeRegistry {
    pub(crate) entries: BTreeMap<String, TypeEntry>,
    /// Auto-assigned names for anonymous shapes, keyed by shape address.
    names: HashMap<usize, String>,
}

impl TypeRegistry {
    pub(crate) fn object_name<'s>(&'s self, shape: &'s Arc<ObjectShape>) -> &'s str {
        if !shape.name.is_empty() {
            return &shape.name;
        }
        self.names
            .get(&(Arc::as_ptr(shape) as usize))
            .map(String::as_str)
            .unwrap_or("__UnknownType")
    }

    pub(crate) fn input_name<'s>(&'s self, shape: &'s Arc<InputObjectShape>) -> &'s str {
        if !shape.name.is_empty() {
            return &shape.name;
        }
        self.names
            .get(&(Arc::as_ptr(shape) as usize))
            .map(String::as_str)
            .unwrap_or("__UnknownInput")
    }

    pub(crate) fn get(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.get(name)
    }
}

/// A parsed schema: host roots plus the memoized type graph.
pub struct Schema {
    pub(crate) query: Object,
    pub(crate) mutation: Object,
    pub(crate) subscription: Option<Object>,
    pub(crate) enums: BTreeMap<String, Vec<String>>,
    pub(crate) registry: TypeRegistry,
    pub(crate) logger: Logger,
    /// Selection-set depth cap; guards cyclic host graphs.
    pub max_depth: u8,
    pub(crate) introspection: OnceCell<HostValue>,
}

impl Schema {
    /// Builds a schema from host roots. A missing mutation root still
    /// registers an empty `M` type; a missing subscription root makes
    /// subscription operators fail at resolve time.
    pub fn build(
        query: Object,
        mutation: Option<Object>,
        subscription: Option<Object>,
    ) -> Result<Schema, SchemaError> {
        SchemaBuilder::new().finish(query, mutation, subscription)
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub(crate) fn object_name<'s>(&'s self, shape: &'s Arc<ObjectShape>) -> &'s str {
        self.registry.object_name(shape)
    }
}

/// Configures enum registration and logging before the schema is built.
pub struct SchemaBuilder {
    enums: BTreeMap<String, Vec<String>>,
    logger: Logger,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder {
            enums: BTreeMap::new(),
            logger: Logger::root(Discard, o!()),
        }
    }

    /// Registers an enum name and its value set. Fields declared with
    /// `TypeShape::Enum(name)` resolve against this registration.
    pub fn register_enum(
        mut self,
        name: &str,
        values: &[&str],
    ) -> Result<Self, SchemaError> {
        if values.is_empty() {
            return Err(SchemaError::EmptyEnum(name.to_owned()));
        }
        if BUILTIN_SCALARS.contains(&name) || name.starts_with("__") {
            return Err(SchemaError::ReservedEnumName(name.to_owned()));
        }
        let previous = self
            .enums
            .insert(name.to_owned(), values.iter().map(|&v| v.to_owned()).collect());
        if previous.is_some() {
            return Err(SchemaError::DuplicateEnum(name.to_owned()));
        }
        Ok(self)
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn finish(
        self,
        query: Object,
        mutation: Option<Object>,
        subscription: Option<Object>,
    ) -> Result<Schema, SchemaError> {
        let mutation = mutation.unwrap_or_else(|| Object::build("M").build());
        let registry = build_registry(&query, &mutation, subscription.as_ref(), &self.enums)?;
        Ok(Schema {
            query,
            mutation,
            subscription,
            enums: self.enums,
            registry,
            logger: self.logger,
            max_depth: *DEFAULT_MAX_DEPTH,
            introspection: OnceCell::new(),
        })
    }
}

struct RegistryWalk<'a> {
    registry: TypeRegistry,
    visited: HashSet<usize>,
    enums: &'a BTreeMap<String, Vec<String>>,
    unknown_types: usize,
    unknown_inputs: usize,
}

fn build_registry(
    query: &Object,
    mutation: &Object,
    subscription: Option<&Object>,
    enums: &BTreeMap<String, Vec<String>>,
) -> Result<TypeRegistry, SchemaError> {
    let mut walk = RegistryWalk {
        registry: TypeRegistry {
            entries: BTreeMap::new(),
            names: HashMap::new(),
        },
        visited: HashSet::new(),
        enums,
        unknown_types: 0,
        unknown_inputs: 0,
    };

    for scalar in BUILTIN_SCALARS {
        walk.registry
            .entries
            .insert(scalar.to_owned(), TypeEntry::Scalar);
    }
    for (name, kind) in META_TYPES {
        walk.registry
            .entries
            .insert(name.to_owned(), TypeEntry::Meta(kind));
    }
    for (name, values) in enums {
        walk.registry
            .entries
            .insert(name.clone(), TypeEntry::Enum(values.clone()));
    }

    walk.object(&query.shape)?;
    walk.object(&mutation.shape)?;
    if let Some(subscription) = subscription {
        walk.object(&subscription.shape)?;
    }
    Ok(walk.registry)
}

impl RegistryWalk<'_> {
    fn object(&mut self, shape: &Arc<ObjectShape>) -> Result<(), SchemaError> {
        if !self.visited.insert(Arc::as_ptr(shape) as usize) {
            return Ok(());
        }
        let name = if shape.name.is_empty() {
            self.unknown_types += 1;
            let assigned = format!("__UnknownType{}", self.unknown_types);
            self.registry
                .names
                .insert(Arc::as_ptr(shape) as usize, assigned.clone());
            assigned
        } else {
            shape.name.clone()
        };
        self.registry
            .entries
            .entry(name)
            .or_insert_with(|| TypeEntry::Object(shape.clone()));

        for field in &shape.fields {
            self.shape(&field.shape)?;
            // The argument list itself is not a type; only input objects
            // nested inside argument shapes are.
            if let Some(args) = &field.args {
                for arg in &args.fields {
                    self.shape(&arg.shape)?;
                }
            }
        }
        Ok(())
    }

    fn input(&mut self, shape: &Arc<InputObjectShape>) -> Result<(), SchemaError> {
        if !self.visited.insert(Arc::as_ptr(shape) as usize) {
            return Ok(());
        }
        let name = if shape.name.is_empty() {
            self.unknown_inputs += 1;
            let assigned = format!("__UnknownInput{}", self.unknown_inputs);
            self.registry
                .names
                .insert(Arc::as_ptr(shape) as usize, assigned.clone());
            assigned
        } else {
            shape.name.clone()
        };
        self.registry
            .entries
            .entry(name)
            .or_insert_with(|| TypeEntry::InputObject(shape.clone()));

        for field in &shape.fields {
            self.shape(&field.shape)?;
        }
        Ok(())
    }

    fn shape(&mut self, shape: &TypeShape) -> Result<(), SchemaError> {
        match shape {
            TypeShape::Object(object) => self.object(object),
            TypeShape::InputObject(input) => self.input(input),
            TypeShape::List(inner) | TypeShape::Nullable(inner) | TypeShape::Id(inner) => {
                self.shape(inner)
            }
            TypeShape::Enum(name) => {
                if self.enums.contains_key(name) {
                    Ok(())
                } else {
                    Err(SchemaError::UnknownEnum(name.clone()))
                }
            }
            _ => Ok(()),
        }
    }
}

pub(crate) mod naming {
    /// Converts a host-side field name to its GraphQL form: names of one
    /// letter are lowercased; longer names keep an upper-case second
    /// letter as-is (acronym style) and otherwise lowercase the first.
    pub(crate) fn field_name(name: &str) -> String {
        let bytes = name.as_bytes();
        match bytes.len() {
            0 => String::new(),
            1 => name.to_ascii_lowercase(),
            _ if bytes[1].is_ascii_uppercase() => name.to_owned(),
            _ => {
                let mut out = String::with_capacity(name.len());
                out.push(bytes[0].to_ascii_lowercase() as char);
                out.push_str(&name[1..]);
                out
            }
        }
    }

    /// Method names additionally drop a leading `Resolve` prefix.
    pub(crate) fn method_name(name: &str) -> String {
        let stripped = match name.strip_prefix("Resolve") {
            Some(rest) if !rest.is_empty() => rest,
            _ => name,
        };
        field_name(stripped)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn field_names_lowercase_unless_acronym() {
            assert_eq!(field_name("A"), "a");
            assert_eq!(field_name("FooBar"), "fooBar");
            assert_eq!(field_name("BAR"), "BAR");
            assert_eq!(field_name("ID"), "ID");
            assert_eq!(field_name("some_field"), "some_field");
        }

        #[test]
        fn method_names_strip_the_resolve_prefix() {
            assert_eq!(method_name("ResolveBar"), "bar");
            assert_eq!(method_name("ResolveFooBar"), "fooBar");
            assert_eq!(method_name("Resolve"), "resolve");
            assert_eq!(method_name("bar"), "bar");
        }
    }
}
