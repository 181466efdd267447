//! A GraphQL execution engine with a bytecode core.
//!
//! Queries are parsed in a single pass into a flat, NUL-separated
//! bytecode stream; no AST is built. A resolver then walks that
//! bytecode against host-provided root objects, invoking method shims,
//! applying `@skip`/`@include`, inlining fragments, and streaming the
//! JSON response straight into an output buffer. Schema introspection
//! (`__schema`, `__type`, `__typename`) is answered by the same resolver
//! against an in-memory description of the schema.
//!
//! ```
//! use graphlet::prelude::*;
//!
//! let root = Object::build("Query")
//!     .field("A", "foo")
//!     .field("B", "bar")
//!     .build();
//! let schema = Schema::build(root, None, None).unwrap();
//! let res = schema.resolve("{a b}", ResolveOptions::default());
//! assert_eq!(res.body, r#"{"a":"foo","b":"bar"}"#);
//! ```

/// The flat query bytecode: emitter, reader, opcodes.
pub mod bytecode;

/// Error types for parsing, execution and schema construction.
pub mod error;

/// Query execution: options, context, resolver, response generation.
pub mod execution;

/// Query parsing: lexer and the bytecode-emitting parser.
pub mod query;

/// Schema construction and the host data model.
pub mod schema;

/// GraphQL input values and argument coercion.
pub mod values;

/// Schema introspection, answered through the normal resolver.
mod introspection;

/// Direct-to-buffer JSON scalar writers.
mod json;

/// The most important traits and types.
pub mod prelude {
    pub use crate::bytecode::OperatorKind;
    pub use crate::error::{GraphQLError, PathFragment, QueryError, SchemaError};
    pub use crate::execution::{
        generate_response, CancelToken, Ctx, GetFormFile, HeaderHints, Resolution,
        ResolveOptions,
    };
    pub use crate::query::{parse_query, ParsedQuery};
    pub use crate::schema::host::{FormFile, HostScalar, HostValue, Object, ObjectBuilder};
    pub use crate::schema::shape::{
        arg, arg_exact, input_object, named_input_object, InputField, InputObjectShape,
        IntWidth, ObjectShape, TypeShape,
    };
    pub use crate::schema::{Schema, SchemaBuilder, TypeKind};
    pub use crate::values::coercion::{ArgValue, ResolvedArgs};
    pub use crate::values::{Arguments, Value, ValueKind};
}
