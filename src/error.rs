use thiserror::Error;

use crate::values::ValueKind;

/// One step of the JSON response path at which an error was raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathFragment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathFragment {
    fn from(key: &str) -> Self {
        PathFragment::Key(key.to_owned())
    }
}

impl From<usize> for PathFragment {
    fn from(idx: usize) -> Self {
        PathFragment::Index(idx)
    }
}

/// Error raised while parsing or executing a query.
///
/// Parsing never aborts: these accumulate in an error list while the
/// parser recovers and the resolver keeps going. Only `Cancelled` stops
/// further work in the enclosing scopes.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("unexpected end of query")]
    UnexpectedEof,

    #[error("unexpected byte {byte:?} at offset {offset}")]
    UnexpectedByte { offset: usize, byte: char },

    #[error("{0}")]
    Parse(String),

    #[error("scope end without matching start")]
    ScopeUnderflow,

    #[error("multiple operators defined in query but no operator target given")]
    AmbiguousOperator,

    #[error("no executable operation found in query")]
    NoOperation,

    #[error("operator {0} not found in query")]
    UnknownOperator(String),

    #[error("fragment {0} is not defined")]
    UnknownFragment(String),

    #[error("{field} does not exists on {type_name}")]
    UnknownField { type_name: String, field: String },

    #[error("value expected to be of type {expected}")]
    TypeMismatch { expected: ValueKind },

    #[error("{0}")]
    Coercion(String),

    #[error("{0}")]
    Resolver(String),

    #[error("max query depth of {0} exceeded")]
    DepthExceeded(u8),

    #[error("context deadline exceeded")]
    Cancelled,

    #[error("{0} is not supported")]
    NotSupported(String),
}

impl From<QueryError> for Vec<QueryError> {
    fn from(e: QueryError) -> Self {
        vec![e]
    }
}

/// A query error together with the response path at which it was raised.
///
/// The path, walked from the response's `data` root, always leads to a
/// `null` value or a missing key.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphQLError {
    pub error: QueryError,
    pub path: Vec<PathFragment>,
}

impl GraphQLError {
    pub fn new(error: QueryError, path: Vec<PathFragment>) -> Self {
        GraphQLError { error, path }
    }

    /// An error raised outside of any response position (e.g. a parse
    /// error or an operator-selection failure).
    pub fn unpositioned(error: QueryError) -> Self {
        GraphQLError {
            error,
            path: Vec::new(),
        }
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl std::fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for GraphQLError {}

/// Error raised while building a [`Schema`](crate::schema::Schema).
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("enum {0} is registered twice")]
    DuplicateEnum(String),

    #[error("enum {0} has no values")]
    EmptyEnum(String),

    #[error("enum {0} clashes with a built-in scalar name")]
    ReservedEnumName(String),

    #[error("enum {0} is referenced by a field shape but was never registered")]
    UnknownEnum(String),
}
