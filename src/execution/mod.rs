//! Query execution: options, per-request context, and the public
//! resolve/response surface.

pub(crate) mod execution;

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use slog::{debug, o, Logger};

use crate::bytecode::OperatorKind;
use crate::error::{GraphQLError, PathFragment, QueryError};
use crate::json;
use crate::query::parse_query;
use crate::schema::host::FormFile;
use crate::schema::Schema;
use crate::values::Value;

/// Form-file accessor contract: given the argument value of a `File`
/// scalar, returns the uploaded file handle if one exists.
pub type GetFormFile =
    Arc<dyn Fn(&str) -> Result<Option<Arc<FormFile>>, anyhow::Error> + Send + Sync>;

/// A cancellation token with an optional deadline and a manual flag.
/// The resolver checks it at every field boundary.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if deadline <= Instant::now())
    }
}

/// Per-request resolve options.
pub struct ResolveOptions {
    /// Names the operator to execute when the document has several.
    pub operator_target: Option<String>,
    /// Variable bindings.
    pub variables: HashMap<String, Value>,
    /// Seed of the context value bag.
    pub values: HashMap<String, Box<dyn Any + Send + Sync>>,
    /// Cancellation token; absent means the request never cancels.
    pub cancel: Option<CancelToken>,
    /// Accessor for the `File` scalar.
    pub get_form_file: Option<GetFormFile>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            operator_target: None,
            variables: HashMap::new(),
            values: HashMap::new(),
            cancel: None,
            get_form_file: None,
        }
    }
}

impl ResolveOptions {
    /// Parses a JSON object of variable bindings, the usual transport
    /// format.
    pub fn with_json_variables(mut self, json: &str) -> Result<Self, serde_json::Error> {
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        if let serde_json::Value::Object(fields) = parsed {
            for (name, value) in fields {
                self.variables.insert(name, Value::from_json(value));
            }
        }
        Ok(self)
    }
}

/// The per-request execution context handed to resolver methods.
///
/// Carries the value bag (writes are visible to every later resolver in
/// the same request), the cancellation token, and the current response
/// path.
pub struct Ctx {
    pub(crate) logger: Logger,
    pub(crate) out: Vec<u8>,
    pub(crate) errors: Vec<GraphQLError>,
    pub(crate) path: Vec<PathFragment>,
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
    cancel: Option<CancelToken>,
}

impl Ctx {
    pub(crate) fn new(
        logger: Logger,
        values: HashMap<String, Box<dyn Any + Send + Sync>>,
        cancel: Option<CancelToken>,
    ) -> Self {
        Ctx {
            logger,
            out: Vec::with_capacity(512),
            errors: Vec::new(),
            path: Vec::new(),
            values,
            cancel,
        }
    }

    /// Stores a value in the request bag, visible to all subsequent
    /// resolvers of this request.
    pub fn set_value<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Reads a value from the request bag.
    pub fn value<V: Any>(&self, key: &str) -> Option<&V> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// The response path of the field currently being resolved.
    pub fn path(&self) -> &[PathFragment] {
        &self.path
    }

    pub(crate) fn error_at(&mut self, error: QueryError, key: Option<&str>) {
        let mut path = self.path.clone();
        if let Some(key) = key {
            path.push(PathFragment::Key(key.to_owned()));
        }
        self.errors.push(GraphQLError::new(error, path));
    }
}

/// What a transport needs to know about the executed operator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderHints {
    pub operator_kind: Option<OperatorKind>,
    pub operator_name: Option<String>,
}

/// The outcome of [`Schema::resolve`]: the raw JSON body, transport
/// hints, and every error raised along the way. The body is always
/// valid JSON.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub body: String,
    pub hints: HeaderHints,
    pub errors: Vec<GraphQLError>,
}

impl Schema {
    /// Parses and executes a query against the host roots. Parse errors
    /// do not stop execution: whatever bytecode was produced still runs.
    pub fn resolve(&self, query: &str, options: ResolveOptions) -> Resolution {
        let parsed = parse_query(query);
        let mut errors: Vec<GraphQLError> = parsed
            .errors
            .into_iter()
            .map(GraphQLError::unpositioned)
            .collect();
        let parse_error_count = errors.len();

        let outcome = execution::execute(self, &parsed.bytecode, options, &mut errors);

        debug!(
            self.logger,
            "resolved query";
            "operator" => outcome.hints.operator_name.as_deref().unwrap_or(""),
            "parse_errors" => parse_error_count,
            "errors" => errors.len(),
        );

        Resolution {
            body: outcome.body,
            hints: outcome.hints,
            errors,
        }
    }
}

/// Wraps a resolved body into the response envelope:
/// `{"data":…, "errors":[…]}`, with `errors` omitted when empty.
pub fn generate_response(resolution: &Resolution) -> String {
    let mut out = Vec::with_capacity(resolution.body.len() + 64);
    out.extend_from_slice(b"{\"data\":");
    out.extend_from_slice(resolution.body.as_bytes());
    if !resolution.errors.is_empty() {
        out.extend_from_slice(b",\"errors\":[");
        for (i, err) in resolution.errors.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            out.extend_from_slice(b"{\"message\":");
            json::write_string(&mut out, &err.message());
            if !err.path.is_empty() {
                out.extend_from_slice(b",\"path\":[");
                for (j, fragment) in err.path.iter().enumerate() {
                    if j > 0 {
                        out.push(b',');
                    }
                    match fragment {
                        PathFragment::Key(key) => json::write_string(&mut out, key),
                        PathFragment::Index(idx) => json::write_u64(&mut out, *idx as u64),
                    }
                }
                out.push(b']');
            }
            out.push(b'}');
        }
        out.push(b']');
    }
    out.push(b'}');
    String::from_utf8_lossy(&out).into_owned()
}

/// Child logger for a single request, tagged with the operator name.
pub(crate) fn request_logger(schema: &Schema, operator: Option<&str>) -> Logger {
    match operator {
        Some(name) => schema.logger.new(o!("operator" => name.to_owned())),
        None => schema.logger.new(o!()),
    }
}
