//! The bytecode walker.
//!
//! Executes one operator's records against the host root object,
//! streaming JSON into the context buffer as it goes. Selection sets
//! nest only through matching `e` records, so the walker is a single
//! forward pass; list fields re-read their child span once per element.

use std::collections::HashMap;

use crate::bytecode::{opens_scope, OperatorKind, Reader};
use crate::error::{PathFragment, QueryError};
use crate::execution::{request_logger, Ctx, GetFormFile, HeaderHints, ResolveOptions};
use crate::introspection;
use crate::json;
use crate::schema::host::{FieldBinding, HostValue, Object};
use crate::schema::shape::TypeShape;
use crate::schema::Schema;
use crate::error::GraphQLError;
use crate::values::coercion::{coerce_arguments, CoercionCtx, ResolvedArgs};
use crate::values::{Arguments, Value};

pub(crate) struct Outcome {
    pub(crate) body: String,
    pub(crate) hints: HeaderHints,
}

struct OperatorRef {
    kind: OperatorKind,
    name: Option<String>,
    /// Byte offset of the first record inside the operator scope.
    pos: usize,
}

pub(crate) fn execute(
    schema: &Schema,
    bytecode: &[u8],
    options: ResolveOptions,
    errors: &mut Vec<GraphQLError>,
) -> Outcome {
    let (operators, fragments) = scan_definitions(bytecode);

    let selected = match &options.operator_target {
        Some(target) => {
            let found = operators
                .iter()
                .find(|op| op.name.as_deref() == Some(target.as_str()));
            if found.is_none() {
                errors.push(GraphQLError::unpositioned(QueryError::UnknownOperator(
                    target.clone(),
                )));
            }
            found
        }
        None => match operators.len() {
            1 => Some(&operators[0]),
            0 => {
                if errors.is_empty() {
                    errors.push(GraphQLError::unpositioned(QueryError::NoOperation));
                }
                None
            }
            _ => {
                errors.push(GraphQLError::unpositioned(QueryError::AmbiguousOperator));
                None
            }
        },
    };

    let Some(operator) = selected else {
        return Outcome {
            body: "{}".to_owned(),
            hints: HeaderHints::default(),
        };
    };

    let hints = HeaderHints {
        operator_kind: Some(operator.kind),
        operator_name: operator.name.clone(),
    };

    let root = match operator.kind {
        OperatorKind::Query => &schema.query,
        OperatorKind::Mutation => &schema.mutation,
        OperatorKind::Subscription => match &schema.subscription {
            Some(subscription) => subscription,
            None => {
                errors.push(GraphQLError::unpositioned(QueryError::NotSupported(
                    "subscription operators without a subscription root".to_owned(),
                )));
                return Outcome {
                    body: "{}".to_owned(),
                    hints,
                };
            }
        },
    };

    let logger = request_logger(schema, operator.name.as_deref());
    let mut ctx = Ctx::new(logger, options.values, options.cancel);
    let mut walker = Walker {
        schema,
        bytecode,
        fragments: &fragments,
        variables: options.variables,
        get_form_file: options.get_form_file,
        max_depth: schema.max_depth,
        cancelled: false,
    };

    let mut reader = Reader::at(bytecode, operator.pos);
    walker.read_operator_header(&mut reader);
    walker.resolve_object_scope(
        &mut ctx,
        &mut reader,
        root,
        1,
        operator.kind == OperatorKind::Query,
    );

    errors.append(&mut ctx.errors);
    Outcome {
        body: String::from_utf8_lossy(&ctx.out).into_owned(),
        hints,
    }
}

/// One pass over the top-level records: operator offsets and fragment
/// body offsets by name.
fn scan_definitions(bytecode: &[u8]) -> (Vec<OperatorRef>, HashMap<String, usize>) {
    let mut operators = Vec::new();
    let mut fragments = HashMap::new();
    let mut reader = Reader::new(bytecode);
    while let Some(record) = reader.next_record() {
        match record.first() {
            Some(b'o') if record.len() >= 2 => {
                if let Some(kind) = OperatorKind::from_letter(record[1]) {
                    let name = if record.len() > 2 {
                        Some(String::from_utf8_lossy(&record[2..]).into_owned())
                    } else {
                        None
                    };
                    operators.push(OperatorRef {
                        kind,
                        name,
                        pos: reader.pos(),
                    });
                }
                reader.skip_scope();
            }
            Some(b'F') => {
                let name = String::from_utf8_lossy(&record[1..]).into_owned();
                // The next record is the raw type-condition name.
                reader.next_record();
                fragments.entry(name).or_insert(reader.pos());
                reader.skip_scope();
            }
            _ => {
                if opens_scope(record) {
                    reader.skip_scope();
                }
            }
        }
    }
    (operators, fragments)
}

struct Walker<'a> {
    schema: &'a Schema,
    bytecode: &'a [u8],
    fragments: &'a HashMap<String, usize>,
    variables: HashMap<String, Value>,
    get_form_file: Option<GetFormFile>,
    max_depth: u8,
    cancelled: bool,
}

impl<'a> Walker<'a> {
    /// Consumes variable definitions and operator directives from the
    /// operator header. Defaults fill in for unbound variables.
    fn read_operator_header(&mut self, reader: &mut Reader<'a>) {
        loop {
            let Some(record) = reader.peek_record() else {
                return;
            };
            match record.first() {
                Some(b'V') => {
                    let name = String::from_utf8_lossy(&record[1..]).into_owned();
                    reader.next_record();
                    let mut default = None;
                    loop {
                        let Some(sub) = reader.next_record() else {
                            break;
                        };
                        if sub == b"e" {
                            break;
                        }
                        match sub.first() {
                            Some(b'y') | Some(b'd') => {}
                            Some(b'v') => default = Some(reader.read_value(sub)),
                            Some(b'A') => {
                                reader.read_arguments();
                            }
                            _ => {}
                        }
                    }
                    if let Some(default) = default {
                        self.variables.entry(name).or_insert(default);
                    }
                }
                // Operator directives are recognized but have no effect.
                Some(b'd') => {
                    reader.next_record();
                    if reader.peek_record() == Some(b"A") {
                        reader.next_record();
                        reader.read_arguments();
                    }
                }
                _ => return,
            }
        }
    }

    /// Resolves one selection set against `object`, writing `{…}`.
    /// `reader` is positioned at the first record inside the scope and
    /// is consumed through the matching `e`.
    fn resolve_object_scope(
        &mut self,
        ctx: &mut Ctx,
        reader: &mut Reader<'a>,
        object: &Object,
        depth: u8,
        root_query: bool,
    ) {
        ctx.out.push(b'{');
        let mut first = true;
        let mut active_spreads = Vec::new();
        self.selections(
            ctx,
            reader,
            object,
            depth,
            root_query,
            &mut first,
            &mut active_spreads,
        );
        ctx.out.push(b'}');
    }

    #[allow(clippy::too_many_arguments)]
    fn selections(
        &mut self,
        ctx: &mut Ctx,
        reader: &mut Reader<'a>,
        object: &Object,
        depth: u8,
        root_query: bool,
        first: &mut bool,
        active_spreads: &mut Vec<String>,
    ) {
        loop {
            let Some(record) = reader.next_record() else {
                return;
            };
            if record == b"e" {
                return;
            }
            match (record.first(), record.get(1)) {
                (Some(b'f'), _) => {
                    let name = String::from_utf8_lossy(&record[1..]).into_owned();
                    self.field(
                        ctx,
                        reader,
                        object,
                        &name,
                        depth,
                        root_query,
                        first,
                        active_spreads,
                    );
                }
                (Some(b's'), Some(b'f')) => {
                    let name = String::from_utf8_lossy(&record[2..]).into_owned();
                    let skip = self.read_directives(reader);
                    if skip || self.cancelled {
                        continue;
                    }
                    if active_spreads.iter().any(|active| active == &name) {
                        continue;
                    }
                    match self.fragments.get(&name) {
                        None => ctx.error_at(QueryError::UnknownFragment(name), None),
                        Some(&pos) => {
                            active_spreads.push(name);
                            let mut fragment_reader = Reader::at(self.bytecode, pos);
                            self.selections(
                                ctx,
                                &mut fragment_reader,
                                object,
                                depth,
                                root_query,
                                first,
                                active_spreads,
                            );
                            active_spreads.pop();
                        }
                    }
                }
                (Some(b's'), Some(b't')) => {
                    // The type condition is advisory and not checked.
                    let skip = self.read_directives(reader);
                    if skip || self.cancelled {
                        reader.skip_scope();
                        continue;
                    }
                    self.selections(
                        ctx,
                        reader,
                        object,
                        depth,
                        root_query,
                        first,
                        active_spreads,
                    );
                }
                _ => {
                    if opens_scope(record) {
                        reader.skip_scope();
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn field(
        &mut self,
        ctx: &mut Ctx,
        reader: &mut Reader<'a>,
        object: &Object,
        name: &str,
        depth: u8,
        root_query: bool,
        first: &mut bool,
        _active_spreads: &mut [String],
    ) {
        let mut alias: Option<String> = None;
        let mut raw_args: Option<Arguments> = None;
        let mut skip = false;
        loop {
            let Some(record) = reader.peek_record() else {
                break;
            };
            match record.first() {
                Some(b'a') => {
                    alias = Some(String::from_utf8_lossy(&record[1..]).into_owned());
                    reader.next_record();
                }
                Some(b'A') => {
                    reader.next_record();
                    raw_args = Some(reader.read_arguments());
                }
                Some(b'd') => skip |= self.read_directives(reader),
                _ => break,
            }
        }

        let key = alias.unwrap_or_else(|| name.to_owned());
        if skip {
            reader.skip_scope();
            return;
        }

        if self.cancelled {
            reader.skip_scope();
            return;
        }
        if ctx.is_cancelled() {
            // First cancelled field: null it, report, and let enclosing
            // scopes unwind while keeping the JSON balanced.
            self.cancelled = true;
            emit_key(ctx, first, &key);
            json::write_null(&mut ctx.out);
            ctx.error_at(QueryError::Cancelled, Some(&key));
            reader.skip_scope();
            return;
        }

        if name == "__typename" {
            emit_key(ctx, first, &key);
            json::write_string(&mut ctx.out, self.schema.object_name(&object.shape));
            reader.skip_scope();
            return;
        }

        if root_query && name == "__schema" {
            let tree = introspection::schema_value(self.schema);
            if let HostValue::Object(schema_object) = tree {
                emit_key(ctx, first, &key);
                ctx.path.push(PathFragment::Key(key.clone()));
                self.resolve_object_scope(ctx, reader, schema_object, depth + 1, false);
                ctx.path.pop();
            } else {
                reader.skip_scope();
            }
            return;
        }

        if root_query && name == "__type" {
            let requested = raw_args.as_ref().and_then(|args| {
                match args.get("name") {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Variable(v)) => match self.variables.get(v) {
                        Some(Value::String(s)) => Some(s.clone()),
                        _ => None,
                    },
                    _ => None,
                }
            });
            emit_key(ctx, first, &key);
            match requested.and_then(|n| introspection::type_by_name(self.schema, &n)) {
                Some(type_object) => {
                    ctx.path.push(PathFragment::Key(key.clone()));
                    self.resolve_object_scope(ctx, reader, &type_object, depth + 1, false);
                    ctx.path.pop();
                }
                None => {
                    json::write_null(&mut ctx.out);
                    reader.skip_scope();
                }
            }
            return;
        }

        let Some(index) = object.field_index(name) else {
            ctx.error_at(
                QueryError::UnknownField {
                    type_name: self.schema.object_name(&object.shape).to_owned(),
                    field: name.to_owned(),
                },
                Some(&key),
            );
            reader.skip_scope();
            return;
        };

        let field_shape = &object.shape.fields[index];
        let child_start = reader.pos();
        reader.skip_scope();

        match &object.fields[index] {
            FieldBinding::Value(value) => {
                emit_key(ctx, first, &key);
                ctx.path.push(PathFragment::Key(key.clone()));
                self.resolve_value(ctx, child_start, &field_shape.shape, value, depth);
                ctx.path.pop();
            }
            FieldBinding::Method(method) => {
                let args = match &field_shape.args {
                    Some(shape) => {
                        let empty = Arguments::new();
                        let provided = raw_args.as_ref().unwrap_or(&empty);
                        let cc = CoercionCtx {
                            variables: &self.variables,
                            enums: &self.schema.enums,
                            get_form_file: self.get_form_file.as_ref(),
                        };
                        match coerce_arguments(&cc, shape, provided) {
                            Ok(args) => args,
                            Err(e) => {
                                emit_key(ctx, first, &key);
                                json::write_null(&mut ctx.out);
                                ctx.error_at(e, Some(&key));
                                return;
                            }
                        }
                    }
                    None => ResolvedArgs::default(),
                };

                emit_key(ctx, first, &key);
                ctx.path.push(PathFragment::Key(key.clone()));
                match (method.run)(ctx, args) {
                    Ok(value) => {
                        self.resolve_value(ctx, child_start, &field_shape.shape, &value, depth)
                    }
                    Err(e) => {
                        json::write_null(&mut ctx.out);
                        ctx.error_at(QueryError::Resolver(e.to_string()), None);
                    }
                }
                ctx.path.pop();
            }
        }
    }

    /// Writes one value according to its declared shape. `child_start`
    /// is the byte offset of the field's child selection records; lists
    /// re-read it once per element.
    fn resolve_value(
        &mut self,
        ctx: &mut Ctx,
        child_start: usize,
        shape: &TypeShape,
        value: &HostValue,
        depth: u8,
    ) {
        match shape {
            TypeShape::Nullable(inner) => match value {
                HostValue::Null => json::write_null(&mut ctx.out),
                _ => self.resolve_value(ctx, child_start, inner, value, depth),
            },
            TypeShape::List(inner) => match value {
                HostValue::Null => json::write_null(&mut ctx.out),
                HostValue::List(items) => {
                    ctx.out.push(b'[');
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            ctx.out.push(b',');
                        }
                        ctx.path.push(PathFragment::Index(i));
                        self.resolve_value(ctx, child_start, inner, item, depth);
                        ctx.path.pop();
                    }
                    ctx.out.push(b']');
                }
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Object(_) => match value {
                HostValue::Object(object) => {
                    if depth >= self.max_depth {
                        json::write_null(&mut ctx.out);
                        ctx.error_at(QueryError::DepthExceeded(self.max_depth), None);
                        return;
                    }
                    let mut reader = Reader::at(self.bytecode, child_start);
                    self.resolve_object_scope(ctx, &mut reader, object, depth + 1, false);
                }
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Id(_) => match value {
                HostValue::String(s) => json::write_string(&mut ctx.out, s),
                HostValue::Int(i) => json::write_string(&mut ctx.out, &i.to_string()),
                HostValue::Uint(u) => json::write_string(&mut ctx.out, &u.to_string()),
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Boolean => match value {
                HostValue::Boolean(b) => json::write_bool(&mut ctx.out, *b),
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Int(_) => match value {
                HostValue::Int(i) => json::write_i64(&mut ctx.out, *i),
                HostValue::Uint(u) => json::write_u64(&mut ctx.out, *u),
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Float | TypeShape::Float32 => match value {
                HostValue::Float(f) => json::write_f64(&mut ctx.out, *f),
                HostValue::Float32(f) => json::write_f32(&mut ctx.out, *f),
                HostValue::Int(i) => json::write_i64(&mut ctx.out, *i),
                HostValue::Uint(u) => json::write_u64(&mut ctx.out, *u),
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::String => match value {
                HostValue::String(s) => json::write_string(&mut ctx.out, s),
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Enum(_) => match value {
                HostValue::Enum(s) | HostValue::String(s) => json::write_string(&mut ctx.out, s),
                _ => json::write_null(&mut ctx.out),
            },
            TypeShape::Time => match value {
                HostValue::Time(t) => json::write_time(&mut ctx.out, t),
                _ => json::write_null(&mut ctx.out),
            },
            // Neither has a JSON rendering on the output side.
            TypeShape::File | TypeShape::InputObject(_) => json::write_null(&mut ctx.out),
        }
    }

    /// Consumes any directive records at the cursor and reports whether
    /// they elide the selection.
    fn read_directives(&mut self, reader: &mut Reader<'a>) -> bool {
        let mut skip = false;
        loop {
            let Some(record) = reader.peek_record() else {
                return skip;
            };
            if record.first() != Some(&b'd') {
                return skip;
            }
            let name = String::from_utf8_lossy(&record[1..]).into_owned();
            reader.next_record();
            let args = if reader.peek_record() == Some(b"A") {
                reader.next_record();
                Some(reader.read_arguments())
            } else {
                None
            };
            match name.as_str() {
                "skip" => skip |= self.directive_condition(args.as_ref()).unwrap_or(true),
                "include" => skip |= !self.directive_condition(args.as_ref()).unwrap_or(true),
                // Unknown directives are accepted and ignored.
                _ => {}
            }
        }
    }

    /// The `if` argument of `@skip`/`@include`, with variables bound.
    fn directive_condition(&self, args: Option<&Arguments>) -> Option<bool> {
        match args?.get("if")? {
            Value::Boolean(b) => Some(*b),
            Value::Variable(name) => match self.variables.get(name) {
                Some(Value::Boolean(b)) => Some(*b),
                _ => Some(false),
            },
            _ => Some(false),
        }
    }
}

fn emit_key(ctx: &mut Ctx, first: &mut bool, key: &str) {
    if !*first {
        ctx.out.push(b',');
    }
    *first = false;
    json::write_string(&mut ctx.out, key);
    ctx.out.push(b':');
}
