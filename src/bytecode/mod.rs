//! The flat query bytecode.
//!
//! A parsed query is a sequence of records separated by a single NUL
//! byte. Each record starts with an ASCII opcode letter; nesting is
//! expressed only through matching `e` records, so the stream can be
//! emitted forward in one pass and walked forward in one pass.
//!
//! ```text
//! oq            operator, query kind (name appended when present)
//! om / os       operator, mutation / subscription kind
//! F<name>       fragment definition; the next record is the raw
//!               type-condition name
//! f<name>       field
//! a<alias>      alias of the preceding field
//! sf<name>      fragment spread (no matching `e`)
//! st<name>      inline fragment (empty name when no type condition)
//! d<name>       directive on the preceding record
//! A             argument group, `k`/value records until `e`
//! k<name>       argument or input-object key
//! V<name>       variable definition, `y<type>` plus optional default
//!               value records until `e`
//! v?            value records (vn/vt/vf/vi/vd/vs/ve/v$/vl/vo)
//! e             end of the current scope
//! ```
//!
//! Names never contain NUL bytes; string value payloads re-escape NUL
//! and backslash so every record stays self-delimited.

use crate::error::QueryError;
use crate::values::{Arguments, Value};

/// The three operator kinds recognized at the top level of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    Query,
    Mutation,
    Subscription,
}

impl OperatorKind {
    pub(crate) fn letter(self) -> u8 {
        match self {
            OperatorKind::Query => b'q',
            OperatorKind::Mutation => b'm',
            OperatorKind::Subscription => b's',
        }
    }

    pub(crate) fn from_letter(b: u8) -> Option<OperatorKind> {
        match b {
            b'q' => Some(OperatorKind::Query),
            b'm' => Some(OperatorKind::Mutation),
            b's' => Some(OperatorKind::Subscription),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperatorKind::Query => "query",
            OperatorKind::Mutation => "mutation",
            OperatorKind::Subscription => "subscription",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
enum Scope {
    Operator,
    Field,
    InlineFragment,
    FragmentDef,
    Arguments,
    VariableDef,
}

/// Append-only bytecode writer with scope balancing.
pub struct Emitter {
    buf: Vec<u8>,
    scopes: Vec<Scope>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            buf: Vec::with_capacity(256),
            scopes: Vec::new(),
        }
    }

    pub fn start_operator(&mut self, kind: OperatorKind, name: Option<&str>) {
        self.buf.push(b'o');
        self.buf.push(kind.letter());
        if let Some(name) = name {
            self.buf.extend_from_slice(name.as_bytes());
        }
        self.terminate();
        self.scopes.push(Scope::Operator);
    }

    pub fn start_field(&mut self, name: &str, alias: Option<&str>) {
        self.record(b"f", name.as_bytes());
        self.scopes.push(Scope::Field);
        if let Some(alias) = alias {
            self.record(b"a", alias.as_bytes());
        }
    }

    /// Spreads are leaf records; they do not open a scope.
    pub fn fragment_spread(&mut self, name: &str) {
        self.record(b"sf", name.as_bytes());
    }

    pub fn start_inline_fragment(&mut self, type_cond: Option<&str>) {
        self.record(b"st", type_cond.unwrap_or("").as_bytes());
        self.scopes.push(Scope::InlineFragment);
    }

    pub fn start_fragment_def(&mut self, name: &str, type_cond: &str) {
        self.record(b"F", name.as_bytes());
        // The type condition is the only record carrying no opcode letter.
        self.record(b"", type_cond.as_bytes());
        self.scopes.push(Scope::FragmentDef);
    }

    pub fn begin_arguments(&mut self) {
        self.record(b"A", b"");
        self.scopes.push(Scope::Arguments);
    }

    pub fn argument(&mut self, name: &str, value: &Value) {
        self.record(b"k", name.as_bytes());
        self.value(value);
    }

    pub fn directive(&mut self, name: &str) {
        self.record(b"d", name.as_bytes());
    }

    pub fn begin_variable_def(&mut self, name: &str, type_text: &str) {
        self.record(b"V", name.as_bytes());
        self.record(b"y", type_text.as_bytes());
        self.scopes.push(Scope::VariableDef);
    }

    pub fn variable_default(&mut self, value: &Value) {
        self.value(value);
    }

    /// Closes the innermost open scope with an `e` record.
    pub fn end_scope(&mut self) -> Result<(), QueryError> {
        match self.scopes.pop() {
            Some(_) => {
                self.record(b"e", b"");
                Ok(())
            }
            None => Err(QueryError::ScopeUnderflow),
        }
    }

    /// Number of scopes still open; the parser drains these during
    /// panic-mode recovery so the stream never ends unbalanced.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Null => self.record(b"vn", b""),
            Value::Boolean(true) => self.record(b"vt", b""),
            Value::Boolean(false) => self.record(b"vf", b""),
            Value::Int(i) => self.record(b"vi", i.to_string().as_bytes()),
            Value::Float(f) => self.record(b"vd", f.to_string().as_bytes()),
            Value::String(s) => {
                self.buf.extend_from_slice(b"vs");
                escape_into(&mut self.buf, s);
                self.terminate();
            }
            Value::Enum(name) => self.record(b"ve", name.as_bytes()),
            Value::Variable(name) => self.record(b"v$", name.as_bytes()),
            Value::List(items) => {
                self.record(b"vl", b"");
                for item in items {
                    self.value(item);
                }
                self.record(b"e", b"");
            }
            Value::Object(fields) => {
                self.record(b"vo", b"");
                for (key, item) in fields {
                    self.record(b"k", key.as_bytes());
                    self.value(item);
                }
                self.record(b"e", b"");
            }
        }
    }

    fn record(&mut self, opcode: &[u8], payload: &[u8]) {
        self.buf.extend_from_slice(opcode);
        self.buf.extend_from_slice(payload);
        self.terminate();
    }

    fn terminate(&mut self) {
        self.buf.push(0);
    }
}

fn escape_into(buf: &mut Vec<u8>, s: &str) {
    for b in s.bytes() {
        match b {
            b'\\' => buf.extend_from_slice(b"\\\\"),
            0 => buf.extend_from_slice(b"\\0"),
            b => buf.push(b),
        }
    }
}

fn unescape(payload: &[u8]) -> String {
    let mut out = Vec::with_capacity(payload.len());
    let mut iter = payload.iter();
    while let Some(&b) = iter.next() {
        if b == b'\\' {
            match iter.next() {
                Some(&b'0') => out.push(0),
                Some(&esc) => out.push(esc),
                None => break,
            }
        } else {
            out.push(b);
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Forward cursor over the NUL-separated records of finished bytecode.
#[derive(Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    /// A cursor positioned at a previously recorded offset, used to jump
    /// to fragment bodies.
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Reader { bytes, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek_record(&self) -> Option<&'a [u8]> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let end = self.bytes[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| self.pos + i)
            .unwrap_or(self.bytes.len());
        Some(&self.bytes[self.pos..end])
    }

    pub fn next_record(&mut self) -> Option<&'a [u8]> {
        let record = self.peek_record()?;
        self.pos += record.len() + 1;
        Some(record)
    }

    /// Consumes records until the `e` matching an already-consumed scope
    /// opener.
    pub fn skip_scope(&mut self) {
        let mut depth = 1usize;
        while let Some(record) = self.next_record() {
            if record == b"e" {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            } else if opens_scope(record) {
                depth += 1;
                if record.first() == Some(&b'F') {
                    // The record after a fragment definition is the raw
                    // type-condition name; it must not be interpreted.
                    self.next_record();
                }
            }
        }
    }

    /// Reads one value, whose first record has already been consumed and
    /// is passed in.
    pub fn read_value(&mut self, record: &'a [u8]) -> Value {
        match record {
            b"vn" => Value::Null,
            b"vt" => Value::Boolean(true),
            b"vf" => Value::Boolean(false),
            b"vl" => {
                let mut items = Vec::new();
                while let Some(next) = self.next_record() {
                    if next == b"e" {
                        break;
                    }
                    items.push(self.read_value(next));
                }
                Value::List(items)
            }
            b"vo" => {
                let mut fields = Arguments::new();
                while let Some(next) = self.next_record() {
                    if next == b"e" {
                        break;
                    }
                    if let Some(key) = next.strip_prefix(b"k") {
                        let key = String::from_utf8_lossy(key).into_owned();
                        match self.next_record() {
                            Some(value_record) => {
                                fields.insert(key, self.read_value(value_record));
                            }
                            None => break,
                        }
                    }
                }
                Value::Object(fields)
            }
            _ => {
                let (tag, payload) = record.split_at(2.min(record.len()));
                match tag {
                    b"vi" => String::from_utf8_lossy(payload)
                        .parse::<i64>()
                        .map(Value::Int)
                        .unwrap_or(Value::Null),
                    b"vd" => String::from_utf8_lossy(payload)
                        .parse::<f64>()
                        .map(Value::Float)
                        .unwrap_or(Value::Null),
                    b"vs" => Value::String(unescape(payload)),
                    b"ve" => Value::Enum(String::from_utf8_lossy(payload).into_owned()),
                    b"v$" => Value::Variable(String::from_utf8_lossy(payload).into_owned()),
                    _ => Value::Null,
                }
            }
        }
    }

    /// Reads the `k`/value records of an argument group whose `A` record
    /// has already been consumed, up to and including the closing `e`.
    pub fn read_arguments(&mut self) -> Arguments {
        let mut args = Arguments::new();
        while let Some(record) = self.next_record() {
            if record == b"e" {
                break;
            }
            if let Some(key) = record.strip_prefix(b"k") {
                let key = String::from_utf8_lossy(key).into_owned();
                match self.next_record() {
                    Some(value_record) => {
                        args.insert(key, self.read_value(value_record));
                    }
                    None => break,
                }
            }
        }
        args
    }
}

/// True for records that open a scope closed by a matching `e`.
pub(crate) fn opens_scope(record: &[u8]) -> bool {
    match record.first() {
        Some(b'o') | Some(b'f') | Some(b'F') | Some(b'A') | Some(b'V') => true,
        Some(b's') => record.get(1) == Some(&b't'),
        Some(b'v') => matches!(record.get(1), Some(b'l') | Some(b'o')),
        _ => false,
    }
}

/// Human-readable form: one record per line. Tests compare against this.
pub fn disassemble(bytes: &[u8]) -> String {
    let joined: Vec<u8> = bytes
        .iter()
        .map(|&b| if b == 0 { b'\n' } else { b })
        .collect();
    String::from_utf8_lossy(&joined).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_without_start_underflows() {
        let mut emitter = Emitter::new();
        assert_eq!(emitter.end_scope(), Err(QueryError::ScopeUnderflow));
        emitter.start_operator(OperatorKind::Query, None);
        assert_eq!(emitter.end_scope(), Ok(()));
        assert_eq!(emitter.end_scope(), Err(QueryError::ScopeUnderflow));
    }

    #[test]
    fn records_are_nul_separated() {
        let mut emitter = Emitter::new();
        emitter.start_operator(OperatorKind::Query, Some("banana"));
        emitter.start_field("some_field", None);
        emitter.end_scope().unwrap();
        emitter.end_scope().unwrap();
        assert_eq!(
            disassemble(&emitter.finish()),
            "oqbanana\nfsome_field\ne\ne"
        );
    }

    #[test]
    fn values_round_trip_through_records() {
        let cases = vec![
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Int(-42),
            Value::Float(1.5),
            Value::String("back\\slash and \u{0} nul".into()),
            Value::Enum("RED".into()),
            Value::Variable("var".into()),
            Value::List(vec![Value::Int(1), Value::List(vec![Value::Null])]),
            Value::Object(Arguments::from_iter([
                ("a".to_owned(), Value::String("x".into())),
                ("b".to_owned(), Value::Object(Arguments::new())),
            ])),
        ];
        for case in cases {
            let mut emitter = Emitter::new();
            emitter.value(&case);
            let bytes = emitter.finish();
            let mut reader = Reader::new(&bytes);
            let first = reader.next_record().unwrap();
            assert_eq!(reader.read_value(first), case);
        }
    }

    #[test]
    fn skip_scope_handles_nesting() {
        let mut emitter = Emitter::new();
        emitter.start_field("outer", None);
        emitter.start_field("inner", None);
        emitter.end_scope().unwrap();
        emitter.end_scope().unwrap();
        emitter.start_field("after", None);
        emitter.end_scope().unwrap();
        let bytes = emitter.finish();

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.next_record(), Some(&b"fouter"[..]));
        reader.skip_scope();
        assert_eq!(reader.next_record(), Some(&b"fafter"[..]));
    }
}
