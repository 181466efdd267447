//! Single-pass recursive-descent parser emitting bytecode.
//!
//! There is no AST: every grammar production writes its records the
//! moment it is recognized. Parse failures append to the error list and
//! trigger panic-mode recovery: open scopes are drained so the stream
//! stays balanced, bytes are skipped to the nearest synchronization
//! point, and parsing resumes with the next definition.

use crate::bytecode::{Emitter, OperatorKind};
use crate::error::QueryError;
use crate::query::lexer::{is_name_start, Lexer};
use crate::values::{Arguments, Value};

/// The outcome of parsing: bytecode for every definition that parsed,
/// plus the errors of those that did not.
pub struct ParsedQuery {
    pub bytecode: Vec<u8>,
    pub errors: Vec<QueryError>,
}

/// Parses a query document. Total: always returns, never panics, and
/// the bytecode always carries balanced `e` records.
pub fn parse_query(source: &str) -> ParsedQuery {
    let mut parser = Parser {
        lex: Lexer::new(source),
        emit: Emitter::new(),
        errors: Vec::new(),
    };
    parser.document();
    ParsedQuery {
        bytecode: parser.emit.finish(),
        errors: parser.errors,
    }
}

struct Parser<'a> {
    lex: Lexer<'a>,
    emit: Emitter,
    errors: Vec<QueryError>,
}

impl<'a> Parser<'a> {
    fn document(&mut self) {
        loop {
            self.lex.skip_ignored();
            if self.lex.eof() {
                return;
            }
            if let Err(e) = self.definition() {
                self.errors.push(e);
                self.recover();
            }
        }
    }

    fn definition(&mut self) -> Result<(), QueryError> {
        if self.lex.peek() == Some(b'{') {
            // A bare selection set is an unnamed query operator.
            return self.operator(OperatorKind::Query);
        }
        if self.lex.match_keyword("query") {
            self.operator(OperatorKind::Query)
        } else if self.lex.match_keyword("mutation") {
            self.operator(OperatorKind::Mutation)
        } else if self.lex.match_keyword("subscription") {
            self.operator(OperatorKind::Subscription)
        } else if self.lex.match_keyword("fragment") {
            self.fragment_definition()
        } else {
            Err(self.lex.unexpected())
        }
    }

    fn operator(&mut self, kind: OperatorKind) -> Result<(), QueryError> {
        self.lex.skip_ignored();
        let name = match self.lex.peek() {
            Some(b) if is_name_start(b) => Some(self.lex.read_name()?),
            _ => None,
        };
        self.emit.start_operator(kind, name);

        self.lex.skip_ignored();
        if self.lex.peek() == Some(b'(') {
            self.variable_definitions()?;
        }
        self.directives()?;
        self.lex.skip_ignored();
        self.selection_set()?;
        self.emit.end_scope()
    }

    fn fragment_definition(&mut self) -> Result<(), QueryError> {
        self.lex.skip_ignored();
        let name = self.lex.read_name()?;
        self.lex.skip_ignored();
        if !self.lex.match_keyword("on") {
            return Err(self.lex.unexpected());
        }
        self.lex.skip_ignored();
        let type_cond = self.lex.read_name()?;
        self.emit.start_fragment_def(name, type_cond);
        self.directives()?;
        self.lex.skip_ignored();
        self.selection_set()?;
        self.emit.end_scope()
    }

    /// `'{' Selection* '}'`, empty permitted.
    fn selection_set(&mut self) -> Result<(), QueryError> {
        self.lex.expect_byte(b'{')?;
        loop {
            self.lex.skip_ignored();
            if self.lex.match_byte(b'}') {
                return Ok(());
            }
            if self.lex.eof() {
                return Err(QueryError::UnexpectedEof);
            }
            self.selection()?;
        }
    }

    fn selection(&mut self) -> Result<(), QueryError> {
        if self.lex.peek() == Some(b'.') {
            return self.fragment_selection();
        }
        self.field()
    }

    /// `'...'` followed by a spread name, `on Type`, directives, or a
    /// bare selection set. `... online` is a spread to `online`.
    fn fragment_selection(&mut self) -> Result<(), QueryError> {
        for _ in 0..3 {
            self.lex.expect_byte(b'.')?;
        }
        self.lex.skip_ignored();
        match self.lex.peek() {
            Some(b'{') | Some(b'@') => {
                self.emit.start_inline_fragment(None);
                self.directives()?;
                self.lex.skip_ignored();
                self.selection_set()?;
                self.emit.end_scope()
            }
            Some(b) if is_name_start(b) => {
                if self.lex.match_keyword("on") {
                    self.lex.skip_ignored();
                    let type_cond = self.lex.read_name()?;
                    self.emit.start_inline_fragment(Some(type_cond));
                    self.directives()?;
                    self.lex.skip_ignored();
                    self.selection_set()?;
                    self.emit.end_scope()
                } else {
                    let name = self.lex.read_name()?;
                    self.emit.fragment_spread(name);
                    self.directives()
                }
            }
            _ => Err(self.lex.unexpected()),
        }
    }

    fn field(&mut self) -> Result<(), QueryError> {
        let first = self.lex.read_name()?;
        self.lex.skip_ignored();
        let (name, alias) = if self.lex.match_byte(b':') {
            self.lex.skip_ignored();
            (self.lex.read_name()?, Some(first))
        } else {
            (first, None)
        };
        self.emit.start_field(name, alias);

        self.lex.skip_ignored();
        if self.lex.peek() == Some(b'(') {
            self.arguments()?;
        }
        self.directives()?;
        self.lex.skip_ignored();
        if self.lex.peek() == Some(b'{') {
            self.selection_set()?;
        }
        self.emit.end_scope()
    }

    /// `'(' (Name ':' Value)* ')'`; an empty list emits nothing.
    fn arguments(&mut self) -> Result<(), QueryError> {
        self.lex.expect_byte(b'(')?;
        self.lex.skip_ignored();
        if self.lex.match_byte(b')') {
            return Ok(());
        }
        self.emit.begin_arguments();
        loop {
            let name = self.lex.read_name()?;
            self.lex.skip_ignored();
            self.lex.expect_byte(b':')?;
            self.lex.skip_ignored();
            let value = self.value()?;
            self.emit.argument(name, &value);
            self.lex.skip_ignored();
            if self.lex.match_byte(b')') {
                break;
            }
            if self.lex.eof() {
                return Err(QueryError::UnexpectedEof);
            }
        }
        self.emit.end_scope()
    }

    /// Zero or more `@name(args)`. Unknown names are emitted as-is; the
    /// resolver ignores the ones it does not recognize.
    fn directives(&mut self) -> Result<(), QueryError> {
        loop {
            self.lex.skip_ignored();
            if !self.lex.match_byte(b'@') {
                return Ok(());
            }
            let name = self.lex.read_name()?;
            self.emit.directive(name);
            self.lex.skip_ignored();
            if self.lex.peek() == Some(b'(') {
                self.arguments()?;
            }
        }
    }

    /// `'(' ('$' Name ':' Type ('=' Value)?)* ')'` on an operator.
    fn variable_definitions(&mut self) -> Result<(), QueryError> {
        self.lex.expect_byte(b'(')?;
        loop {
            self.lex.skip_ignored();
            if self.lex.match_byte(b')') {
                return Ok(());
            }
            self.lex.expect_byte(b'$')?;
            let name = self.lex.read_name()?;
            self.lex.skip_ignored();
            self.lex.expect_byte(b':')?;
            let type_text = self.type_text()?;
            self.emit.begin_variable_def(name, &type_text);
            self.lex.skip_ignored();
            if self.lex.match_byte(b'=') {
                self.lex.skip_ignored();
                let default = self.value()?;
                self.emit.variable_default(&default);
            }
            self.directives()?;
            self.emit.end_scope()?;
        }
    }

    /// Reads a type expression (`[String!]!`) as normalized text; the
    /// resolver re-reads it when binding variables.
    fn type_text(&mut self) -> Result<String, QueryError> {
        self.lex.skip_ignored();
        let mut text = if self.lex.match_byte(b'[') {
            let inner = self.type_text()?;
            self.lex.skip_ignored();
            self.lex.expect_byte(b']')?;
            format!("[{}]", inner)
        } else {
            self.lex.read_name()?.to_owned()
        };
        self.lex.skip_ignored();
        if self.lex.match_byte(b'!') {
            text.push('!');
        }
        Ok(text)
    }

    /// Any input value per the October 2021 grammar.
    fn value(&mut self) -> Result<Value, QueryError> {
        match self.lex.peek() {
            Some(b'$') => {
                self.lex.advance();
                Ok(Value::Variable(self.lex.read_name()?.to_owned()))
            }
            Some(b'"') => Ok(Value::String(self.lex.read_string()?)),
            Some(b'-') => self.lex.read_number(),
            Some(b) if b.is_ascii_digit() => self.lex.read_number(),
            Some(b'[') => {
                self.lex.advance();
                let mut items = Vec::new();
                loop {
                    self.lex.skip_ignored();
                    if self.lex.match_byte(b']') {
                        return Ok(Value::List(items));
                    }
                    if self.lex.eof() {
                        return Err(QueryError::UnexpectedEof);
                    }
                    items.push(self.value()?);
                }
            }
            Some(b'{') => {
                self.lex.advance();
                let mut fields = Arguments::new();
                loop {
                    self.lex.skip_ignored();
                    if self.lex.match_byte(b'}') {
                        return Ok(Value::Object(fields));
                    }
                    if self.lex.eof() {
                        return Err(QueryError::UnexpectedEof);
                    }
                    let name = self.lex.read_name()?;
                    self.lex.skip_ignored();
                    self.lex.expect_byte(b':')?;
                    self.lex.skip_ignored();
                    let value = self.value()?;
                    fields.insert(name.to_owned(), value);
                }
            }
            Some(b) if is_name_start(b) => {
                let name = self.lex.read_name()?;
                Ok(match name {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    _ => Value::Enum(name.to_owned()),
                })
            }
            _ => Err(self.lex.unexpected()),
        }
    }

    /// Panic-mode recovery: drain open scopes so the bytecode stays
    /// balanced, then skip to the nearest synchronization token.
    fn recover(&mut self) {
        while self.emit.depth() > 0 {
            let _ = self.emit.end_scope();
        }
        loop {
            match self.lex.peek() {
                None => return,
                Some(b'}') | Some(b',') | Some(b'\n') => {
                    self.lex.advance();
                    return;
                }
                _ => {
                    self.lex.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::disassemble;
    use pretty_assertions::assert_eq;

    /// Strips layout and `//` comments from an expected-bytecode block,
    /// the same normalization the reference test corpus uses.
    fn format_expected(expected: &str) -> String {
        expected
            .trim()
            .lines()
            .map(|line| {
                line.split("//")
                    .next()
                    .unwrap_or("")
                    .replace([' ', '\t'], "")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn parse_and_expect(query: &str, expected: &str) {
        let parsed = parse_query(query);
        for err in &parsed.errors {
            panic!("unexpected parse error for {:?}: {}", query, err);
        }
        assert_eq!(format_expected(expected), disassemble(&parsed.bytecode));
    }

    #[test]
    fn simple_query() {
        parse_and_expect(
            "{}",
            "
            oq // operator of the query kind
            e  // end of operator
            ",
        );
    }

    #[test]
    fn simple_query_written_out() {
        parse_and_expect("query {}", "oq\ne");
    }

    #[test]
    fn simple_mutation() {
        parse_and_expect("mutation {}", "om\ne");
    }

    #[test]
    fn simple_subscription() {
        parse_and_expect("subscription {}", "os\ne");
    }

    #[test]
    fn query_with_name() {
        parse_and_expect("query banana {}", "oqbanana\ne");
    }

    #[test]
    fn multiple_simple_queries() {
        parse_and_expect("{}{}", "oq\ne\noq\ne");
    }

    #[test]
    fn multiple_named_queries() {
        parse_and_expect(
            "
            query a {}
            mutation b {}
            ",
            "
            oqa // operator 1
            e   // end of operator 1
            omb // operator 2
            e   // end of operator 2
            ",
        );
    }

    #[test]
    fn query_with_field() {
        parse_and_expect(
            "query {
                some_field
            }",
            "
            oq
            fsome_field
            e
            e
            ",
        );
    }

    #[test]
    fn query_with_multiple_fields() {
        parse_and_expect(
            "query {
                some_field
                other
            }",
            "
            oq
            fsome_field
            e
            fother
            e
            e
            ",
        );
    }

    #[test]
    fn field_with_selection_set() {
        parse_and_expect(
            "query {
                some_field {
                    foo
                    bar
                }
            }",
            "
            oq
            fsome_field
            ffoo
            e
            fbar
            e
            e
            e
            ",
        );
    }

    #[test]
    fn field_with_fragment_spread() {
        parse_and_expect(
            "query {
                some_field {
                    foo
                    ... baz
                    bar
                }
            }",
            "
            oq
            fsome_field
            ffoo
            e
            sfbaz // fragment spread pointing to fragment baz
            fbar
            e
            e
            e
            ",
        );
    }

    #[test]
    fn spread_name_starting_with_on() {
        parse_and_expect(
            "query {
                some_field {
                    foo
                    ... online
                    bar
                }
            }",
            "
            oq
            fsome_field
            ffoo
            e
            sfonline // a spread, not an inline fragment
            fbar
            e
            e
            e
            ",
        );
    }

    #[test]
    fn inline_fragment() {
        parse_and_expect(
            "query {
                some_field {
                    foo
                    ... on baz {
                        bazField
                    }
                    bar
                }
            }",
            "
            oq
            fsome_field
            ffoo
            e
            stbaz
            fbazField
            e
            e
            fbar
            e
            e
            e
            ",
        );
    }

    #[test]
    fn inline_fragment_without_type_condition() {
        parse_and_expect(
            "{a...{b} c}",
            "
            oq
            fa
            e
            st
            fb
            e
            e
            fc
            e
            e
            ",
        );
    }

    #[test]
    fn fragment_definition() {
        parse_and_expect(
            "fragment Foo on Bar {}",
            "
            FFoo // fragment with name Foo
            Bar  // fragment type condition
            e
            ",
        );
    }

    #[test]
    fn fragment_definition_with_fields() {
        parse_and_expect(
            "fragment Foo on Bar {
                fieldA
                bField
            }",
            "
            FFoo
            Bar
            ffieldA
            e
            fbField
            e
            e
            ",
        );
    }

    #[test]
    fn aliases_are_sub_records_of_their_field() {
        parse_and_expect(
            "{aa: a}",
            "
            oq
            fa  // the field keeps its own name
            aaa // alias record: opcode a, payload aa
            e
            e
            ",
        );
    }

    #[test]
    fn arguments_emit_key_value_records() {
        parse_and_expect(
            r#"{bar(a: "foo", b: 2, c: 1.5, d: true, e: null, f: RED, g: $v)}"#,
            "
            oq
            fbar
            A
            ka
            vsfoo
            kb
            vi2
            kc
            vd1.5
            kd
            vt
            ke
            vn
            kf
            veRED
            kg
            v$v
            e
            e
            e
            ",
        );
    }

    #[test]
    fn empty_argument_lists_emit_nothing() {
        parse_and_expect("{bar()}", "oq\nfbar\ne\ne");
    }

    #[test]
    fn nested_value_literals() {
        parse_and_expect(
            r#"{bar(a: [1, [2]], b: {c: "x", d: {}})}"#,
            "
            oq
            fbar
            A
            ka
            vl
            vi1
            vl
            vi2
            e
            e
            kb
            vo
            kc
            vsx
            kd
            vo
            e
            e
            e
            e
            e
            ",
        );
    }

    #[test]
    fn directives_attach_to_fields() {
        parse_and_expect(
            "{a @skip(if: true) b @unknown c}",
            "
            oq
            fa
            dskip
            A
            kif
            vt
            e
            e
            fb
            dunknown
            e
            fc
            e
            e
            ",
        );
    }

    #[test]
    fn variable_definitions_land_in_the_operator_header() {
        parse_and_expect(
            r#"query ($a: String, $b: [Int!]! = [1]) {foo(x: $a)}"#,
            "
            oq
            Va
            yString
            e
            Vb
            y[Int!]!
            vl
            vi1
            e
            e
            ffoo
            A
            kx
            v$a
            e
            e
            e
            ",
        );
    }

    #[test]
    fn parse_errors_recover_and_keep_definitions() {
        let parsed = parse_query("query } query b {a}");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(disassemble(&parsed.bytecode), "oq\ne\noqb\nfa\ne\ne");
    }

    #[test]
    fn truncated_queries_stay_balanced() {
        let parsed = parse_query("query { a");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(disassemble(&parsed.bytecode), "oq\nfa\ne\ne");
    }

    #[test]
    fn garbage_between_definitions_is_reported_once_per_attempt() {
        let parsed = parse_query("%%%\n{a}");
        assert!(!parsed.errors.is_empty());
        assert_eq!(disassemble(&parsed.bytecode), "oq\nfa\ne\ne");
    }
}
