//! Compiler from a Cypher subset to the query IR.
//!
//! The supported surface is deliberately narrow: `MATCH` clauses with
//! directed relationship chains, variable-length edges (optionally wrapped
//! in `shortestPath`), and a `WHERE` conjunction of name filters, pairwise
//! edge-timestamp orderings, label predicates, and relationship-type
//! restrictions on named paths. `RETURN` is parsed and discarded.
//!
//! Recognizable-but-unsupported `WHERE` terms are dropped, so the produced
//! pattern matches a superset of the intended results. Malformed input is a
//! hard parse error; callers log it and report zero matches.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::query::ir::{NodeFilter, QueryEdge, QueryIr, QueryNode};
use crate::types::{QueryNodeId, UNORDERED_TIMESTAMP};

/// Failure to tokenize or parse a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable description with an input offset.
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cypher parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Compiles a query string into IR.
pub fn compile(query: &str) -> Result<QueryIr, ParseError> {
    let tokens = lex(query)?;
    let mut compiler = Compiler::new(tokens);
    compiler.run()?;
    Ok(compiler.into_ir())
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,
    DotDot,
    Pipe,
    Star,
    Minus,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

fn lex(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '.' => {
                if bytes.get(i + 1) == Some(&b'.') {
                    tokens.push(Token::DotDot);
                    i += 2;
                } else {
                    tokens.push(Token::Dot);
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(ParseError {
                        message: format!("unterminated string at offset {i}"),
                    });
                }
                tokens.push(Token::Str(input[start..j].to_owned()));
                i = j + 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                let value: i64 = input[start..i].parse().map_err(|_| ParseError {
                    message: format!("bad integer literal at offset {start}"),
                })?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..i].to_owned()));
            }
            other => {
                return Err(ParseError {
                    message: format!("unexpected character '{other}' at offset {i}"),
                })
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsed pattern elements (lowered after the clause's WHERE is absorbed)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct NodePattern {
    var: Option<String>,
    labels: Vec<String>,
    /// `{name: 'x'}` style property map entries.
    name_literal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RelLength {
    /// Plain single edge.
    Unit,
    /// `*` with no bounds (or open bounds).
    Unbounded,
    /// `*n..n` fixed-length repetition.
    Fixed(u32),
}

#[derive(Debug, Clone)]
struct RelPattern {
    var: Option<String>,
    types: Vec<String>,
    length: RelLength,
    /// True when the textual arrow pointed left; endpoints swap.
    reversed: bool,
    /// Set when this relationship sits inside `shortestPath(...)`.
    shortest: bool,
    /// Name of the enclosing named path, if any.
    path_name: Option<String>,
}

#[derive(Debug, Clone)]
struct PathPattern {
    nodes: Vec<NodePattern>,
    rels: Vec<RelPattern>,
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

struct Compiler {
    tokens: Vec<Token>,
    pos: usize,
    num_node_ids: u32,
    node_ids: FxHashMap<String, QueryNodeId>,
    /// Label spec captured at a node's first lowering; later occurrences
    /// do not override.
    node_specs: FxHashMap<QueryNodeId, String>,
    /// var → regex pattern applied to the node name.
    contains: FxHashMap<String, String>,
    /// edge var → synthetic ordering timestamp.
    timestamps: FxHashMap<String, u64>,
    /// var → extra label tokens gathered from WHERE (`;`-joined, `~`-aware).
    extra_labels: FxHashMap<String, String>,
    /// path or edge var → star traversal restriction tokens.
    path_constraints: FxHashMap<String, String>,
    edges: Vec<QueryEdge>,
}

impl Compiler {
    fn new(tokens: Vec<Token>) -> Compiler {
        Compiler {
            tokens,
            pos: 0,
            num_node_ids: 0,
            node_ids: FxHashMap::default(),
            node_specs: FxHashMap::default(),
            contains: FxHashMap::default(),
            timestamps: FxHashMap::default(),
            extra_labels: FxHashMap::default(),
            path_constraints: FxHashMap::default(),
            edges: Vec::new(),
        }
    }

    // -- token helpers ------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(ParseError {
                message: format!(
                    "expected {:?}, found {:?} at token {}",
                    token,
                    self.peek(),
                    self.pos
                ),
            })
        }
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(ParseError {
                message: format!("expected identifier, found {other:?}"),
            }),
        }
    }

    // -- id assignment ------------------------------------------------------

    fn node_id(&mut self, name: &str) -> QueryNodeId {
        if let Some(&id) = self.node_ids.get(name) {
            return id;
        }
        let id = self.num_node_ids;
        self.num_node_ids += 1;
        self.node_ids.insert(name.to_owned(), id);
        id
    }

    fn anon_node_id(&mut self) -> QueryNodeId {
        let id = self.num_node_ids;
        self.num_node_ids += 1;
        id
    }

    // -- driver -------------------------------------------------------------

    fn run(&mut self) -> Result<(), ParseError> {
        while self.peek().is_some() {
            if self.eat_keyword("MATCH") {
                self.compile_match()?;
            } else if self.eat_keyword("RETURN") {
                self.skip_return();
            } else {
                return Err(ParseError {
                    message: format!("expected MATCH or RETURN, found {:?}", self.peek()),
                });
            }
        }
        Ok(())
    }

    fn skip_return(&mut self) {
        while let Some(t) = self.peek() {
            if matches!(t, Token::Ident(s) if s.eq_ignore_ascii_case("MATCH")) {
                break;
            }
            self.pos += 1;
        }
    }

    fn compile_match(&mut self) -> Result<(), ParseError> {
        let mut paths = vec![self.parse_path()?];
        while self.eat(&Token::Comma) {
            paths.push(self.parse_path()?);
        }
        // The clause's WHERE feeds the side tables consulted while lowering
        // this clause's patterns, so it is absorbed first.
        if self.eat_keyword("WHERE") {
            self.compile_where()?;
        }
        for path in paths {
            self.lower_path(path);
        }
        Ok(())
    }

    // -- pattern parsing ----------------------------------------------------

    fn parse_path(&mut self) -> Result<PathPattern, ParseError> {
        let mut path_name = None;
        let mut shortest = false;

        // `p = ...` prefix.
        if matches!(self.peek(), Some(Token::Ident(_)))
            && self.peek_at(1) == Some(&Token::Eq)
            && !self.peek_keyword("shortestPath")
        {
            path_name = Some(self.expect_ident()?);
            self.expect(Token::Eq)?;
        }

        if self.eat_keyword("shortestPath") {
            shortest = true;
            self.expect(Token::LParen)?;
            // The name may also sit inside the parentheses.
            if matches!(self.peek(), Some(Token::Ident(_))) && self.peek_at(1) == Some(&Token::Eq) {
                path_name = Some(self.expect_ident()?);
                self.expect(Token::Eq)?;
            }
            let path = self.parse_chain(shortest, path_name)?;
            self.expect(Token::RParen)?;
            return Ok(path);
        }

        self.parse_chain(shortest, path_name)
    }

    fn parse_chain(
        &mut self,
        shortest: bool,
        path_name: Option<String>,
    ) -> Result<PathPattern, ParseError> {
        let mut nodes = vec![self.parse_node_pattern()?];
        let mut rels = Vec::new();
        let mut shortest_pending = shortest;
        loop {
            match self.peek() {
                Some(Token::Minus) | Some(Token::Lt) => {
                    let mut rel = self.parse_rel_pattern()?;
                    rel.path_name = path_name.clone();
                    if shortest_pending && rel.length == RelLength::Unbounded {
                        rel.shortest = true;
                        shortest_pending = false;
                    }
                    rels.push(rel);
                    nodes.push(self.parse_node_pattern()?);
                }
                _ => break,
            }
        }
        Ok(PathPattern { nodes, rels })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern, ParseError> {
        self.expect(Token::LParen)?;
        let mut pattern = NodePattern {
            var: None,
            labels: Vec::new(),
            name_literal: None,
        };
        if let Some(Token::Ident(_)) = self.peek() {
            pattern.var = Some(self.expect_ident()?);
        }
        while self.eat(&Token::Colon) {
            pattern.labels.push(self.expect_ident()?);
        }
        if self.eat(&Token::LBrace) {
            loop {
                let key = self.expect_ident()?;
                self.expect(Token::Colon)?;
                let value = self.bump();
                if key == "name" {
                    match value {
                        Some(Token::Str(s)) => pattern.name_literal = Some(s),
                        Some(Token::Int(n)) => pattern.name_literal = Some(n.to_string()),
                        _ => {}
                    }
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBrace)?;
        }
        self.expect(Token::RParen)?;
        Ok(pattern)
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern, ParseError> {
        let mut rel = RelPattern {
            var: None,
            types: Vec::new(),
            length: RelLength::Unit,
            reversed: false,
            shortest: false,
            path_name: None,
        };
        if self.eat(&Token::Lt) {
            rel.reversed = true;
        }
        self.expect(Token::Minus)?;

        if self.eat(&Token::LBracket) {
            if let Some(Token::Ident(_)) = self.peek() {
                rel.var = Some(self.expect_ident()?);
            }
            if self.eat(&Token::Colon) {
                rel.types.push(self.expect_ident()?);
                while self.eat(&Token::Pipe) {
                    // `|:T` and `|T` both appear in the wild.
                    self.eat(&Token::Colon);
                    rel.types.push(self.expect_ident()?);
                }
            }
            if self.eat(&Token::Star) {
                rel.length = RelLength::Unbounded;
                if let Some(Token::Int(start)) = self.peek().cloned() {
                    self.pos += 1;
                    self.expect(Token::DotDot)?;
                    match self.bump() {
                        Some(Token::Int(end)) if end == start && start > 0 => {
                            rel.length = RelLength::Fixed(start as u32);
                        }
                        Some(Token::Int(_)) => {
                            // Open or mismatched bounds stay unbounded.
                            rel.length = RelLength::Unbounded;
                        }
                        other => {
                            return Err(ParseError {
                                message: format!("expected range end, found {other:?}"),
                            })
                        }
                    }
                }
            }
            self.expect(Token::RBracket)?;
        }

        self.expect(Token::Minus)?;
        if !rel.reversed {
            // Trailing `>` for a directed right arrow; absent for the bare
            // `-[..]-` form, which is treated as outgoing.
            self.eat(&Token::Gt);
        }
        Ok(rel)
    }

    // -- WHERE parsing ------------------------------------------------------

    fn compile_where(&mut self) -> Result<(), ParseError> {
        loop {
            self.compile_where_term()?;
            if !self.eat_keyword("AND") {
                break;
            }
        }
        Ok(())
    }

    /// Compiles one conjunct, dropping recognizable-but-unsupported forms.
    fn compile_where_term(&mut self) -> Result<(), ParseError> {
        if self.eat_keyword("NOT") {
            // Only `NOT v:Label` contributes (a negative label token);
            // anything else under NOT is dropped.
            if matches!(self.peek(), Some(Token::Ident(_)))
                && self.peek_at(1) == Some(&Token::Colon)
            {
                self.compile_label_predicate(true)?;
            } else {
                self.skip_term();
            }
            return Ok(());
        }

        if self.eat_keyword("none") {
            self.expect(Token::LParen)?;
            self.compile_comprehension("~")?;
            self.expect(Token::RParen)?;
            return Ok(());
        }
        if self.eat_keyword("all") {
            self.expect(Token::LParen)?;
            self.compile_comprehension("")?;
            self.expect(Token::RParen)?;
            return Ok(());
        }
        if self.eat(&Token::LBracket) {
            self.compile_comprehension("")?;
            self.expect(Token::RBracket)?;
            return Ok(());
        }

        if matches!(self.peek(), Some(Token::Ident(_))) {
            match self.peek_at(1) {
                Some(Token::Colon) => return self.compile_label_predicate(false),
                Some(Token::Dot) => return self.compile_property_term(),
                _ => {}
            }
        }

        self.skip_term();
        Ok(())
    }

    /// `v:Label1:Label2` — adds (possibly negated) label tokens to `v`.
    fn compile_label_predicate(&mut self, negate: bool) -> Result<(), ParseError> {
        let var = self.expect_ident()?;
        let prefix = if negate { "~" } else { "" };
        while self.eat(&Token::Colon) {
            let label = self.expect_ident()?;
            let token = format!("{prefix}{label}");
            match self.extra_labels.get_mut(&var) {
                Some(existing) => {
                    existing.push(';');
                    existing.push_str(&token);
                }
                None => {
                    self.extra_labels.insert(var.clone(), token);
                }
            }
        }
        Ok(())
    }

    /// `v.prop OP rhs` — CONTAINS filters, name/id equality, and pairwise
    /// `time` orderings.
    fn compile_property_term(&mut self) -> Result<(), ParseError> {
        let var = self.expect_ident()?;
        self.expect(Token::Dot)?;
        let prop = self.expect_ident()?;

        if self.eat_keyword("CONTAINS") {
            if let Some(Token::Str(value)) = self.bump() {
                if prop == "name" {
                    self.contains.entry(var).or_insert(value);
                }
            }
            return Ok(());
        }

        let op = match self.bump() {
            Some(op @ (Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::Eq)) => op,
            _ => {
                self.skip_term();
                return Ok(());
            }
        };

        // Property-to-property comparison: only `time` ordering is honored.
        if matches!(self.peek(), Some(Token::Ident(_))) && self.peek_at(1) == Some(&Token::Dot) {
            let var2 = self.expect_ident()?;
            self.expect(Token::Dot)?;
            let prop2 = self.expect_ident()?;
            if prop == "time" && prop2 == "time" {
                self.order_timestamps(&var, &var2, &op);
            }
            return Ok(());
        }

        // Literal comparison: equality on `name`/`id` becomes an anchored
        // name filter; everything else is dropped.
        if op == Token::Eq {
            let literal = match self.bump() {
                Some(Token::Str(s)) => Some(s),
                Some(Token::Int(n)) => Some(n.to_string()),
                _ => None,
            };
            if let Some(value) = literal {
                if prop == "name" || prop == "id" || prop == "uuid" {
                    self.contains
                        .entry(var)
                        .or_insert_with(|| format!("^{}$", regex_escape(&value)));
                }
            }
        } else {
            // Consume the literal of an ordering comparison we do not keep.
            self.bump();
        }
        Ok(())
    }

    /// Assigns synthetic ordering timestamps so that matching honors the
    /// pairwise comparison. Chains longer than two are not topologically
    /// sorted; see the design notes.
    fn order_timestamps(&mut self, lhs: &str, rhs: &str, op: &Token) {
        let (early, late) = match op {
            Token::Lt | Token::Le => (lhs, rhs),
            _ => (rhs, lhs),
        };
        match (
            self.timestamps.get(early).copied(),
            self.timestamps.get(late).copied(),
        ) {
            (None, None) => {
                self.timestamps.insert(early.to_owned(), 5);
                self.timestamps.insert(late.to_owned(), 10);
            }
            (None, Some(t)) => {
                self.timestamps.insert(early.to_owned(), t.saturating_sub(1));
            }
            (Some(t), None) => {
                self.timestamps.insert(late.to_owned(), t + 1);
            }
            (Some(_), Some(_)) => {}
        }
    }

    /// `x IN relationships(p) WHERE type(x) = 'T'` — records a star-edge
    /// restriction on the named path (or relationship variable) `p`.
    fn compile_comprehension(&mut self, prefix: &str) -> Result<(), ParseError> {
        let binder = self.expect_ident()?;
        if !self.eat_keyword("IN") {
            return Err(ParseError {
                message: "expected IN inside comprehension".to_owned(),
            });
        }
        // `relationships(p)` or a bare identifier; either way the argument
        // names the path the restriction applies to.
        let mut subject = self.expect_ident()?;
        if self.eat(&Token::LParen) {
            subject = self.expect_ident()?;
            self.expect(Token::RParen)?;
        }
        if !self.eat_keyword("WHERE") {
            return Err(ParseError {
                message: "expected WHERE inside comprehension".to_owned(),
            });
        }
        // `type(x) = 'T'`
        let _fn_name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let inner_var = self.expect_ident()?;
        self.expect(Token::RParen)?;
        self.expect(Token::Eq)?;
        let value = match self.bump() {
            Some(Token::Str(s)) => s,
            other => {
                return Err(ParseError {
                    message: format!("expected string in comprehension, found {other:?}"),
                })
            }
        };
        if inner_var == binder {
            let token = format!("{prefix}{value}");
            match self.path_constraints.get_mut(&subject) {
                Some(existing) => {
                    existing.push(';');
                    existing.push_str(&token);
                }
                None => {
                    self.path_constraints.insert(subject, token);
                }
            }
        }
        Ok(())
    }

    /// Skips a conjunct we do not understand, balancing brackets.
    fn skip_term(&mut self) {
        let mut depth = 0i32;
        while let Some(t) = self.peek() {
            match t {
                Token::Ident(s)
                    if depth == 0
                        && (s.eq_ignore_ascii_case("AND")
                            || s.eq_ignore_ascii_case("RETURN")
                            || s.eq_ignore_ascii_case("MATCH")) =>
                {
                    break;
                }
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    // -- lowering -----------------------------------------------------------

    fn lower_path(&mut self, path: PathPattern) {
        let mut node_ids: Vec<QueryNodeId> = Vec::with_capacity(path.nodes.len());
        for node in &path.nodes {
            node_ids.push(self.lower_node(node));
        }
        for (i, rel) in path.rels.iter().enumerate() {
            let (src, dst) = if rel.reversed {
                (node_ids[i + 1], node_ids[i])
            } else {
                (node_ids[i], node_ids[i + 1])
            };
            self.lower_rel(rel, src, dst);
        }
        // A bare single-node pattern still has to reach the planner.
        if path.rels.is_empty() {
            debug_assert_eq!(node_ids.len(), 1);
        }
    }

    fn lower_node(&mut self, pattern: &NodePattern) -> QueryNodeId {
        let id = match &pattern.var {
            Some(name) => self.node_id(name),
            None => self.anon_node_id(),
        };
        if let std::collections::hash_map::Entry::Vacant(entry) = self.node_specs.entry(id) {
            let mut tokens: Vec<String> = pattern.labels.clone();
            if let Some(var) = &pattern.var {
                if let Some(extra) = self.extra_labels.get(var) {
                    tokens.push(extra.clone());
                }
            }
            let spec = if tokens.is_empty() {
                "any".to_owned()
            } else {
                tokens.join(";")
            };
            entry.insert(spec);
        }
        if let (Some(var), Some(name)) = (&pattern.var, &pattern.name_literal) {
            let anchored = format!("^{}$", regex_escape(name));
            self.contains.entry(var.clone()).or_insert(anchored);
        }
        id
    }

    fn lower_rel(&mut self, rel: &RelPattern, src: QueryNodeId, dst: QueryNodeId) {
        match rel.length {
            RelLength::Unbounded => {
                let head = if rel.shortest { "*" } else { "**" };
                let restriction = rel
                    .path_name
                    .as_ref()
                    .and_then(|p| self.path_constraints.get(p).cloned())
                    .or_else(|| {
                        rel.var
                            .as_ref()
                            .and_then(|v| self.path_constraints.get(v).cloned())
                    })
                    .or_else(|| {
                        if rel.types.is_empty() {
                            None
                        } else {
                            Some(rel.types.join(";"))
                        }
                    });
                let label = match restriction {
                    Some(r) => format!("{head}={r}"),
                    None => head.to_owned(),
                };
                self.edges.push(QueryEdge {
                    src,
                    dst,
                    label,
                    timestamp: UNORDERED_TIMESTAMP,
                });
            }
            RelLength::Fixed(n) => {
                let label = if rel.types.is_empty() {
                    "ANY".to_owned()
                } else {
                    rel.types.join(";")
                };
                let mut prev = src;
                for step in 0..n {
                    let next = if step + 1 == n {
                        dst
                    } else {
                        let mid = self.anon_node_id();
                        self.node_specs.insert(mid, "any".to_owned());
                        mid
                    };
                    self.edges.push(QueryEdge {
                        src: prev,
                        dst: next,
                        label: label.clone(),
                        timestamp: UNORDERED_TIMESTAMP,
                    });
                    prev = next;
                }
            }
            RelLength::Unit => {
                let label = if rel.types.is_empty() {
                    "ANY".to_owned()
                } else {
                    rel.types.join(";")
                };
                let timestamp = rel
                    .var
                    .as_ref()
                    .and_then(|v| self.timestamps.get(v).copied())
                    .unwrap_or(UNORDERED_TIMESTAMP);
                self.edges.push(QueryEdge {
                    src,
                    dst,
                    label,
                    timestamp,
                });
            }
        }
    }

    fn into_ir(self) -> QueryIr {
        let nodes: Vec<QueryNode> = (0..self.num_node_ids)
            .map(|id| QueryNode {
                id,
                label: self.node_specs.get(&id).cloned(),
            })
            .collect();
        let mut filters: Vec<NodeFilter> = self
            .contains
            .iter()
            .filter_map(|(var, pattern)| {
                self.node_ids.get(var).map(|&node| NodeFilter {
                    node,
                    pattern: pattern.clone(),
                })
            })
            .collect();
        filters.sort_by_key(|f| f.node);
        QueryIr {
            nodes,
            edges: self.edges,
            filters,
        }
    }
}

/// Escapes regex metacharacters so a literal can be embedded in a pattern.
fn regex_escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
