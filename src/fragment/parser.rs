//! Fragment syntax parser.
//!
//! Accepts a Nix-like data subset: an optional function header, an optional
//! `let ... in`, then one attribute set of `key = value;` bindings. Let-bound
//! names and `inherit` are substituted as data while parsing. Other evaluation
//! constructs (`if`, `import`, interpolation, function application) are
//! rejected with a located error rather than silently skipped.

use crate::error::ParseError;
use crate::key::{render_segment, OptionKey};
use crate::value::OptionValue;
use std::collections::{BTreeMap, BTreeSet};

/// Keywords that introduce evaluated expressions
const UNSUPPORTED_KEYWORDS: &[&str] = &["if", "import", "assert", "then", "else"];

/// Top-level key holding the import list
pub const IMPORTS_KEY: &str = "imports";

/// Result of parsing one fragment source
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFragment {
    /// Parameter names of the function header, if the fragment has one
    pub params: Option<Vec<String>>,
    /// Import references in source order (duplicates preserved)
    pub imports: Vec<String>,
    /// Top-level bindings in source order
    pub bindings: Vec<(OptionKey, OptionValue)>,
    /// Source constructs the canonical rendering cannot reproduce
    pub unrendered: Vec<&'static str>,
}

/// Parse a fragment source
pub fn parse_fragment(source: &str) -> Result<ParsedFragment, ParseError> {
    FragmentParser::new(source).parse()
}

/// Parse a single value (used for CLI overrides and tests)
pub fn parse_value(source: &str) -> Result<OptionValue, ParseError> {
    let mut parser = FragmentParser::new(source);
    let value = parser.parse_value()?;
    parser.skip_trivia();
    if parser.current().is_some() {
        return Err(parser.error("unexpected input after value"));
    }
    Ok(value)
}

struct FragmentParser<'a> {
    source: &'a str,
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    /// Innermost `let` scope last
    scopes: Vec<BTreeMap<String, OptionValue>>,
    unrendered: BTreeSet<&'static str>,
}

impl<'a> FragmentParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            input: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            scopes: Vec::new(),
            unrendered: BTreeSet::new(),
        }
    }

    fn parse(mut self) -> Result<ParsedFragment, ParseError> {
        self.skip_trivia();
        let params = self.parse_header()?;
        self.skip_trivia();

        let scoped = self.at_keyword("let");
        if scoped {
            self.advance_by(3);
            self.parse_let_bindings()?;
            self.skip_trivia();
        }

        if self.current() != Some('{') {
            return Err(self.error("fragment body must be an attribute set"));
        }
        let (imports, bindings) = self.parse_top_level()?;
        if scoped {
            self.scopes.pop();
        }

        self.skip_trivia();
        if self.current().is_some() {
            return Err(self.error("unexpected input after fragment body"));
        }

        Ok(ParsedFragment {
            params,
            imports,
            bindings,
            unrendered: self.unrendered.into_iter().collect(),
        })
    }

    // ---- cursor -------------------------------------------------------

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn location(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.col)
    }

    fn restore(&mut self, saved: (usize, usize, usize)) {
        self.pos = saved.0;
        self.line = saved.1;
        self.col = saved.2;
    }

    fn peek_str(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.input.get(self.pos + i) == Some(&c))
    }

    fn error(&self, message: &str) -> ParseError {
        self.error_at(self.line, self.col, message)
    }

    fn error_at(&self, line: usize, col: usize, message: &str) -> ParseError {
        let line_text = self.source.lines().nth(line.saturating_sub(1)).unwrap_or("");
        ParseError {
            message: message.to_string(),
            line,
            col,
            context: format!("{}\n{}^", line_text, " ".repeat(col.saturating_sub(1))),
        }
    }

    fn expect(&mut self, expected: char, what: &str) -> Result<(), ParseError> {
        if self.current() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}' {}", expected, what)))
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                self.unrendered.insert("comments");
                while let Some(ch) = self.current() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else if self.peek_str("/*") {
                self.unrendered.insert("comments");
                self.advance_by(2);
                while self.current().is_some() && !self.peek_str("*/") {
                    self.advance();
                }
                self.advance_by(2);
            } else {
                break;
            }
        }
    }

    // ---- structure ----------------------------------------------------

    /// `{ config, pkgs, ... }:` or `args:`; restores the cursor when absent.
    fn parse_header(&mut self) -> Result<Option<Vec<String>>, ParseError> {
        let saved = self.location();

        if self.current() == Some('{') {
            if let Some(params) = self.try_parse_param_set() {
                self.skip_trivia();
                if self.current() == Some(':') {
                    self.advance();
                    return Ok(Some(params));
                }
            }
            self.restore(saved);
            return Ok(None);
        }

        if self.current().map_or(false, is_identifier_start) {
            let name = self.parse_identifier()?;
            self.skip_trivia();
            if self.current() == Some(':') {
                self.advance();
                return Ok(Some(vec![name]));
            }
            self.restore(saved);
        }
        Ok(None)
    }

    fn try_parse_param_set(&mut self) -> Option<Vec<String>> {
        self.advance(); // '{'
        let mut params = Vec::new();
        loop {
            self.skip_trivia();
            match self.current() {
                Some('}') => {
                    self.advance();
                    return Some(params);
                }
                Some('.') if self.peek_str("...") => self.advance_by(3),
                Some(c) if is_identifier_start(c) => params.push(self.parse_identifier().ok()?),
                _ => return None,
            }
            self.skip_trivia();
            match self.current() {
                Some(',') => self.advance(),
                Some('}') => {}
                _ => return None,
            }
        }
    }

    fn parse_top_level(
        &mut self,
    ) -> Result<(Vec<String>, Vec<(OptionKey, OptionValue)>), ParseError> {
        self.advance(); // '{'
        let mut imports = Vec::new();
        let mut saw_imports = false;
        let mut bindings = Vec::new();
        let mut leaf_keys: BTreeSet<OptionKey> = BTreeSet::new();

        loop {
            self.skip_trivia();
            match self.current() {
                None => return Err(self.error("unterminated attribute set, expected '}'")),
                Some('}') => {
                    self.advance();
                    break;
                }
                _ => {}
            }

            let (_, line, col) = self.location();
            if self.at_keyword("inherit") {
                for (name, value) in self.parse_inherit()? {
                    if name == IMPORTS_KEY {
                        return Err(self.error_at(line, col, "'imports' cannot be inherited"));
                    }
                    let key = OptionKey::from_segments([name]);
                    self.record_leaves(&mut leaf_keys, &key, &value, line, col)?;
                    bindings.push((key, value));
                }
                continue;
            }
            self.reject_unsupported_keyword()?;
            let key = self.parse_attr_path()?;
            self.skip_trivia();
            self.expect('=', &format!("after attribute '{}'", key))?;
            self.skip_trivia();

            if key.len() == 1 && key.segments()[0] == IMPORTS_KEY {
                if saw_imports {
                    return Err(self.error_at(line, col, "'imports' is defined more than once"));
                }
                imports = self.parse_imports()?;
                saw_imports = true;
            } else {
                let value = self.parse_value()?;
                self.record_leaves(&mut leaf_keys, &key, &value, line, col)?;
                bindings.push((key.clone(), value));
            }

            self.skip_trivia();
            self.expect(';', &format!("after the value of '{}'", key))?;
        }

        Ok((imports, bindings))
    }

    /// Reject a top-level leaf that clashes with one defined earlier
    fn record_leaves(
        &self,
        defined: &mut BTreeSet<OptionKey>,
        key: &OptionKey,
        value: &OptionValue,
        line: usize,
        col: usize,
    ) -> Result<(), ParseError> {
        let mut leaves = Vec::new();
        collect_leaf_keys(key, value, &mut leaves);
        if let Some(duplicate) = leaves.iter().find_map(|leaf| conflicting_key(defined, leaf)) {
            return Err(self.error_at(
                line,
                col,
                &format!("attribute '{}' is already defined", duplicate),
            ));
        }
        defined.extend(leaves);
        Ok(())
    }

    /// Bindings after `let`, up to and including `in`. Pushes a scope the caller pops.
    fn parse_let_bindings(&mut self) -> Result<(), ParseError> {
        let (_, line, col) = self.location();
        self.unrendered.insert("'let' bindings");
        self.scopes.push(BTreeMap::new());
        let mut defined: Vec<(String, bool, usize, usize)> = Vec::new();

        loop {
            self.skip_trivia();
            if self.at_keyword("in") {
                self.advance_by(2);
                break;
            }
            if self.current().is_none() {
                return Err(self.error_at(line, col, "unterminated 'let', expected 'in'"));
            }

            let (_, bind_line, bind_col) = self.location();
            let inherited = self.at_keyword("inherit");
            let bound = if inherited {
                self.parse_inherit()?
            } else {
                self.reject_unsupported_keyword()?;
                let name = self.parse_identifier()?;
                self.skip_trivia();
                self.expect('=', &format!("after let binding '{}'", name))?;
                let value = self.parse_value()?;
                self.skip_trivia();
                self.expect(';', &format!("after the value of '{}'", name))?;
                vec![(name, value)]
            };

            for (name, value) in bound {
                let rebound = self
                    .scopes
                    .last_mut()
                    .map_or(false, |scope| scope.insert(name.clone(), value).is_some());
                if rebound {
                    return Err(self.error_at(
                        bind_line,
                        bind_col,
                        &format!("'{}' is already bound in this 'let'", name),
                    ));
                }
                defined.push((name, inherited, bind_line, bind_col));
            }
        }

        // Names are substituted in order, so a binding may only use earlier ones.
        // A plain `inherit x;` reads the enclosing scope and may name itself.
        if let Some(scope) = self.scopes.last() {
            for (i, (name, inherited, line, col)) in defined.iter().enumerate() {
                let Some(value) = scope.get(name) else { continue };
                let from = if *inherited { i + 1 } else { i };
                if let Some((later, ..)) = defined[from..]
                    .iter()
                    .find(|(other, ..)| mentions(value, other))
                {
                    return Err(self.error_at(
                        *line,
                        *col,
                        &format!("let binding '{}' uses '{}' before it is defined", name, later),
                    ));
                }
            }
        }
        Ok(())
    }

    /// `inherit a b;` or `inherit (source) a b;`, returning the bound names in order
    fn parse_inherit(&mut self) -> Result<Vec<(String, OptionValue)>, ParseError> {
        let (_, line, col) = self.location();
        self.advance_by("inherit".len());
        self.unrendered.insert("'inherit'");
        self.skip_trivia();

        let source = if self.current() == Some('(') {
            self.advance();
            self.skip_trivia();
            let path = self.parse_attr_path()?;
            self.skip_trivia();
            self.expect(')', "after the 'inherit' source")?;
            path.segments().to_vec()
        } else {
            Vec::new()
        };

        let mut inherited = Vec::new();
        loop {
            self.skip_trivia();
            match self.current() {
                Some(';') => {
                    self.advance();
                    break;
                }
                Some(c) if is_identifier_start(c) || c == '"' => {
                    let name = self.parse_attr_segment()?;
                    let mut segments = source.clone();
                    segments.push(name.clone());
                    let value = self.resolve_identifier(&segments, line, col)?;
                    inherited.push((name, value));
                }
                None => return Err(self.error_at(line, col, "unterminated 'inherit', expected ';'")),
                Some(c) => {
                    return Err(self.error(&format!("unexpected character '{}' in 'inherit'", c)))
                }
            }
        }
        if inherited.is_empty() {
            return Err(self.error_at(line, col, "'inherit' needs at least one name"));
        }
        Ok(inherited)
    }

    fn parse_imports(&mut self) -> Result<Vec<String>, ParseError> {
        let (_, line, col) = self.location();
        let value = self.parse_value()?;
        let OptionValue::List(items) = value else {
            return Err(self.error_at(line, col, "'imports' must be a list"));
        };
        items
            .into_iter()
            .map(|item| match item {
                OptionValue::Path(p) | OptionValue::String(p) => Ok(p),
                other => Err(self.error_at(
                    line,
                    col,
                    &format!("'imports' entries must be paths or strings, found {}", other.kind()),
                )),
            })
            .collect()
    }

    fn parse_attrset(&mut self) -> Result<OptionValue, ParseError> {
        self.advance(); // '{'
        let mut map = BTreeMap::new();
        loop {
            self.skip_trivia();
            match self.current() {
                None => return Err(self.error("unterminated attribute set, expected '}'")),
                Some('}') => {
                    self.advance();
                    break;
                }
                _ => {}
            }

            let (_, line, col) = self.location();
            if self.at_keyword("inherit") {
                for (name, value) in self.parse_inherit()? {
                    insert_path(&mut map, std::slice::from_ref(&name), value)
                        .map_err(|message| self.error_at(line, col, &message))?;
                }
                continue;
            }
            self.reject_unsupported_keyword()?;
            let key = self.parse_attr_path()?;
            self.skip_trivia();
            self.expect('=', &format!("after attribute '{}'", key))?;
            self.skip_trivia();
            let value = self.parse_value()?;
            self.skip_trivia();
            self.expect(';', &format!("after the value of '{}'", key))?;

            insert_path(&mut map, key.segments(), value)
                .map_err(|message| self.error_at(line, col, &message))?;
        }
        Ok(OptionValue::Mapping(map))
    }

    fn parse_attr_path(&mut self) -> Result<OptionKey, ParseError> {
        let mut segments = vec![self.parse_attr_segment()?];
        while self.current() == Some('.') {
            self.advance();
            self.skip_trivia();
            segments.push(self.parse_attr_segment()?);
        }
        Ok(OptionKey::from_segments(segments))
    }

    fn parse_attr_segment(&mut self) -> Result<String, ParseError> {
        match self.current() {
            Some('"') => self.parse_string(),
            Some(c) if is_identifier_start(c) => self.parse_identifier(),
            _ => Err(self.error("expected an attribute name")),
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        let mut id = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '\'' {
                id.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if id.is_empty() {
            Err(self.error("expected identifier"))
        } else {
            Ok(id)
        }
    }

    /// `keyword` at the cursor, not followed by more identifier characters
    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek_str(keyword)
            && !self
                .peek_at(keyword.len())
                .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '\'')
    }

    fn reject_unsupported_keyword(&self) -> Result<(), ParseError> {
        for keyword in UNSUPPORTED_KEYWORDS {
            if self.at_keyword(keyword) {
                return Err(self.error(&format!(
                    "'{}' is not supported; fragments must be plain data",
                    keyword
                )));
            }
        }
        Ok(())
    }

    // ---- values -------------------------------------------------------

    fn parse_value(&mut self) -> Result<OptionValue, ParseError> {
        self.skip_trivia();
        match self.current() {
            None => Err(self.error("unexpected end of input, expected a value")),
            Some('{') => self.parse_attrset(),
            Some('[') => self.parse_list(),
            Some('"') => self.parse_string().map(OptionValue::String),
            Some('\'') if self.peek_at(1) == Some('\'') => {
                self.parse_indented_string().map(OptionValue::String)
            }
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('-') if self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.parse_number()
            }
            Some('.') if matches!(self.peek_at(1), Some('/') | Some('.')) => self.parse_path(),
            Some('/') => self.parse_path(),
            Some('~') if self.peek_at(1) == Some('/') => self.parse_path(),
            Some('<') => Err(self.error("search paths (<...>) are not supported")),
            Some(c) if is_identifier_start(c) => self.parse_identifier_value(),
            Some(c) => Err(self.error(&format!("unexpected character '{}'", c))),
        }
    }

    fn parse_identifier_value(&mut self) -> Result<OptionValue, ParseError> {
        let (_, line, col) = self.location();
        self.reject_unsupported_keyword()?;
        let word = self.parse_identifier()?;

        match word.as_str() {
            "true" => return Ok(OptionValue::Bool(true)),
            "false" => return Ok(OptionValue::Bool(false)),
            "null" => return Ok(OptionValue::Null),
            "with" => {
                // Scope expression is irrelevant for data; only the body is kept.
                self.unrendered.insert("'with' scopes");
                self.parse_value()?;
                self.skip_trivia();
                self.expect(';', "after 'with' scope")?;
                return self.parse_value();
            }
            "let" => {
                self.parse_let_bindings()?;
                let body = self.parse_value();
                self.scopes.pop();
                return body;
            }
            "rec" => {
                self.skip_trivia();
                if self.current() == Some('{') {
                    return self.parse_attrset();
                }
                return Err(self.error("expected '{' after 'rec'"));
            }
            _ => {}
        }

        let mut segments = vec![word];
        while self.current() == Some('.')
            && self
                .peek_at(1)
                .map_or(false, |c| is_identifier_start(c) || c == '"')
        {
            self.advance();
            segments.push(self.parse_attr_segment()?);
        }

        if self.current() == Some(':') {
            return Err(self.error("functions are not supported in option values"));
        }

        self.resolve_identifier(&segments, line, col)
    }

    /// Let-bound names substitute their value; `config.x` is a reference; anything else a symbol
    fn resolve_identifier(
        &self,
        segments: &[String],
        line: usize,
        col: usize,
    ) -> Result<OptionValue, ParseError> {
        let Some((head, rest)) = segments.split_first() else {
            return Err(self.error_at(line, col, "expected identifier"));
        };

        if let Some(bound) = self.scopes.iter().rev().find_map(|scope| scope.get(head)) {
            if rest.is_empty() {
                return Ok(bound.clone());
            }
            let path = OptionKey::from_segments(rest.iter().cloned());
            return bound.lookup(&path).cloned().ok_or_else(|| {
                self.error_at(line, col, &format!("'{}' has no attribute '{}'", head, path))
            });
        }

        if head == "config" && !rest.is_empty() {
            return Ok(OptionValue::Reference(OptionKey::from_segments(
                rest.iter().cloned(),
            )));
        }

        let symbol = segments
            .iter()
            .map(|s| render_segment(s))
            .collect::<Vec<_>>()
            .join(".");
        Ok(OptionValue::Symbol(symbol))
    }

    fn parse_list(&mut self) -> Result<OptionValue, ParseError> {
        let (_, line, col) = self.location();
        self.advance(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.current() {
                None => return Err(self.error_at(line, col, "unterminated list, expected ']'")),
                Some(']') => {
                    self.advance();
                    break;
                }
                _ => items.push(self.parse_value()?),
            }
        }
        Ok(OptionValue::List(items))
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        let (_, line, col) = self.location();
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None => return Err(self.error_at(line, col, "unterminated string")),
                Some('"') => {
                    self.advance();
                    return Ok(s);
                }
                Some('\\') => {
                    self.advance();
                    let Some(c) = self.current() else {
                        return Err(self.error_at(line, col, "unterminated string"));
                    };
                    s.push(unescape(c));
                    self.advance();
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    return Err(self.error("string interpolation is not supported"));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn parse_indented_string(&mut self) -> Result<String, ParseError> {
        let (_, line, col) = self.location();
        self.advance_by(2);
        let mut raw = String::new();
        loop {
            match self.current() {
                None => return Err(self.error_at(line, col, "unterminated indented string")),
                Some('\'') if self.peek_at(1) == Some('\'') => match self.peek_at(2) {
                    Some('\'') => {
                        raw.push_str("''");
                        self.advance_by(3);
                    }
                    Some('$') => {
                        raw.push('$');
                        self.advance_by(3);
                    }
                    Some('\\') => {
                        self.advance_by(3);
                        let Some(c) = self.current() else {
                            return Err(self.error_at(line, col, "unterminated indented string"));
                        };
                        raw.push(unescape(c));
                        self.advance();
                    }
                    _ => {
                        self.advance_by(2);
                        break;
                    }
                },
                Some('$') if self.peek_at(1) == Some('{') => {
                    return Err(self.error("string interpolation is not supported"));
                }
                Some(c) => {
                    raw.push(c);
                    self.advance();
                }
            }
        }
        Ok(strip_indentation(&raw))
    }

    fn parse_number(&mut self) -> Result<OptionValue, ParseError> {
        let (_, line, col) = self.location();
        let mut text = String::new();
        if self.current() == Some('-') {
            text.push('-');
            self.advance();
        }
        self.take_digits(&mut text);

        let mut is_float = false;
        if self.current() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.advance();
            self.take_digits(&mut text);
        }
        if matches!(self.current(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.advance();
                if sign {
                    text.push(self.current().unwrap_or('+'));
                    self.advance();
                }
                self.take_digits(&mut text);
            }
        }

        if self.current().map_or(false, |c| c.is_ascii_alphabetic() || c == '_') {
            return Err(self.error_at(line, col, "invalid number literal"));
        }

        if is_float {
            text.parse::<f64>()
                .map(OptionValue::Float)
                .map_err(|_| self.error_at(line, col, "invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|_| self.error_at(line, col, "integer literal out of range"))
        }
    }

    fn take_digits(&mut self, into: &mut String) {
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                into.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn parse_path(&mut self) -> Result<OptionValue, ParseError> {
        let (_, line, col) = self.location();
        let mut path = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '/' | '~') {
                path.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if !path.contains('/') || path.ends_with('/') {
            return Err(self.error_at(line, col, &format!("invalid path literal '{}'", path)));
        }
        Ok(OptionValue::Path(path))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

/// Drop a blank first line and the indentation common to all non-blank lines
fn strip_indentation(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.split('\n').collect();
    if lines.len() > 1 && lines[0].trim().is_empty() {
        lines.remove(0);
    }

    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| *c == ' ').count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full keys of every non-mapping value under `key`
fn collect_leaf_keys(key: &OptionKey, value: &OptionValue, into: &mut Vec<OptionKey>) {
    match value {
        OptionValue::Mapping(map) => {
            for (segment, child) in map {
                collect_leaf_keys(&key.child(segment.clone()), child, into);
            }
        }
        _ => into.push(key.clone()),
    }
}

/// Whether `value` holds a symbol rooted at `name`
fn mentions(value: &OptionValue, name: &str) -> bool {
    match value {
        OptionValue::Symbol(symbol) => {
            symbol == name
                || symbol
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('.'))
        }
        OptionValue::List(items) => items.iter().any(|item| mentions(item, name)),
        OptionValue::Mapping(map) => map.values().any(|child| mentions(child, name)),
        _ => false,
    }
}

/// A leaf defined twice, or defined both as a value and as an attribute set
fn conflicting_key(defined: &BTreeSet<OptionKey>, leaf: &OptionKey) -> Option<OptionKey> {
    defined.iter().find_map(|existing| {
        if existing == leaf || existing.is_strict_prefix_of(leaf) {
            Some(existing.clone())
        } else if leaf.is_strict_prefix_of(existing) {
            Some(leaf.clone())
        } else {
            None
        }
    })
}

/// Insert `value` at a dotted path inside a mapping literal
fn insert_path(
    map: &mut BTreeMap<String, OptionValue>,
    segments: &[String],
    value: OptionValue,
) -> Result<(), String> {
    let Some((first, rest)) = segments.split_first() else {
        return Err("empty attribute path".to_string());
    };

    if rest.is_empty() {
        match (map.get_mut(first), value) {
            (None, value) => {
                map.insert(first.clone(), value);
                Ok(())
            }
            (Some(OptionValue::Mapping(existing)), OptionValue::Mapping(incoming)) => {
                for (name, child) in incoming {
                    insert_path(existing, std::slice::from_ref(&name), child)?;
                }
                Ok(())
            }
            (Some(_), _) => Err(format!("attribute '{}' is already defined", first)),
        }
    } else {
        let entry = map
            .entry(first.clone())
            .or_insert_with(|| OptionValue::Mapping(BTreeMap::new()));
        match entry {
            OptionValue::Mapping(inner) => insert_path(inner, rest, value),
            _ => Err(format!("attribute '{}' is already defined", first)),
        }
    }
}
