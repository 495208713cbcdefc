//! Stage text grammars
//!
//! A grammar turns the text a user typed into a stage into typed
//! [`Parameters`]. Grammars are a pluggable capability: the
//! [`GrammarRegistry`] holds one per [`StageKind`] and falls back to the
//! descriptor-driven [`ArgumentGrammar`] for kinds without an override.
//!
//! ## Built-in syntax
//!
//! ```text
//! [kind:] arg, arg, name=value
//! ```
//!
//! - literals: `"quoted"`, `'quoted'`, bare words (`ground_truth.label`),
//!   integers, floats, `true`/`false`, `none`, lists `[a, b]`
//! - expression-typed parameters take the raw argument text, which must parse
//!   as a Rhai expression (`label == "cat" && confidence > 0.5`)
//! - a leading `kind:` selects the stage kind
//!
//! ## Example
//!
//! ```ignore
//! use viewbar::stage::{GrammarRegistry, StageKind};
//!
//! let grammar = GrammarRegistry::new();
//! let (kind, params) = grammar.parse("take: 10, seed=0.5", StageKind::Match)?;
//! assert_eq!(kind, StageKind::Take);
//! ```

use crate::stage::kind::{ParamDefault, ParamSpec, ParamType, StageKind};
use crate::stage::value::{ParamValue, Parameters};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Human-readable grammar failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the stage text, when known
    pub offset: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    pub fn at(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }

    fn shifted(mut self, by: usize) -> Self {
        self.offset = self.offset.map(|o| o + by);
        self
    }
}

/// Parses the argument text of one stage kind.
pub trait StageGrammar: Send + Sync {
    /// Parse `args` (the stage text without any `kind:` prefix).
    fn parse(&self, kind: StageKind, args: &str) -> Result<Parameters, ParseError>;

    /// Cheap syntax check run on every keystroke. Defaults to a full parse.
    fn check(&self, kind: StageKind, args: &str) -> Option<ParseError> {
        self.parse(kind, args).err()
    }
}

/// Per-kind grammar lookup with a shared fallback.
#[derive(Clone)]
pub struct GrammarRegistry {
    fallback: Arc<dyn StageGrammar>,
    overrides: HashMap<StageKind, Arc<dyn StageGrammar>>,
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GrammarRegistry {
    /// Registry using [`ArgumentGrammar`] for every kind
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(ArgumentGrammar::new()))
    }

    pub fn with_fallback(fallback: Arc<dyn StageGrammar>) -> Self {
        Self {
            fallback,
            overrides: HashMap::new(),
        }
    }

    /// Install a grammar for one kind
    pub fn register(&mut self, kind: StageKind, grammar: Arc<dyn StageGrammar>) {
        self.overrides.insert(kind, grammar);
    }

    pub fn grammar_for(&self, kind: StageKind) -> &dyn StageGrammar {
        self.overrides
            .get(&kind)
            .map(|g| g.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    /// Parse full stage text, honouring a `kind:` prefix.
    pub fn parse(
        &self,
        text: &str,
        kind: StageKind,
    ) -> Result<(StageKind, Parameters), ParseError> {
        let (prefix, args, offset) = split_kind_prefix(text)?;
        let kind = prefix.unwrap_or(kind);
        let params = self
            .grammar_for(kind)
            .parse(kind, args)
            .map_err(|e| e.shifted(offset))?;
        Ok((kind, params))
    }

    /// Keystroke-time syntax check of full stage text.
    pub fn check(&self, text: &str, kind: StageKind) -> Option<ParseError> {
        match split_kind_prefix(text) {
            Ok((prefix, args, offset)) => {
                let kind = prefix.unwrap_or(kind);
                self.grammar_for(kind)
                    .check(kind, args)
                    .map(|e| e.shifted(offset))
            }
            Err(e) => Some(e),
        }
    }

    /// Kind named by a `kind:` prefix, if the text has a valid one
    pub fn prefix_kind(text: &str) -> Option<StageKind> {
        split_kind_prefix(text).ok().and_then(|(kind, _, _)| kind)
    }
}

/// Split `kind: rest` into the kind and the argument text.
///
/// Returns the byte offset of the argument text within `text`.
fn split_kind_prefix(text: &str) -> Result<(Option<StageKind>, &str, usize), ParseError> {
    let start = text.len() - text.trim_start().len();
    let rest = &text[start..];
    let ident_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if ident_len == 0 {
        return Ok((None, text, 0));
    }

    let after = &rest[ident_len..];
    let gap = after.len() - after.trim_start().len();
    let after_trimmed = &after[gap..];
    if !after_trimmed.starts_with(':') || after_trimmed.starts_with("::") {
        return Ok((None, text, 0));
    }

    let name = &rest[..ident_len];
    let kind = StageKind::from_name(name)
        .ok_or_else(|| ParseError::at(format!("unknown stage '{}'", name), start))?;
    let args_offset = start + ident_len + gap + 1;
    Ok((Some(kind), &text[args_offset..], args_offset))
}

/// Descriptor-driven grammar for every built-in kind.
pub struct ArgumentGrammar {
    engine: rhai::Engine,
}

impl Default for ArgumentGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgumentGrammar {
    pub fn new() -> Self {
        let mut engine = rhai::Engine::new_raw();
        engine.set_max_expr_depths(64, 64);
        Self { engine }
    }

    fn check_expression(&self, src: &str) -> Result<(), String> {
        if src.trim().is_empty() {
            return Err("expression is empty".to_string());
        }
        self.engine
            .compile_expression(src)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn coerce(&self, spec: &ParamSpec, literal: &Literal, raw: &str) -> Result<ParamValue, String> {
        let mut expr_error = None;
        for ty in spec.types {
            let value = match (ty, literal) {
                (ParamType::Id, Literal::Str(s) | Literal::Bare(s)) if is_object_id(s) => {
                    Some(ParamValue::Str(s.clone()))
                }
                (ParamType::IdList, Literal::List(items)) => items
                    .iter()
                    .map(|item| match item {
                        Literal::Str(s) | Literal::Bare(s) if is_object_id(s) => {
                            Some(ParamValue::Str(s.clone()))
                        }
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(ParamValue::List),
                (ParamType::Str, Literal::Str(s) | Literal::Bare(s)) => {
                    Some(ParamValue::Str(s.clone()))
                }
                (ParamType::StrList, Literal::List(items)) => items
                    .iter()
                    .map(|item| match item {
                        Literal::Str(s) | Literal::Bare(s) => Some(ParamValue::Str(s.clone())),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(ParamValue::List),
                (ParamType::Int, Literal::Int(i)) => Some(ParamValue::Int(*i)),
                (ParamType::Float, Literal::Float(f)) => Some(ParamValue::Float(*f)),
                (ParamType::Float, Literal::Int(i)) => Some(ParamValue::Float(*i as f64)),
                (ParamType::Bool, Literal::Bool(b)) => Some(ParamValue::Bool(*b)),
                (ParamType::Null, Literal::Null) => Some(ParamValue::Null),
                (ParamType::Expr, _) => match self.check_expression(raw) {
                    Ok(()) => Some(ParamValue::Expr(raw.trim().to_string())),
                    Err(e) => {
                        expr_error = Some(e);
                        None
                    }
                },
                _ => None,
            };
            if let Some(value) = value {
                return Ok(value);
            }
        }

        Err(match expr_error {
            Some(e) if matches!(spec.types, [ParamType::Expr]) => {
                format!("invalid expression for '{}': {}", spec.name, e)
            }
            _ => format!(
                "parameter '{}' expects {}, got `{}`",
                spec.name,
                spec.signature(),
                raw.trim()
            ),
        })
    }
}

impl StageGrammar for ArgumentGrammar {
    fn parse(&self, kind: StageKind, args: &str) -> Result<Parameters, ParseError> {
        let specs = kind.params();
        let mut bound: Vec<Option<ParamValue>> = vec![None; specs.len()];

        let pieces = split_top_level(args, 0)?;
        let mut positional: Vec<(usize, &str)> = Vec::new();
        let mut keywords: Vec<(usize, &str, &str)> = Vec::new();
        let takes_expr = specs.iter().any(|s| s.types.contains(&ParamType::Expr));
        for (offset, piece) in pieces {
            match split_keyword(piece) {
                Some((name, value)) if kind.param(name).is_some() => {
                    keywords.push((offset, name, value))
                }
                // `x = 1` may still be meant as an expression
                Some((name, _)) if !takes_expr => {
                    return Err(ParseError::at(
                        format!("unknown parameter '{}' for {}", name, kind),
                        offset,
                    ));
                }
                _ if !keywords.is_empty() => {
                    return Err(ParseError::at(
                        "positional argument after keyword argument",
                        offset,
                    ));
                }
                _ => positional.push((offset, piece)),
            }
        }

        // Surplus positionals fold into a trailing list parameter:
        // `exclude_fields: a, b` == `exclude_fields: [a, b]`
        let mut folded: Option<(usize, Literal, String)> = None;
        if positional.len() > specs.len() && !specs.is_empty() {
            let last = &specs[specs.len() - 1];
            let takes_list = last
                .types
                .iter()
                .any(|t| matches!(t, ParamType::StrList | ParamType::IdList));
            if takes_list {
                let tail = positional.split_off(specs.len() - 1);
                let offset = tail[0].0;
                let items = tail
                    .iter()
                    .map(|(_, p)| parse_literal(p))
                    .collect::<Vec<_>>();
                let raw = tail.iter().map(|(_, p)| p.trim()).collect::<Vec<_>>().join(", ");
                folded = Some((offset, Literal::List(items), raw));
            }
        }

        if positional.len() > specs.len() {
            let (offset, _) = positional[specs.len()];
            return Err(ParseError::at(
                format!("{} takes at most {} argument(s)", kind, specs.len()),
                offset,
            ));
        }

        for (i, (offset, piece)) in positional.iter().enumerate() {
            let value = self
                .coerce(&specs[i], &parse_literal(piece), piece)
                .map_err(|m| ParseError::at(m, *offset))?;
            bound[i] = Some(value);
        }
        if let Some((offset, literal, raw)) = folded {
            let i = specs.len() - 1;
            let value = self
                .coerce(&specs[i], &literal, &raw)
                .map_err(|m| ParseError::at(m, offset))?;
            bound[i] = Some(value);
        }

        for (offset, name, value) in keywords {
            let i = specs
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| ParseError::at(format!("unknown parameter '{}'", name), offset))?;
            if bound[i].is_some() {
                return Err(ParseError::at(
                    format!("parameter '{}' given more than once", name),
                    offset,
                ));
            }
            let value = self
                .coerce(&specs[i], &parse_literal(value), value)
                .map_err(|m| ParseError::at(m, offset))?;
            bound[i] = Some(value);
        }

        let mut params = Parameters::new();
        for (spec, value) in specs.iter().zip(bound) {
            let value = match (value, spec.default) {
                (Some(v), _) => v,
                (None, Some(ParamDefault::Null)) => ParamValue::Null,
                (None, Some(ParamDefault::Bool(b))) => ParamValue::Bool(b),
                (None, None) => {
                    return Err(ParseError::new(format!(
                        "missing required parameter '{}' for {}",
                        spec.name, kind
                    )));
                }
            };
            params.insert(spec.name, value);
        }
        Ok(params)
    }
}

/// Render parameters back into text the built-in grammar accepts.
///
/// Required parameters are positional; optional ones appear as keywords only
/// when they differ from their default.
pub fn render_text(kind: StageKind, params: &Parameters) -> String {
    let mut args = Vec::new();
    for spec in kind.params() {
        let Some(value) = params.get(spec.name) else {
            continue;
        };
        match spec.default {
            None => args.push(value.render()),
            Some(default) => {
                let is_default = match default {
                    ParamDefault::Null => value.is_null(),
                    ParamDefault::Bool(b) => value.as_bool() == Some(b),
                };
                if !is_default {
                    args.push(format!("{}={}", spec.name, value.render()));
                }
            }
        }
    }
    if args.is_empty() {
        format!("{}:", kind)
    } else {
        format!("{}: {}", kind, args.join(", "))
    }
}

fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Literal forms recognised in argument text.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bare(String),
    List(Vec<Literal>),
    /// Anything else, e.g. an expression
    Other,
}

fn parse_literal(src: &str) -> Literal {
    let s = src.trim();
    if let Some(quoted) = parse_quoted(s) {
        return Literal::Str(quoted);
    }
    if s.starts_with('[') && s.ends_with(']') && s.len() >= 2 {
        let inner = &s[1..s.len() - 1];
        return match split_top_level(inner, 0) {
            Ok(items) => Literal::List(items.iter().map(|(_, p)| parse_literal(p)).collect()),
            Err(_) => Literal::Other,
        };
    }
    match s {
        "true" | "True" => return Literal::Bool(true),
        "false" | "False" => return Literal::Bool(false),
        "none" | "None" | "null" => return Literal::Null,
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Literal::Int(i);
    }
    let numeric = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric {
        if let Ok(f) = s.parse::<f64>() {
            return Literal::Float(f);
        }
    }
    // bare words also cover hex ids such as `5f8d254a...`
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Literal::Bare(s.to_string());
    }
    Literal::Other
}

/// Whole-string quoted literal, with `\"`, `\'` and `\\` unescaped.
fn parse_quoted(s: &str) -> Option<String> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let mut out = String::new();
    let mut chars = s[1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?.1),
            c if c == quote => {
                // closing quote must end the literal
                return (i + 2 == s.len()).then_some(out);
            }
            c => out.push(c),
        }
    }
    None
}

/// `name = value` where `=` is not part of `==`.
fn split_keyword(piece: &str) -> Option<(&str, &str)> {
    let trimmed = piece.trim_start();
    let ident_len = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    if ident_len == 0 || trimmed.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    let after = trimmed[ident_len..].trim_start();
    let value = after.strip_prefix('=')?;
    if value.starts_with('=') {
        return None;
    }
    Some((&trimmed[..ident_len], value))
}

/// Split on commas outside quotes and brackets.
///
/// Returns each piece with its byte offset (plus `base`). Blank input yields
/// no pieces; a blank piece between commas is an error.
fn split_top_level(text: &str, base: usize) -> Result<Vec<(usize, &str)>, ParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut pieces = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => stack.push(')'),
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ')' | ']' | '}' => {
                if stack.pop() != Some(c) {
                    return Err(ParseError::at(format!("unexpected '{}'", c), base + i));
                }
            }
            ',' if stack.is_empty() => {
                pieces.push((base + start, &text[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(ParseError::new("unterminated string"));
    }
    if let Some(closer) = stack.last() {
        return Err(ParseError::new(format!("missing '{}'", closer)));
    }
    pieces.push((base + start, &text[start..]));

    for (offset, piece) in &pieces {
        if piece.trim().is_empty() {
            return Err(ParseError::at("empty argument", *offset));
        }
    }
    Ok(pieces)
}
