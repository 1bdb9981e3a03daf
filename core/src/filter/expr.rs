//! Built-in boolean filter language.
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := postfix ( CMP postfix )?
//! postfix := primary ( "." IDENT "(" args? ")" )*
//! primary := true | false | null | INT | FLOAT | STRING
//!          | IDENT | IDENT "(" args? ")" | "(" expr ")"
//! ```
//!
//! Identifiers are item fields (see [`ItemRecord::field`]). Unknown fields
//! are `null`; comparisons against `null` are false and `null` is false in
//! a boolean position.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::CharIndices;

use super::{EvalContext, FilterCompiler, FilterError, ItemPredicate, Value};
use crate::item::ItemRecord;

// ─────────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Dot,
    Not,
    And,
    Or,
    Cmp(CmpOp),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    pos: usize,
}

fn syntax(position: usize, message: impl Into<String>) -> FilterError {
    FilterError::Syntax {
        position,
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<Spanned>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '(' | ')' | ',' | '.' => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => Token::Dot,
                }
            }
            '!' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    Token::Cmp(CmpOp::Ne)
                } else {
                    Token::Not
                }
            }
            '&' | '|' => {
                chars.next();
                if !next_is(&mut chars, c) {
                    return Err(syntax(pos, format!("expected `{c}{c}`")));
                }
                if c == '&' { Token::And } else { Token::Or }
            }
            '=' => {
                chars.next();
                if !next_is(&mut chars, '=') {
                    return Err(syntax(pos, "expected `==`"));
                }
                Token::Cmp(CmpOp::Eq)
            }
            '>' | '<' => {
                chars.next();
                let or_equal = next_is(&mut chars, '=');
                Token::Cmp(match (c, or_equal) {
                    ('>', true) => CmpOp::Ge,
                    ('>', false) => CmpOp::Gt,
                    ('<', true) => CmpOp::Le,
                    _ => CmpOp::Lt,
                })
            }
            '"' => lex_string(&mut chars, pos)?,
            c if c.is_ascii_digit() => lex_number(&mut chars, pos)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                Token::Ident(ident)
            }
            other => return Err(syntax(pos, format!("unexpected character `{other}`"))),
        };

        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    chars.next_if(|&(_, c)| c == expected).is_some()
}

fn lex_string(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<Token, FilterError> {
    chars.next(); // opening quote
    let mut text = String::new();
    loop {
        let Some((_, c)) = chars.next() else {
            return Err(syntax(start, "unterminated string"));
        };
        match c {
            '"' => return Ok(Token::Str(text)),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, other)) => text.push(other),
                None => return Err(syntax(start, "unterminated string")),
            },
            other => text.push(other),
        }
    }
}

fn lex_number(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<Token, FilterError> {
    let mut text = String::new();
    let mut is_float = false;
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            chars.next();
        } else if c == '.' && !is_float {
            // Only a fraction if a digit follows; `3.Count()` is not a thing,
            // but keep the dot for the parser to report.
            let mut ahead = chars.clone();
            ahead.next();
            if !ahead.peek().is_some_and(|&(_, d)| d.is_ascii_digit()) {
                break;
            }
            is_float = true;
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }

    if is_float {
        text.parse()
            .map(Token::Float)
            .map_err(|_| syntax(start, format!("invalid number `{text}`")))
    } else {
        text.parse()
            .map(Token::Int)
            .map_err(|_| syntax(start, format!("integer out of range `{text}`")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Syntax tree
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    OpenPrefixCount,
    OpenSuffixCount,
}

impl Function {
    fn resolve(name: &str) -> Option<Self> {
        match name {
            "OpenPrefixCount" => Some(Self::OpenPrefixCount),
            "OpenSuffixCount" => Some(Self::OpenSuffixCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Contains,
    StartsWith,
    EndsWith,
    Count,
}

impl Method {
    fn resolve(name: &str) -> Option<Self> {
        match name {
            "Contains" => Some(Self::Contains),
            "StartsWith" => Some(Self::StartsWith),
            "EndsWith" => Some(Self::EndsWith),
            "Count" => Some(Self::Count),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Count => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Field(String),
    Call(Function),
    Method {
        target: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

/// Deepest expression tree the parser builds; evaluation recurses once per level.
const MAX_NESTING: usize = 256;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), FilterError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(syntax(self.position(), format!("expected {what}")))
        }
    }

    /// Count one more tree level, failing past [`MAX_NESTING`].
    fn enter(&mut self, at: usize) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(syntax(at, "expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.enter(self.position())?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let depth = self.depth;
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::And) {
            self.enter(self.position())?;
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, FilterError> {
        let at = self.position();
        if self.eat(&Token::Not) {
            self.enter(at)?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, FilterError> {
        let lhs = self.parse_postfix()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_postfix()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_postfix(&mut self) -> Result<Expr, FilterError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            let at = self.position();
            self.enter(at)?;
            let Some(Token::Ident(name)) = self.advance() else {
                return Err(syntax(at, "expected method name after `.`"));
            };
            let method = Method::resolve(&name).ok_or(FilterError::UnknownMethod(name.clone()))?;
            self.expect(&Token::LParen, "`(` after method name")?;
            let args = self.parse_args()?;
            if args.len() != method.arity() {
                return Err(FilterError::Arity {
                    name,
                    expected: method.arity(),
                    found: args.len(),
                });
            }
            expr = Expr::Method {
                target: Box::new(expr),
                method,
                args,
            };
        }
        self.depth = depth;
        Ok(expr)
    }

    /// Arguments after an opening parenthesis, consuming the closing one.
    fn parse_args(&mut self) -> Result<Vec<Expr>, FilterError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma, "`,` or `)`")?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        let at = self.position();
        let Some(token) = self.advance() else {
            return Err(syntax(at, "unexpected end of expression"));
        };

        match token {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                self.enter(at)?;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "`)`")?;
                self.depth -= 1;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ if self.eat(&Token::LParen) => {
                    let function =
                        Function::resolve(&name).ok_or(FilterError::UnknownFunction(name.clone()))?;
                    let args = self.parse_args()?;
                    if !args.is_empty() {
                        return Err(FilterError::Arity {
                            name,
                            expected: 0,
                            found: args.len(),
                        });
                    }
                    Ok(Expr::Call(function))
                }
                _ => Ok(Expr::Field(name)),
            },
            other => Err(syntax(at, format!("unexpected token {other:?}"))),
        }
    }
}

fn parse(src: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(FilterError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
        depth: 0,
    };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(syntax(parser.position(), "unexpected trailing input"));
    }
    Ok(expr)
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

fn eval_error(message: impl Into<String>) -> FilterError {
    FilterError::Eval(message.into())
}

fn truthy(value: &Value) -> Result<bool, FilterError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(eval_error(format!("expected bool, found {}", other.type_name()))),
    }
}

fn eval(expr: &Expr, item: &ItemRecord, ctx: &EvalContext<'_>) -> Result<Value, FilterError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(name) => Ok(item.field(name)),
        Expr::Call(Function::OpenPrefixCount) => Ok(Value::from(ctx.affixes.open_prefixes(item))),
        Expr::Call(Function::OpenSuffixCount) => Ok(Value::from(ctx.affixes.open_suffixes(item))),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, item, ctx)?)?)),
        Expr::And(lhs, rhs) => {
            let result = truthy(&eval(lhs, item, ctx)?)? && truthy(&eval(rhs, item, ctx)?)?;
            Ok(Value::Bool(result))
        }
        Expr::Or(lhs, rhs) => {
            let result = truthy(&eval(lhs, item, ctx)?)? || truthy(&eval(rhs, item, ctx)?)?;
            Ok(Value::Bool(result))
        }
        Expr::Compare { op, lhs, rhs } => {
            let lhs = eval(lhs, item, ctx)?;
            let rhs = eval(rhs, item, ctx)?;
            compare(*op, &lhs, &rhs).map(Value::Bool)
        }
        Expr::Method {
            target,
            method,
            args,
        } => {
            let target = eval(target, item, ctx)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, item, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call_method(*method, &target, &args)
        }
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, FilterError> {
    let ordering = match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => return Ok(false),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (lhs.as_f64().unwrap_or_default(), rhs.as_f64().unwrap_or_default());
            a.partial_cmp(&b)
        }
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(_), Value::Bool(_)) | (Value::List(_), Value::List(_)) => {
            return match op {
                CmpOp::Eq => Ok(lhs == rhs),
                CmpOp::Ne => Ok(lhs != rhs),
                _ => Err(eval_error(format!("cannot order {} values", lhs.type_name()))),
            };
        }
        _ => {
            return Err(eval_error(format!(
                "cannot compare {} with {}",
                lhs.type_name(),
                rhs.type_name()
            )));
        }
    };

    // NaN compares false to everything.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Lt => ordering == Ordering::Less,
    })
}

fn call_method(method: Method, target: &Value, args: &[Value]) -> Result<Value, FilterError> {
    if target.is_null() {
        return Ok(Value::Null);
    }

    match (method, target, args) {
        (Method::Count, Value::List(items), []) => Ok(Value::Int(items.len() as i64)),
        (Method::Contains, Value::List(items), [needle]) => {
            Ok(Value::Bool(items.iter().any(|item| item == needle)))
        }
        (Method::Contains, Value::Str(s), [Value::Str(needle)]) => {
            Ok(Value::Bool(s.contains(needle.as_str())))
        }
        (Method::StartsWith, Value::Str(s), [Value::Str(prefix)]) => {
            Ok(Value::Bool(s.starts_with(prefix.as_str())))
        }
        (Method::EndsWith, Value::Str(s), [Value::Str(suffix)]) => {
            Ok(Value::Bool(s.ends_with(suffix.as_str())))
        }
        _ => Err(eval_error(format!(
            "{method:?} is not defined for {}",
            target.type_name()
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiler
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct CompiledExpr {
    root: Expr,
}

impl ItemPredicate for CompiledExpr {
    fn evaluate(&self, item: &ItemRecord, ctx: &EvalContext<'_>) -> Result<bool, FilterError> {
        match eval(&self.root, item, ctx)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(eval_error(format!(
                "expression produced {}, not bool",
                other.type_name()
            ))),
        }
    }
}

/// The built-in [`FilterCompiler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprCompiler;

impl FilterCompiler for ExprCompiler {
    fn compile(&self, expression: &str) -> Result<Box<dyn ItemPredicate>, FilterError> {
        let root = parse(expression)?;
        Ok(Box::new(CompiledExpr { root }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affix::AffixCounter;
    use crate::testkit::FakeItem;

    fn eval_on(expression: &str, item: &ItemRecord) -> Result<bool, FilterError> {
        let counter = AffixCounter::default();
        let ctx = EvalContext { affixes: &counter };
        ExprCompiler.compile(expression)?.evaluate(item, &ctx)
    }

    fn ring() -> ItemRecord {
        FakeItem::new(1, "Metadata/Items/Rings/Ring1")
            .rarity("Rare")
            .field("Rarity", "Rare")
            .field("BaseName", "Sapphire Ring")
            .field("ItemLevel", 84i64)
            .field("Quality", 7.5)
            .field("Tags", vec!["ring", "default"])
            .into_record(0)
    }

    #[test]
    fn test_field_comparisons() {
        let item = ring();
        assert_eq!(eval_on(r#"Rarity == "Rare""#, &item), Ok(true));
        assert_eq!(eval_on("ItemLevel >= 84 && ItemLevel < 85", &item), Ok(true));
        assert_eq!(eval_on("Quality > 7", &item), Ok(true));
        assert_eq!(eval_on("ItemLevel != 84", &item), Ok(false));
        assert_eq!(eval_on(r#"Kind == "ShopItem" && TabIndex == 0"#, &item), Ok(true));
    }

    #[test]
    fn test_precedence_and_negation() {
        let item = ring();
        assert_eq!(eval_on("false && false || true", &item), Ok(true));
        assert_eq!(eval_on("false && (false || true)", &item), Ok(false));
        assert_eq!(eval_on(r#"!(Rarity == "Magic")"#, &item), Ok(true));
        assert_eq!(eval_on("!true || !false", &item), Ok(true));
    }

    #[test]
    fn test_string_and_list_methods() {
        let item = ring();
        assert_eq!(eval_on(r#"BaseName.Contains("Sapphire")"#, &item), Ok(true));
        assert_eq!(eval_on(r#"BaseName.StartsWith("Ruby")"#, &item), Ok(false));
        assert_eq!(eval_on(r#"BaseName.EndsWith("Ring")"#, &item), Ok(true));
        assert_eq!(eval_on(r#"Tags.Contains("ring") && Tags.Count() == 2"#, &item), Ok(true));
    }

    #[test]
    fn test_unknown_fields_are_null() {
        let item = ring();
        assert_eq!(eval_on("Corrupted", &item), Ok(false));
        assert_eq!(eval_on("Sockets > 3", &item), Ok(false));
        assert_eq!(eval_on(r#"Missing.Contains("x")"#, &item), Ok(false));
    }

    #[test]
    fn test_open_affix_functions_evaluate_inline() {
        let item = ring();
        assert_eq!(eval_on("OpenPrefixCount() == 3", &item), Ok(true));
        assert_eq!(eval_on("OpenSuffixCount() > 3", &item), Ok(false));
    }

    #[test]
    fn test_type_errors_are_reported() {
        let item = ring();
        assert!(matches!(eval_on(r#"ItemLevel == "84""#, &item), Err(FilterError::Eval(_))));
        assert!(matches!(eval_on("ItemLevel", &item), Err(FilterError::Eval(_))));
        assert!(matches!(eval_on("ItemLevel.StartsWith(\"8\")", &item), Err(FilterError::Eval(_))));
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(ExprCompiler.compile("   ").unwrap_err(), FilterError::Empty);
        assert!(matches!(
            ExprCompiler.compile("Rarity = \"Rare\""),
            Err(FilterError::Syntax { position: 7, .. })
        ));
        assert!(matches!(ExprCompiler.compile("(true"), Err(FilterError::Syntax { .. })));
        assert!(matches!(ExprCompiler.compile("true true"), Err(FilterError::Syntax { .. })));
        assert!(matches!(ExprCompiler.compile("\"open"), Err(FilterError::Syntax { .. })));
        assert_eq!(
            ExprCompiler.compile("Explode()").unwrap_err(),
            FilterError::UnknownFunction("Explode".into())
        );
        assert_eq!(
            ExprCompiler.compile("Name.Reverse()").unwrap_err(),
            FilterError::UnknownMethod("Reverse".into())
        );
        assert!(matches!(
            ExprCompiler.compile("Name.Contains()"),
            Err(FilterError::Arity { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let too_deep = |open: &str, close: &str| {
            format!("{}true{}", open.repeat(3_000), close.repeat(3_000))
        };
        for rule in [
            too_deep("(", ")"),
            too_deep("!", ""),
            too_deep("Name.Contains(", ")"),
            vec!["true"; 3_000].join(" && "),
            vec!["false"; 3_000].join(" || "),
            format!("Name{}", ".Contains(\"a\")".repeat(3_000)),
        ] {
            assert!(
                matches!(
                    ExprCompiler.compile(&rule),
                    Err(FilterError::Syntax { ref message, .. }) if message == "expression nested too deeply"
                ),
                "accepted: {}",
                &rule[..40]
            );
        }

        let item = ring();
        let shallow = format!("{}true{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval_on(&shallow, &item), Ok(true));
        assert_eq!(eval_on(&vec!["true"; 200].join(" && "), &item), Ok(true));
        assert_eq!(eval_on(&format!("{}true", "!!".repeat(50)), &item), Ok(true));
    }

    #[test]
    fn test_preprocessed_rule_compiles() {
        let pre = crate::filter::preprocess(
            "// crafting bases\nRarity == \"Rare\" && OpenPrefixCount() >= 1\nBaseName.Contains(\"Amulet\")",
        );
        let item = ring();
        assert_eq!(eval_on(&pre.expression, &item), Ok(true));
    }
}
