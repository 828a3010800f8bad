//! # Conditional Expressions
//!
//! A small expression language for `${...}` placeholders that
//! pick a value based on other variables:
//!
//! ```text
//! ${"prod-cluster" if env == "production" else "dev-cluster"}
//! ${replicas if replicas > 1 and not_paused == True else 1}
//! ```
//!
//! Grammar (Python conditional-expression subset):
//!
//! ```text
//! conditional := disjunction [ "if" disjunction "else" conditional ]
//! disjunction := conjunction ( "or" conjunction )*
//! conjunction := comparison ( "and" comparison )*
//! comparison  := primary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") primary )*
//! primary     := NAME | STRING | NUMBER | True | False | None | "(" conditional ")"
//! ```
//!
//! `true`/`false`/`null` are accepted as aliases for the capitalized
//! constants. There are no calls, attribute access, arithmetic or
//! subscripts. Only scalar variables are visible.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Failure while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    /// The expression uses syntax outside the supported subset.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// A name is not in the variable table.
    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),
    /// An ordering comparison between incompatible operands.
    #[error("cannot compare {left} {op} {right}")]
    Incomparable {
        op: CmpOp,
        left: &'static str,
        right: &'static str,
    },
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
        };
        f.write_str(s)
    }
}

/// Evaluate `expression` against the scalar entries of `variables`.
///
/// Object and array variables are skipped, so referencing one is an
/// undefined-variable error.
pub fn evaluate(expression: &str, variables: &Map<String, Value>) -> Result<Value, ExprError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.conditional()?;
    if let Some(tok) = parser.peek() {
        return Err(ExprError::Syntax(format!("unexpected token {tok:?}")));
    }
    let scope = Scope { variables };
    Ok(expr.eval(&scope)?.into_value())
}

// ── Values ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::from(i),
            Scalar::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Str(s) => Value::String(s),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Str(s) => !s.is_empty(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "None",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn equals(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => a.as_f64() == b.as_f64(),
            (a, b) => a == b,
        }
    }

    fn order(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    fn compare(&self, op: CmpOp, other: &Scalar) -> Result<bool, ExprError> {
        match op {
            CmpOp::Eq => return Ok(self.equals(other)),
            CmpOp::NotEq => return Ok(!self.equals(other)),
            _ => {}
        }
        let ord = self.order(other).ok_or(ExprError::Incomparable {
            op,
            left: self.type_name(),
            right: other.type_name(),
        })?;
        Ok(match op {
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::LtE => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::GtE => ord != Ordering::Less,
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::NotEq => ord != Ordering::Equal,
        })
    }
}

struct Scope<'a> {
    variables: &'a Map<String, Value>,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Result<Scalar, ExprError> {
        self.variables
            .get(name)
            .and_then(Scalar::from_value)
            .ok_or_else(|| ExprError::UndefinedVariable(name.to_string()))
    }
}

// ── Tokens ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Literal(Scalar),
    Cmp(CmpOp),
    If,
    Else,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
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
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::NotEq, 2),
                    ('<', Some('=')) => (CmpOp::LtE, 2),
                    ('>', Some('=')) => (CmpOp::GtE, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => return Err(ExprError::Syntax(format!("unsupported operator '{c}'"))),
                };
                tokens.push(Token::Cmp(op));
                i += width;
            }
            '"' | '\'' => {
                let (s, end) = read_string(&chars, i)?;
                tokens.push(Token::Literal(Scalar::Str(s)));
                i = end;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let (num, end) = read_number(&chars, i)?;
                tokens.push(Token::Literal(num));
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "if" => Token::If,
                    "else" => Token::Else,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "True" | "true" => Token::Literal(Scalar::Bool(true)),
                    "False" | "false" => Token::Literal(Scalar::Bool(false)),
                    "None" | "null" => Token::Literal(Scalar::Null),
                    "not" | "in" | "is" | "lambda" => {
                        return Err(ExprError::Syntax(format!("unsupported keyword '{word}'")))
                    }
                    _ => Token::Name(word),
                });
            }
            other => return Err(ExprError::Syntax(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| ExprError::Syntax("unterminated string".to_string()))?;
                out.push(match *escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ExprError::Syntax("unterminated string".to_string()))
}

fn read_number(chars: &[char], start: usize) -> Result<(Scalar, usize), ExprError> {
    let mut i = start;
    if chars[i] == '-' {
        i += 1;
    }
    while i < chars.len()
        && (chars[i].is_ascii_digit()
            || matches!(chars[i], '.' | 'e' | 'E')
            || (matches!(chars[i], '+' | '-') && matches!(chars[i - 1], 'e' | 'E')))
    {
        i += 1;
    }
    let text: String = chars[start..i].iter().collect();
    if let Ok(n) = text.parse::<i64>() {
        return Ok((Scalar::Int(n), i));
    }
    text.parse::<f64>()
        .map(|f| (Scalar::Float(f), i))
        .map_err(|_| ExprError::Syntax(format!("invalid number '{text}'")))
}

// ── Syntax tree ──────────────────────────────────────────────────────

#[derive(Debug)]
enum Expr {
    Literal(Scalar),
    Name(String),
    IfElse {
        body: Box<Expr>,
        test: Box<Expr>,
        orelse: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare {
        left: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
}

impl Expr {
    fn eval(&self, scope: &Scope<'_>) -> Result<Scalar, ExprError> {
        match self {
            Expr::Literal(s) => Ok(s.clone()),
            Expr::Name(name) => scope.lookup(name),
            Expr::IfElse { body, test, orelse } => {
                if test.eval(scope)?.truthy() {
                    body.eval(scope)
                } else {
                    orelse.eval(scope)
                }
            }
            // `or` yields the first truthy operand, else the last one.
            Expr::Or(operands) => {
                let mut last = Scalar::Null;
                for operand in operands {
                    last = operand.eval(scope)?;
                    if last.truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            // `and` yields the first falsy operand, else the last one.
            Expr::And(operands) => {
                let mut last = Scalar::Bool(true);
                for operand in operands {
                    last = operand.eval(scope)?;
                    if !last.truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Compare { left, rest } => {
                let mut lhs = left.eval(scope)?;
                for (op, right) in rest {
                    let rhs = right.eval(scope)?;
                    if !lhs.compare(*op, &rhs)? {
                        return Ok(Scalar::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Scalar::Bool(true))
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let body = self.disjunction()?;
        if !self.eat(&Token::If) {
            return Ok(body);
        }
        let test = self.disjunction()?;
        if !self.eat(&Token::Else) {
            return Err(ExprError::Syntax("expected 'else'".to_string()));
        }
        let orelse = self.conditional()?;
        Ok(Expr::IfElse {
            body: Box::new(body),
            test: Box::new(test),
            orelse: Box::new(orelse),
        })
    }

    fn disjunction(&mut self) -> Result<Expr, ExprError> {
        let mut operands = vec![self.conjunction()?];
        while self.eat(&Token::Or) {
            operands.push(self.conjunction()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Or(operands)
        })
    }

    fn conjunction(&mut self) -> Result<Expr, ExprError> {
        let mut operands = vec![self.comparison()?];
        while self.eat(&Token::And) {
            operands.push(self.comparison()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::And(operands)
        })
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.primary()?;
        let mut rest = Vec::new();
        while let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            rest.push((op, self.primary()?));
        }
        Ok(if rest.is_empty() {
            left
        } else {
            Expr::Compare {
                left: Box::new(left),
                rest,
            }
        })
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ExprError::Syntax("unexpected end of expression".to_string()))?;
        self.pos += 1;
        match tok {
            Token::Name(name) => Ok(Expr::Name(name)),
            Token::Literal(s) => Ok(Expr::Literal(s)),
            Token::LParen => {
                let inner = self.conditional()?;
                if !self.eat(&Token::RParen) {
                    return Err(ExprError::Syntax("expected ')'".to_string()));
                }
                Ok(inner)
            }
            other => Err(ExprError::Syntax(format!("unexpected token {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Map<String, Value> {
        json!({
            "env": "production",
            "replicas": 3,
            "ratio": 0.5,
            "debug": false,
            "owner": null,
            "image": {"tag": "v1"}
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn eval(expr: &str) -> Result<Value, ExprError> {
        evaluate(expr, &vars())
    }

    #[test]
    fn simple_conditional_picks_branch() {
        assert_eq!(
            eval(r#""prod" if env == "production" else "dev""#).unwrap(),
            json!("prod")
        );
        assert_eq!(
            eval(r#"'prod' if env != 'production' else 'dev'"#).unwrap(),
            json!("dev")
        );
    }

    #[test]
    fn numeric_comparisons_mix_int_and_float() {
        assert_eq!(eval("1 if replicas > 2.5 else 0").unwrap(), json!(1));
        assert_eq!(eval("1 if ratio <= 0.5 else 0").unwrap(), json!(1));
        assert_eq!(eval("1 if replicas == 3.0 else 0").unwrap(), json!(1));
    }

    #[test]
    fn chained_comparison() {
        assert_eq!(eval("True if 1 < replicas < 5 else False").unwrap(), json!(true));
        assert_eq!(eval("True if 1 < replicas < 2 else False").unwrap(), json!(false));
    }

    #[test]
    fn boolean_operators_short_circuit() {
        assert_eq!(
            eval(r#""a" if debug or replicas > 1 else "b""#).unwrap(),
            json!("a")
        );
        assert_eq!(
            eval(r#""a" if debug and undefined_name else "b""#).unwrap(),
            json!("b")
        );
    }

    #[test]
    fn nested_conditionals_and_parentheses() {
        let expr = r#""big" if replicas > 10 else ("mid" if replicas > 2 else "small")"#;
        assert_eq!(eval(expr).unwrap(), json!("mid"));
        let expr = r#""big" if replicas > 10 else "mid" if replicas > 2 else "small""#;
        assert_eq!(eval(expr).unwrap(), json!("mid"));
    }

    #[test]
    fn none_and_lowercase_literals() {
        assert_eq!(eval("1 if owner == None else 2").unwrap(), json!(1));
        assert_eq!(eval("1 if debug == false else 2").unwrap(), json!(1));
        assert_eq!(eval("null if debug else -4").unwrap(), json!(-4));
    }

    #[test]
    fn undefined_name_is_reported() {
        assert_eq!(
            eval("1 if missing == 2 else 0").unwrap_err(),
            ExprError::UndefinedVariable("missing".to_string())
        );
    }

    #[test]
    fn structured_variables_are_not_visible() {
        assert_eq!(
            eval("1 if image else 0").unwrap_err(),
            ExprError::UndefinedVariable("image".to_string())
        );
    }

    #[test]
    fn ordering_mismatched_types_is_reported() {
        let err = eval(r#"1 if env > 3 else 0"#).unwrap_err();
        assert!(matches!(err, ExprError::Incomparable { op: CmpOp::Gt, .. }));
        assert_eq!(err.to_string(), "cannot compare str > int");
    }

    #[test]
    fn unsupported_syntax_is_a_syntax_error() {
        assert!(matches!(eval("1 if not debug else 0"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("1 if replicas + 1 else 0"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("f(x) if a else b"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("1 if replicas else"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("'open if a else b"), Err(ExprError::Syntax(_))));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            eval("1 if missing == 2 else 0").unwrap_err().to_string(),
            "variable 'missing' is not defined"
        );
        assert_eq!(
            eval("1 if replicas else").unwrap_err().to_string(),
            "syntax error: unexpected end of expression"
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            eval(r#"'it\'s' if True else 'no'"#).unwrap(),
            json!("it's")
        );
    }
}
