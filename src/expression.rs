// src/expression.rs
//! Condition expressions: a small, Python-compatible grammar of boolean,
//! comparison and membership operations.
//!
//! ```text
//! test       := or_test ['if' or_test 'else' test]
//! or_test    := and_test ('or' and_test)*
//! and_test   := not_test ('and' not_test)*
//! not_test   := 'not' not_test | comparison
//! comparison := sum (comp_op sum)*
//! comp_op    := '==' | '!=' | '<' | '<=' | '>' | '>=' | 'in' | 'not' 'in' | 'is' ['not']
//! sum        := unary (('+' | '-') unary)*
//! unary      := '-' unary | postfix
//! postfix    := atom ('.' NAME | '[' test ']' | '(' [args] ')')*
//! atom       := NAME | NUMBER | STRING | 'True' | 'False' | 'None'
//!             | '(' [test (',' test)* [',']] ')' | '[' [test (',' test)* [',']] ']'
//! ```
use crate::comparison::{cmp_values, contains, identical, truthy, type_name, values_equal};
use crate::context::Context;
use crate::errors::{EvalError, Result};
use crate::functions::Registry;
use crate::parser::{is_ident_start, Parser};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ENode {
    Literal(Value),
    Name(String),
    Sequence(Vec<ENode>),
    Not(Box<ENode>),
    Neg(Box<ENode>),
    And(Box<ENode>, Box<ENode>),
    Or(Box<ENode>, Box<ENode>),
    IfElse {
        cond: Box<ENode>,
        then: Box<ENode>,
        otherwise: Box<ENode>,
    },
    /// `a < b <= c` is `a < b and b <= c`, with `b` evaluated once.
    Compare {
        first: Box<ENode>,
        rest: Vec<(CmpOp, ENode)>,
    },
    Binary {
        op: BinOp,
        left: Box<ENode>,
        right: Box<ENode>,
    },
    Attribute {
        target: Box<ENode>,
        name: String,
    },
    Subscript {
        target: Box<ENode>,
        index: Box<ENode>,
    },
    Call {
        func: Box<ENode>,
        args: Vec<ENode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
}

const RESERVED: &[&str] = &["and", "or", "not", "in", "is", "if", "else"];

pub fn parse_expr(input: &str) -> Result<ENode> {
    let mut p = EParser::new(input);
    p.parser.skip_ws();
    if p.parser.eof() {
        return Err(p.parser.error("unexpected end of expression"));
    }
    let node = p.parse_test()?;
    p.parser.skip_ws();
    if !p.parser.eof() {
        return Err(p.parser.error("invalid syntax"));
    }
    Ok(node)
}

struct EParser<'a> {
    parser: Parser<'a>,
}

impl<'a> EParser<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            parser: Parser::new(s),
        }
    }

    fn keyword(&mut self, kw: &str) -> bool {
        self.parser.skip_ws();
        self.parser.consume_keyword(kw)
    }

    fn parse_test(&mut self) -> Result<ENode> {
        let value = self.parse_or()?;
        if self.keyword("if") {
            let cond = self.parse_or()?;
            if !self.keyword("else") {
                return Err(self.parser.error("expected 'else'"));
            }
            let otherwise = self.parse_test()?;
            return Ok(ENode::IfElse {
                cond: Box::new(cond),
                then: Box::new(value),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(value)
    }

    fn parse_or(&mut self) -> Result<ENode> {
        let mut left = self.parse_and()?;
        while self.keyword("or") {
            let right = self.parse_and()?;
            left = ENode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ENode> {
        let mut left = self.parse_not()?;
        while self.keyword("and") {
            let right = self.parse_not()?;
            left = ENode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<ENode> {
        if self.keyword("not") {
            let inner = self.parse_not()?;
            return Ok(ENode::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_cmp_op(&mut self) -> Result<Option<CmpOp>> {
        self.parser.skip_ws();
        let op = if self.parser.consume_str("==") {
            CmpOp::Eq
        } else if self.parser.consume_str("!=") {
            CmpOp::Ne
        } else if self.parser.consume_str("<=") {
            CmpOp::Le
        } else if self.parser.consume_str(">=") {
            CmpOp::Ge
        } else if self.parser.consume_char('<') {
            CmpOp::Lt
        } else if self.parser.consume_char('>') {
            CmpOp::Gt
        } else if self.parser.consume_keyword("in") {
            CmpOp::In
        } else if self.parser.consume_keyword("is") {
            if self.keyword("not") {
                CmpOp::IsNot
            } else {
                CmpOp::Is
            }
        } else if self.parser.consume_keyword("not") {
            if !self.keyword("in") {
                return Err(self.parser.error("expected 'in' after 'not'"));
            }
            CmpOp::NotIn
        } else {
            return Ok(None);
        };
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> Result<ENode> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();
        while let Some(op) = self.parse_cmp_op()? {
            rest.push((op, self.parse_sum()?));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        Ok(ENode::Compare {
            first: Box::new(first),
            rest,
        })
    }

    fn parse_sum(&mut self) -> Result<ENode> {
        let mut left = self.parse_unary()?;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_char('+') {
                BinOp::Add
            } else if self.parser.consume_char('-') {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.parse_unary()?;
            left = ENode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ENode> {
        self.parser.skip_ws();
        if self.parser.consume_char('-') {
            let inner = self.parse_unary()?;
            return Ok(ENode::Neg(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ENode> {
        let mut node = self.parse_atom()?;
        loop {
            self.parser.skip_ws();
            if self.parser.consume_char('.') {
                self.parser.skip_ws();
                let name = self.parser.parse_identifier()?.to_string();
                node = ENode::Attribute {
                    target: Box::new(node),
                    name,
                };
            } else if self.parser.consume_char('[') {
                let index = self.parse_test()?;
                self.parser.expect(']')?;
                node = ENode::Subscript {
                    target: Box::new(node),
                    index: Box::new(index),
                };
            } else if self.parser.consume_char('(') {
                let (args, _) = self.parse_items(')')?;
                node = ENode::Call {
                    func: Box::new(node),
                    args,
                };
            } else {
                return Ok(node);
            }
        }
    }

    /// Comma-separated tests up to `close`; also reports a trailing comma.
    fn parse_items(&mut self, close: char) -> Result<(Vec<ENode>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.parser.skip_ws();
            if self.parser.consume_char(close) {
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_test()?);
            self.parser.skip_ws();
            if self.parser.consume_char(',') {
                trailing_comma = true;
                continue;
            }
            trailing_comma = false;
            self.parser.expect(close)?;
            return Ok((items, trailing_comma));
        }
    }

    fn parse_atom(&mut self) -> Result<ENode> {
        self.parser.skip_ws();
        match self.parser.peek_char() {
            None => Err(self.parser.error("unexpected end of expression")),
            Some('\'') | Some('"') => {
                let mut s = self.parser.parse_quoted_string()?;
                // adjacent literals concatenate
                loop {
                    self.parser.skip_ws();
                    match self.parser.peek_char() {
                        Some('\'') | Some('"') => s.push_str(&self.parser.parse_quoted_string()?),
                        _ => break,
                    }
                }
                Ok(ENode::Literal(Value::String(s)))
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                Ok(ENode::Literal(self.parser.parse_number_literal()?))
            }
            Some('(') => {
                self.parser.consume_char('(');
                let (mut items, trailing_comma) = self.parse_items(')')?;
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(ENode::Sequence(items))
                }
            }
            Some('[') => {
                self.parser.consume_char('[');
                let (items, _) = self.parse_items(']')?;
                Ok(ENode::Sequence(items))
            }
            Some(c) if is_ident_start(c) => {
                let start = self.parser.pos();
                let name = self.parser.parse_identifier()?;
                match name {
                    "True" => Ok(ENode::Literal(Value::Bool(true))),
                    "False" => Ok(ENode::Literal(Value::Bool(false))),
                    "None" => Ok(ENode::Literal(Value::Null)),
                    kw if RESERVED.contains(&kw) => Err(EvalError::Syntax {
                        msg: format!("unexpected keyword '{kw}'"),
                        offset: start,
                    }),
                    _ => Ok(ENode::Name(name.to_string())),
                }
            }
            Some(c) => Err(self.parser.error(format!("unexpected character '{c}'"))),
        }
    }
}

/// Evaluate AST node → Value
pub fn eval_ast(node: &ENode, ctx: &Context, registry: &Registry) -> Result<Value> {
    match node {
        ENode::Literal(v) => Ok(v.clone()),
        ENode::Name(name) => ctx.lookup(name).cloned(),
        ENode::Sequence(items) => items
            .iter()
            .map(|item| eval_ast(item, ctx, registry))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        ENode::Not(inner) => Ok(Value::Bool(!truthy(&eval_ast(inner, ctx, registry)?))),
        ENode::Neg(inner) => negate(eval_ast(inner, ctx, registry)?),
        ENode::And(l, r) => {
            let left = eval_ast(l, ctx, registry)?;
            if truthy(&left) {
                eval_ast(r, ctx, registry)
            } else {
                Ok(left)
            }
        }
        ENode::Or(l, r) => {
            let left = eval_ast(l, ctx, registry)?;
            if truthy(&left) {
                Ok(left)
            } else {
                eval_ast(r, ctx, registry)
            }
        }
        ENode::IfElse {
            cond,
            then,
            otherwise,
        } => {
            if truthy(&eval_ast(cond, ctx, registry)?) {
                eval_ast(then, ctx, registry)
            } else {
                eval_ast(otherwise, ctx, registry)
            }
        }
        ENode::Compare { first, rest } => {
            let mut left = eval_ast(first, ctx, registry)?;
            for (op, right) in rest {
                let right = eval_ast(right, ctx, registry)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        ENode::Binary { op, left, right } => {
            let l = eval_ast(left, ctx, registry)?;
            let r = eval_ast(right, ctx, registry)?;
            arithmetic(*op, l, r)
        }
        ENode::Attribute { target, name } => {
            let value = eval_ast(target, ctx, registry)?;
            attribute(&value, name)
        }
        ENode::Subscript { target, index } => {
            let value = eval_ast(target, ctx, registry)?;
            let index = eval_ast(index, ctx, registry)?;
            subscript(&value, &index)
        }
        ENode::Call { func, args } => call(func, args, ctx, registry),
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool> {
    let sym = op.symbol();
    match op {
        CmpOp::Eq => Ok(values_equal(a, b)),
        CmpOp::Ne => Ok(!values_equal(a, b)),
        CmpOp::Lt => cmp_values(a, b, sym, |o| o.is_lt()),
        CmpOp::Le => cmp_values(a, b, sym, |o| o.is_le()),
        CmpOp::Gt => cmp_values(a, b, sym, |o| o.is_gt()),
        CmpOp::Ge => cmp_values(a, b, sym, |o| o.is_ge()),
        CmpOp::In => contains(b, a),
        CmpOp::NotIn => contains(b, a).map(|found| !found),
        CmpOp::Is => Ok(identical(a, b)),
        CmpOp::IsNot => Ok(!identical(a, b)),
    }
}

fn int_of(v: &Value) -> Option<i64> {
    match v {
        Value::Bool(b) => Some(*b as i64),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Number(_))
}

fn negate(v: Value) -> Result<Value> {
    if let Some(i) = int_of(&v) {
        return i
            .checked_neg()
            .map(Value::from)
            .ok_or_else(|| EvalError::Overflow("integer negation overflow".into()));
    }
    match v.as_f64() {
        Some(f) => Ok(Value::from(-f)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary -: '{}'",
            type_name(&v)
        ))),
    }
}

fn arithmetic(op: BinOp, l: Value, r: Value) -> Result<Value> {
    let sym = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
    };
    if is_numeric(&l) && is_numeric(&r) {
        if let (Some(a), Some(b)) = (int_of(&l), int_of(&r)) {
            let out = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
            };
            return out
                .map(Value::from)
                .ok_or_else(|| EvalError::Overflow("integer overflow".into()));
        }
        let a = int_of(&l).map(|i| i as f64).or_else(|| l.as_f64()).unwrap_or(0.0);
        let b = int_of(&r).map(|i| i as f64).or_else(|| r.as_f64()).unwrap_or(0.0);
        let out = match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
        };
        if !out.is_finite() {
            return Err(EvalError::Overflow("float result out of range".into()));
        }
        return Ok(Value::from(out));
    }
    match (op, l, r) {
        (BinOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (BinOp::Add, Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (_, l, r) => Err(EvalError::Type(format!(
            "unsupported operand type(s) for {sym}: '{}' and '{}'",
            type_name(&l),
            type_name(&r)
        ))),
    }
}

fn attribute(value: &Value, name: &str) -> Result<Value> {
    match value {
        Value::Object(m) => m.get(name).cloned().ok_or_else(|| {
            EvalError::Attribute(format!("'dict' object has no attribute '{name}'"))
        }),
        other => Err(EvalError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            type_name(other)
        ))),
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let idx = if i < 0 { len as i64 + i } else { i };
    (0..len as i64).contains(&idx).then_some(idx as usize)
}

fn subscript(value: &Value, index: &Value) -> Result<Value> {
    match value {
        Value::Array(a) => {
            let i = int_of(index).ok_or_else(|| {
                EvalError::Type(format!(
                    "list indices must be integers, not {}",
                    type_name(index)
                ))
            })?;
            resolve_index(i, a.len())
                .map(|idx| a[idx].clone())
                .ok_or_else(|| EvalError::Index("list index out of range".into()))
        }
        Value::String(s) => {
            let i = int_of(index).ok_or_else(|| {
                EvalError::Type(format!(
                    "string indices must be integers, not {}",
                    type_name(index)
                ))
            })?;
            let chars: Vec<char> = s.chars().collect();
            resolve_index(i, chars.len())
                .map(|idx| Value::String(chars[idx].to_string()))
                .ok_or_else(|| EvalError::Index("string index out of range".into()))
        }
        Value::Object(m) => index
            .as_str()
            .and_then(|k| m.get(k))
            .cloned()
            .ok_or_else(|| EvalError::Key(crate::comparison::repr(index))),
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            type_name(other)
        ))),
    }
}

fn call(func: &ENode, args: &[ENode], ctx: &Context, registry: &Registry) -> Result<Value> {
    let mut values = Vec::with_capacity(args.len() + 1);
    let name = match func {
        ENode::Name(name) => name,
        ENode::Attribute { target, name } => {
            let receiver = eval_ast(target, ctx, registry)?;
            if registry.get(name).is_none() {
                return Err(match attribute(&receiver, name) {
                    Ok(v) => EvalError::Type(format!("'{}' object is not callable", type_name(&v))),
                    Err(e) => e,
                });
            }
            values.push(receiver);
            name
        }
        other => {
            let v = eval_ast(other, ctx, registry)?;
            return Err(EvalError::Type(format!(
                "'{}' object is not callable",
                type_name(&v)
            )));
        }
    };
    for arg in args {
        values.push(eval_ast(arg, ctx, registry)?);
    }
    match registry.call(name, &values) {
        Some(result) => result,
        None => match ctx.get(name) {
            Some(v) => Err(EvalError::Type(format!(
                "'{}' object is not callable",
                type_name(v)
            ))),
            None => Err(EvalError::Name(name.clone())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> Context {
        Context::new()
            .with_var("client", json!("Company A"))
            .with_var("builder", json!("html"))
            .with_var("release", json!(3))
            .with_var("tags", json!(["beta", "internal"]))
            .with_var("project", json!({"name": "Widget", "modules": ["core", "net"]}))
    }

    fn eval(expr: &str) -> Result<Value> {
        let ast = parse_expr(expr)?;
        eval_ast(&ast, &ctx(), &Registry::with_builtins())
    }

    #[test]
    fn membership_in_tuple() {
        assert_eq!(eval("client in ('Company A', 'Company B')").unwrap(), json!(true));
        assert_eq!(eval("client not in ('Company A',)").unwrap(), json!(false));
        // ('Company B') is a parenthesised string, so this is a substring test
        assert_eq!(eval("client not in ('Company B')").unwrap(), json!(true));
    }

    #[test]
    fn boolean_operators_return_operands() {
        assert_eq!(eval("release and builder").unwrap(), json!("html"));
        assert_eq!(eval("0 or None").unwrap(), json!(null));
        assert_eq!(eval("not tags").unwrap(), json!(false));
        // right side is never evaluated
        assert_eq!(eval("False and undefined_name").unwrap(), json!(false));
    }

    #[test]
    fn chained_comparison() {
        assert_eq!(eval("1 < release <= 3").unwrap(), json!(true));
        assert_eq!(eval("1 < release < 3").unwrap(), json!(false));
        assert_eq!(eval("release == 3.0 != 4").unwrap(), json!(true));
    }

    #[test]
    fn is_and_conditional_expression() {
        assert_eq!(eval("client is not None").unwrap(), json!(true));
        assert_eq!(eval("'a' if builder == 'latex' else 'b'").unwrap(), json!("b"));
    }

    #[test]
    fn attributes_subscripts_and_calls() {
        assert_eq!(eval("project.name").unwrap(), json!("Widget"));
        assert_eq!(eval("'net' in project['modules']").unwrap(), json!(true));
        assert_eq!(eval("tags[-1]").unwrap(), json!("internal"));
        assert_eq!(eval("client.lower().startswith('company')").unwrap(), json!(true));
        assert_eq!(eval("len(tags) + 1").unwrap(), json!(3));
        assert_eq!(eval("-release - 1").unwrap(), json!(-4));
        assert_eq!(eval("'v' + str(release)").unwrap(), json!("v3"));
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(eval("clien == 'A'").unwrap_err(), EvalError::Name("clien".into()));
        assert_eq!(
            eval("release < 'x'").unwrap_err().to_string(),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
        assert_eq!(
            eval("project.owner").unwrap_err().to_string(),
            "AttributeError: 'dict' object has no attribute 'owner'"
        );
        assert_eq!(eval("tags[5]").unwrap_err().kind(), "IndexError");
        assert_eq!(eval("project['x']").unwrap_err().to_string(), "KeyError: 'x'");
        assert_eq!(eval("client()").unwrap_err().kind(), "TypeError");
        assert_eq!(eval("nope(1)").unwrap_err(), EvalError::Name("nope".into()));
        assert_eq!(
            eval("lower('a', 'b')").unwrap_err().to_string(),
            "TypeError: lower() takes 1 argument(s) (2 given)"
        );
    }

    #[test]
    fn float_overflow_is_an_overflow_error() {
        assert_eq!(eval("1e400 > 0").unwrap_err().kind(), "OverflowError");
        assert_eq!(
            eval("1e308 + 1e308").unwrap_err().to_string(),
            "OverflowError: float result out of range"
        );
        assert_eq!(eval("1e308 - 1").unwrap(), json!(1e308));
    }

    #[test]
    fn syntax_errors() {
        for bad in ["", "client in", "client ==", "(a", "a b", "not", "'open", "a not b", "in"] {
            assert_eq!(
                parse_expr(bad).unwrap_err().kind(),
                "SyntaxError",
                "expression {bad:?} should not parse"
            );
        }
    }

    #[test]
    fn parses_multiline_expressions() {
        let ast = parse_expr("client in (\n  'A',\n  'B'\n)").unwrap();
        assert_eq!(
            ast,
            ENode::Compare {
                first: Box::new(ENode::Name("client".into())),
                rest: vec![(
                    CmpOp::In,
                    ENode::Sequence(vec![
                        ENode::Literal(json!("A")),
                        ENode::Literal(json!("B"))
                    ])
                )],
            }
        );
    }
}
