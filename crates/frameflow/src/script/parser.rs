// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pest-based scriptlet parser.
//!
//! [`parse_script`] first tries the single-expression form and falls back to
//! a statement list. Operator precedence is handled by a Pratt parser over
//! the flat `binary` rule.

use crate::error::{FrameError, Result, SourceContext};
use crate::script::ast::*;
use lazy_static::lazy_static;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::Arc;

#[derive(Parser)]
#[grammar = "script/scriptlet.pest"]
pub struct ScriptletParser;

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::nullish, Assoc::Left))
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left)
            | Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::not)
            | Op::prefix(Rule::neg)
            | Op::prefix(Rule::pos)
            | Op::prefix(Rule::typeof_op));
}

/// Parses a scriptlet into its syntax tree.
pub fn parse_script(source: &str) -> Result<Script> {
    if let Ok(mut pairs) = ScriptletParser::parse(Rule::expression_script, source) {
        let script = expect(pairs.next(), "expression script")?;
        let expr = expect(script.into_inner().next(), "expression")?;
        return Ok(Script::Expr(build_expression(expr)?));
    }

    let mut pairs = ScriptletParser::parse(Rule::statement_script, source)
        .map_err(|e| pest_error(source, e))?;
    let script = expect(pairs.next(), "statement script")?;
    Ok(Script::Block(build_statements(script.into_inner())?))
}

fn pest_error(source: &str, e: pest::error::Error<Rule>) -> FrameError {
    let (line, column) = match e.line_col {
        LineColLocation::Pos((l, c)) => (l, c),
        LineColLocation::Span((l, c), _) => (l, c),
    };
    FrameError::ParseError {
        message: e.variant.message().to_string(),
        line,
        column,
        source_context: Some(SourceContext::from_source(source, line, column)),
    }
}

fn malformed(what: &str) -> FrameError {
    FrameError::ParseError {
        message: format!("Malformed {}", what),
        line: 0,
        column: 0,
        source_context: None,
    }
}

fn expect<'i>(pair: Option<Pair<'i, Rule>>, what: &str) -> Result<Pair<'i, Rule>> {
    pair.ok_or_else(|| malformed(what))
}

fn ident(pair: &Pair<'_, Rule>) -> Ident {
    let span = pair.as_span();
    Ident {
        name: pair.as_str().to_string(),
        span: Span {
            start: span.start(),
            end: span.end(),
        },
    }
}

fn build_statements(pairs: Pairs<'_, Rule>) -> Result<Vec<Stmt>> {
    pairs
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_statement)
        .collect()
}

fn build_statement(pair: Pair<'_, Rule>) -> Result<Stmt> {
    match pair.as_rule() {
        Rule::block => Ok(Stmt::Block(build_statements(pair.into_inner())?)),
        Rule::let_stmt => {
            let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::decl_kind);
            let name = ident(&expect(inner.next(), "declaration")?);
            let init = inner.next().map(build_expression).transpose()?;
            Ok(Stmt::Let { name, init })
        }
        Rule::if_stmt => {
            let mut inner = pair
                .into_inner()
                .filter(|p| !matches!(p.as_rule(), Rule::kw_if | Rule::kw_else));
            let test = build_expression(expect(inner.next(), "if condition")?)?;
            let then = Box::new(build_statement(expect(inner.next(), "if branch")?)?);
            let otherwise = inner
                .next()
                .map(build_statement)
                .transpose()?
                .map(Box::new);
            Ok(Stmt::If {
                test,
                then,
                otherwise,
            })
        }
        Rule::return_stmt => {
            let value = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::expression)
                .map(build_expression)
                .transpose()?;
            Ok(Stmt::Return(value))
        }
        Rule::empty_stmt => Ok(Stmt::Empty),
        Rule::expr_stmt => Ok(Stmt::Expr(build_expression(expect(
            pair.into_inner().next(),
            "expression statement",
        )?)?)),
        _ => Err(malformed("statement")),
    }
}

fn build_expression(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expression => build_expression(expect(pair.into_inner().next(), "expression")?),
        Rule::assignment => {
            let mut inner = pair.into_inner();
            let target = ident(&expect(inner.next(), "assignment target")?);
            let op = match expect(inner.next(), "assignment operator")?.as_str() {
                "+=" => AssignOp::Add,
                "-=" => AssignOp::Sub,
                _ => AssignOp::Set,
            };
            let value = Box::new(build_expression(expect(inner.next(), "assigned value")?)?);
            Ok(Expr::Assign { target, op, value })
        }
        Rule::conditional => {
            let mut inner = pair.into_inner();
            let test = build_expression(expect(inner.next(), "condition")?)?;
            match (inner.next(), inner.next()) {
                (Some(then), Some(otherwise)) => Ok(Expr::Conditional {
                    test: Box::new(test),
                    then: Box::new(build_expression(then)?),
                    otherwise: Box::new(build_expression(otherwise)?),
                }),
                _ => Ok(test),
            }
        }
        Rule::binary => build_binary(pair.into_inner()),
        Rule::postfix_expr => build_postfix(pair),
        _ => build_primary(pair),
    }
}

fn build_binary(pairs: Pairs<'_, Rule>) -> Result<Expr> {
    PRATT
        .map_primary(build_expression)
        .map_prefix(|op, expr| {
            let op = match op.as_rule() {
                Rule::not => UnaryOp::Not,
                Rule::neg => UnaryOp::Neg,
                Rule::pos => UnaryOp::Pos,
                _ => UnaryOp::TypeOf,
            };
            Ok(Expr::Unary {
                op,
                expr: Box::new(expr?),
            })
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::nullish => BinaryOp::Nullish,
                Rule::or => BinaryOp::Or,
                Rule::and => BinaryOp::And,
                Rule::strict_eq => BinaryOp::StrictEq,
                Rule::strict_ne => BinaryOp::StrictNe,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            })
        })
        .parse(pairs)
}

fn build_postfix(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = build_primary(expect(inner.next(), "operand")?)?;

    for op in inner {
        expr = match op.as_rule() {
            Rule::member | Rule::optional_member => {
                let optional = op.as_rule() == Rule::optional_member;
                let name = expect(op.into_inner().next(), "member name")?;
                Expr::Member {
                    object: Box::new(expr),
                    property: ident(&name),
                    optional,
                }
            }
            Rule::index => Expr::Index {
                object: Box::new(expr),
                index: Box::new(build_expression(expect(op.into_inner().next(), "index")?)?),
            },
            Rule::call => Expr::Call {
                callee: Box::new(expr),
                args: op.into_inner().map(build_expression).collect::<Result<_>>()?,
            },
            _ => return Err(malformed("postfix operator")),
        };
    }

    Ok(expr)
}

fn build_primary(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::number => Ok(Expr::Literal(Literal::Number(parse_number(pair.as_str())?))),
        Rule::string => Ok(Expr::Literal(Literal::Str(unescape(pair.as_str())))),
        Rule::true_lit => Ok(Expr::Literal(Literal::Bool(true))),
        Rule::false_lit => Ok(Expr::Literal(Literal::Bool(false))),
        Rule::null_lit => Ok(Expr::Literal(Literal::Null)),
        Rule::undefined_lit => Ok(Expr::Literal(Literal::Undefined)),
        Rule::ident => Ok(Expr::Ident(ident(&pair))),
        Rule::paren => build_expression(expect(pair.into_inner().next(), "parenthesized expression")?),
        Rule::array => Ok(Expr::Array(
            pair.into_inner().map(build_expression).collect::<Result<_>>()?,
        )),
        Rule::object => Ok(Expr::Object(
            pair.into_inner().map(build_property).collect::<Result<_>>()?,
        )),
        Rule::arrow => {
            let mut inner = pair.into_inner();
            let params = expect(inner.next(), "arrow parameters")?
                .into_inner()
                .map(|p| ident(&p))
                .collect();
            let body = expect(inner.next(), "arrow body")?;
            let body = match body.as_rule() {
                Rule::block => ArrowBody::Block(build_statements(body.into_inner())?),
                _ => ArrowBody::Expr(build_expression(body)?),
            };
            Ok(Expr::Arrow(Arc::new(Arrow { params, body })))
        }
        _ => build_expression(pair),
    }
}

fn build_property(pair: Pair<'_, Rule>) -> Result<Property> {
    let mut inner = pair.into_inner();
    let key = expect(inner.next(), "property key")?;

    match inner.next() {
        None => {
            let name = ident(&key);
            Ok(Property {
                key: PropKey::Ident(name.clone()),
                value: Expr::Ident(name),
                shorthand: true,
            })
        }
        Some(value) => {
            let key = match key.as_rule() {
                Rule::prop_name => PropKey::Ident(ident(&key)),
                Rule::string => PropKey::Literal(unescape(key.as_str())),
                _ => PropKey::Literal(key.as_str().to_string()),
            };
            Ok(Property {
                key,
                value: build_expression(value)?,
                shorthand: false,
            })
        }
    }
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| malformed(&format!("number '{}'", text)))
}

/// Strips the quotes of a string token and resolves escapes.
fn unescape(token: &str) -> String {
    let body = if token.len() >= 2 {
        &token[1..token.len() - 1]
    } else {
        token
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        match parse_script(source).unwrap() {
            Script::Expr(e) => e,
            Script::Block(_) => panic!("expected expression form for {source}"),
        }
    }

    #[test]
    fn precedence_follows_js() {
        let e = expr("1 + 2 * 3");
        match e {
            Expr::Binary { op: BinaryOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }

        let e = expr("a || b && c");
        assert!(matches!(e, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn member_chains_and_calls() {
        let e = expr("n1.props.items.map(x => x * 2)");
        let Expr::Call { callee, args } = e else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(args[0], Expr::Arrow(_)));
        let Expr::Member { property, .. } = *callee else {
            panic!("expected member callee");
        };
        assert_eq!(property.name, "map");
    }

    #[test]
    fn identifier_spans_point_into_source() {
        let source = "  foo.bar + baz";
        let Expr::Binary { lhs, rhs, .. } = expr(source) else {
            panic!("expected binary");
        };
        let Expr::Member { object, property, .. } = *lhs else {
            panic!("expected member");
        };
        let Expr::Ident(foo) = *object else {
            panic!("expected ident");
        };
        assert_eq!(&source[foo.span.start..foo.span.end], "foo");
        assert_eq!(&source[property.span.start..property.span.end], "bar");
        let Expr::Ident(baz) = *rhs else {
            panic!("expected ident");
        };
        assert_eq!(baz.span.start, 12);
    }

    #[test]
    fn object_literals_with_shorthand() {
        let Expr::Object(props) = expr("{ a: 1, 'b c': 2, d }") else {
            panic!("expected object");
        };
        assert_eq!(props.len(), 3);
        assert_eq!(props[1].key.as_str(), "b c");
        assert!(props[2].shorthand);
    }

    #[test]
    fn statement_blocks_fall_back() {
        let script = parse_script("let x = 1; if (x > 0) { return x; } else return 0").unwrap();
        let Script::Block(stmts) = script else {
            panic!("expected block form");
        };
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Stmt::Let { .. }));
        assert!(matches!(stmts[1], Stmt::If { otherwise: Some(_), .. }));
    }

    #[test]
    fn strings_are_unescaped() {
        assert_eq!(
            expr(r"'it\'s\n'"),
            Expr::Literal(Literal::Str("it's\n".to_string()))
        );
    }

    #[test]
    fn keywords_do_not_shadow_longer_identifiers() {
        assert!(matches!(expr("letter"), Expr::Ident(_)));
        assert!(matches!(expr("typeof x"), Expr::Unary { op: UnaryOp::TypeOf, .. }));
    }

    #[test]
    fn syntax_errors_carry_location() {
        let err = parse_script("a + * 2").unwrap_err();
        match err {
            FrameError::ParseError { line, source_context, .. } => {
                assert_eq!(line, 1);
                assert!(source_context.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
