// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Syntax tree for scriptlets.
//!
//! Identifier-like tokens carry byte spans into the original source so the
//! rewriter can substitute them without re-serializing the scriptlet.

use std::sync::Arc;

/// Byte range into the scriptlet source (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// A name token with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    /// The identifier text.
    pub name: String,
    /// Where it appears in the source.
    pub span: Span,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal.
    Number(f64),
    /// String literal, unescaped.
    Str(String),
    /// `true` / `false`.
    Bool(bool),
    /// `null`.
    Null,
    /// `undefined`.
    Undefined,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `+`
    Pos,
    /// `typeof`
    TypeOf,
}

/// Infix operators, including the short-circuiting ones.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Nullish,
    Or,
    And,
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
}

/// Object literal key.
#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    /// Bare name key; renameable.
    Ident(Ident),
    /// Quoted or numeric key.
    Literal(String),
}

impl PropKey {
    /// The key as a string.
    pub fn as_str(&self) -> &str {
        match self {
            PropKey::Ident(id) => &id.name,
            PropKey::Literal(s) => s,
        }
    }
}

/// One `key: value` entry of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// The key.
    pub key: PropKey,
    /// The value expression.
    pub value: Expr,
    /// `{ name }` form, where the key token is also the value identifier.
    pub shorthand: bool,
}

/// Arrow function body.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    /// `x => expr`
    Expr(Expr),
    /// `x => { ... }`
    Block(Vec<Stmt>),
}

/// Arrow function.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    /// Parameter names.
    pub params: Vec<Ident>,
    /// Function body.
    pub body: ArrowBody,
}

/// Expressions.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(Ident),
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Member {
        object: Box<Expr>,
        property: Ident,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assign {
        target: Ident,
        op: AssignOp,
        value: Box<Expr>,
    },
    Arrow(Arc<Arrow>),
}

/// Statements.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: Ident,
        init: Option<Expr>,
    },
    Expr(Expr),
    If {
        test: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Return(Option<Expr>),
    Block(Vec<Stmt>),
    Empty,
}

/// A parsed scriptlet: a single expression or a statement list.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Expression form; its value is the result.
    Expr(Expr),
    /// Statement form; the result is the value of the first executed `return`.
    Block(Vec<Stmt>),
}
