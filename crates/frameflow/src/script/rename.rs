// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Identifier-safe rewriting of scriptlet source.
//!
//! The rewriter never re-serializes a syntax tree. It collects the byte spans
//! of matching tokens and splices replacements into the original text, so
//! whitespace, comments and parenthesization survive unchanged.

use crate::error::Result;
use crate::script::ast::*;
use crate::script::parser::parse_script;
use std::collections::{HashMap, HashSet};

/// Rewrites `source`, replacing every free identifier, member property name
/// and object-literal key found in `renames`.
///
/// Locals (arrow parameters and `let` names) that shadow a renamed id are
/// left alone, as are string literal contents.
pub fn rename_identifiers(source: &str, renames: &HashMap<String, String>) -> Result<String> {
    if renames.is_empty() || !renames.keys().any(|old| source.contains(old.as_str())) {
        return Ok(source.to_string());
    }

    let script = parse_script(source)?;
    let mut collector = Collector {
        renames,
        scopes: vec![HashSet::new()],
        edits: Vec::new(),
    };
    match &script {
        Script::Expr(expr) => collector.expr(expr),
        Script::Block(stmts) => collector.stmts(stmts),
    }

    let mut edits = collector.edits;
    edits.sort_by_key(|(span, _)| span.start);
    edits.dedup_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&source[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

struct Collector<'a> {
    renames: &'a HashMap<String, String>,
    scopes: Vec<HashSet<String>>,
    edits: Vec<(Span, &'a str)>,
}

impl<'a> Collector<'a> {
    fn token(&mut self, ident: &Ident) {
        let renames = self.renames;
        if let Some(new) = renames.get(&ident.name) {
            self.edits.push((ident.span, new.as_str()));
        }
    }

    fn free(&mut self, ident: &Ident) {
        if !self.scopes.iter().any(|scope| scope.contains(&ident.name)) {
            self.token(ident);
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        self.scopes.push(HashSet::new());
        for stmt in stmts {
            self.stmt(stmt);
        }
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, init } => {
                if let Some(init) = init {
                    self.expr(init);
                }
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.name.clone());
                }
            }
            Stmt::Expr(expr) | Stmt::Return(Some(expr)) => self.expr(expr),
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                self.expr(test);
                self.stmt(then);
                if let Some(otherwise) = otherwise {
                    self.stmt(otherwise);
                }
            }
            Stmt::Block(stmts) => self.stmts(stmts),
            Stmt::Return(None) | Stmt::Empty => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Ident(id) => self.free(id),
            Expr::Array(items) => items.iter().for_each(|e| self.expr(e)),
            Expr::Object(props) => {
                for prop in props {
                    match (&prop.key, prop.shorthand) {
                        // One token serves as key and value; rename it only when free.
                        (_, true) => self.expr(&prop.value),
                        (PropKey::Ident(key), false) => {
                            self.token(key);
                            self.expr(&prop.value);
                        }
                        (PropKey::Literal(_), false) => self.expr(&prop.value),
                    }
                }
            }
            Expr::Member {
                object, property, ..
            } => {
                self.expr(object);
                self.token(property);
            }
            Expr::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Call { callee, args } => {
                self.expr(callee);
                args.iter().for_each(|e| self.expr(e));
            }
            Expr::Unary { expr, .. } => self.expr(expr),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                self.expr(test);
                self.expr(then);
                self.expr(otherwise);
            }
            Expr::Assign { target, value, .. } => {
                self.free(target);
                self.expr(value);
            }
            Expr::Arrow(arrow) => {
                self.scopes
                    .push(arrow.params.iter().map(|p| p.name.clone()).collect());
                match &arrow.body {
                    ArrowBody::Expr(body) => self.expr(body),
                    ArrowBody::Block(stmts) => self.stmts(stmts),
                }
                self.scopes.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn renames_free_identifiers_only() {
        let renames = map(&[("n1", "n1_7")]);
        let out = rename_identifiers("n1.props.value + 'n1' + (n1 => n1)(2)", &renames).unwrap();
        assert_eq!(out, "n1_7.props.value + 'n1' + (n1 => n1)(2)");
    }

    #[test]
    fn renames_member_names_and_object_keys() {
        let renames = map(&[("card", "card_3")]);
        let out = rename_identifiers("{ card: self.props.card, other: 1 }", &renames).unwrap();
        assert_eq!(out, "{ card_3: self.props.card_3, other: 1 }");
    }

    #[test]
    fn shorthand_properties_are_renamed_once() {
        let renames = map(&[("a", "b")]);
        assert_eq!(rename_identifiers("{ a }", &renames).unwrap(), "{ b }");
    }

    #[test]
    fn preserves_formatting_and_comments() {
        let renames = map(&[("x", "y")]);
        let source = "let v = x.props.n /* keep */ *  (2+x.props.n);\nreturn v";
        assert_eq!(
            rename_identifiers(source, &renames).unwrap(),
            "let v = y.props.n /* keep */ *  (2+y.props.n);\nreturn v"
        );
    }

    #[test]
    fn round_trip_restores_source() {
        let forward = map(&[("main", "main_1")]);
        let back = map(&[("main_1", "main")]);
        let source = "main.props.items.filter(i => i.ok).length > 0 ? main.styles.color : 'red'";
        let renamed = rename_identifiers(source, &forward).unwrap();
        assert_ne!(renamed, source);
        assert_eq!(rename_identifiers(&renamed, &back).unwrap(), source);
    }

    #[test]
    fn unparsable_sources_are_errors() {
        let renames = map(&[("a", "b")]);
        assert!(rename_identifiers("a +", &renames).is_err());
    }
}
