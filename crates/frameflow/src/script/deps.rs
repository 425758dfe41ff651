// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Static extraction of free-variable access chains.
//!
//! `otherNode.props.value` yields `["otherNode", "props", "value"]`. A chain
//! continues through `.name` and literal `[0]` / `['key']` segments and stops
//! at the first computed index. For method calls the method name itself is
//! not part of the chain. Names bound by `let` or arrow parameters are not free.

use crate::script::ast::*;
use crate::script::value::format_number;
use std::collections::HashSet;

/// A member-access chain rooted at a free identifier.
pub type DepPath = Vec<String>;

/// Collects the distinct free access chains of a script, in first-use order.
pub fn collect_dependencies(script: &Script) -> Vec<DepPath> {
    let mut walker = Walker {
        scopes: vec![HashSet::new()],
        paths: Vec::new(),
    };
    match script {
        Script::Expr(expr) => walker.expr(expr),
        Script::Block(stmts) => walker.stmts(stmts),
    }
    walker.paths
}

struct Walker {
    scopes: Vec<HashSet<String>>,
    paths: Vec<DepPath>,
}

impl Walker {
    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn push(&mut self, path: DepPath) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
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
                self.bind(&name.name);
            }
            Stmt::Expr(expr) => self.expr(expr),
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
            Stmt::Return(Some(expr)) => self.expr(expr),
            Stmt::Block(stmts) => self.stmts(stmts),
            Stmt::Return(None) | Stmt::Empty => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Ident(id) => {
                if !self.is_bound(&id.name) {
                    self.push(vec![id.name.clone()]);
                }
            }
            Expr::Member { object, .. } | Expr::Index { object, .. } => {
                if let Some(path) = chain(expr) {
                    if !self.is_bound(&path[0]) {
                        self.push(path);
                    }
                    return;
                }
                self.expr(object);
                if let Expr::Index { index, .. } = expr {
                    self.expr(index);
                }
            }
            Expr::Call { callee, args } => {
                match callee.as_ref() {
                    Expr::Member { object, .. } => self.expr(object),
                    other => self.expr(other),
                }
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Array(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            Expr::Object(props) => {
                for prop in props {
                    self.expr(&prop.value);
                }
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
            Expr::Assign { value, .. } => self.expr(value),
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

/// Returns the full chain if `expr` is an identifier followed only by
/// static member segments.
fn chain(expr: &Expr) -> Option<DepPath> {
    match expr {
        Expr::Ident(id) => Some(vec![id.name.clone()]),
        Expr::Member {
            object, property, ..
        } => {
            let mut path = chain(object)?;
            path.push(property.name.clone());
            Some(path)
        }
        Expr::Index { object, index } => {
            let segment = match index.as_ref() {
                Expr::Literal(Literal::Str(s)) => s.clone(),
                Expr::Literal(Literal::Number(n)) => format_number(*n),
                _ => return None,
            };
            let mut path = chain(object)?;
            path.push(segment);
            Some(path)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_script;

    fn deps(source: &str) -> Vec<String> {
        collect_dependencies(&parse_script(source).unwrap())
            .into_iter()
            .map(|path| path.join("."))
            .collect()
    }

    #[test]
    fn member_chains() {
        assert_eq!(
            deps("otherNode.props.value + 1"),
            vec!["otherNode.props.value"]
        );
        assert_eq!(deps("a + a"), vec!["a"]);
    }

    #[test]
    fn literal_indexes_extend_chains() {
        assert_eq!(
            deps("list1.props.value[2]['name']"),
            vec!["list1.props.value.2.name"]
        );
    }

    #[test]
    fn computed_indexes_end_chains() {
        assert_eq!(
            deps("n1.props.items[i].label"),
            vec!["n1.props.items", "i"]
        );
    }

    #[test]
    fn method_names_are_not_part_of_chains() {
        assert_eq!(
            deps("n1.props.items.map(x => x.id * factor)"),
            vec!["n1.props.items", "factor"]
        );
    }

    #[test]
    fn locals_are_not_free() {
        assert_eq!(
            deps("let total = base; if (total > 1) { return total + extra; } return 0;"),
            vec!["base", "extra"]
        );
    }

    #[test]
    fn object_values_but_not_keys() {
        assert_eq!(deps("{ n1: 1, value: v, w }"), vec!["v", "w"]);
    }
}
