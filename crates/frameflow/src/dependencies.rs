// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Same-node evaluation order.
//!
//! Within one bucket (`props`, `styles` or `actions`) of one node, a key may
//! read another key of the same bucket either by bare name or through
//! `self.<bucket>.<key>`. Those reads form a graph that is ordered with a
//! depth-first topological sort so every key is evaluated after its inputs.

use crate::error::{FrameError, Result};
use crate::script::DepPath;
use std::collections::{BTreeMap, BTreeSet};

/// Extracts the own-bucket keys a scriptlet reads.
///
/// A key reading its own name is not an edge: the name falls through to the
/// enclosing scopes instead.
pub fn local_dependencies(
    key: &str,
    bucket: &str,
    own_keys: &BTreeSet<String>,
    deps: &[DepPath],
) -> Vec<String> {
    let mut local = Vec::new();
    for path in deps {
        let target = match path.as_slice() {
            [root, section, name, ..] if root == "self" && section == bucket => name,
            [root, ..] => root,
            [] => continue,
        };
        if target != key && own_keys.contains(target) && !local.contains(target) {
            local.push(target.clone());
        }
    }
    local
}

/// Orders the keys of one bucket so each key follows the keys it reads.
///
/// Keys without constraints keep their sorted order. A cycle is reported as
/// [`FrameError::Cycle`] with the offending key path.
pub fn order_keys(node: &str, graph: &BTreeMap<String, Vec<String>>) -> Result<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        node: &str,
        key: &str,
        graph: &BTreeMap<String, Vec<String>>,
        marks: &mut BTreeMap<String, Mark>,
        stack: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|k| k == key).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].to_vec();
                path.push(key.to_string());
                return Err(FrameError::Cycle {
                    node: node.to_string(),
                    path,
                });
            }
            None => {}
        }

        marks.insert(key.to_string(), Mark::Visiting);
        stack.push(key.to_string());
        if let Some(inputs) = graph.get(key) {
            for input in inputs {
                if graph.contains_key(input) {
                    visit(node, input, graph, marks, stack, order)?;
                }
            }
        }
        stack.pop();
        marks.insert(key.to_string(), Mark::Done);
        order.push(key.to_string());
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(graph.len());
    for key in graph.keys() {
        visit(node, key, graph, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}
