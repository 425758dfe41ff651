// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Style sheets layered over resolved styles.

use crate::node::NodeKind;
use crate::runtime::state::ValueMap;
use serde::{Deserialize, Serialize};

const BACKGROUND: &str = "background";
const HOVER_BACKGROUND: &str = "hoverBackground";
const THEME_HOVER_BACKGROUND: &str = "themeHoverBackground";

/// One style rule, matched by node kind or by class name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeRule {
    /// Kind tag the rule applies to.
    pub kind: Option<NodeKind>,
    /// Class name the rule applies to (matched against the `class` prop).
    pub class: Option<String>,
    /// Styles contributed by the rule.
    pub styles: ValueMap,
}

impl ThemeRule {
    fn matches(&self, kind: NodeKind, classes: &[&str]) -> bool {
        let kind_ok = self.kind.map_or(true, |k| k == kind);
        let class_ok = self
            .class
            .as_deref()
            .map_or(true, |c| classes.contains(&c));
        (self.kind.is_some() || self.class.is_some()) && kind_ok && class_ok
    }
}

/// An ordered list of rules; later matches win over earlier ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSheet {
    /// The rules.
    pub rules: Vec<ThemeRule>,
}

impl StyleSheet {
    /// Creates a sheet from rules.
    pub fn new(rules: Vec<ThemeRule>) -> Self {
        Self { rules }
    }

    /// Merges the matching rules into a node's resolved styles.
    ///
    /// Matched rule styles take precedence over the node's own. When the node
    /// defines any `background*` style locally, rule `background*` keys are
    /// ignored and rule `hoverBackground*` keys are stored as
    /// `themeHoverBackground*` instead.
    pub fn apply(&self, kind: NodeKind, class: Option<&str>, styles: &mut ValueMap) {
        let classes: Vec<&str> = class.map(|c| c.split_whitespace().collect()).unwrap_or_default();
        let matched: Vec<&ThemeRule> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(kind, &classes))
            .collect();
        if matched.is_empty() {
            return;
        }

        let local_background = styles.keys().any(|k| k.starts_with(BACKGROUND));
        for rule in matched {
            for (key, value) in &rule.styles {
                if local_background {
                    if key.starts_with(BACKGROUND) {
                        continue;
                    }
                    if let Some(suffix) = key.strip_prefix(HOVER_BACKGROUND) {
                        styles.insert(format!("{}{}", THEME_HOVER_BACKGROUND, suffix), value.clone());
                        continue;
                    }
                }
                styles.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet() -> StyleSheet {
        serde_json::from_value(json!({
            "rules": [
                { "kind": "button", "styles": { "color": "white", "background": "blue", "hoverBackground": "navy" } },
                { "class": "danger", "styles": { "color": "red" } }
            ]
        }))
        .unwrap()
    }

    fn styles(value: serde_json::Value) -> ValueMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn theme_styles_override_local_ones() {
        let mut s = styles(json!({ "color": "black", "padding": 4 }));
        sheet().apply(NodeKind::Button, None, &mut s);
        assert_eq!(s["color"], json!("white"));
        assert_eq!(s["background"], json!("blue"));
        assert_eq!(s["padding"], json!(4));
    }

    #[test]
    fn local_background_wins_and_hover_is_renamed() {
        let mut s = styles(json!({ "backgroundColor": "yellow" }));
        sheet().apply(NodeKind::Button, None, &mut s);
        assert_eq!(s["backgroundColor"], json!("yellow"));
        assert!(!s.contains_key("background"));
        assert!(!s.contains_key("hoverBackground"));
        assert_eq!(s["themeHoverBackground"], json!("navy"));
    }

    #[test]
    fn class_rules_and_order() {
        let mut s = ValueMap::new();
        sheet().apply(NodeKind::Button, Some("big danger"), &mut s);
        assert_eq!(s["color"], json!("red"));

        let mut s = ValueMap::new();
        sheet().apply(NodeKind::Text, Some("big"), &mut s);
        assert!(s.is_empty());
    }
}
