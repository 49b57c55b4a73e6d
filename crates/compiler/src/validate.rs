//! Structural pre-check of a document.
//!
//! Only checks what lowering depends on: ids resolve, used nodes are
//! listed once, and every connection points at a node used earlier in the
//! same flow. All problems are collected, not just the first.

use crate::document::{Connection, DocumentContext, Flow, Node, RowBinding};
use crate::error::ValidationError;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Check `document` and return every structural problem found.
pub fn validate(document: &DocumentContext) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if document.flow(&document.main_flow).is_none() {
        errors.push(ValidationError::MissingMainFlow(document.main_flow.clone()));
    }

    let mut seen = HashSet::new();
    for flow in &document.flows {
        if !seen.insert(flow.id.as_str()) {
            errors.push(ValidationError::DuplicateFlow(flow.id.clone()));
        }
        check_flow(flow, &mut errors);
    }

    errors
}

fn check_flow(flow: &Flow, errors: &mut Vec<ValidationError>) {
    let mut nodes: HashMap<&str, &Node> = HashMap::new();
    for node in &flow.nodes {
        match nodes.entry(node.id.as_str()) {
            Entry::Occupied(_) => errors.push(ValidationError::DuplicateNode {
                flow: flow.id.clone(),
                node: node.id.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
        }
    }

    let mut computed = HashSet::new();
    for id in &flow.sorted_used_nodes {
        let Some(node) = nodes.get(id.as_str()) else {
            errors.push(ValidationError::UnknownUsedNode {
                flow: flow.id.clone(),
                node: id.clone(),
            });
            continue;
        };
        for row in &node.rows {
            for source in connections(&row.binding) {
                let problem = if !nodes.contains_key(source.node.as_str()) {
                    Some(ValidationError::UnknownSource {
                        flow: flow.id.clone(),
                        node: node.id.clone(),
                        row: row.id.clone(),
                        source_node: source.node.clone(),
                    })
                } else if !computed.contains(source.node.as_str()) {
                    Some(ValidationError::SourceOutOfOrder {
                        flow: flow.id.clone(),
                        node: node.id.clone(),
                        row: row.id.clone(),
                        source_node: source.node.clone(),
                    })
                } else {
                    None
                };
                errors.extend(problem);
            }
            check_elements(flow, node, &row.id, &row.binding, errors);
        }
        if !computed.insert(id.as_str()) {
            errors.push(ValidationError::RepeatedUsedNode {
                flow: flow.id.clone(),
                node: id.clone(),
            });
        }
    }
}

fn check_elements(
    flow: &Flow,
    node: &Node,
    row: &str,
    binding: &RowBinding,
    errors: &mut Vec<ValidationError>,
) {
    let (RowBinding::List { elements } | RowBinding::Tuple { elements, .. }) = binding else {
        return;
    };
    let mut indices = HashSet::new();
    for element in elements {
        if !indices.insert(element.index) {
            errors.push(ValidationError::RepeatedElement {
                flow: flow.id.clone(),
                node: node.id.clone(),
                row: row.to_string(),
                index: element.index,
            });
        }
    }
}

/// Every connection a binding makes.
pub(crate) fn connections(binding: &RowBinding) -> Vec<&Connection> {
    match binding {
        RowBinding::Simple { source } => vec![source],
        RowBinding::List { elements } | RowBinding::Tuple { elements, .. } => {
            elements.iter().map(|e| &e.source).collect()
        }
        RowBinding::Map { entries } => entries.values().collect(),
        RowBinding::Initializer { .. } | RowBinding::Unbound => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> DocumentContext {
        DocumentContext::from_json(json).unwrap()
    }

    #[test]
    fn valid_document_has_no_errors() {
        let document = doc(
            r#"{"mainFlow": "main", "flows": [{"id": "main",
                "nodes": [
                  {"id": "a", "routine": "standard::identity",
                   "rows": [{"id": "v", "binding": {"kind": "initializer", "value": 1}}]},
                  {"id": "b", "routine": "standard::identity",
                   "rows": [{"id": "v", "binding": {"kind": "simple", "source": {"node": "a"}}}]}
                ],
                "sortedUsedNodes": ["a", "b"]}]}"#,
        );
        assert_eq!(validate(&document), vec![]);
    }

    #[test]
    fn collects_every_problem() {
        let document = doc(
            r#"{"mainFlow": "nope", "flows": [
                {"id": "f",
                 "nodes": [
                   {"id": "a", "routine": "standard::identity",
                    "rows": [{"id": "v", "binding": {"kind": "simple", "source": {"node": "b"}}}]},
                   {"id": "b", "routine": "standard::identity",
                    "rows": [{"id": "v", "binding": {"kind": "list", "elements": [
                      {"index": 0, "source": {"node": "ghost"}},
                      {"index": 0, "source": {"node": "a"}}
                    ]}}]},
                   {"id": "b", "routine": "standard::identity"}
                 ],
                 "sortedUsedNodes": ["a", "b", "missing", "a"]},
                {"id": "f"}
            ]}"#,
        );
        let errors = validate(&document);
        let f = || "f".to_string();
        assert!(errors.contains(&ValidationError::MissingMainFlow("nope".into())));
        assert!(errors.contains(&ValidationError::DuplicateFlow(f())));
        assert!(errors.contains(&ValidationError::DuplicateNode {
            flow: f(),
            node: "b".into()
        }));
        assert!(errors.contains(&ValidationError::SourceOutOfOrder {
            flow: f(),
            node: "a".into(),
            row: "v".into(),
            source_node: "b".into()
        }));
        assert!(errors.contains(&ValidationError::UnknownSource {
            flow: f(),
            node: "b".into(),
            row: "v".into(),
            source_node: "ghost".into()
        }));
        assert!(errors.contains(&ValidationError::RepeatedElement {
            flow: f(),
            node: "b".into(),
            row: "v".into(),
            index: 0
        }));
        assert!(errors.contains(&ValidationError::UnknownUsedNode {
            flow: f(),
            node: "missing".into()
        }));
        assert!(errors.contains(&ValidationError::RepeatedUsedNode {
            flow: f(),
            node: "a".into()
        }));
    }
}
