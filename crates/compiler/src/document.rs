//! The flow document handed to the compiler.
//!
//! Documents arrive already type-checked. Each flow lists its nodes, the
//! subset that is actually used in dependency order, and for every node
//! input row how that row is bound.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A whole document: its flows and which one runs first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    /// Id of the flow the entry chunk calls.
    pub main_flow: String,
    /// All flows of the document.
    pub flows: Vec<Flow>,
}

impl DocumentContext {
    /// Parse a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Look up a flow by id.
    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.iter().find(|flow| flow.id == id)
    }
}

/// One flow: a callable graph of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: String,
    /// Input ids, in positional argument order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output ids, in row order of the flow's output node.
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Ids of the nodes that contribute to the result, dependencies first.
    /// The last one produces the flow's value.
    #[serde(default)]
    pub sorted_used_nodes: Vec<String>,
}

impl Flow {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// A node: one routine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    /// Routine path, e.g. `standard::add` or `document::helper`.
    pub routine: String,
    /// Input rows, in argument order.
    #[serde(default)]
    pub rows: Vec<InputRow>,
}

/// One input row of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRow {
    pub id: String,
    #[serde(default)]
    pub binding: RowBinding,
}

/// How a row gets its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RowBinding {
    /// One connection to a node computed earlier in the flow.
    Simple { source: Connection },
    /// A constant written in the document.
    Initializer { value: serde_json::Value },
    /// An array assembled from indexed connections; no index may be skipped.
    List {
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// A fixed-length array; every index below `length` must be connected.
    Tuple {
        length: usize,
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// An object assembled from keyed connections.
    Map {
        #[serde(default)]
        entries: IndexMap<String, Connection>,
    },
    /// Nothing connected.
    #[default]
    Unbound,
}

/// A reference to the value a node produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Producing node id.
    pub node: String,
    /// Field of a compound producer, such as a flow input node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// An indexed element of a list or tuple row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub index: usize,
    pub source: Connection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_binding_kind() {
        let doc = DocumentContext::from_json(
            r#"{
              "mainFlow": "main",
              "flows": [{
                "id": "main",
                "nodes": [{
                  "id": "n1",
                  "routine": "standard::identity",
                  "rows": [
                    { "id": "a", "binding": { "kind": "simple", "source": { "node": "n0", "output": "x" } } },
                    { "id": "b", "binding": { "kind": "initializer", "value": [1, "two"] } },
                    { "id": "c", "binding": { "kind": "list", "elements": [{ "index": 0, "source": { "node": "n0" } }] } },
                    { "id": "d", "binding": { "kind": "tuple", "length": 0 } },
                    { "id": "e", "binding": { "kind": "map", "entries": { "z": { "node": "n0" }, "a": { "node": "n0" } } } },
                    { "id": "f", "binding": { "kind": "unbound" } },
                    { "id": "g" }
                  ]
                }],
                "sortedUsedNodes": ["n1"]
              }]
            }"#,
        )
        .unwrap();

        let flow = doc.flow("main").unwrap();
        assert!(flow.inputs.is_empty());
        let rows = &flow.node("n1").unwrap().rows;
        assert_eq!(
            rows[0].binding,
            RowBinding::Simple {
                source: Connection {
                    node: "n0".into(),
                    output: Some("x".into())
                }
            }
        );
        assert_eq!(
            rows[1].binding,
            RowBinding::Initializer {
                value: serde_json::json!([1, "two"])
            }
        );
        assert!(matches!(&rows[2].binding, RowBinding::List { elements } if elements[0].index == 0));
        assert_eq!(
            rows[3].binding,
            RowBinding::Tuple {
                length: 0,
                elements: vec![]
            }
        );
        match &rows[4].binding {
            RowBinding::Map { entries } => {
                assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["z", "a"]);
            }
            other => panic!("expected map, got {other:?}"),
        }
        assert_eq!(rows[5].binding, RowBinding::Unbound);
        assert_eq!(rows[6].binding, RowBinding::Unbound);
    }

    #[test]
    fn unknown_binding_kind_is_rejected() {
        let err = DocumentContext::from_json(
            r#"{"mainFlow": "m", "flows": [{"id": "m", "nodes": [{"id": "n", "routine": "r",
                "rows": [{"id": "a", "binding": {"kind": "spread"}}]}]}]}"#,
        );
        assert!(err.is_err());
    }
}
