//! Workflow graph: the engine's task/children document and the node/edge
//! model the panels render.
//!
//! The document is decoded with key order preserved, so transforming the same
//! document always yields nodes and edges in the same order. The transform is
//! a reshaping step only: it does not look for cycles and keeps repeated
//! edges, but it refuses documents whose nodes or edges cannot be trusted.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{OrcaError, Result};

/// A JSON object decoded as an ordered list of entries.
///
/// Duplicate keys are a decode error rather than last-one-wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Entries<V>(Vec<(String, V)>);

impl<V> Entries<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replace the value under `key`, or append a new entry at the end.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.0.push((key, value)),
        }
    }
}

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for Entries<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!("duplicate key `{}`", key)));
                    }
                    entries.push((key, value));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

impl<V: Serialize> Serialize for Entries<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Placeholder for the values of the children map; only the keys matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unused;

impl<'de> Deserialize<'de> for Unused {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Unused)
    }
}

impl Serialize for Unused {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

/// One task as the engine describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, rename = "cmd", skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The engine's graph document: tasks by key, and `children[parent][child]`
/// for every dependency edge. A parent with no children has no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub tasks: Entries<TaskSpec>,
    #[serde(default)]
    pub children: Entries<Entries<Unused>>,
}

impl GraphDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task keyed by its own name.
    pub fn with_task(mut self, name: &str, desc: &str) -> Self {
        self.tasks.insert(
            name,
            TaskSpec {
                name: name.to_string(),
                desc: desc.to_string(),
                command: None,
                status: None,
            },
        );
        self
    }

    /// Add a `parent -> child` dependency.
    pub fn with_edge(mut self, parent: &str, child: &str) -> Self {
        match self.children.get_mut(parent) {
            Some(kids) => kids.insert(child, Unused),
            None => {
                let mut kids = Entries::new();
                kids.insert(child, Unused);
                self.children.insert(parent, kids);
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

/// Renderable graph: unique node ids, every edge between known nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphModel {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphModel {
    /// Targets of the edges leaving `id`, in edge order.
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == id)
            .map(|e| e.target.as_str())
    }

    /// Nodes without incoming edges, in node order.
    pub fn roots(&self) -> Vec<&GraphNode> {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .collect()
    }
}

/// Reshape a graph document into a node list and an edge list.
pub fn transform(doc: &GraphDocument) -> Result<GraphModel> {
    let mut ids = HashSet::with_capacity(doc.tasks.len());
    let mut nodes = Vec::with_capacity(doc.tasks.len());
    for (_, task) in doc.tasks.iter() {
        if !ids.insert(task.name.as_str()) {
            return Err(OrcaError::DuplicateNode(task.name.clone()));
        }
        nodes.push(GraphNode {
            id: task.name.clone(),
            desc: task.desc.clone(),
        });
    }

    let mut edges = Vec::new();
    for (parent, kids) in doc.children.iter() {
        for (child, _) in kids.iter() {
            if !ids.contains(parent) || !ids.contains(child) {
                return Err(OrcaError::DanglingEdge {
                    from: parent.to_string(),
                    to: child.to_string(),
                });
            }
            edges.push(GraphEdge {
                source: parent.to_string(),
                target: child.to_string(),
            });
        }
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "Transformed graph document");
    Ok(GraphModel { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_in_document_order() {
        let doc: GraphDocument = serde_json::from_str(
            r#"{
                "tasks": {
                    "C": {"name": "C", "desc": "third"},
                    "A": {"name": "A", "desc": "first"},
                    "B": {"name": "B"}
                },
                "children": {"C": {"A": "A"}, "A": {"B": "B", "C": "C"}}
            }"#,
        )
        .unwrap();

        let model = transform(&doc).unwrap();
        let ids: Vec<_> = model.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["C", "A", "B"]);
        assert_eq!(model.nodes[2].desc, "");

        let edges: Vec<_> = model
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(edges, [("C", "A"), ("A", "B"), ("A", "C")]);
    }

    #[test]
    fn example_graph() {
        let doc: GraphDocument = serde_json::from_str(
            r#"{"tasks":{"A":{"name":"A"},"B":{"name":"B"}},"children":{"A":{"B":true}}}"#,
        )
        .unwrap();
        let model = transform(&doc).unwrap();
        assert_eq!(
            model,
            GraphModel {
                nodes: vec![
                    GraphNode { id: "A".into(), desc: String::new() },
                    GraphNode { id: "B".into(), desc: String::new() },
                ],
                edges: vec![GraphEdge { source: "A".into(), target: "B".into() }],
            }
        );
    }

    #[test]
    fn transform_is_deterministic() {
        let doc = GraphDocument::new()
            .with_task("extract", "pull rows")
            .with_task("load", "write rows")
            .with_task("notify", "")
            .with_edge("extract", "load")
            .with_edge("load", "notify");
        assert_eq!(transform(&doc).unwrap(), transform(&doc).unwrap());
    }

    #[test]
    fn every_edge_endpoint_is_a_node() {
        let doc = GraphDocument::new()
            .with_task("a", "")
            .with_task("b", "")
            .with_task("c", "")
            .with_edge("a", "b")
            .with_edge("a", "c")
            .with_edge("b", "c");
        let model = transform(&doc).unwrap();
        let ids: HashSet<_> = model.nodes.iter().map(|n| n.id.as_str()).collect();
        for e in &model.edges {
            assert!(ids.contains(e.source.as_str()));
            assert!(ids.contains(e.target.as_str()));
        }
    }

    #[test]
    fn duplicate_task_names_are_rejected() {
        let doc: GraphDocument = serde_json::from_str(
            r#"{"tasks":{"t1":{"name":"load"},"t2":{"name":"load"}},"children":{}}"#,
        )
        .unwrap();
        let err = transform(&doc).unwrap_err();
        assert!(matches!(err, OrcaError::DuplicateNode(ref id) if id == "load"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let doc = GraphDocument::new().with_task("a", "").with_edge("a", "ghost");
        let err = transform(&doc).unwrap_err();
        assert!(matches!(err, OrcaError::DanglingEdge { ref to, .. } if to == "ghost"));
    }

    #[test]
    fn duplicate_json_keys_fail_to_decode() {
        let res: std::result::Result<GraphDocument, _> = serde_json::from_str(
            r#"{"tasks":{"a":{"name":"a"},"a":{"name":"a"}},"children":{}}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn missing_children_means_no_edges() {
        let doc: GraphDocument =
            serde_json::from_str(r#"{"tasks":{"a":{"name":"a","cmd":"echo hi"}}}"#).unwrap();
        assert_eq!(doc.tasks.get("a").unwrap().command.as_deref(), Some("echo hi"));
        let model = transform(&doc).unwrap();
        assert!(model.edges.is_empty());
    }

    #[test]
    fn roots_and_children() {
        let doc = GraphDocument::new()
            .with_task("a", "")
            .with_task("b", "")
            .with_task("c", "")
            .with_edge("a", "b")
            .with_edge("a", "c");
        let model = transform(&doc).unwrap();
        let roots: Vec<_> = model.roots().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, ["a"]);
        let kids: Vec<_> = model.children_of("a").collect();
        assert_eq!(kids, ["b", "c"]);
    }

    #[test]
    fn serializes_back_in_order() {
        let doc = GraphDocument::new()
            .with_task("z", "")
            .with_task("a", "")
            .with_edge("z", "a");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
        let back: GraphDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
