//! Host data model contract.
//!
//! The engine never builds document nodes itself.  A host converts its raw
//! data into a tree of [`Selectable`] nodes (see [`Ruleset`](crate::universe::Ruleset))
//! and the interpreter queries and mutates that tree only through this trait.
//!
//! Nodes are addressed by [`NodePath`]: a document index plus the child index
//! at each level below the root.  Selection collects paths first and mutates
//! afterwards, so a path stays valid as long as no child is removed; the
//! contract offers no way to remove one.

use std::fmt;

use crate::value::Value;

/// A node of a host document tree.
pub trait Selectable {
    /// Element type (`part`, `module`, …).
    fn element_type(&self) -> &str;

    fn name(&self) -> &str;

    fn has_class(&self, class: &str) -> bool;

    /// True if the node was produced by the named ruleset.
    fn in_ruleset(&self, ruleset: &str) -> bool;

    fn get_field(&self, key: &str) -> Option<Value>;

    fn set_field(&mut self, key: &str, value: Value);

    /// Remove a field, returning whether it existed.
    fn delete_field(&mut self, key: &str) -> bool;

    fn child_count(&self) -> usize;

    fn child(&self, index: usize) -> Option<&dyn Selectable>;

    fn child_mut(&mut self, index: usize) -> Option<&mut dyn Selectable>;

    /// Append a new, empty child of the given element type and return its index.
    fn add_child(&mut self, element_type: &str) -> usize;

    /// Render the node (and its subtree) back to the host format.
    fn serialize(&self) -> String;
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Address of a node inside a [`DocumentSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    pub doc: usize,
    pub steps: Vec<usize>,
}

impl NodePath {
    pub fn root(doc: usize) -> Self {
        NodePath {
            doc,
            steps: Vec::new(),
        }
    }

    /// The path of this node's `index`th child.
    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(index);
        NodePath {
            doc: self.doc,
            steps,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc)?;
        for step in &self.steps {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

/// Follow `steps` down from `root`.
pub fn descend<'a>(root: &'a dyn Selectable, steps: &[usize]) -> Option<&'a dyn Selectable> {
    let mut node = root;
    for &i in steps {
        node = node.child(i)?;
    }
    Some(node)
}

/// Mutable counterpart of [`descend`].
pub fn descend_mut<'a>(
    root: &'a mut dyn Selectable,
    steps: &[usize],
) -> Option<&'a mut dyn Selectable> {
    let mut node = root;
    for &i in steps {
        node = node.child_mut(i)?;
    }
    Some(node)
}

/// Visit `node` and its subtree in pre-order.
///
/// The callback receives the node's path steps, its ancestor chain (root
/// first, parent last) and the node itself.
pub fn walk<'a>(
    node: &'a dyn Selectable,
    steps: &mut Vec<usize>,
    ancestors: &mut Vec<&'a dyn Selectable>,
    visit: &mut dyn FnMut(&[usize], &[&'a dyn Selectable], &'a dyn Selectable),
) {
    visit(steps, ancestors, node);
    ancestors.push(node);
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            steps.push(i);
            walk(child, steps, ancestors, visit);
            steps.pop();
        }
    }
    ancestors.pop();
}

// ── Documents ─────────────────────────────────────────────────────────────────

/// One converted input: the label that chose its ruleset, its name and tree.
pub struct Document {
    pub label: String,
    pub name: String,
    pub root: Box<dyn Selectable>,
}

impl Document {
    pub fn new(label: impl Into<String>, name: impl Into<String>, root: Box<dyn Selectable>) -> Self {
        Document {
            label: label.into(),
            name: name.into(),
            root,
        }
    }

    pub fn serialize(&self) -> String {
        self.root.serialize()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("label", &self.label)
            .field("name", &self.name)
            .field("element", &self.root.element_type())
            .finish()
    }
}

/// All documents a registration run patches, in insertion order.
#[derive(Debug, Default)]
pub struct DocumentSet {
    documents: Vec<Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and return its index.
    pub fn push(&mut self, document: Document) -> usize {
        self.documents.push(document);
        self.documents.len() - 1
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn node(&self, path: &NodePath) -> Option<&dyn Selectable> {
        let doc = self.documents.get(path.doc)?;
        descend(doc.root.as_ref(), &path.steps)
    }

    pub fn node_mut(&mut self, path: &NodePath) -> Option<&mut dyn Selectable> {
        let doc = self.documents.get_mut(path.doc)?;
        descend_mut(doc.root.as_mut(), &path.steps)
    }
}

impl IntoIterator for DocumentSet {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::JsonNode;

    fn tree() -> JsonNode {
        let mut root = JsonNode::new("part", "engine");
        let mut a = JsonNode::new("module", "a");
        a.push_child(JsonNode::new("resource", "fuel"));
        root.push_child(a);
        root.push_child(JsonNode::new("module", "b"));
        root
    }

    #[test]
    fn walk_is_preorder_with_ancestors() {
        let root = tree();
        let mut seen = Vec::new();
        walk(&root, &mut Vec::new(), &mut Vec::new(), &mut |steps, ancestors, node| {
            let chain: Vec<&str> = ancestors.iter().map(|a| a.name()).collect();
            seen.push((steps.to_vec(), chain.join("/"), node.name().to_owned()));
        });
        assert_eq!(
            seen,
            vec![
                (vec![], "".into(), "engine".into()),
                (vec![0], "engine".into(), "a".into()),
                (vec![0, 0], "engine/a".into(), "fuel".into()),
                (vec![1], "engine".into(), "b".into()),
            ]
        );
    }

    #[test]
    fn paths_navigate_and_mutate() {
        let mut docs = DocumentSet::new();
        let idx = docs.push(Document::new("parts_data", "engine", Box::new(tree())));
        let fuel = NodePath::root(idx).child(0).child(0);
        assert_eq!(fuel.to_string(), "0/0/0");
        assert_eq!(docs.node(&fuel).map(|n| n.name().to_owned()), Some("fuel".into()));

        docs.node_mut(&fuel)
            .expect("node exists")
            .set_field("amount", Value::Integer(5));
        assert_eq!(
            docs.node(&fuel).and_then(|n| n.get_field("amount")),
            Some(Value::Integer(5))
        );
        assert!(docs.node(&NodePath::root(idx).child(7)).is_none());
        assert!(docs.node(&NodePath::root(3)).is_none());
    }
}
