//! Document tree stored as an arena of nodes addressed by [`NodeId`].
//!
//! Nodes never move once allocated. Replacing a node rewrites its parent's
//! child list and clears the removed node's parent link, so a detached
//! subtree simply becomes unreachable from the root.
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a construct starts in its source file. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A conditional block awaiting resolution. Its content is the node's children.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMarker {
    pub directive: String,
    pub expression: String,
    pub location: Location,
    /// Column of the directive itself.
    pub indent: usize,
    /// Column of the first body line; equals `indent` for an empty body.
    pub body_indent: usize,
}

impl ConditionMarker {
    /// Columns to strip from the body when it replaces the marker.
    pub fn dedent(&self) -> usize {
        self.body_indent.saturating_sub(self.indent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    /// One source line, with its indentation.
    Text(String),
    /// One line of a literal block, rendered exactly as read.
    Literal(String),
    Marker(ConditionMarker),
    /// Preview-mode annotation showing a guarding expression.
    Annotation { expression: String, indent: usize },
    /// Inline error placeholder.
    Problem {
        message: String,
        location: Option<Location>,
        indent: usize,
    },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    nodes: Vec<Node>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Allocate a node that is not yet attached anywhere.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Allocate a node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn marker(&self, id: NodeId) -> Option<&ConditionMarker> {
        match self.kind(id) {
            NodeKind::Marker(m) => Some(m),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Detach and return all children of `id`.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Put `replacement` where `id` sits in its parent, in order, and detach
    /// `id`. Replacing with an empty list removes the node. Returns false if
    /// `id` has no parent.
    pub fn replace(&mut self, id: NodeId, replacement: Vec<NodeId>) -> bool {
        let Some(parent) = self.nodes[id.0].parent else {
            return false;
        };
        let Some(pos) = self.nodes[parent.0].children.iter().position(|c| *c == id) else {
            return false;
        };
        for node in &replacement {
            self.nodes[node.0].parent = Some(parent);
        }
        self.nodes[parent.0].children.splice(pos..=pos, replacement);
        self.nodes[id.0].parent = None;
        true
    }

    /// True if the node can be reached from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Attached nodes below `from`, in document (pre-)order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(from).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Attached markers in document order.
    pub fn markers(&self) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.marker(*id).is_some())
            .collect()
    }

    /// Remove up to `columns` leading spaces from every line in the subtree
    /// rooted at `id`, keeping recorded indents consistent.
    pub fn shift_left(&mut self, id: NodeId, columns: usize) {
        if columns == 0 {
            return;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match &mut self.nodes[current.0].kind {
                NodeKind::Text(line) | NodeKind::Literal(line) => {
                    let strip = line
                        .chars()
                        .take(columns)
                        .take_while(|c| *c == ' ' || *c == '\t')
                        .count();
                    line.drain(..strip);
                }
                NodeKind::Marker(m) => {
                    m.indent = m.indent.saturating_sub(columns);
                    m.body_indent = m.body_indent.saturating_sub(columns);
                }
                NodeKind::Annotation { indent, .. } | NodeKind::Problem { indent, .. } => {
                    *indent = indent.saturating_sub(columns);
                }
                NodeKind::Root => {}
            }
            stack.extend(self.nodes[current.0].children.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| match doc.kind(*id) {
                NodeKind::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    fn marker(line: usize) -> NodeKind {
        NodeKind::Marker(ConditionMarker {
            directive: "custver".into(),
            expression: "True".into(),
            location: Location {
                file: "t.rst".into(),
                line,
            },
            indent: 0,
            body_indent: 3,
        })
    }

    #[test]
    fn replace_splices_in_place() {
        let mut doc = Document::new("t");
        let root = doc.root();
        doc.append(root, NodeKind::Text("a".into()));
        let m = doc.append(root, marker(2));
        doc.append(m, NodeKind::Text("   b".into()));
        doc.append(m, NodeKind::Text("   c".into()));
        doc.append(root, NodeKind::Text("d".into()));

        let children = doc.take_children(m);
        for c in &children {
            doc.shift_left(*c, 3);
        }
        assert!(doc.replace(m, children));
        assert!(!doc.is_attached(m));
        assert_eq!(text(&doc, doc.children(root)), vec!["a", "b", "c", "d"]);
        assert!(doc.markers().is_empty());
    }

    #[test]
    fn removed_subtrees_are_unreachable() {
        let mut doc = Document::new("t");
        let root = doc.root();
        let outer = doc.append(root, marker(1));
        let inner = doc.append(outer, marker(3));
        assert_eq!(doc.markers(), vec![outer, inner]);

        assert!(doc.replace(outer, Vec::new()));
        assert!(!doc.is_attached(inner));
        assert!(doc.children(root).is_empty());
        assert!(!doc.replace(outer, Vec::new()));
    }

    #[test]
    fn shift_left_only_strips_whitespace() {
        let mut doc = Document::new("t");
        let id = doc.append(doc.root(), NodeKind::Text("  x".into()));
        doc.shift_left(id, 3);
        assert_eq!(doc.kind(id), &NodeKind::Text("x".into()));
    }
}
