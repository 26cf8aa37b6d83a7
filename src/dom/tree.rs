use crate::{DocumentNode, NodeKind};

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    /// Element name or processing-instruction target.
    name: String,
    /// Character data of text, comment and processing-instruction nodes.
    value: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        NodeData { kind, name: String::new(), value: String::new(), attributes: Vec::new(), parent, children: Vec::new() }
    }
}

/// Arena-backed document tree.
///
/// The document node always exists (see [`root_id`](Document::root_id)).
/// Nodes are appended as the last child of their parent; nothing is ever
/// removed.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document { nodes: vec![NodeData::new(NodeKind::Document, None)] }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root_id())
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }

    /// Number of nodes, including the document node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing but the document node exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Append an element named `name` to `parent`.
    pub fn element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.append(parent, NodeKind::Element);
        self.nodes[id.0].name = name.to_string();
        id
    }

    /// Append an element carrying `attributes`.
    pub fn element_with(&mut self, parent: NodeId, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.element(parent, name);
        for (attr, value) in attributes {
            self.set_attribute(id, attr, value);
        }
        id
    }

    /// Set (or replace) an attribute. Ignored for non-element nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let data = &mut self.nodes[node.0];
        if data.kind != NodeKind::Element {
            return;
        }
        match data.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => data.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn text(&mut self, parent: NodeId, value: &str) -> NodeId {
        let id = self.append(parent, NodeKind::Text);
        self.nodes[id.0].value = value.to_string();
        id
    }

    pub fn comment(&mut self, parent: NodeId, value: &str) -> NodeId {
        let id = self.append(parent, NodeKind::Comment);
        self.nodes[id.0].value = value.to_string();
        id
    }

    pub fn processing_instruction(&mut self, parent: NodeId, target: &str, data: &str) -> NodeId {
        let id = self.append(parent, NodeKind::ProcessingInstruction);
        self.nodes[id.0].name = target.to_string();
        self.nodes[id.0].value = data.to_string();
        id
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }
}

/// Handle to a node of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: NodeId,
}

impl<'d> NodeRef<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    /// Element name or processing-instruction target.
    pub fn name(&self) -> Option<&'d str> {
        match self.data().kind {
            NodeKind::Element | NodeKind::ProcessingInstruction => Some(self.data().name.as_str()),
            _ => None,
        }
    }

    /// Character data of text, comment and processing-instruction nodes.
    pub fn value(&self) -> Option<&'d str> {
        match self.data().kind {
            NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction => Some(self.data().value.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.data().attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&'d str, &'d str)> {
        self.data().attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.data().parent.map(|id| self.doc.node(id))
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'d>> {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// Position among the parent's children (0 for the document node).
    pub fn index(&self) -> usize {
        self.parent().and_then(|p| p.data().children.iter().position(|&c| c == self.id)).unwrap_or(0)
    }

    /// Siblings after this node, in document order.
    pub fn following_siblings(&self) -> Vec<NodeRef<'d>> {
        match self.parent() {
            Some(parent) => parent.data().children[self.index() + 1..].iter().map(|&id| self.doc.node(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Siblings before this node, nearest first.
    pub fn preceding_siblings(&self) -> Vec<NodeRef<'d>> {
        match self.parent() {
            Some(parent) => parent.data().children[..self.index()].iter().rev().map(|&id| self.doc.node(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Descendants in document order.
    pub fn descendants(&self) -> Vec<NodeRef<'d>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef<'d>> = DocumentNode::children(self).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(DocumentNode::children(&node).into_iter().rev());
        }
        out
    }

    /// Child indices from the document node down to this node. Comparing
    /// these compares document order.
    pub(crate) fn order_key(&self) -> Vec<usize> {
        let mut key: Vec<usize> = std::iter::once(*self).chain(self.ancestors()).map(|n| n.index()).collect();
        key.reverse();
        key
    }
}

impl DocumentNode for NodeRef<'_> {
    fn is_same(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }

    fn kind(&self) -> NodeKind {
        self.data().kind
    }

    fn identifier(&self) -> Option<String> {
        self.attribute("id").or_else(|| self.attribute("xml:id")).map(str::to_string)
    }

    fn children(&self) -> Vec<Self> {
        self.data().children.iter().map(|&id| self.doc.node(id)).collect()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for NodeRef<'_> {}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.data().kind {
            NodeKind::Element => write!(f, "<{}>#{}", self.data().name, self.id.0),
            NodeKind::ProcessingInstruction => write!(f, "<?{}?>#{}", self.data().name, self.id.0),
            kind => write!(f, "{}#{}", kind, self.id.0),
        }
    }
}
