use crate::normalize::NormalizedUrl;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Index of a node inside a [`CrawlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct CrawlNode {
    pub url: NormalizedUrl,
    pub depth: usize,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl CrawlNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Pages visited during a crawl, arranged by the page they were first
/// discovered on. Nodes live in an arena; each parent owns its children.
#[derive(Debug, Clone)]
pub struct CrawlTree {
    nodes: Vec<CrawlNode>,
}

impl CrawlTree {
    pub fn new(root: NormalizedUrl) -> Self {
        Self {
            nodes: vec![CrawlNode {
                url: root,
                depth: 0,
                children: Vec::new(),
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &CrawlNode {
        &self.nodes[id.0]
    }

    /// Append a child one level below `parent`.
    pub fn add_child(&mut self, parent: NodeId, url: NormalizedUrl) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        self.nodes.push(CrawlNode {
            url,
            depth,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Unlink a node that turned out to duplicate an already visited page.
    /// The root cannot be detached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Node ids reachable from the root, depth-first, children in discovery order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Number of nodes reachable from the root.
    pub fn len(&self) -> usize {
        self.preorder().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn max_depth(&self) -> usize {
        self.preorder()
            .into_iter()
            .map(|id| self.nodes[id.0].depth)
            .max()
            .unwrap_or(0)
    }

    /// One URL per line, indented two spaces per level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for id in self.preorder() {
            let node = &self.nodes[id.0];
            out.push_str(&"  ".repeat(node.depth));
            out.push_str(node.url.as_str());
            out.push('\n');
        }
        out
    }

    fn serialize_node<S: Serializer>(&self, id: NodeId, serializer: S) -> Result<S::Ok, S::Error> {
        NodeView { tree: self, id }.serialize(serializer)
    }
}

struct NodeView<'a> {
    tree: &'a CrawlTree,
    id: NodeId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let children: Vec<NodeView<'_>> = node
            .children
            .iter()
            .map(|&id| NodeView {
                tree: self.tree,
                id,
            })
            .collect();

        let mut state = serializer.serialize_struct("CrawlNode", 3)?;
        state.serialize_field("url", &node.url)?;
        state.serialize_field("depth", &node.depth)?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

impl Serialize for CrawlTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.serialize_node(self.root(), serializer)
    }
}
