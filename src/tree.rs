//! The AND/OR structure of a choice.
//!
//! Every operation here is pure: it reads `self` and hands back a new tree.
//! Structural edits finish with [`Node::clean_structure`], so no group is
//! left empty or holding a single child, except the root, which keeps its
//! id and is never replaced.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CompendiumError, Result};

pub const ROOT: &str = "root";

/// Fresh 16 character id, the shape the host uses for its own ids.
pub fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Option,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Leaf referring to an option record by id.
    Option { id: String },
    And {
        id: String,
        #[serde(default)]
        options: Vec<Node>,
    },
    Or {
        id: String,
        #[serde(default)]
        options: Vec<Node>,
    },
}

impl Default for Node {
    fn default() -> Self {
        Node::root()
    }
}

impl Node {
    /// An empty root.
    pub fn root() -> Self {
        Node::And { id: ROOT.to_string(), options: Vec::new() }
    }

    pub fn option(id: impl Into<String>) -> Self {
        Node::Option { id: id.into() }
    }

    pub fn and(id: impl Into<String>, options: Vec<Node>) -> Self {
        Node::And { id: id.into(), options }
    }

    pub fn or(id: impl Into<String>, options: Vec<Node>) -> Self {
        Node::Or { id: id.into(), options }
    }

    pub fn id(&self) -> &str {
        match self {
            Node::Option { id } | Node::And { id, .. } | Node::Or { id, .. } => id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Option { .. } => NodeKind::Option,
            Node::And { .. } => NodeKind::And,
            Node::Or { .. } => NodeKind::Or,
        }
    }

    pub fn is_group(&self) -> bool {
        !matches!(self, Node::Option { .. })
    }

    /// Child nodes; empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Option { .. } => &[],
            Node::And { options, .. } | Node::Or { options, .. } => options,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Option { .. } => None,
            Node::And { options, .. } | Node::Or { options, .. } => Some(options),
        }
    }

    /// Depth-first search by id, `self` included.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id() == id {
            return Some(self);
        }
        self.children_mut()?.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// The group whose direct children include `id`.
    pub fn find_parent(&self, id: &str) -> Option<&Node> {
        if self.children().iter().any(|c| c.id() == id) {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find_parent(id))
    }

    /// Option ids of every leaf, in tree order.
    pub fn leaves(&self) -> Vec<&str> {
        match self {
            Node::Option { id } => vec![id.as_str()],
            _ => self.children().iter().flat_map(Node::leaves).collect(),
        }
    }

    /// Insert `node` under `target` (the root when `target` is missing).
    /// Dropping onto a leaf replaces the leaf with a new AND group holding
    /// the leaf and `node`.
    pub fn insert(&self, node: Node, target: &str) -> Node {
        self.insert_unclean(node, target).clean_structure()
    }

    pub(crate) fn insert_unclean(&self, node: Node, target: &str) -> Node {
        let mut tree = self.clone();
        let target = if tree.find(target).is_some() { target.to_string() } else { tree.id().to_string() };
        debug!(node = node.id(), target = %target, "insert");
        if let Some(slot) = tree.find_mut(&target) {
            if let Some(children) = slot.children_mut() {
                children.push(node);
            } else {
                let leaf = std::mem::replace(slot, Node::and(random_id(), Vec::new()));
                if let Some(children) = slot.children_mut() {
                    children.extend([leaf, node]);
                }
            }
        }
        tree
    }

    /// Remove every node with `id`, subtree included. The root stays.
    pub fn remove(&self, id: &str) -> Node {
        if id == self.id() {
            return self.clone();
        }
        debug!(id, "remove");
        self.without(id).clean_structure()
    }

    fn without(&self, id: &str) -> Node {
        let mut tree = self.clone();
        tree.strip(id);
        tree
    }

    fn strip(&mut self, id: &str) {
        if let Some(children) = self.children_mut() {
            children.retain(|c| c.id() != id);
            children.iter_mut().for_each(|c| c.strip(id));
        }
    }

    /// Move the leaf `id` under `dest`. Groups do not move.
    pub fn move_node(&self, id: &str, dest: &str) -> Node {
        if id == dest {
            return self.clone();
        }
        match self.find(id) {
            Some(node @ Node::Option { .. }) => {
                debug!(id, dest, "move");
                self.without(id).insert(node.clone(), dest)
            }
            _ => self.clone(),
        }
    }

    /// Toggle the connective of the group `id` between AND and OR.
    pub fn switch(&self, id: &str) -> Node {
        let mut tree = self.clone();
        if let Some(node) = tree.find_mut(id) {
            let switched = match std::mem::replace(node, Node::option(String::new())) {
                Node::And { id, options } => Node::Or { id, options },
                Node::Or { id, options } => Node::And { id, options },
                leaf => leaf,
            };
            *node = switched;
        }
        tree
    }

    /// Shallow-merge `patch` into the node `id`.
    pub fn edit(&self, id: &str, patch: &Map<String, Value>) -> Result<Node> {
        let mut tree = self.clone();
        let root_id = tree.id().to_string();
        let node = tree
            .find_mut(id)
            .ok_or_else(|| CompendiumError::NotFound(format!("structure node {id}")))?;
        let mut raw = serde_json::to_value(&*node)?;
        if let Value::Object(fields) = &mut raw {
            fields.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let edited: Node = serde_json::from_value(raw)?;
        if id == root_id && (edited.id() != root_id || !edited.is_group()) {
            return Err(CompendiumError::Invariant("the root must stay a group with a fixed id".into()));
        }
        *node = edited;
        Ok(tree)
    }

    /// Hoist singleton groups into their parent's place and drop empty
    /// ones. The root keeps its id; when it is left holding a single group
    /// it takes over that group's connective and children.
    pub fn clean_structure(&self) -> Node {
        let mut root = self.clone();
        if let Some(children) = root.children_mut() {
            let cleaned: Vec<Node> = children.iter().filter_map(Node::cleaned).collect();
            *children = cleaned;
        }
        let adopted = match root.children() {
            [only] if only.is_group() => Some(only.clone()),
            _ => None,
        };
        if let Some(group) = adopted {
            let id = root.id().to_string();
            root = match group {
                Node::And { options, .. } => Node::And { id, options },
                Node::Or { options, .. } => Node::Or { id, options },
                leaf => leaf,
            };
        }
        root
    }

    fn cleaned(&self) -> Option<Node> {
        let children = match self {
            Node::Option { .. } => return Some(self.clone()),
            Node::And { options, .. } | Node::Or { options, .. } => options,
        };
        let mut kept: Vec<Node> = children.iter().filter_map(Node::cleaned).collect();
        match kept.len() {
            0 => None,
            1 => kept.pop(),
            _ => Some(match self.kind() {
                NodeKind::And => Node::and(self.id(), kept),
                _ => Node::or(self.id(), kept),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::or(
            ROOT,
            vec![
                Node::option("A"),
                Node::and("g1", vec![Node::option("B"), Node::option("C")]),
            ],
        )
    }

    #[test]
    fn find_and_parent() {
        let tree = sample();
        assert_eq!(tree.find("C"), Some(&Node::option("C")));
        assert_eq!(tree.find_parent("C").map(Node::id), Some("g1"));
        assert_eq!(tree.find_parent("A").map(Node::id), Some(ROOT));
        assert!(tree.find("Z").is_none());
        assert!(tree.find_parent(ROOT).is_none());
    }

    #[test]
    fn random_ids_are_alphanumeric() {
        let id = random_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, random_id());
    }

    #[test]
    fn insert_into_group_appends() {
        let tree = sample().insert(Node::option("D"), "g1");
        assert_eq!(tree.find("g1").unwrap().children().len(), 3);
        assert_eq!(tree.find_parent("D").map(Node::id), Some("g1"));
    }

    #[test]
    fn insert_onto_nested_leaf_wraps_it() {
        let tree = sample().insert(Node::option("D"), "B");
        let parent = tree.find_parent("D").unwrap();
        assert_eq!(parent.kind(), NodeKind::And);
        assert_eq!(parent.leaves(), vec!["B", "D"]);
        assert_eq!(tree.find_parent(parent.id()).map(Node::id), Some("g1"));
    }

    #[test]
    fn insert_into_missing_target_falls_back_to_root() {
        let tree = sample().insert(Node::option("D"), "nowhere");
        assert_eq!(tree.find_parent("D").map(Node::id), Some(ROOT));
    }

    #[test]
    fn remove_root_is_noop() {
        assert_eq!(sample().remove(ROOT), sample());
    }

    #[test]
    fn remove_hoists_singleton_group() {
        let tree = sample().remove("C");
        assert_eq!(tree, Node::or(ROOT, vec![Node::option("A"), Node::option("B")]));
    }

    #[test]
    fn move_only_moves_leaves() {
        let tree = sample();
        assert_eq!(tree.move_node("g1", ROOT), tree);
        assert_eq!(tree.move_node("A", "A"), tree);
        let moved = tree.move_node("A", "g1");
        assert_eq!(moved, Node::and(ROOT, vec![Node::option("B"), Node::option("C"), Node::option("A")]));
    }

    #[test]
    fn switch_toggles_groups_only() {
        let tree = sample().switch(ROOT);
        assert_eq!(tree.kind(), NodeKind::And);
        assert_eq!(tree.switch(ROOT).kind(), NodeKind::Or);
        assert_eq!(sample().switch("A"), sample());
    }

    #[test]
    fn edit_merges_fields() {
        let mut patch = Map::new();
        patch.insert("type".into(), Value::from("or"));
        let tree = sample().edit("g1", &patch).unwrap();
        assert_eq!(tree.find("g1").unwrap().kind(), NodeKind::Or);
        assert!(matches!(sample().edit("nope", &patch), Err(CompendiumError::NotFound(_))));

        let mut patch = Map::new();
        patch.insert("type".into(), Value::from("option"));
        assert!(matches!(sample().edit(ROOT, &patch), Err(CompendiumError::Invariant(_))));
    }

    #[test]
    fn clean_drops_empty_groups() {
        let tree = Node::and(
            ROOT,
            vec![
                Node::option("A"),
                Node::or("empty", vec![]),
                Node::or("nested", vec![Node::and("inner", vec![])]),
                Node::option("B"),
            ],
        );
        assert_eq!(tree.clean_structure(), Node::and(ROOT, vec![Node::option("A"), Node::option("B")]));
    }

    #[test]
    fn clean_keeps_empty_root() {
        assert_eq!(Node::root().clean_structure(), Node::root());
    }
}
