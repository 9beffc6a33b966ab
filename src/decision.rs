//! Interactive resolution of a choice.
//!
//! [`ChoiceModel::compile_tree`] produces an ephemeral copy of the structure
//! with each leaf carrying its option record. A [`Decision`] wraps that copy
//! and tracks which leaves the user has taken:
//!
//! * choosing a leaf of an OR group invalidates (and unchooses) every leaf in
//!   the other branches of that group; unchoosing it lifts the invalidation;
//! * the leaves directly inside an AND group are chosen or dropped together.

use serde::Serialize;
use tracing::debug;

use crate::choice::{ChoiceModel, ChoiceOption};
use crate::tree::{Node, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChoiceOption>,
    pub chosen: bool,
    pub invalid: bool,
    pub options: Vec<DecisionNode>,
}

impl DecisionNode {
    fn compile(node: &Node, model: &ChoiceModel) -> Self {
        Self {
            id: node.id().to_string(),
            kind: node.kind(),
            content: match node.kind() {
                NodeKind::Option => model.option(node.id()).cloned(),
                _ => None,
            },
            chosen: false,
            invalid: false,
            options: node.children().iter().map(|c| Self::compile(c, model)).collect(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Option
    }

    pub fn find(&self, id: &str) -> Option<&DecisionNode> {
        if self.id == id {
            return Some(self);
        }
        self.options.iter().find_map(|c| c.find(id))
    }

    fn parent_mut(&mut self, id: &str) -> Option<&mut DecisionNode> {
        if self.options.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.options.iter_mut().find_map(|c| c.parent_mut(id))
    }

    fn leaf_count(&self) -> usize {
        if self.is_leaf() { 1 } else { self.options.iter().map(Self::leaf_count).sum() }
    }

    fn for_each_leaf_mut(&mut self, f: &mut impl FnMut(&mut DecisionNode)) {
        if self.is_leaf() {
            f(self);
        } else {
            self.options.iter_mut().for_each(|c| c.for_each_leaf_mut(f));
        }
    }

    // Leaves reached through AND groups only start out chosen.
    fn preselect(&mut self, and_chain: bool) {
        let and_chain = and_chain && self.kind == NodeKind::And;
        for child in &mut self.options {
            if child.is_leaf() {
                child.chosen = and_chain;
            } else {
                child.preselect(and_chain);
            }
        }
    }

    fn collect_chosen(&self, out: &mut Vec<String>) {
        if self.is_leaf() {
            if self.chosen {
                out.push(self.id.clone());
            }
        } else {
            self.options.iter().for_each(|c| c.collect_chosen(out));
        }
    }
}

impl ChoiceModel {
    /// Copy of the structure with each leaf's option record embedded.
    pub fn compile_tree(&self) -> DecisionNode {
        DecisionNode::compile(&self.structure, self)
    }

    /// A decision over this model in its initial state.
    pub fn decision(&self) -> Decision {
        Decision::new(self.compile_tree())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    tree: DecisionNode,
}

impl Decision {
    /// Start a decision over a compiled tree. A lone leaf is chosen outright;
    /// otherwise leaves whose every ancestor is an AND group are.
    pub fn new(mut tree: DecisionNode) -> Self {
        if tree.leaf_count() == 1 {
            tree.for_each_leaf_mut(&mut |leaf| leaf.chosen = true);
        } else {
            tree.preselect(true);
        }
        Self { tree }
    }

    pub fn tree(&self) -> &DecisionNode {
        &self.tree
    }

    pub fn is_chosen(&self, id: &str) -> bool {
        self.tree.find(id).is_some_and(|n| n.chosen)
    }

    pub fn is_invalid(&self, id: &str) -> bool {
        self.tree.find(id).is_some_and(|n| n.invalid)
    }

    /// Flip the leaf `id`. Returns false, changing nothing, when `id` is not
    /// a leaf below a group or the leaf is currently invalid.
    pub fn toggle(&mut self, id: &str) -> bool {
        let Some(parent) = self.tree.parent_mut(id) else {
            return false;
        };
        let Some(index) = parent.options.iter().position(|c| c.id == id && c.is_leaf()) else {
            return false;
        };
        if parent.options[index].invalid {
            return false;
        }
        let chosen = !parent.options[index].chosen;
        parent.options[index].chosen = chosen;
        debug!(id, chosen, group = ?parent.kind, "toggle");

        match parent.kind {
            NodeKind::Or => {
                for (i, sibling) in parent.options.iter_mut().enumerate() {
                    if i == index {
                        continue;
                    }
                    sibling.for_each_leaf_mut(&mut |leaf| {
                        leaf.invalid = chosen;
                        if chosen {
                            leaf.chosen = false;
                        }
                    });
                }
            }
            NodeKind::And => {
                for sibling in parent.options.iter_mut().filter(|c| c.is_leaf() && !c.invalid) {
                    sibling.chosen = chosen;
                }
            }
            NodeKind::Option => {}
        }
        true
    }

    /// Option ids of the chosen leaves, in tree order.
    pub fn selection(&self) -> Vec<String> {
        let mut chosen = Vec::new();
        self.tree.collect_chosen(&mut chosen);
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ROOT;
    use serde_json::json;

    fn model(structure: Node, ids: &[&str]) -> ChoiceModel {
        let options = ids
            .iter()
            .map(|id| serde_json::from_value(json!({"id": id, "name": id, "type": "placeholder"})).unwrap())
            .collect();
        ChoiceModel::new(options, structure)
    }

    #[test]
    fn compile_embeds_option_records() {
        let m = model(Node::or(ROOT, vec![Node::option("A"), Node::option("B")]), &["A", "B"]);
        let tree = m.compile_tree();
        assert!(tree.content.is_none());
        assert_eq!(tree.options[1].content.as_ref().map(|o| o.name.as_str()), Some("B"));
        assert_eq!(m.structure, Node::or(ROOT, vec![Node::option("A"), Node::option("B")]));
    }

    #[test]
    fn or_ancestor_disqualifies_preselection() {
        let structure = Node::and(
            ROOT,
            vec![
                Node::option("A"),
                Node::or("o", vec![Node::option("B"), Node::and("g", vec![Node::option("C"), Node::option("D")])]),
            ],
        );
        let decision = model(structure, &["A", "B", "C", "D"]).decision();
        assert!(decision.is_chosen("A"));
        assert!(!decision.is_chosen("B"));
        assert!(!decision.is_chosen("C"));
        assert!(!decision.is_chosen("D"));
    }

    #[test]
    fn or_choice_invalidates_whole_sibling_subtrees() {
        let structure = Node::or(
            ROOT,
            vec![Node::option("A"), Node::and("g", vec![Node::option("B"), Node::option("C")])],
        );
        let mut decision = model(structure, &["A", "B", "C"]).decision();
        assert!(decision.toggle("A"));
        assert!(decision.is_invalid("B") && decision.is_invalid("C"));
        assert!(!decision.toggle("B"), "invalid leaves cannot be toggled");
        assert!(decision.toggle("A"));
        assert!(!decision.is_invalid("B"));
        assert!(decision.toggle("B"));
        assert!(decision.is_chosen("C"), "AND siblings follow");
        assert_eq!(decision.selection(), vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn groups_are_not_toggled() {
        let structure = Node::or(ROOT, vec![Node::option("A"), Node::and("g", vec![Node::option("B"), Node::option("C")])]);
        let mut decision = model(structure, &["A", "B", "C"]).decision();
        assert!(!decision.toggle("g"));
        assert!(!decision.toggle(ROOT));
        assert!(!decision.toggle("missing"));
    }
}
