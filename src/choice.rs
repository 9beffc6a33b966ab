//! Choice structures: a set of options plus the AND/OR tree deciding which
//! combinations of them may be taken.
//!
//! [`ChoiceModel`] never changes itself. Each edit returns the new
//! `options`/`structure` for the caller to persist; the caller rebuilds the
//! model from what it stored.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{CompendiumError, Result};
use crate::filter::Filter;
use crate::tree::{random_id, Node, NodeKind, ROOT};

lazy_static! {
    // Document uuids are dot separated, e.g. "Compendium.core.items.Item.abc123"
    // or "Actor.x1y2.Item.z3".
    static ref DOCUMENT_UUID: Regex = Regex::new(r"^[A-Za-z][\w-]*(\.[\w-]+)+$").unwrap();
}

/// How a document option locates its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    #[default]
    Uuid,
    /// Relative to the document that owns the choice.
    Relative,
}

/// An absolute or parent-relative document reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef<'a> {
    Uuid(&'a str),
    Relative(&'a str),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentOption {
    #[serde(rename = "documentUuid", default, skip_serializing_if = "Option::is_none")]
    pub document_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<String>,
    #[serde(rename = "idType", default)]
    pub id_type: IdType,
    /// Overlay merged onto the resolved document.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub diff: Map<String, Value>,
}

impl DocumentOption {
    pub fn reference(&self) -> Option<DocumentRef<'_>> {
        match (self.id_type, &self.relative, &self.document_uuid) {
            (IdType::Relative, Some(path), _) => Some(DocumentRef::Relative(path)),
            (_, _, Some(uuid)) => Some(DocumentRef::Uuid(uuid)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
    Item(DocumentOption),
    Effect(DocumentOption),
    /// Resolved by letting the user pick a document matching `filters`.
    Filter {
        #[serde(default)]
        filters: Vec<Filter>,
    },
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: OptionKind,
}

impl ChoiceOption {
    pub fn document(&self) -> Option<&DocumentOption> {
        match &self.kind {
            OptionKind::Item(doc) | OptionKind::Effect(doc) => Some(doc),
            _ => None,
        }
    }
}

/// What `add_option` should create, read from untyped drop data.
enum NewEntry {
    Option(ChoiceOption),
    Group(NodeKind),
}

// `Ok(None)` for data that describes nothing we can add. A filter option
// whose sub-filters do not parse is an error of its own.
fn classify(data: &Value) -> Result<Option<NewEntry>> {
    let Some(fields) = data.as_object() else {
        return Ok(None);
    };
    let text = |key: &str| fields.get(key).and_then(Value::as_str);
    let name = text("name");

    let document = match (text("documentName"), text("type")) {
        (Some("Item"), _) | (None, Some("item" | "Item")) => Some(true),
        (Some("ActiveEffect"), _) | (None, Some("effect" | "ActiveEffect")) => Some(false),
        _ => None,
    };
    if let Some(is_item) = document {
        let Some(uuid) = text("uuid").or_else(|| text("documentUuid")) else {
            return Ok(None);
        };
        if !DOCUMENT_UUID.is_match(uuid) {
            return Ok(None);
        }
        let relative = text("relative").map(str::to_string);
        let doc = DocumentOption {
            document_uuid: Some(uuid.to_string()),
            id_type: if relative.is_some() { IdType::Relative } else { IdType::Uuid },
            relative,
            diff: Map::new(),
        };
        return Ok(Some(NewEntry::Option(ChoiceOption {
            id: random_id(),
            name: name.unwrap_or(uuid).to_string(),
            kind: if is_item { OptionKind::Item(doc) } else { OptionKind::Effect(doc) },
        })));
    }

    let entry = match text("type") {
        Some("filter") => {
            let filters = match fields.get("filters") {
                Some(Value::Array(items)) => items.iter().map(Filter::parse).collect::<Result<Vec<_>>>()?,
                Some(single) => vec![Filter::parse(single)?],
                None => Vec::new(),
            };
            NewEntry::Option(ChoiceOption {
                id: random_id(),
                name: name.unwrap_or("Filter").to_string(),
                kind: OptionKind::Filter { filters },
            })
        }
        Some("placeholder") => NewEntry::Option(ChoiceOption {
            id: random_id(),
            name: name.unwrap_or("Placeholder").to_string(),
            kind: OptionKind::Placeholder,
        }),
        Some("and") => NewEntry::Group(NodeKind::And),
        Some("or") => NewEntry::Group(NodeKind::Or),
        _ => return Ok(None),
    };
    Ok(Some(entry))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoiceModel {
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub structure: Node,
}

impl ChoiceModel {
    pub fn new(options: Vec<ChoiceOption>, structure: Node) -> Self {
        Self { options, structure }
    }

    pub fn from_value(raw: Value) -> Result<Self> {
        Ok(serde_json::from_value(raw)?)
    }

    pub fn option(&self, id: &str) -> Option<&ChoiceOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        self.structure.find(id)
    }

    pub fn find_parent(&self, id: &str) -> Option<&Node> {
        self.structure.find_parent(id)
    }

    pub fn insert(&self, node: Node, target: Option<&str>) -> Node {
        self.structure.insert(node, target.unwrap_or(ROOT))
    }

    pub fn remove(&self, id: &str) -> Node {
        self.structure.remove(id)
    }

    pub fn move_node(&self, id: &str, dest: Option<&str>) -> Node {
        self.structure.move_node(id, dest.unwrap_or(ROOT))
    }

    pub fn switch(&self, id: Option<&str>) -> Node {
        self.structure.switch(id.unwrap_or(ROOT))
    }

    pub fn edit(&self, id: &str, patch: &Map<String, Value>) -> Result<Node> {
        self.structure.edit(id, patch)
    }

    pub fn clean_structure(structure: &Node) -> Node {
        structure.clean_structure()
    }

    /// Register an option built from `data` and place its leaf under
    /// `target`. `{"type": "and" | "or"}` adds an empty group instead; it is
    /// placed without normalization so that it survives until filled.
    ///
    /// Data that describes no option is `UnrecognizedOption`; a filter
    /// option with a malformed sub-filter reports the parse error.
    pub fn add_option(&self, data: &Value, target: Option<&str>) -> Result<ChoiceModel> {
        let target = target.unwrap_or(ROOT);
        let entry = classify(data).inspect_err(|e| warn!(%e, "option data carries an invalid filter"))?;
        match entry {
            Some(NewEntry::Option(option)) => {
                debug!(id = %option.id, name = %option.name, "add option");
                let structure = self.structure.insert(Node::option(option.id.clone()), target);
                let mut options = self.options.clone();
                options.push(option);
                Ok(ChoiceModel { options, structure })
            }
            Some(NewEntry::Group(kind)) => {
                let id = random_id();
                let group = match kind {
                    NodeKind::Or => Node::or(id, Vec::new()),
                    _ => Node::and(id, Vec::new()),
                };
                Ok(ChoiceModel {
                    options: self.options.clone(),
                    structure: self.structure.insert_unclean(group, target),
                })
            }
            None => {
                warn!(%data, "cannot create a choice option from this data");
                Err(CompendiumError::UnrecognizedOption(data.to_string()))
            }
        }
    }

    /// Drop the option record `id` and its leaf.
    pub fn delete_option(&self, id: &str) -> ChoiceModel {
        ChoiceModel {
            options: self.options.iter().filter(|o| o.id != id).cloned().collect(),
            structure: self.structure.remove(id),
        }
    }

    /// Shallow-merge `patch` into the option record `id`.
    pub fn edit_option(&self, id: &str, patch: &Map<String, Value>) -> Result<Vec<ChoiceOption>> {
        let mut options = self.options.clone();
        let option = options
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| CompendiumError::NotFound(format!("option {id}")))?;
        let mut raw = serde_json::to_value(&*option)?;
        if let Value::Object(fields) = &mut raw {
            fields.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let edited: ChoiceOption = serde_json::from_value(raw)?;
        if edited.id != id {
            return Err(CompendiumError::Invariant(format!("option {id} cannot change its id")));
        }
        *option = edited;
        Ok(options)
    }

    /// The structure as text: `", "` joins AND, `" OR "` joins OR, and
    /// nested groups are parenthesized.
    pub fn text_display(&self) -> String {
        self.render(&self.structure, true)
    }

    fn render(&self, node: &Node, top: bool) -> String {
        let separator = match node.kind() {
            NodeKind::Option => {
                return self
                    .option(node.id())
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| node.id().to_string());
            }
            NodeKind::And => ", ",
            NodeKind::Or => " OR ",
        };
        let inner = node
            .children()
            .iter()
            .map(|c| self.render(c, false))
            .collect::<Vec<_>>()
            .join(separator);
        if top { inner } else { format!("({inner})") }
    }

    /// Check that the root is a group called `root`, option ids are unique
    /// and every leaf refers to exactly one option.
    pub fn validate(&self) -> Result<()> {
        if self.structure.id() != ROOT || !self.structure.is_group() {
            return Err(CompendiumError::Invariant(format!(
                "structure must be rooted at a group with id {ROOT}"
            )));
        }
        let mut ids = HashSet::new();
        for option in &self.options {
            if !ids.insert(option.id.as_str()) {
                return Err(CompendiumError::Invariant(format!("duplicate option id {}", option.id)));
            }
        }
        for leaf in self.structure.leaves() {
            if !ids.contains(leaf) {
                return Err(CompendiumError::Invariant(format!("dangling option reference {leaf}")));
            }
        }
        Ok(())
    }
}
