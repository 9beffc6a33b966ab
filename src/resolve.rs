//! Turning chosen options into documents.
//!
//! Document lookup and interactive picking belong to the host, reached
//! through [`DocumentSource`]. Its calls may wait on the user for as long as
//! they like; nothing here cancels them, and their errors reach the caller
//! unchanged.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::choice::{ChoiceModel, ChoiceOption, DocumentRef, OptionKind};
use crate::decision::Decision;
use crate::error::{CompendiumError, Result};
use crate::filter::Filter;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch a document by absolute uuid.
    async fn from_uuid(&self, uuid: &str) -> Result<Option<Value>>;
    /// Fetch a document by a path relative to `parent`.
    async fn from_relative(&self, parent: &Value, path: &str) -> Result<Option<Value>>;
    /// Let the user pick up to `count` documents matching `filters`.
    async fn pick(&self, filters: &[Filter], count: usize) -> Result<Vec<Value>>;
}

/// Presents a decision to the user and hands it back once submitted.
#[async_trait]
pub trait DecisionPrompt: Send + Sync {
    async fn decide(&self, decision: Decision) -> Result<Decision>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Document(Value),
    /// Stand-in for an option with nothing behind it yet.
    Placeholder(ChoiceOption),
}

/// Merge `overlay` into `target`. Nested objects merge key by key, anything
/// else in the overlay wins. Dotted overlay keys address nested fields.
pub fn merge_object(target: &mut Value, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        let path: Vec<&str> = key.split('.').collect();
        merge_path(target, &path, value);
    }
}

fn merge_path(target: &mut Value, path: &[&str], value: &Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(fields) = target else { return };
    match path {
        [] => {}
        [last] => {
            let merged = match (fields.get_mut(*last), value) {
                (Some(existing), Value::Object(nested)) if existing.is_object() => {
                    merge_object(existing, nested);
                    true
                }
                _ => false,
            };
            if !merged {
                fields.insert(last.to_string(), value.clone());
            }
        }
        [head, rest @ ..] => {
            let slot = fields.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new()));
            merge_path(slot, rest, value);
        }
    }
}

impl ChoiceModel {
    /// Resolve the option `option_id` into something usable.
    ///
    /// Filter options ask `source` to let the user pick one matching
    /// document, falling back to a placeholder when nothing is picked.
    /// Document options are fetched by uuid, or relative to `parent`, and
    /// get their stored diff applied when `include_diff` is set.
    pub async fn get_option_document(
        &self,
        option_id: &str,
        parent: Option<&Value>,
        include_diff: bool,
        source: &dyn DocumentSource,
    ) -> Result<Resolved> {
        let option = self
            .option(option_id)
            .ok_or_else(|| CompendiumError::NotFound(format!("option {option_id}")))?;

        let doc = match &option.kind {
            OptionKind::Placeholder => return Ok(Resolved::Placeholder(option.clone())),
            OptionKind::Filter { filters } => {
                let picked = source.pick(filters, 1).await?;
                return Ok(match picked.into_iter().next() {
                    Some(document) => Resolved::Document(document),
                    None => {
                        debug!(option_id, "nothing picked, using placeholder");
                        Resolved::Placeholder(option.clone())
                    }
                });
            }
            OptionKind::Item(doc) | OptionKind::Effect(doc) => doc,
        };

        let found = match (doc.reference(), parent) {
            (Some(DocumentRef::Relative(path)), Some(parent)) => source.from_relative(parent, path).await?,
            (Some(DocumentRef::Relative(path)), None) => match &doc.document_uuid {
                Some(uuid) => source.from_uuid(uuid).await?,
                None => {
                    return Err(CompendiumError::Document(format!(
                        "relative reference {path} needs a parent document"
                    )));
                }
            },
            (Some(DocumentRef::Uuid(uuid)), _) => source.from_uuid(uuid).await?,
            (None, _) => {
                return Err(CompendiumError::Document(format!("option {option_id} has no document reference")));
            }
        };
        let mut document =
            found.ok_or_else(|| CompendiumError::NotFound(format!("document for option {option_id}")))?;
        if include_diff && !doc.diff.is_empty() {
            merge_object(&mut document, &doc.diff);
        }
        Ok(Resolved::Document(document))
    }

    /// Resolve every chosen leaf of a finished decision, in tree order.
    pub async fn resolve_selection(
        &self,
        decision: &Decision,
        parent: Option<&Value>,
        source: &dyn DocumentSource,
    ) -> Result<Vec<Resolved>> {
        let mut resolved = Vec::new();
        for id in decision.selection() {
            resolved.push(self.get_option_document(&id, parent, true, source).await?);
        }
        Ok(resolved)
    }

    /// Run the whole choice: present the decision, then resolve what was
    /// chosen. A model without options resolves to nothing and never
    /// reaches the prompt.
    pub async fn decide(
        &self,
        prompt: &dyn DecisionPrompt,
        parent: Option<&Value>,
        source: &dyn DocumentSource,
    ) -> Result<Vec<Resolved>> {
        if self.options.is_empty() {
            return Ok(Vec::new());
        }
        let decision = prompt.decide(self.decision()).await?;
        let resolved = self.resolve_selection(&decision, parent, source).await?;
        info!(chosen = resolved.len(), "choice resolved");
        Ok(resolved)
    }
}
