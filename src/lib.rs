//! Compendium – rules plumbing for a tabletop RPG virtual tabletop.
//!
//! Two self-contained engines live here:
//!
//! * a **filter engine** that evaluates declarative boolean filter
//!   descriptions against JSON records, used to narrow a compendium down to
//!   the entries a browser should show;
//! * a **choice engine** that keeps an AND/OR tree of options ("take A, or
//!   both B and C"), edits it without mutating anything in place, and walks
//!   a user through picking from it.
//!
//! ## Modules
//! * [`filter`] – [`filter::Filter`] descriptions, their wire format, and the
//!   [`filter::FilterEngine`] that evaluates them.
//! * [`compare`] – The comparison library (`exact`, `icontains`, `has`, `in`,
//!   `gte`, ...) behind filter leaves.
//! * [`locale`] – Locale-aware lowercasing for the case-insensitive comparisons.
//! * [`tree`] – The AND/OR [`tree::Node`] structure and its pure edits.
//! * [`choice`] – Option records and the [`choice::ChoiceModel`] edit API.
//! * [`decision`] – Compiled decision trees and the toggle state machine.
//! * [`resolve`] – Turning chosen options into documents through the host.
//! * [`settings`] – File and environment configuration.
//!
//! ## Quick Start
//! ```
//! use compendium::choice::ChoiceModel;
//! use compendium::filter::perform_check;
//! use serde_json::json;
//!
//! let spell = json!({"name": "Fireball", "type": "spell", "system": {"level": 3}});
//! let wanted = json!({"operator": "and", "value": [
//!     {"key": "type", "value": "spell"},
//!     {"key": "system.level", "value": 3, "operator": "lte"}]});
//! assert!(perform_check(&spell, &wanted).unwrap());
//!
//! let model = ChoiceModel::default()
//!     .add_option(&json!({"type": "placeholder", "name": "Anything"}), None)
//!     .unwrap();
//! assert_eq!(model.text_display(), "Anything");
//! assert_eq!(model.decision().selection().len(), 1);
//! ```

pub mod choice;
pub mod compare;
pub mod decision;
pub mod error;
pub mod filter;
pub mod locale;
pub mod resolve;
pub mod settings;
pub mod tree;

pub use error::{CompendiumError, Result};
