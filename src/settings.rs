//! Runtime settings.
//!
//! Read from an optional `compendium.toml` (or the file given explicitly),
//! then overridden by `COMPENDIUM_*` environment variables, e.g.
//! `COMPENDIUM_LOCALE=tr`.

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::filter::FilterEngine;
use crate::locale::Locale;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Language tag used by the case-insensitive comparisons.
    pub locale: String,
    /// `tracing` filter directive for the binary.
    pub log: String,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name("compendium").required(false),
        };
        let settings = Config::builder()
            .set_default("locale", "en")?
            .set_default("log", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix("COMPENDIUM"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn locale(&self) -> Locale {
        Locale::new(self.locale.clone())
    }

    pub fn engine(&self) -> FilterEngine {
        FilterEngine::new(self.locale())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { locale: "en".to_string(), log: "info".to_string() }
    }
}
