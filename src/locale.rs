//! Locale-aware case folding for the case-insensitive comparisons.
//!
//! The filter engine never consults ambient state; callers hand a [`Locale`]
//! to [`crate::filter::FilterEngine`] and every `i*` comparison lowercases
//! through it.

use std::fmt;

/// A BCP-47 style language tag, reduced to what case folding needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    tag: String,
}

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Primary language subtag, lowercased (`"tr"` for `"tr-TR"`).
    fn language(&self) -> String {
        self.tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    // Turkish and Azeri distinguish dotted and dotless i.
    fn dotted_i(&self) -> bool {
        matches!(self.language().as_str(), "tr" | "az")
    }

    /// Lowercase `s` under this locale's rules.
    pub fn to_lowercase(&self, s: &str) -> String {
        if !self.dotted_i() {
            return s.to_lowercase();
        }
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                'I' => {
                    // I followed by a combining dot above folds to plain i
                    if chars.peek() == Some(&'\u{0307}') {
                        chars.next();
                        out.push('i');
                    } else {
                        out.push('ı');
                    }
                }
                'İ' => out.push('i'),
                _ => out.extend(c.to_lowercase()),
            }
        }
        out
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_locale_lowercases_unicode() {
        let locale = Locale::default();
        assert_eq!(locale.to_lowercase("HELLO Wörld"), "hello wörld");
        assert_eq!(locale.to_lowercase("I"), "i");
    }

    #[test]
    fn turkish_dotless_i() {
        let locale = Locale::new("tr-TR");
        assert_eq!(locale.to_lowercase("I"), "ı");
        assert_eq!(locale.to_lowercase("İSTANBUL"), "istanbul");
        assert_eq!(locale.to_lowercase("I\u{0307}"), "i");
    }
}
