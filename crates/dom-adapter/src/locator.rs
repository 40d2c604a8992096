//! Locator model shared by the engine and DOM backends

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a locator value is interpreted when searching the document.
///
/// `Text` means exact trimmed text-content equality; `Contains` means
/// substring match. Both are evaluated by scanning every element in document
/// order rather than through native text-selector APIs, so they are O(n) over
/// the whole document per lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// CSS selector
    Css,

    /// XPath expression
    Xpath,

    /// `id` attribute equality
    Id,

    /// Class-list membership
    ClassName,

    /// Tag name equality
    TagName,

    /// Exact trimmed text content
    Text,

    /// Text content substring
    Contains,
}

impl Strategy {
    /// Stable lowercase name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Css => "css",
            Strategy::Xpath => "xpath",
            Strategy::Id => "id",
            Strategy::ClassName => "className",
            Strategy::TagName => "tagName",
            Strategy::Text => "text",
            Strategy::Contains => "contains",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A (strategy, value) pair identifying how to find one or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// CSS selector locator.
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::Css, value)
    }

    /// XPath locator.
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::Xpath, value)
    }

    /// `id` attribute locator.
    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    /// Class-name locator.
    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, value)
    }

    /// Tag-name locator.
    pub fn tag_name(value: impl Into<String>) -> Self {
        Self::new(Strategy::TagName, value)
    }

    /// Exact-text locator.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(Strategy::Text, value)
    }

    /// Substring-text locator.
    pub fn contains(value: impl Into<String>) -> Self {
        Self::new(Strategy::Contains, value)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_serde_uses_camel_case() {
        let locator: Locator =
            serde_json::from_str(r#"{"strategy":"className","value":"item"}"#).unwrap();
        assert_eq!(locator.strategy, Strategy::ClassName);
        assert_eq!(locator.value, "item");

        let json = serde_json::to_string(&Locator::tag_name("button")).unwrap();
        assert!(json.contains(r#""tagName""#));
    }

    #[test]
    fn display_names_strategy_and_value() {
        assert_eq!(Locator::css(".item").to_string(), "css:.item");
        assert_eq!(Locator::contains("Add to").to_string(), "contains:Add to");
    }
}
