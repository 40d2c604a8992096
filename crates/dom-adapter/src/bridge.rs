//! DOM bridge trait
//!
//! The capability surface the workflow engine consumes from its environment.
//! An implementation wraps whatever actually owns the document: the in-memory
//! backend in this crate, or the in-page content-script glue in production.

use crate::{DomError, ElementHandle, Locator};
use async_trait::async_trait;

/// DOM query and mutation primitives.
///
/// Resolution contract:
/// - [`resolve_one`](DomBridge::resolve_one) returns the first match in
///   document order and fails with [`DomError::NotFound`] when nothing matches.
/// - [`resolve_all`](DomBridge::resolve_all) returns every match in document
///   order; no match is `Ok(vec![])`, never an error. Callers check length.
/// - [`query_within`](DomBridge::query_within) evaluates a bare CSS selector
///   scoped to a parent element's descendants, for parent-scoped lookups.
///
/// Mutation primitives carry the event semantics the engine relies on: input
/// dispatches input/change, set_checked dispatches change, click is a trusted
/// click on the node itself.
#[async_trait]
pub trait DomBridge: Send + Sync {
    /// Resolve a locator to a single element.
    async fn resolve_one(&self, locator: &Locator) -> Result<ElementHandle, DomError>;

    /// Resolve a locator to all matching elements in document order.
    async fn resolve_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DomError>;

    /// Evaluate a CSS selector among a parent element's descendants.
    async fn query_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DomError>;

    /// Dispatch a click on the element.
    async fn click(&self, element: &ElementHandle) -> Result<(), DomError>;

    /// Set the element's value, optionally clearing it first, dispatching
    /// input and change events.
    async fn set_value(
        &self,
        element: &ElementHandle,
        text: &str,
        clear_first: bool,
    ) -> Result<(), DomError>;

    /// Set the checked state, dispatching change.
    async fn set_checked(&self, element: &ElementHandle, checked: bool) -> Result<(), DomError>;

    /// Read the checked state.
    async fn is_checked(&self, element: &ElementHandle) -> Result<bool, DomError>;

    /// Select a dropdown option by option value, dispatching change.
    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), DomError>;

    /// Dispatch mouseover on the element.
    async fn dispatch_hover(&self, element: &ElementHandle) -> Result<(), DomError>;

    /// Dispatch focus on the element.
    async fn dispatch_focus(&self, element: &ElementHandle) -> Result<(), DomError>;

    /// Scroll the element into view.
    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DomError>;
}
