//! In-memory DOM backend
//!
//! A small element tree implementing [`DomBridge`] without a live browser.
//! Test suites and demos drive the engine against it; it records every
//! dispatched event per element so assertions can observe exactly what the
//! engine did. Elements can be inserted while a workflow runs, which is how
//! smart-wait behavior is exercised.

use crate::{DomBridge, DomError, ElementHandle, Locator, Strategy};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Events a backend dispatches on elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Click,
    Input,
    Change,
    Hover,
    Focus,
    ScrollIntoView,
}

/// Builder for inserting elements into a [`MemoryDom`].
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    tag: String,
    id_attr: Option<String>,
    classes: Vec<String>,
    text: String,
    value: String,
    checked: bool,
    attrs: Vec<(String, String)>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    /// Set the `id` attribute.
    pub fn id_attr(mut self, id: impl Into<String>) -> Self {
        self.id_attr = Some(id.into());
        self
    }

    /// Add a class.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set the element's own text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the initial value.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the initial checked state.
    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Set an arbitrary attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }
}

struct Node {
    tag: String,
    attrs: HashMap<String, String>,
    classes: Vec<String>,
    text: String,
    value: String,
    checked: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    detached: bool,
    events: Vec<EventKind>,
}

#[derive(Default)]
struct Tree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
}

impl Tree {
    fn node(&self, handle: &ElementHandle) -> Result<&Node, DomError> {
        let idx = handle.id as usize;
        match self.nodes.get(idx) {
            Some(node) if !node.detached => Ok(node),
            _ => Err(DomError::Stale(handle.to_string())),
        }
    }

    fn node_mut(&mut self, handle: &ElementHandle) -> Result<&mut Node, DomError> {
        let idx = handle.id as usize;
        match self.nodes.get_mut(idx) {
            Some(node) if !node.detached => Ok(node),
            _ => Err(DomError::Stale(handle.to_string())),
        }
    }

    /// Indices of live nodes in document order (depth-first over roots).
    fn document_order(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let roots: Vec<usize> = self.roots.clone();
        for root in roots {
            self.collect_subtree(root, &mut out);
        }
        out
    }

    fn collect_subtree(&self, idx: usize, out: &mut Vec<usize>) {
        if self.nodes[idx].detached {
            return;
        }
        out.push(idx);
        let children = self.nodes[idx].children.clone();
        for child in children {
            self.collect_subtree(child, out);
        }
    }

    /// Live descendants of `idx`, document order, excluding `idx` itself.
    fn descendants(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let children = self.nodes[idx].children.clone();
        for child in children {
            self.collect_subtree(child, &mut out);
        }
        out
    }

    /// Concatenated text of the node and its live descendants.
    fn text_content(&self, idx: usize) -> String {
        let mut buf = String::new();
        self.append_text(idx, &mut buf);
        buf
    }

    fn append_text(&self, idx: usize, buf: &mut String) {
        let node = &self.nodes[idx];
        if node.detached {
            return;
        }
        buf.push_str(&node.text);
        for &child in &node.children {
            self.append_text(child, buf);
        }
    }

    fn label(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        match node.attrs.get("id") {
            Some(id) => format!("{}#{}", node.tag, id),
            None => match node.classes.first() {
                Some(class) => format!("{}.{}", node.tag, class),
                None => node.tag.clone(),
            },
        }
    }

    fn handle(&self, idx: usize) -> ElementHandle {
        ElementHandle::new(idx as u64, self.label(idx))
    }
}

/// One compound selector: `tag#id.class[attr=value]`.
#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if node.tag != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| node.classes.contains(c)) {
            return false;
        }
        self.attrs
            .iter()
            .all(|(k, v)| node.attrs.get(k) == Some(v))
    }
}

fn parse_compound(token: &str) -> Result<Compound, DomError> {
    let mut compound = Compound::default();
    let mut rest = token;
    let bad = || DomError::InvalidSelector(token.to_string());

    // Leading tag name (or universal `*`)
    let split = rest.find(['#', '.', '['].as_ref()).unwrap_or(rest.len());
    let head = &rest[..split];
    if !head.is_empty() && head != "*" {
        if !head.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(bad());
        }
        compound.tag = Some(head.to_ascii_lowercase());
    }
    rest = &rest[split..];

    while !rest.is_empty() {
        let (kind, body) = rest.split_at(1);
        match kind {
            "#" | "." => {
                let end = body.find(['#', '.', '['].as_ref()).unwrap_or(body.len());
                let name = &body[..end];
                if name.is_empty() {
                    return Err(bad());
                }
                if kind == "#" {
                    compound.id = Some(name.to_string());
                } else {
                    compound.classes.push(name.to_string());
                }
                rest = &body[end..];
            }
            "[" => {
                let close = body.find(']').ok_or_else(bad)?;
                let inner = &body[..close];
                let eq = inner.find('=').ok_or_else(bad)?;
                let key = inner[..eq].trim();
                let value = inner[eq + 1..].trim().trim_matches(['"', '\''].as_ref());
                if key.is_empty() {
                    return Err(bad());
                }
                compound.attrs.push((key.to_string(), value.to_string()));
                rest = &body[close + 1..];
            }
            _ => return Err(bad()),
        }
    }

    Ok(compound)
}

/// Parse a descendant-combinator selector chain.
///
/// Supported: compound selectors joined by whitespace. Grouping (`,`), child
/// (`>`), sibling combinators, and pseudo-classes are rejected.
fn parse_selector(selector: &str) -> Result<Vec<Compound>, DomError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() || trimmed.contains([',', '>', '+', '~', ':'].as_ref()) {
        return Err(DomError::InvalidSelector(selector.to_string()));
    }
    trimmed.split_whitespace().map(parse_compound).collect()
}

/// In-memory [`DomBridge`] backend.
#[derive(Clone, Default)]
pub struct MemoryDom {
    inner: Arc<RwLock<Tree>>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, optionally under a parent, returning its handle.
    pub fn insert(&self, spec: ElementSpec, parent: Option<&ElementHandle>) -> ElementHandle {
        let mut tree = self.inner.write();
        let idx = tree.nodes.len();
        let mut attrs: HashMap<String, String> = spec.attrs.into_iter().collect();
        if let Some(id) = spec.id_attr {
            attrs.insert("id".to_string(), id);
        }
        let parent_idx = parent.map(|h| h.id as usize);
        tree.nodes.push(Node {
            tag: spec.tag,
            attrs,
            classes: spec.classes,
            text: spec.text,
            value: spec.value,
            checked: spec.checked,
            parent: parent_idx,
            children: Vec::new(),
            detached: false,
            events: Vec::new(),
        });
        match parent_idx {
            Some(p) => tree.nodes[p].children.push(idx),
            None => tree.roots.push(idx),
        }
        tree.handle(idx)
    }

    /// Detach an element and its subtree; later lookups treat it as gone.
    pub fn remove(&self, handle: &ElementHandle) {
        let mut tree = self.inner.write();
        let mut stack = vec![handle.id as usize];
        while let Some(idx) = stack.pop() {
            if let Some(node) = tree.nodes.get_mut(idx) {
                node.detached = true;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Events dispatched on an element so far, in dispatch order.
    pub fn events(&self, handle: &ElementHandle) -> Vec<EventKind> {
        self.inner
            .read()
            .nodes
            .get(handle.id as usize)
            .map(|n| n.events.clone())
            .unwrap_or_default()
    }

    /// Number of clicks dispatched on an element.
    pub fn click_count(&self, handle: &ElementHandle) -> usize {
        self.events(handle)
            .iter()
            .filter(|e| **e == EventKind::Click)
            .count()
    }

    /// Current value of an element.
    pub fn value_of(&self, handle: &ElementHandle) -> String {
        self.inner
            .read()
            .nodes
            .get(handle.id as usize)
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    fn select(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DomError> {
        let tree = self.inner.read();
        let order = tree.document_order();
        let matches: Vec<usize> = match locator.strategy {
            Strategy::Css => css_select(&tree, &locator.value, None)?,
            Strategy::Xpath => xpath_select(&tree, &locator.value)?,
            Strategy::Id => order
                .into_iter()
                .filter(|&i| tree.nodes[i].attrs.get("id") == Some(&locator.value))
                .collect(),
            Strategy::ClassName => order
                .into_iter()
                .filter(|&i| tree.nodes[i].classes.contains(&locator.value))
                .collect(),
            Strategy::TagName => {
                let tag = locator.value.to_ascii_lowercase();
                order
                    .into_iter()
                    .filter(|&i| tree.nodes[i].tag == tag)
                    .collect()
            }
            // Full scan in document order; no native text-selector API here.
            Strategy::Text => order
                .into_iter()
                .filter(|&i| tree.text_content(i).trim() == locator.value)
                .collect(),
            Strategy::Contains => order
                .into_iter()
                .filter(|&i| tree.text_content(i).contains(&locator.value))
                .collect(),
        };
        Ok(matches.into_iter().map(|i| tree.handle(i)).collect())
    }

    fn record(&self, handle: &ElementHandle, event: EventKind) -> Result<(), DomError> {
        let mut tree = self.inner.write();
        let node = tree.node_mut(handle)?;
        node.events.push(event);
        Ok(())
    }
}

fn css_select(tree: &Tree, selector: &str, scope: Option<usize>) -> Result<Vec<usize>, DomError> {
    let compounds = parse_selector(selector)?;
    let (target, ancestors) = compounds.split_last().expect("parse rejects empty");

    let candidates = match scope {
        Some(idx) => tree.descendants(idx),
        None => tree.document_order(),
    };

    let result = candidates
        .into_iter()
        .filter(|&idx| {
            if !target.matches(&tree.nodes[idx]) {
                return false;
            }
            // Right-to-left ancestor matching for descendant combinators.
            let mut current = tree.nodes[idx].parent;
            for needed in ancestors.iter().rev() {
                loop {
                    match current {
                        Some(a) => {
                            current = tree.nodes[a].parent;
                            if needed.matches(&tree.nodes[a]) {
                                break;
                            }
                        }
                        None => return false,
                    }
                }
            }
            true
        })
        .collect();
    Ok(result)
}

/// Minimal XPath support: `//tag`, `//*`, with an optional `[@attr='value']`
/// predicate. Anything else is refused rather than silently matching nothing.
fn xpath_select(tree: &Tree, expr: &str) -> Result<Vec<usize>, DomError> {
    let unsupported = |reason: &str| DomError::UnsupportedStrategy {
        strategy: "xpath".to_string(),
        reason: reason.to_string(),
    };

    let rest = expr
        .strip_prefix("//")
        .ok_or_else(|| unsupported("expression must start with //"))?;

    let (name_part, predicate) = match rest.find('[') {
        Some(open) => {
            let close = rest
                .rfind(']')
                .ok_or_else(|| unsupported("unterminated predicate"))?;
            (&rest[..open], Some(&rest[open + 1..close]))
        }
        None => (rest, None),
    };

    let tag = if name_part == "*" {
        None
    } else if name_part
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !name_part.is_empty()
    {
        Some(name_part.to_ascii_lowercase())
    } else {
        return Err(unsupported("only //tag and //* node tests are evaluated"));
    };

    let attr = match predicate {
        Some(pred) => {
            let body = pred
                .strip_prefix('@')
                .ok_or_else(|| unsupported("only [@attr='value'] predicates are evaluated"))?;
            let eq = body
                .find('=')
                .ok_or_else(|| unsupported("only [@attr='value'] predicates are evaluated"))?;
            let key = body[..eq].trim().to_string();
            let value = body[eq + 1..]
                .trim()
                .trim_matches(['"', '\''].as_ref())
                .to_string();
            Some((key, value))
        }
        None => None,
    };

    Ok(tree
        .document_order()
        .into_iter()
        .filter(|&i| {
            let node = &tree.nodes[i];
            if let Some(tag) = &tag {
                if node.tag != *tag {
                    return false;
                }
            }
            match &attr {
                Some((k, v)) => node.attrs.get(k) == Some(v),
                None => true,
            }
        })
        .collect())
}

#[async_trait]
impl DomBridge for MemoryDom {
    async fn resolve_one(&self, locator: &Locator) -> Result<ElementHandle, DomError> {
        let mut matches = self.select(locator)?;
        if matches.is_empty() {
            return Err(DomError::not_found(locator));
        }
        Ok(matches.remove(0))
    }

    async fn resolve_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DomError> {
        self.select(locator)
    }

    async fn query_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DomError> {
        let tree = self.inner.read();
        tree.node(parent)?;
        let matches = css_select(&tree, selector, Some(parent.id as usize))?;
        Ok(matches.into_iter().map(|i| tree.handle(i)).collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DomError> {
        debug!(element = %element, "click");
        let mut tree = self.inner.write();
        let node = tree.node_mut(element)?;
        node.events.push(EventKind::Click);
        // Native click toggles checkboxes and sets radios.
        let input_type = node.attrs.get("type").map(String::as_str);
        if node.tag == "input" {
            match input_type {
                Some("checkbox") => node.checked = !node.checked,
                Some("radio") => node.checked = true,
                _ => {}
            }
        }
        Ok(())
    }

    async fn set_value(
        &self,
        element: &ElementHandle,
        text: &str,
        clear_first: bool,
    ) -> Result<(), DomError> {
        debug!(element = %element, text, clear_first, "set_value");
        let mut tree = self.inner.write();
        let node = tree.node_mut(element)?;
        if clear_first {
            node.value.clear();
            node.events.push(EventKind::Input);
        }
        node.value = text.to_string();
        node.events.push(EventKind::Input);
        node.events.push(EventKind::Change);
        Ok(())
    }

    async fn set_checked(&self, element: &ElementHandle, checked: bool) -> Result<(), DomError> {
        let mut tree = self.inner.write();
        let node = tree.node_mut(element)?;
        node.checked = checked;
        node.events.push(EventKind::Change);
        Ok(())
    }

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool, DomError> {
        let tree = self.inner.read();
        Ok(tree.node(element)?.checked)
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), DomError> {
        let mut tree = self.inner.write();
        let node = tree.node(element)?;
        let options: Vec<usize> = node
            .children
            .iter()
            .copied()
            .filter(|&c| tree.nodes[c].tag == "option")
            .collect();
        if !options.is_empty()
            && !options
                .iter()
                .any(|&c| tree.nodes[c].attrs.get("value").map(String::as_str) == Some(value))
        {
            return Err(DomError::Backend(format!(
                "no option with value '{value}' in {element}"
            )));
        }
        let node = tree.node_mut(element)?;
        node.value = value.to_string();
        node.events.push(EventKind::Change);
        Ok(())
    }

    async fn dispatch_hover(&self, element: &ElementHandle) -> Result<(), DomError> {
        self.record(element, EventKind::Hover)
    }

    async fn dispatch_focus(&self, element: &ElementHandle) -> Result<(), DomError> {
        self.record(element, EventKind::Focus)
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DomError> {
        self.record(element, EventKind::ScrollIntoView)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MemoryDom, ElementHandle, ElementHandle, ElementHandle) {
        let dom = MemoryDom::new();
        let list = dom.insert(ElementSpec::new("ul").id_attr("items"), None);
        let first = dom.insert(
            ElementSpec::new("li").class("item").text("First"),
            Some(&list),
        );
        let second = dom.insert(
            ElementSpec::new("li").class("item").class("done").text("Second"),
            Some(&list),
        );
        (dom, list, first, second)
    }

    #[test]
    fn compound_parsing() {
        let c = parse_compound("button#go.primary[data-role=submit]").unwrap();
        assert_eq!(c.tag.as_deref(), Some("button"));
        assert_eq!(c.id.as_deref(), Some("go"));
        assert_eq!(c.classes, vec!["primary".to_string()]);
        assert_eq!(
            c.attrs,
            vec![("data-role".to_string(), "submit".to_string())]
        );

        assert!(parse_selector("a, b").is_err());
        assert!(parse_selector("ul > li").is_err());
    }

    #[tokio::test]
    async fn css_and_class_lookup() {
        let (dom, _, _, _) = sample();
        let items = dom.resolve_all(&Locator::css("ul#items .item")).await.unwrap();
        assert_eq!(items.len(), 2);
        let done = dom.resolve_all(&Locator::class_name("done")).await.unwrap();
        assert_eq!(done.len(), 1);
    }

    #[tokio::test]
    async fn text_scans_match_whole_subtree() {
        let (dom, list, first, _) = sample();
        let exact = dom.resolve_one(&Locator::text("First")).await.unwrap();
        assert_eq!(exact, first);
        // Contains matches ancestors too; the list concatenates child text.
        let containing = dom.resolve_all(&Locator::contains("First")).await.unwrap();
        assert!(containing.contains(&list));
    }

    #[tokio::test]
    async fn scoped_query_excludes_outsiders() {
        let (dom, list, _, _) = sample();
        dom.insert(ElementSpec::new("li").class("item").text("Loose"), None);
        let scoped = dom.query_within(&list, ".item").await.unwrap();
        assert_eq!(scoped.len(), 2);
    }

    #[tokio::test]
    async fn xpath_subset_and_refusal() {
        let (dom, _, _, _) = sample();
        let all = dom.resolve_all(&Locator::xpath("//li")).await.unwrap();
        assert_eq!(all.len(), 2);
        let by_attr = dom
            .resolve_all(&Locator::xpath("//*[@id='items']"))
            .await
            .unwrap();
        assert_eq!(by_attr.len(), 1);

        let err = dom
            .resolve_all(&Locator::xpath("//li/following-sibling::li"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomError::UnsupportedStrategy { .. }));
    }

    #[tokio::test]
    async fn click_toggles_checkbox() {
        let dom = MemoryDom::new();
        let cb = dom.insert(
            ElementSpec::new("input").attr("type", "checkbox").id_attr("opt"),
            None,
        );
        dom.click(&cb).await.unwrap();
        assert!(dom.is_checked(&cb).await.unwrap());
        dom.click(&cb).await.unwrap();
        assert!(!dom.is_checked(&cb).await.unwrap());
        assert_eq!(dom.click_count(&cb), 2);
    }

    #[tokio::test]
    async fn removed_elements_go_stale() {
        let (dom, _, first, _) = sample();
        dom.remove(&first);
        let err = dom.click(&first).await.unwrap_err();
        assert!(matches!(err, DomError::Stale(_)));
        assert!(dom.resolve_one(&Locator::text("First")).await.is_err());
    }
}
