//! Rendered-page document model - wraps parsed HTML into auditable nodes

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;

/// Attribute used by the screenshot layer to tag injected highlight markup.
/// Anything inside an element carrying it is invisible to the audit.
pub const OVERLAY_ATTR: &str = "data-emag-overlay";

/// Maximum length of the HTML snippet kept per node for reporting.
const SNIPPET_MAX: usize = 400;

/// A parsed page snapshot ready for rule evaluation
pub struct AuditDocument {
    html: Html,
    nodes: Vec<AuditNode>,
    by_node_id: HashMap<NodeId, usize>,
}

/// One element of the document, in DOM order
#[derive(Debug, Clone)]
pub struct AuditNode {
    /// Position in DOM order (0-based)
    pub index: usize,
    /// Handle into the underlying tree
    pub node_id: NodeId,
    /// Lowercased tag name
    pub tag: String,
    /// Lowercased attribute names mapped to raw values
    pub attrs: HashMap<String, String>,
    /// Unique CSS path used as the reporting target
    pub target: String,
    /// Truncated outer HTML snippet
    pub html: String,
    /// Static visibility heuristic (no computed styles available)
    pub visible: bool,
}

impl AuditNode {
    /// Get an attribute value by (lowercase) name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    /// True when the attribute exists and is non-empty after trimming
    pub fn has_nonempty_attr(&self, name: &str) -> bool {
        self.attr(name).is_some_and(|v| !v.trim().is_empty())
    }
}

impl AuditDocument {
    /// Parse an HTML snapshot into an auditable document
    pub fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);

        // First pass: count id attributes so unique ids can serve as targets
        let mut id_counts: HashMap<String, usize> = HashMap::new();
        for node in html.tree.root().descendants() {
            if let Some(element) = node.value().as_element() {
                if let Some(id) = element.attr("id") {
                    *id_counts.entry(id.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut nodes = Vec::new();
        let mut by_node_id = HashMap::new();
        for child in html.tree.root().children() {
            if child.value().is_element() {
                Self::walk(child, "", true, 1, &id_counts, &mut nodes, &mut by_node_id);
            }
        }

        Self {
            html,
            nodes,
            by_node_id,
        }
    }

    fn walk(
        node: NodeRef<'_, Node>,
        parent_target: &str,
        parent_visible: bool,
        nth: usize,
        id_counts: &HashMap<String, usize>,
        nodes: &mut Vec<AuditNode>,
        by_node_id: &mut HashMap<NodeId, usize>,
    ) {
        let Some(element) = node.value().as_element() else {
            return;
        };

        // The audit must never flag its own instrumentation
        if element.attr(OVERLAY_ATTR).is_some() {
            return;
        }

        let tag = element.name().to_ascii_lowercase();
        let attrs: HashMap<String, String> = element
            .attrs()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();

        let target = match attrs.get("id") {
            Some(id) if !id.is_empty() && id_counts.get(id) == Some(&1) => format!("#{id}"),
            _ if parent_target.is_empty() => tag.clone(),
            _ => format!("{parent_target} > {tag}:nth-child({nth})"),
        };

        let visible = parent_visible && !statically_hidden(&attrs);
        let snippet = ElementRef::wrap(node)
            .map(|el| truncate_snippet(&el.html()))
            .unwrap_or_default();

        let index = nodes.len();
        by_node_id.insert(node.id(), index);
        nodes.push(AuditNode {
            index,
            node_id: node.id(),
            tag,
            attrs,
            target: target.clone(),
            html: snippet,
            visible,
        });

        let mut child_nth = 0;
        for child in node.children() {
            if child.value().is_element() {
                child_nth += 1;
                Self::walk(
                    child, &target, visible, child_nth, id_counts, nodes, by_node_id,
                );
            }
        }
    }

    /// All auditable nodes in DOM order
    pub fn nodes(&self) -> &[AuditNode] {
        &self.nodes
    }

    /// Match a compiled selector, in DOM order, skipping overlay content
    pub fn select(&self, selector: &Selector) -> Vec<&AuditNode> {
        self.html
            .select(selector)
            .filter_map(|el| self.by_node_id.get(&el.id()).map(|&i| &self.nodes[i]))
            .collect()
    }

    /// Resolve a node back to its element in the underlying tree
    pub fn element(&self, node: &AuditNode) -> Option<ElementRef<'_>> {
        self.html.tree.get(node.node_id).and_then(ElementRef::wrap)
    }

    /// Collapsed text content of a node's subtree
    pub fn text(&self, node: &AuditNode) -> String {
        self.element(node)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default()
    }

    /// Accessible name approximation: text, aria-label, labelled image alt, title
    pub fn accessible_text(&self, node: &AuditNode) -> String {
        let text = self.text(node);
        if !text.is_empty() {
            return text;
        }
        if let Some(label) = node.attr("aria-label") {
            if !label.trim().is_empty() {
                return collapse_whitespace(label);
            }
        }
        if let Some(el) = self.element(node) {
            for descendant in el.descendants() {
                if let Some(child) = descendant.value().as_element() {
                    if child.name().eq_ignore_ascii_case("img") {
                        if let Some(alt) = child.attr("alt") {
                            if !alt.trim().is_empty() {
                                return collapse_whitespace(alt);
                            }
                        }
                    }
                }
            }
        }
        node.attr("title")
            .map(collapse_whitespace)
            .unwrap_or_default()
    }

    /// Find the element an in-page anchor points at, by id or name
    pub fn anchor_target(&self, fragment: &str) -> Option<&AuditNode> {
        self.nodes.iter().find(|n| {
            n.attr("id") == Some(fragment) || n.attr("name") == Some(fragment)
        })
    }

    /// Next element sibling of a node, with the intervening text collapsed
    ///
    /// Returns `None` at the end of the sibling list. The returned string is
    /// whatever non-markup text sits between the two elements.
    pub fn next_element_sibling(&self, node: &AuditNode) -> Option<(&AuditNode, String)> {
        let el = self.element(node)?;
        let mut gap = String::new();
        for sibling in el.next_siblings() {
            match sibling.value() {
                Node::Text(t) => gap.push_str(t),
                Node::Element(_) => {
                    let next = self.by_node_id.get(&sibling.id()).map(|&i| &self.nodes[i])?;
                    return Some((next, collapse_whitespace(&gap)));
                }
                _ => {}
            }
        }
        None
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_snippet(s: &str) -> String {
    if s.len() <= SNIPPET_MAX {
        return s.to_string();
    }
    let mut end = SNIPPET_MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// Static stand-in for computed-style visibility
fn statically_hidden(attrs: &HashMap<String, String>) -> bool {
    if attrs.contains_key("hidden") {
        return true;
    }
    if attrs.get("aria-hidden").map(|v| v.as_str()) == Some("true") {
        return true;
    }
    if attrs.get("type").map(|v| v.as_str()) == Some("hidden") {
        return true;
    }
    if let Some(style) = attrs.get("style") {
        let normalized: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if normalized.contains("display:none") || normalized.contains("visibility:hidden") {
            return true;
        }
    }
    false
}
