//! Owned markup tree shared by extraction, conversion and assembly.
//!
//! Pages are parsed with scraper (html5ever); the part of a page that survives
//! extraction is copied into a [`DomNode`] tree that can be mutated freely and
//! serialized back to markup.

pub mod html;
pub mod text;


/// A node of the owned markup tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element(Element),
    Text(String),
}

/// An element with its attributes and ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase local tag name
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DomNode>) -> Self {
        self.children = children;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    pub fn remove_classes(&mut self, unwanted: &[&str]) {
        let Some(existing) = self.attr("class") else {
            return;
        };
        let kept: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| !unwanted.contains(c))
            .collect();
        if kept.is_empty() {
            self.remove_attr("class");
        } else {
            let kept = kept.join(" ");
            self.set_attr("class", kept);
        }
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    /// Concatenated text of all descendants, `<br>` rendered as a newline
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Element children, skipping text
    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(DomNode::as_element)
    }

    /// First descendant element (depth-first) with the given tag
    pub fn find(&self, tag: &str) -> Option<&Element> {
        for child in self.element_children() {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find(tag) {
                return Some(found);
            }
        }
        None
    }

    /// Serialize this element and its subtree back to markup
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        html::serialize_element(self, &mut out);
        out
    }
}

impl DomNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            DomNode::Element(el) => Some(el),
            DomNode::Text(_) => None,
        }
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        matches!(self, DomNode::Element(el) if el.tag == tag)
    }

    pub fn text(&self) -> String {
        match self {
            DomNode::Element(el) => el.text(),
            DomNode::Text(t) => t.clone(),
        }
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(el) if el.tag == "br" => out.push('\n'),
            DomNode::Element(el) => collect_text(&el.children, out),
        }
    }
}
