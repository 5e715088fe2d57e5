use crate::parsers::text::trim_closing_marks;
use crate::parsers::{DomNode, Element};

/// Tags that stay even when they have no children or text
const KEEP_WHEN_EMPTY: [&str; 6] = ["img", "br", "hr", "input", "td", "th"];

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Remove elements left with no element children and no text, bottom-up
pub fn prune_empty(element: &mut Element) {
    for child in element.children.iter_mut() {
        if let DomNode::Element(el) = child {
            prune_empty(el);
        }
    }

    element.children.retain(|child| match child {
        DomNode::Text(t) => !t.is_empty(),
        DomNode::Element(el) => !is_empty_element(el),
    });
}

fn is_empty_element(el: &Element) -> bool {
    if KEEP_WHEN_EMPTY.contains(&el.tag.as_str()) {
        return false;
    }
    el.element_children().next().is_none() && el.text().trim().is_empty()
}

/// Strip leftover `#` marks (and permalink pilcrows) around heading text
pub fn clean_headings(element: &mut Element) {
    for child in element.children.iter_mut() {
        let DomNode::Element(el) = child else {
            continue;
        };
        if HEADING_TAGS.contains(&el.tag.as_str()) {
            if let Some(first) = first_text_mut(el) {
                *first = first.trim_start().trim_start_matches('#').trim_start().to_string();
            }
            if let Some(last) = last_text_mut(el) {
                *last = trim_closing_marks(last).to_string();
            }
        } else {
            clean_headings(el);
        }
    }
}

fn first_text_mut(element: &mut Element) -> Option<&mut String> {
    for child in element.children.iter_mut() {
        match child {
            DomNode::Text(t) if !t.trim().is_empty() => return Some(t),
            DomNode::Text(_) => {}
            DomNode::Element(el) => {
                if let Some(found) = first_text_mut(el) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn last_text_mut(element: &mut Element) -> Option<&mut String> {
    for child in element.children.iter_mut().rev() {
        match child {
            DomNode::Text(t) if !t.trim().is_empty() => return Some(t),
            DomNode::Text(_) => {}
            DomNode::Element(el) => {
                if let Some(found) = last_text_mut(el) {
                    return Some(found);
                }
            }
        }
    }
    None
}
