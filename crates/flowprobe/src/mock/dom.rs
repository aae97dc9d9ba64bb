//! Arena DOM for the mock driver. Node 0 is always `<body>`.

use std::collections::BTreeMap;

use super::app::{MockElement, Reaction};

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) tag: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) text: String,
    pub(crate) hidden: bool,
    pub(crate) disabled: bool,
    pub(crate) value: String,
    pub(crate) on_click: Vec<Reaction>,
    pub(crate) on_change: Vec<Reaction>,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
}

pub(crate) const ROOT: usize = 0;

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
                text: String::new(),
                hidden: false,
                disabled: false,
                value: String::new(),
                on_click: Vec::new(),
                on_change: Vec::new(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    /// Insert `element` and its subtree as the last child of `parent`.
    pub(crate) fn append(&mut self, parent: usize, element: &MockElement) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            tag: element.tag.clone(),
            attrs: element.attrs.clone(),
            text: element.text.clone(),
            hidden: element.hidden,
            disabled: element.disabled,
            value: element.attrs.get("value").cloned().unwrap_or_default(),
            on_click: element.on_click.clone(),
            on_change: element.on_change.clone(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(idx);
        for child in &element.children {
            self.append(idx, child);
        }
        idx
    }

    /// Descendants of `from` in document order, excluding `from`.
    pub(crate) fn descendants(&self, from: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[from].children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.nodes[idx].children.iter().rev().copied());
        }
        out
    }

    pub(crate) fn parent(&self, idx: usize) -> Option<usize> {
        self.nodes[idx].parent
    }

    pub(crate) fn attr(&self, idx: usize, name: &str) -> Option<&str> {
        self.nodes[idx].attrs.get(name).map(String::as_str)
    }

    /// Own text plus all descendant text, like `textContent`.
    pub(crate) fn text_content(&self, idx: usize) -> String {
        let mut text = self.nodes[idx].text.clone();
        for child in self.descendants(idx) {
            text.push_str(&self.nodes[child].text);
        }
        text
    }

    /// Rendered: neither the node nor any ancestor is hidden.
    pub(crate) fn is_visible(&self, idx: usize) -> bool {
        let mut current = Some(idx);
        while let Some(i) = current {
            if self.nodes[i].hidden {
                return false;
            }
            current = self.nodes[i].parent;
        }
        true
    }

    pub(crate) fn is_interactable(&self, idx: usize) -> bool {
        self.is_visible(idx) && !self.nodes[idx].disabled
    }

    /// `<option>` descendants of a select, in document order
    pub(crate) fn options(&self, select: usize) -> Vec<usize> {
        self.descendants(select)
            .into_iter()
            .filter(|&i| self.nodes[i].tag == "option")
            .collect()
    }

    /// Submitted value of an option: its `value` attribute, else its text
    pub(crate) fn option_value(&self, option: usize) -> String {
        let node = &self.nodes[option];
        node.attrs
            .get("value")
            .cloned()
            .unwrap_or_else(|| node.text.clone())
    }
}
