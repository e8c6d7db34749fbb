//! Minimal element tree the renderer paints into.

use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: &'static str,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    #[must_use]
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whitespace separated class list.
    #[must_use]
    pub fn with_class(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn set_text(&mut self, text: &str) {
        if self.text != text {
            self.text = text.to_string();
        }
    }

    pub fn set_classes(&mut self, classes: &str) {
        let classes: Vec<String> = classes.split_whitespace().map(str::to_string).collect();
        if self.classes != classes {
            self.classes = classes;
        }
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Number of elements in this subtree, itself included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Element::node_count).sum::<usize>()
    }

    pub fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        if let Some(id) = &self.id {
            let _ = write!(out, " id=\"{}\"", escape(id));
        }
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&self.classes.join(" ")));
        }
        for (name, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        out.push('>');
        out.push_str(&escape(&self.text));
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }
}

#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The regions of the dashboard page.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub status: Element,
    pub grid: Element,
    pub history: Element,
    pub charts: Element,
    pub dates: Element,
    pub devices: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            status: Element::new("header").with_id("status"),
            grid: Element::new("div").with_id("sensors-grid").with_class("sensors-grid"),
            history: Element::new("div").with_id("history"),
            charts: Element::new("div").with_id("charts"),
            dates: Element::new("select").with_id("date"),
            devices: Element::new("div").with_id("devices-container"),
        }
    }
}

impl Document {
    fn regions(&self) -> [&Element; 6] {
        [
            &self.status,
            &self.dates,
            &self.grid,
            &self.history,
            &self.charts,
            &self.devices,
        ]
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Element> {
        self.regions().into_iter().find_map(|r| r.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        [
            &mut self.status,
            &mut self.dates,
            &mut self.grid,
            &mut self.history,
            &mut self.charts,
            &mut self.devices,
        ]
        .into_iter()
        .find_map(|r| r.find_mut(id))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.regions().iter().map(|r| r.node_count()).sum()
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for region in self.regions() {
            region.write_html(&mut out);
            out.push('\n');
        }
        out
    }
}
