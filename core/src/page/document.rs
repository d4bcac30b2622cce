use super::selector::Selector;
use super::{markup, ComputedStyle, ElementId};
use crate::error::PageError;

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) tag: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) text: String,
    pub(crate) value: Option<String>,
}

impl Node {
    fn new(tag: String, attrs: Vec<(String, String)>, parent: Option<usize>) -> Self {
        Self {
            tag,
            attrs,
            parent,
            children: Vec::new(),
            text: String::new(),
            value: None,
        }
    }
}

/// An element tree. Nodes live in an arena indexed by [`ElementId`]; index 0
/// is the document itself and never matches a selector. Nodes are only
/// appended while loading, so arena order is document order.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

const ROOT: usize = 0;

impl Default for Document {
    fn default() -> Self {
        Self {
            nodes: vec![Node::new("#document".to_string(), Vec::new(), None)],
        }
    }
}

impl Document {
    /// Parse well-formed XHTML markup.
    pub fn parse(markup: &str) -> Result<Self, PageError> {
        let mut document = markup::parse(markup)?;
        document.initialize_values();
        Ok(document)
    }

    /// Number of elements, not counting the document node.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn root() -> usize {
        ROOT
    }

    pub(crate) fn append_element(
        &mut self,
        parent: usize,
        tag: &str,
        attrs: Vec<(String, String)>,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes
            .push(Node::new(tag.to_ascii_lowercase(), attrs, Some(parent)));
        self.nodes[parent].children.push(id);
        id
    }

    pub(crate) fn append_text(&mut self, node: usize, text: &str) {
        let target = &mut self.nodes[node].text;
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(text);
    }

    pub(crate) fn node(&self, id: usize) -> Option<&Node> {
        if id == ROOT {
            None
        } else {
            self.nodes.get(id)
        }
    }

    fn node_mut(&mut self, id: usize) -> Result<&mut Node, PageError> {
        if id == ROOT {
            return Err(PageError::StaleElement(id));
        }
        self.nodes.get_mut(id).ok_or(PageError::StaleElement(id))
    }

    pub(crate) fn contains(&self, element: ElementId) -> bool {
        element.0 != ROOT && element.0 < self.nodes.len()
    }

    /// Element ids in document order.
    pub(crate) fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        1..self.nodes.len()
    }

    /// Parent element, `None` at the top of the tree.
    pub(crate) fn parent_element(&self, id: usize) -> Option<usize> {
        self.nodes
            .get(id)
            .and_then(|node| node.parent)
            .filter(|parent| *parent != ROOT)
    }

    pub fn tag_name(&self, element: ElementId) -> Option<&str> {
        self.node(element.0).map(|node| node.tag.as_str())
    }

    pub fn attr(&self, element: ElementId, name: &str) -> Option<&str> {
        self.node(element.0).and_then(|node| {
            node.attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn has_attr(&self, element: ElementId, name: &str) -> bool {
        self.attr(element, name).is_some()
    }

    pub(crate) fn toggle_attr(&mut self, element: ElementId, name: &str) -> Result<(), PageError> {
        let node = self.node_mut(element.0)?;
        if let Some(pos) = node.attrs.iter().position(|(key, _)| key == name) {
            node.attrs.remove(pos);
        } else {
            node.attrs.push((name.to_string(), name.to_string()));
        }
        Ok(())
    }

    pub fn text(&self, element: ElementId) -> Option<&str> {
        self.node(element.0).map(|node| node.text.as_str())
    }

    pub fn value(&self, element: ElementId) -> Option<String> {
        self.node(element.0).and_then(|node| node.value.clone())
    }

    /// Assign a form value. Selects only accept values of their options and
    /// fall back to the empty string otherwise.
    pub(crate) fn set_value(&mut self, element: ElementId, value: &str) -> Result<(), PageError> {
        let resolved = if self.tag_name(element) == Some("select") {
            let known = self
                .options_of(element.0)
                .iter()
                .any(|option| self.option_value(*option) == value);
            if known {
                value.to_string()
            } else {
                String::new()
            }
        } else {
            value.to_string()
        };
        self.node_mut(element.0)?.value = Some(resolved);
        Ok(())
    }

    pub fn select(&self, selector: &str) -> Result<Vec<ElementId>, PageError> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .elements()
            .filter(|id| selector.matches(self, *id))
            .map(ElementId)
            .collect())
    }

    /// Elements that can take focus.
    pub fn is_focusable(&self, element: ElementId) -> bool {
        if self.has_attr(element, "disabled") {
            return false;
        }
        match self.tag_name(element) {
            Some("a") => self.has_attr(element, "href"),
            Some("button") | Some("input") | Some("select") | Some("textarea") => true,
            Some(_) => self.has_attr(element, "tabindex"),
            None => false,
        }
    }

    pub fn computed_style(&self, element: ElementId) -> Result<ComputedStyle, PageError> {
        if !self.contains(element) {
            return Err(PageError::StaleElement(element.0));
        }
        let declarations = self.inline_style(element.0);
        let lookup = |name: &str| {
            declarations
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        let display = match lookup("display") {
            Some(display) => display,
            None if self.has_attr(element, "hidden") => "none".to_string(),
            None => self.default_display(element).to_string(),
        };
        let opacity = lookup("opacity")
            .and_then(|raw| raw.parse::<f32>().ok())
            .unwrap_or(1.0);

        Ok(ComputedStyle {
            display,
            visibility: self.visibility(element.0),
            opacity,
        })
    }

    /// `visibility` is inherited.
    fn visibility(&self, id: usize) -> String {
        let own = self
            .inline_style(id)
            .into_iter()
            .find(|(key, _)| key == "visibility")
            .map(|(_, value)| value);
        match own.as_deref() {
            Some("inherit") | None => match self.parent_element(id) {
                Some(parent) => self.visibility(parent),
                None => "visible".to_string(),
            },
            Some(value) => value.to_string(),
        }
    }

    fn inline_style(&self, id: usize) -> Vec<(String, String)> {
        let Some(style) = self.attr(ElementId(id), "style") else {
            return Vec::new();
        };
        style
            .split(';')
            .filter_map(|declaration| declaration.split_once(':'))
            .map(|(key, value)| {
                let value = value.trim().trim_end_matches("!important").trim();
                (key.trim().to_ascii_lowercase(), value.to_string())
            })
            .collect()
    }

    fn default_display(&self, element: ElementId) -> &'static str {
        match self.tag_name(element).unwrap_or_default() {
            "head" | "script" | "style" | "title" | "meta" | "link" | "template" => "none",
            "input" if self.attr(element, "type") == Some("hidden") => "none",
            "button" | "input" | "select" | "textarea" => "inline-block",
            "a" | "span" | "em" | "strong" | "b" | "i" | "label" | "img" | "small" | "code" => {
                "inline"
            }
            "li" => "list-item",
            "table" => "table",
            _ => "block",
        }
    }

    fn options_of(&self, select: usize) -> Vec<usize> {
        let mut options = Vec::new();
        let mut stack: Vec<usize> = self.nodes[select].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.nodes[id].tag == "option" {
                options.push(id);
            }
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        options
    }

    fn option_value(&self, option: usize) -> String {
        self.attr(ElementId(option), "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.nodes[option].text.clone())
    }

    /// Seed form values from markup the way a browser does on load.
    fn initialize_values(&mut self) {
        for id in 1..self.nodes.len() {
            let element = ElementId(id);
            let value = match self.nodes[id].tag.as_str() {
                "input" => Some(self.attr(element, "value").unwrap_or_default().to_string()),
                "textarea" => Some(self.nodes[id].text.clone()),
                "option" => Some(self.option_value(id)),
                "select" => {
                    let options = self.options_of(id);
                    let chosen = options
                        .iter()
                        .find(|option| self.has_attr(ElementId(**option), "selected"))
                        .or_else(|| options.first())
                        .map(|option| self.option_value(*option));
                    Some(chosen.unwrap_or_default())
                }
                _ => None,
            };
            self.nodes[id].value = value;
        }
    }
}
