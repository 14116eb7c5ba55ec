use std::fmt;

/// A node in a slide's element tree.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

/// The address of an element relative to some root element.
///
/// Each entry is an index into the `children` of the element at that depth.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct ElementPath(Vec<usize>);

impl ElementPath {
    pub(crate) fn root() -> Self {
        Self::default()
    }

    pub(crate) fn child(&self, index: usize) -> Self {
        let mut indexes = self.0.clone();
        indexes.push(index);
        Self(indexes)
    }

    /// Appends a path that's relative to the element this one points to.
    pub(crate) fn join(&self, relative: &ElementPath) -> Self {
        let mut indexes = self.0.clone();
        indexes.extend_from_slice(&relative.0);
        Self(indexes)
    }
}

/// A simple selector.
///
/// Only single class, id and tag selectors are supported, which is all the deck controller needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Selector<'a> {
    Class(&'a str),
    Id(&'a str),
    Tag(&'a str),
}

impl<'a> Selector<'a> {
    pub(crate) fn parse(input: &'a str) -> Self {
        if let Some(class) = input.strip_prefix('.') {
            Self::Class(class)
        } else if let Some(id) = input.strip_prefix('#') {
            Self::Id(id)
        } else {
            Self::Tag(input)
        }
    }

    pub(crate) fn matches(&self, element: &Element) -> bool {
        match self {
            Self::Class(class) => element.has_class(class),
            Self::Id(id) => element.id() == Some(*id),
            Self::Tag(tag) => element.tag.eq_ignore_ascii_case(tag),
        }
    }
}

/// The inline `style` attribute of an element.
///
/// Declarations keep their insertion order so serializing an untouched element gives back the
/// same attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct InlineStyle(Vec<(String, String)>);

impl InlineStyle {
    pub(crate) fn parse(input: &str) -> Self {
        let mut style = Self::default();
        for declaration in input.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim();
            let value = value.trim();
            if !property.is_empty() && !value.is_empty() {
                style.set(property, value);
            }
        }
        style
    }

    pub(crate) fn get(&self, property: &str) -> Option<&str> {
        self.0.iter().find(|(name, _)| name == property).map(|(_, value)| value.as_str())
    }

    /// Sets a property and returns the value it had before, if any.
    pub(crate) fn set(&mut self, property: &str, value: &str) -> Option<String> {
        match self.0.iter_mut().find(|(name, _)| name == property) {
            Some((_, current)) => Some(std::mem::replace(current, value.to_string())),
            None => {
                self.0.push((property.to_string(), value.to_string()));
                None
            }
        }
    }

    /// Removes a property and returns its value, if it was set.
    pub(crate) fn remove(&mut self, property: &str) -> Option<String> {
        let index = self.0.iter().position(|(name, _)| name == property)?;
        Some(self.0.remove(index).1)
    }

    /// Sets the property to the given value or removes it if there is none.
    pub(crate) fn put(&mut self, property: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.set(property, value);
            }
            None => {
                self.remove(property);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}: {value};")?;
        }
        Ok(())
    }
}

/// An element in a slide.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Element {
    pub(crate) tag: String,
    id: Option<String>,
    classes: Vec<String>,
    style: InlineStyle,
    attributes: Vec<(String, Option<String>)>,
    children: Vec<Node>,
}

impl Element {
    pub(crate) fn new<S: Into<String>>(tag: S) -> Self {
        Self { tag: tag.into(), ..Default::default() }
    }

    pub(crate) fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub(crate) fn with_style(mut self, property: &str, value: &str) -> Self {
        self.style.set(property, value);
        self
    }

    pub(crate) fn with_attribute<S: Into<String>>(mut self, name: S, value: Option<String>) -> Self {
        self.attributes.push((name.into(), value));
        self
    }

    pub(crate) fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub(crate) fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub(crate) fn with_inline_style(mut self, style: InlineStyle) -> Self {
        self.style = style;
        self
    }

    pub(crate) fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn classes(&self) -> &[String] {
        &self.classes
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Adds a class, returning whether it wasn't there before.
    pub(crate) fn add_class(&mut self, class: &str) -> bool {
        if self.has_class(class) {
            false
        } else {
            self.classes.push(class.to_string());
            true
        }
    }

    /// Removes a class, returning whether it was there.
    pub(crate) fn remove_class(&mut self, class: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| c != class);
        before != self.classes.len()
    }

    pub(crate) fn toggle_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.add_class(class);
        } else {
            self.remove_class(class);
        }
    }

    pub(crate) fn style(&self) -> &InlineStyle {
        &self.style
    }

    pub(crate) fn style_mut(&mut self) -> &mut InlineStyle {
        &mut self.style
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).and_then(|(_, value)| value.as_deref())
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, current)) => *current = Some(value.to_string()),
            None => self.attributes.push((name.to_string(), Some(value.to_string()))),
        }
    }

    pub(crate) fn attributes(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.attributes.iter().map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub(crate) fn children(&self) -> &[Node] {
        &self.children
    }

    /// The concatenation of all text under this element.
    pub(crate) fn text_content(&self) -> String {
        let mut output = String::new();
        self.collect_text(&mut output);
        output
    }

    fn collect_text(&self, output: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => output.push_str(text),
                Node::Element(element) => element.collect_text(output),
            }
        }
    }

    /// Replaces all children with a single text node and returns the previous children.
    pub(crate) fn replace_text<S: Into<String>>(&mut self, text: S) -> Vec<Node> {
        std::mem::replace(&mut self.children, vec![Node::Text(text.into())])
    }

    pub(crate) fn replace_children(&mut self, children: Vec<Node>) -> Vec<Node> {
        std::mem::replace(&mut self.children, children)
    }

    /// Pushes a piece of text at the end of this element's text, merging with a trailing text node.
    pub(crate) fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    pub(crate) fn at_path(&self, path: &ElementPath) -> Option<&Element> {
        let mut current = self;
        for index in &path.0 {
            match current.children.get(*index)? {
                Node::Element(element) => current = element,
                Node::Text(_) => return None,
            }
        }
        Some(current)
    }

    pub(crate) fn at_path_mut(&mut self, path: &ElementPath) -> Option<&mut Element> {
        let mut current = self;
        for index in &path.0 {
            match current.children.get_mut(*index)? {
                Node::Element(element) => current = element,
                Node::Text(_) => return None,
            }
        }
        Some(current)
    }

    /// The paths of every descendant element, in document order.
    pub(crate) fn descendant_paths(&self) -> Vec<ElementPath> {
        let mut paths = Vec::new();
        self.collect_paths(&ElementPath::root(), &mut |_| true, &mut paths);
        paths
    }

    /// The paths of the descendant elements that match the selector, in document order.
    pub(crate) fn select_paths(&self, selector: Selector) -> Vec<ElementPath> {
        let mut paths = Vec::new();
        self.collect_paths(&ElementPath::root(), &mut |e| selector.matches(e), &mut paths);
        paths
    }

    fn collect_paths<F>(&self, base: &ElementPath, filter: &mut F, paths: &mut Vec<ElementPath>)
    where
        F: FnMut(&Element) -> bool,
    {
        for (index, child) in self.children.iter().enumerate() {
            if let Node::Element(element) = child {
                let path = base.child(index);
                if filter(element) {
                    paths.push(path.clone());
                }
                element.collect_paths(&path, filter, paths);
            }
        }
    }

    pub(crate) fn select(&self, selector: Selector) -> Option<&Element> {
        let path = self.select_paths(selector).into_iter().next()?;
        self.at_path(&path)
    }

    pub(crate) fn select_mut(&mut self, selector: Selector) -> Option<&mut Element> {
        let path = self.select_paths(selector).into_iter().next()?;
        self.at_path_mut(&path)
    }

    pub(crate) fn contains(&self, selector: Selector) -> bool {
        self.select(selector).is_some()
    }

    /// Visits every descendant element mutably.
    pub(crate) fn for_each_descendant_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        for child in &mut self.children {
            if let Node::Element(element) = child {
                f(element);
                element.for_each_descendant_mut(f);
            }
        }
    }
}
