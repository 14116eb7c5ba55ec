use super::element::{Element, Node};
use std::fmt::Write;

const VOID_TAGS: &[&str] =
    &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr"];

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "section",
    "table",
    "tr",
    "ul",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "svg", "template", "noscript"];

/// Serializes an element, and everything under it, back into HTML.
pub(crate) fn to_html(element: &Element) -> String {
    let mut output = String::new();
    write_element(element, &mut output);
    output
}

pub(crate) fn write_element(element: &Element, output: &mut String) {
    let tag = &element.tag;
    output.push('<');
    output.push_str(tag);
    if let Some(id) = element.id() {
        write_attribute(output, "id", Some(id));
    }
    if !element.classes().is_empty() {
        write_attribute(output, "class", Some(&element.classes().join(" ")));
    }
    if !element.style().is_empty() {
        write_attribute(output, "style", Some(&element.style().to_string()));
    }
    for (name, value) in element.attributes() {
        write_attribute(output, name, value);
    }
    output.push('>');
    if VOID_TAGS.contains(&tag.as_str()) {
        return;
    }
    for child in element.children() {
        match child {
            Node::Element(child) => write_element(child, output),
            Node::Text(text) => output.push_str(text),
        }
    }
    let _ = write!(output, "</{tag}>");
}

fn write_attribute(output: &mut String, name: &str, value: Option<&str>) {
    match value {
        Some(value) => {
            let value = value.replace('"', "&quot;");
            let _ = write!(output, " {name}=\"{value}\"");
        }
        None => {
            let _ = write!(output, " {name}");
        }
    }
}

/// A line of visible text in a slide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TextLine {
    pub(crate) text: String,
    pub(crate) emphasis: bool,
}

/// Extracts the text that is currently visible in an element as a list of lines.
///
/// Block elements start new lines. Elements hidden through their inline style are skipped.
pub(crate) fn visible_lines(element: &Element) -> Vec<TextLine> {
    let mut collector = LineCollector::default();
    collector.visit(element, false);
    collector.flush();
    collector.lines
}

#[derive(Default)]
struct LineCollector {
    lines: Vec<TextLine>,
    current: String,
    emphasis: bool,
}

impl LineCollector {
    fn visit(&mut self, element: &Element, emphasis: bool) {
        if SKIPPED_TAGS.contains(&element.tag.as_str()) || is_hidden(element) {
            return;
        }
        let is_block = BLOCK_TAGS.contains(&element.tag.as_str());
        let emphasis = emphasis || matches!(element.tag.as_str(), "h1" | "h2" | "h3" | "strong" | "b");
        if is_block {
            self.flush();
        }
        for child in element.children() {
            match child {
                Node::Element(child) => self.visit(child, emphasis),
                Node::Text(text) => self.push(text, emphasis),
            }
        }
        if is_block {
            self.flush();
        }
    }

    fn push(&mut self, text: &str, emphasis: bool) {
        let text = decode_entities(text);
        let mut words = text.split_whitespace().peekable();
        if words.peek().is_none() {
            return;
        }
        if !self.current.is_empty() && text.starts_with(char::is_whitespace) {
            self.current.push(' ');
        }
        let joined = words.collect::<Vec<_>>().join(" ");
        self.current.push_str(&joined);
        if text.ends_with(char::is_whitespace) {
            self.current.push(' ');
        }
        self.emphasis = self.emphasis || emphasis;
    }

    fn flush(&mut self) {
        let text = self.current.trim().to_string();
        if !text.is_empty() {
            self.lines.push(TextLine { text, emphasis: self.emphasis });
        }
        self.current.clear();
        self.emphasis = false;
    }
}

fn is_hidden(element: &Element) -> bool {
    let style = element.style();
    if style.get("display") == Some("none") {
        return true;
    }
    match style.get("opacity").map(str::parse::<f64>) {
        Some(Ok(opacity)) => opacity <= 0.0,
        _ => false,
    }
}

/// Escapes text so it can be placed inside an element.
pub(crate) fn escape_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            other => output.push(other),
        }
    }
    output
}

/// Decodes the handful of entities that are common in slide text.
pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
