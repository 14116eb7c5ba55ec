use super::element::{Element, InlineStyle, Node};
use std::borrow::Cow;
use tl::{HTMLTag, NodeHandle, Parser};

/// The parts of an HTML document the deck cares about.
#[derive(Debug, Default)]
pub(crate) struct ParsedDocument {
    pub(crate) head: Option<Element>,
    pub(crate) body: Option<Element>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseHtmlError {
    #[error("parsing html failed: {0}")]
    ParsingHtml(#[from] tl::ParseError),
}

/// Parses an HTML document into owned element trees.
pub(crate) fn parse_document(input: &str) -> Result<ParsedDocument, ParseHtmlError> {
    let dom = tl::parse(input, Default::default())?;
    let parser = dom.parser();
    let mut top_level = Vec::new();
    for handle in dom.children() {
        if let Some(node) = convert(handle, parser) {
            top_level.push(node);
        }
    }
    let head = find_tag(&top_level, "head").cloned();
    let body = find_tag(&top_level, "body").cloned();
    Ok(ParsedDocument { head, body })
}

fn find_tag<'a>(nodes: &'a [Node], tag: &str) -> Option<&'a Element> {
    for node in nodes {
        let Node::Element(element) = node else {
            continue;
        };
        if element.tag.eq_ignore_ascii_case(tag) {
            return Some(element);
        }
        if let Some(found) = find_tag(element.children(), tag) {
            return Some(found);
        }
    }
    None
}

fn convert(handle: &NodeHandle, parser: &Parser) -> Option<Node> {
    match handle.get(parser)? {
        tl::Node::Tag(tag) => convert_tag(tag, parser).map(Node::Element),
        tl::Node::Raw(bytes) => Some(Node::Text(bytes.as_utf8_str().into_owned())),
        tl::Node::Comment(_) => None,
    }
}

fn convert_tag(tag: &HTMLTag, parser: &Parser) -> Option<Element> {
    let name = tag.name().as_utf8_str();
    // doctype declarations show up as tags
    if name.starts_with('!') {
        return None;
    }
    let mut element = Element::new(name.to_ascii_lowercase());
    let attributes = tag.attributes();
    if let Some(id) = attributes.id() {
        element = element.with_id(id.as_utf8_str().into_owned());
    }
    if let Some(classes) = attributes.class() {
        for class in classes.as_utf8_str().split_ascii_whitespace() {
            element = element.with_class(class);
        }
    }
    for (name, value) in attributes.iter() {
        let value = value.map(Cow::into_owned);
        match name.as_ref() {
            // handled above
            "id" | "class" => (),
            "style" => {
                element = element.with_inline_style(InlineStyle::parse(value.as_deref().unwrap_or_default()));
            }
            _ => element = element.with_attribute(name.into_owned(), value),
        }
    }
    for child in tag.children().top().iter() {
        match convert(child, parser) {
            Some(Node::Element(child)) => element = element.with_child(child),
            Some(Node::Text(text)) => element = element.with_text(text),
            None => (),
        }
    }
    Some(element)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::deck::element::Selector;

    const DOCUMENT: &str = r#"<!DOCTYPE html>
<html>
<head><title>deck</title><link rel="stylesheet" href="styles.css"></head>
<body class="dark">
  <!-- slides -->
  <div class="slide active title-slide" data-slide="1" style="opacity: 1">
    <h1 id="title">Hello &amp; welcome</h1>
  </div>
</body>
</html>"#;

    #[test]
    fn parse_head_and_body() {
        let document = parse_document(DOCUMENT).expect("parse failed");
        let head = document.head.expect("no head");
        assert!(head.contains(Selector::Tag("title")));
        let body = document.body.expect("no body");
        assert_eq!(body.classes(), &["dark"]);
    }

    #[test]
    fn parse_slide_attributes() {
        let document = parse_document(DOCUMENT).expect("parse failed");
        let body = document.body.expect("no body");
        let slide = body.select(Selector::Class("slide")).expect("no slide");
        assert_eq!(slide.classes(), &["slide", "active", "title-slide"]);
        assert_eq!(slide.attribute("data-slide"), Some("1"));
        assert_eq!(slide.style().get("opacity"), Some("1"));
        let title = slide.select(Selector::Id("title")).expect("no title");
        assert_eq!(title.text_content(), "Hello &amp; welcome");
    }
}
