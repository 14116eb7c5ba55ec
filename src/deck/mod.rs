use self::{
    element::{Element, Selector},
    html::{TextLine, to_html, visible_lines, write_element},
    parse::{ParseHtmlError, parse_document},
};
use itertools::Itertools;
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub(crate) mod element;
pub(crate) mod html;
pub(crate) mod parse;

/// The class that marks an element as a slide.
pub(crate) const SLIDE_CLASS: &str = "slide";

/// The class carried by the slide being shown.
pub(crate) const ACTIVE_CLASS: &str = "active";

/// A slide in a deck.
#[derive(Clone, Debug)]
pub(crate) struct Slide {
    number: usize,
    pub(crate) root: Element,
}

impl Slide {
    pub(crate) fn new(number: usize, root: Element) -> Self {
        Self { number, root }
    }

    /// The slide's position number, starting at 1.
    pub(crate) fn number(&self) -> usize {
        self.number
    }

    pub(crate) fn is_active(&self) -> bool {
        self.root.has_class(ACTIVE_CLASS)
    }

    pub(crate) fn contains(&self, selector: Selector) -> bool {
        self.root.contains(selector)
    }

    /// The text currently visible in this slide.
    pub(crate) fn visible_lines(&self) -> Vec<TextLine> {
        visible_lines(&self.root)
    }

    /// The slide's title, if it has a heading.
    pub(crate) fn title(&self) -> Option<String> {
        ["h1", "h2", "h3"]
            .into_iter()
            .find_map(|tag| self.root.select(Selector::Tag(tag)))
            .map(|heading| html::decode_entities(heading.text_content().trim()))
    }
}

/// A deck of slides loaded from an HTML document.
#[derive(Clone, Debug)]
pub struct Deck {
    slides: Vec<Slide>,
    head: Option<Element>,
    pub(crate) body: Element,
    base_directory: PathBuf,
}

impl Deck {
    /// Load a deck from an HTML file.
    pub fn load(path: &Path) -> Result<Self, DeckLoadError> {
        let contents = fs::read_to_string(path).map_err(DeckLoadError::Reading)?;
        Self::parse(&contents, base_directory(path))
    }

    pub(crate) fn parse(contents: &str, base_directory: PathBuf) -> Result<Self, DeckLoadError> {
        let document = parse_document(contents)?;
        let body = document.body.unwrap_or_else(|| Element::new("body"));
        let mut slides = Vec::new();
        for (index, path) in body.select_paths(Selector::Class(SLIDE_CLASS)).into_iter().enumerate() {
            let Some(root) = body.at_path(&path) else {
                continue;
            };
            let number = match root.attribute("data-slide") {
                Some(number) => {
                    number.trim().parse().map_err(|_| DeckLoadError::InvalidSlideNumber(number.to_string()))?
                }
                None => index + 1,
            };
            if slides.iter().any(|s: &Slide| s.number == number) {
                return Err(DeckLoadError::DuplicateSlideNumber(number));
            }
            slides.push(Slide::new(number, root.clone()));
        }
        if slides.is_empty() {
            return Err(DeckLoadError::NoSlides);
        }
        // The slides are kept on their own so strip any children off the body.
        let mut body_element = Element::new("body");
        for class in body.classes() {
            body_element.add_class(class);
        }
        Ok(Self { slides, head: document.head, body: body_element, base_directory })
    }

    /// The number of slides in this deck.
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Get a slide by its 1-based position.
    pub(crate) fn slide(&self, position: usize) -> Option<&Slide> {
        self.slides.get(position.checked_sub(1)?)
    }

    pub(crate) fn slide_mut(&mut self, position: usize) -> Option<&mut Slide> {
        self.slides.get_mut(position.checked_sub(1)?)
    }

    pub(crate) fn iter_slides(&self) -> impl Iterator<Item = &Slide> {
        self.slides.iter()
    }

    /// Builds a standalone HTML document that renders a single slide.
    ///
    /// The slide is serialized as given, which lets callers pass in a tweaked copy of it.
    pub(crate) fn capture_html(&self, slide: &Element, background: &str) -> String {
        let mut output = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
        let base = self.base_directory.canonicalize().unwrap_or_else(|_| self.base_directory.clone());
        output.push_str(&format!("<base href=\"{}\">\n", directory_url(&base)));
        if let Some(head) = &self.head {
            for child in head.children() {
                match child {
                    element::Node::Element(element) => write_element(element, &mut output),
                    element::Node::Text(text) => output.push_str(text),
                }
            }
        }
        output.push_str("\n</head>\n");
        let body =
            self.body.clone().with_style("background-color", background).with_style("margin", "0").with_child(slide.clone());
        output.push_str(&to_html(&body));
        output.push_str("\n</html>\n");
        output
    }

    /// A summary of this deck.
    pub fn metadata(&self) -> DeckMetadata {
        let slides = self.slides.iter().map(|s| SlideMetadata { number: s.number, title: s.title() }).collect();
        DeckMetadata { total_slides: self.slides.len(), slides }
    }
}

/// The directory relative assets in a deck are resolved against.
fn base_directory(deck_path: &Path) -> PathBuf {
    let deck_path = deck_path.canonicalize().unwrap_or_else(|_| deck_path.to_path_buf());
    match deck_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// A `file://` URL pointing at a directory, with every path segment percent-encoded.
fn directory_url(directory: &Path) -> String {
    let path = directory.to_string_lossy();
    let encoded = path.trim_end_matches('/').split('/').map(urlencoding::encode).join("/");
    format!("file://{encoded}/")
}

#[derive(Debug, Serialize)]
pub struct DeckMetadata {
    pub total_slides: usize,
    pub slides: Vec<SlideMetadata>,
}

#[derive(Debug, Serialize)]
pub struct SlideMetadata {
    pub number: usize,
    pub title: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum DeckLoadError {
    #[error("reading deck: {0}")]
    Reading(io::Error),

    #[error(transparent)]
    Parse(#[from] ParseHtmlError),

    #[error("no elements with class 'slide' found")]
    NoSlides,

    #[error("invalid slide number: '{0}'")]
    InvalidSlideNumber(String),

    #[error("slide number {0} appears more than once")]
    DuplicateSlideNumber(usize),
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use rstest::rstest;

    pub(crate) fn make_deck(slides: Vec<Element>) -> Deck {
        let slides = slides.into_iter().enumerate().map(|(index, root)| Slide::new(index + 1, root)).collect();
        Deck { slides, head: None, body: Element::new("body"), base_directory: PathBuf::from("/tmp") }
    }

    const DOCUMENT: &str = r#"<html><head><link rel="stylesheet" href="style.css"></head>
<body class="deck">
  <div class="slide active" data-slide="1"><h1>First</h1></div>
  <div class="slide" data-slide="2"><h2>Second</h2><p>body</p></div>
  <nav class="nav-dots"></nav>
</body></html>"#;

    #[test]
    fn parse_deck() {
        let deck = Deck::parse(DOCUMENT, PathBuf::from("/tmp")).expect("parse failed");
        assert_eq!(deck.len(), 2);
        assert!(deck.slide(1).unwrap().is_active());
        assert!(!deck.slide(2).unwrap().is_active());
        assert_eq!(deck.slide(2).unwrap().title().as_deref(), Some("Second"));
        assert!(deck.slide(0).is_none());
        assert!(deck.slide(3).is_none());
        assert_eq!(deck.body.classes(), &["deck"]);
    }

    #[test]
    fn slide_numbers_default_to_position() {
        let deck = Deck::parse(r#"<body><div class="slide"></div><div class="slide"></div></body>"#, PathBuf::new())
            .expect("parse failed");
        let numbers: Vec<_> = deck.iter_slides().map(Slide::number).collect();
        assert_eq!(numbers, &[1, 2]);
    }

    #[rstest]
    #[case::no_slides("<body><div></div></body>")]
    #[case::bad_number(r#"<body><div class="slide" data-slide="x"></div></body>"#)]
    #[case::duplicate(r#"<body><div class="slide" data-slide="1"></div><div class="slide" data-slide="1"></div></body>"#)]
    fn invalid_decks(#[case] input: &str) {
        Deck::parse(input, PathBuf::new()).expect_err("parse succeeded");
    }

    #[test]
    fn capture_html_contains_head_and_slide() {
        let deck = Deck::parse(DOCUMENT, PathBuf::from("/tmp")).expect("parse failed");
        let slide = &deck.slide(2).unwrap().root;
        let html = deck.capture_html(slide, "#ffffff");
        assert!(html.contains(r#"<link rel="stylesheet" href="style.css">"#), "{html}");
        assert!(html.contains(r#"<body class="deck" style="background-color: #ffffff; margin: 0;">"#), "{html}");
        assert!(html.contains(r#"<div class="slide" data-slide="2"><h2>Second</h2><p>body</p></div>"#), "{html}");
        assert!(!html.contains("nav-dots"), "{html}");
    }

    #[test]
    fn bare_deck_name_resolves_assets_next_to_it() {
        let directory = base_directory(Path::new("htmldeck-missing-deck.html"));
        assert_eq!(directory, PathBuf::from("."));
    }

    #[test]
    fn loaded_deck_base_is_absolute() {
        let dir = tempfile::tempdir().expect("no temp dir");
        let path = dir.path().join("deck.html");
        fs::write(&path, DOCUMENT).expect("write failed");
        let deck = Deck::load(&path).expect("load failed");
        assert!(deck.base_directory.is_absolute(), "{:?}", deck.base_directory);

        let html = deck.capture_html(&deck.slide(1).unwrap().root, "#000000");
        assert!(!html.contains(r#"<base href="file:///">"#), "{html}");
    }

    #[test]
    fn base_href_is_percent_encoded() {
        assert_eq!(directory_url(Path::new("/home/me/my talks/50%")), "file:///home/me/my%20talks/50%25/");
        assert_eq!(directory_url(Path::new("/")), "file:///");
    }
}
