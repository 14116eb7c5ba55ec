use crate::{
    deck::{
        ACTIVE_CLASS, Deck,
        element::{Element, ElementPath, Node, Selector},
        html::escape_text,
    },
    presentation::effects::{PILL_TEXT_CLASS, ROTATING_PILL_ID},
};

const OPTIMIZED_CLASS: &str = "pdf-optimized";
const EXPORT_MODE_CLASS: &str = "pdf-export-mode";
const TITLE_SLIDE_CLASS: &str = "title-slide";
const SLIDE_CONTENT_CLASS: &str = "slide-content";
const FLOATING_CLASSES: &[&str] = &["floating-icon", "floating-elements"];
const GRADIENT_TEXT_CLASSES: &[&str] = &["gradient-text", "brand-highlight"];
const CONTENT_BACKGROUND: &str = "rgba(255, 255, 255, 0.98)";
const SOLID_TEXT_COLOR: &str = "#667eea";
const DEFAULT_SVG_SIZE: &str = "24";

/// The element a mutation was applied to.
#[derive(Clone, Debug, PartialEq)]
enum Target {
    Body,
    Slide(ElementPath),
}

#[derive(Debug)]
enum Mutation {
    ClassAdded { target: Target, class: &'static str },
    Style { target: Target, property: &'static str, previous: Option<String> },
    Text { target: Target, previous: Vec<Node> },
}

/// Every change made to a deck while putting a slide into its capture state.
///
/// Restoring replays the changes backwards, which leaves the deck exactly as it was.
#[derive(Debug)]
struct CaptureLedger {
    slide: usize,
    mutations: Vec<Mutation>,
}

impl CaptureLedger {
    fn new(slide: usize) -> Self {
        Self { slide, mutations: Vec::new() }
    }

    fn element<'a>(deck: &'a mut Deck, slide: usize, target: &Target) -> Option<&'a mut Element> {
        match target {
            Target::Body => Some(&mut deck.body),
            Target::Slide(path) => deck.slide_mut(slide)?.root.at_path_mut(path),
        }
    }

    fn add_class(&mut self, deck: &mut Deck, target: Target, class: &'static str) {
        let Some(element) = Self::element(deck, self.slide, &target) else {
            return;
        };
        // Classes that were already there must survive the restore.
        if element.add_class(class) {
            self.mutations.push(Mutation::ClassAdded { target, class });
        }
    }

    fn set_style(&mut self, deck: &mut Deck, target: Target, property: &'static str, value: &str) {
        let Some(element) = Self::element(deck, self.slide, &target) else {
            return;
        };
        let previous = element.style_mut().set(property, value);
        self.mutations.push(Mutation::Style { target, property, previous });
    }

    fn replace_text(&mut self, deck: &mut Deck, target: Target, text: &str) {
        let Some(element) = Self::element(deck, self.slide, &target) else {
            return;
        };
        let previous = element.replace_text(escape_text(text));
        self.mutations.push(Mutation::Text { target, previous });
    }

    fn restore(self, deck: &mut Deck) {
        let slide = self.slide;
        let count = self.mutations.len();
        for mutation in self.mutations.into_iter().rev() {
            match mutation {
                Mutation::ClassAdded { target, class } => {
                    if let Some(element) = Self::element(deck, slide, &target) {
                        element.remove_class(class);
                    }
                }
                Mutation::Style { target, property, previous } => {
                    if let Some(element) = Self::element(deck, slide, &target) {
                        element.style_mut().put(property, previous.as_deref());
                    }
                }
                Mutation::Text { target, previous } => {
                    if let Some(element) = Self::element(deck, slide, &target) {
                        element.replace_children(previous);
                    }
                }
            }
        }
        tracing::debug!("restored slide {slide} after reverting {count} changes");
    }
}

/// A slide that's been put into its capture state.
///
/// The slide and the document body are restored when this is dropped, no matter how the capture
/// ended.
pub(crate) struct CaptureScope<'a> {
    deck: &'a mut Deck,
    ledger: Option<CaptureLedger>,
}

impl<'a> CaptureScope<'a> {
    /// Puts a slide into its capture state.
    ///
    /// Returns `None` if the deck doesn't have this slide.
    pub(crate) fn enter(deck: &'a mut Deck, slide: usize, pinned_label: Option<&str>) -> Option<Self> {
        let root = &deck.slide(slide)?.root;
        let descendants = root.descendant_paths();
        let pill = root.select_paths(Selector::Id(ROTATING_PILL_ID)).into_iter().next();
        let pill_text = pill.as_ref().and_then(|pill_path| {
            let pill = root.at_path(pill_path)?;
            let text = pill.select_paths(Selector::Class(PILL_TEXT_CLASS)).into_iter().next()?;
            Some(pill_path.join(&text))
        });
        let floating: Vec<_> =
            FLOATING_CLASSES.iter().flat_map(|class| root.select_paths(Selector::Class(*class))).collect();
        let with_backdrop: Vec<_> = descendants
            .iter()
            .filter(|path| root.at_path(path).is_some_and(|e| e.style().get("backdrop-filter").is_some()))
            .cloned()
            .collect();
        let content = match root.has_class(TITLE_SLIDE_CLASS) {
            true => None,
            false => root.select_paths(Selector::Class(SLIDE_CONTENT_CLASS)).into_iter().next(),
        };

        let mut ledger = CaptureLedger::new(slide);
        let root = || Target::Slide(ElementPath::root());
        ledger.add_class(deck, root(), OPTIMIZED_CLASS);
        ledger.add_class(deck, Target::Body, EXPORT_MODE_CLASS);
        for path in descendants {
            ledger.set_style(deck, Target::Slide(path.clone()), "animation-play-state", "paused");
            ledger.set_style(deck, Target::Slide(path.clone()), "transition-duration", "0s");
            ledger.set_style(deck, Target::Slide(path.clone()), "animation", "none");
            ledger.set_style(deck, Target::Slide(path), "transition", "none");
        }
        if let Some(pill) = pill {
            ledger.set_style(deck, Target::Slide(pill.clone()), "animation", "none");
            ledger.set_style(deck, Target::Slide(pill), "transform", "scale(1)");
        }
        if let Some(text) = pill_text {
            if let Some(label) = pinned_label {
                ledger.replace_text(deck, Target::Slide(text.clone()), label);
            }
            ledger.set_style(deck, Target::Slide(text), "opacity", "1");
        }
        for path in floating {
            ledger.set_style(deck, Target::Slide(path), "display", "none");
        }
        for path in with_backdrop {
            ledger.set_style(deck, Target::Slide(path), "backdrop-filter", "none");
        }
        if let Some(content) = content {
            ledger.set_style(deck, Target::Slide(content), "background", CONTENT_BACKGROUND);
        }
        ledger.set_style(deck, root(), "transform", "translateX(0)");
        ledger.set_style(deck, root(), "opacity", "1");
        ledger.add_class(deck, root(), ACTIVE_CLASS);
        tracing::debug!("slide {slide} entered capture state with {} changes", ledger.mutations.len());
        Some(Self { deck, ledger: Some(ledger) })
    }

    pub(crate) fn deck(&self) -> &Deck {
        self.deck
    }

    /// The element for the slide being captured.
    pub(crate) fn slide_element(&self) -> Option<&Element> {
        let slide = self.ledger.as_ref()?.slide;
        self.deck.slide(slide).map(|slide| &slide.root)
    }

    /// Releases the deck while keeping the slide in its capture state.
    ///
    /// The returned value must be resumed or restored later on.
    pub(crate) fn suspend(mut self) -> PendingCapture {
        PendingCapture { ledger: self.ledger.take() }
    }
}

impl Drop for CaptureScope<'_> {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.take() {
            ledger.restore(self.deck);
        }
    }
}

/// A capture that's waiting for the slide to settle.
#[derive(Debug)]
pub(crate) struct PendingCapture {
    ledger: Option<CaptureLedger>,
}

impl PendingCapture {
    pub(crate) fn slide(&self) -> usize {
        self.ledger.as_ref().map(|ledger| ledger.slide).unwrap_or_default()
    }

    /// Takes the deck back, restoring the slide once the returned scope is dropped.
    pub(crate) fn resume(mut self, deck: &mut Deck) -> CaptureScope<'_> {
        CaptureScope { deck, ledger: self.ledger.take() }
    }

    /// Restores the slide right away.
    pub(crate) fn restore(self, deck: &mut Deck) {
        drop(self.resume(deck));
    }
}

impl Drop for PendingCapture {
    fn drop(&mut self) {
        if let Some(ledger) = &self.ledger {
            tracing::warn!("capture of slide {} dropped without restoring it", ledger.slide);
        }
    }
}

/// Builds the copy of a slide that's handed to the rasterizer.
///
/// This works on a clone so the live slide is never touched.
pub(crate) fn optimize_for_capture(slide: &Element) -> Element {
    let mut slide = slide.clone();
    slide.style_mut().set("transform", "translateX(0)");
    slide.style_mut().set("opacity", "1");
    slide.add_class(ACTIVE_CLASS);
    slide.for_each_descendant_mut(&mut |element: &mut Element| {
        if GRADIENT_TEXT_CLASSES.iter().any(|class| element.has_class(class)) {
            let style = element.style_mut();
            style.set("color", SOLID_TEXT_COLOR);
            style.set("background", "none");
            style.set("-webkit-background-clip", "unset");
            style.set("-webkit-text-fill-color", "unset");
            style.set("background-clip", "unset");
        }
        if element.tag.eq_ignore_ascii_case("svg") {
            element.style_mut().set("display", "block");
            let width = element.style().get("width").unwrap_or(DEFAULT_SVG_SIZE).to_string();
            let height = element.style().get("height").unwrap_or(DEFAULT_SVG_SIZE).to_string();
            element.set_attribute("width", &width);
            element.set_attribute("height", &height);
        }
        element.style_mut().set("animation", "none");
        element.style_mut().set("transition", "none");
    });
    slide
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::deck::{html::to_html, test::make_deck};

    fn capture_slide() -> Element {
        Element::new("div")
            .with_class("slide")
            .with_style("opacity", "0.5")
            .with_child(Element::new("div").with_class("floating-elements").with_style("display", "flex"))
            .with_child(
                Element::new("div")
                    .with_class("slide-content")
                    .with_style("backdrop-filter", "blur(10px)")
                    .with_style("transition", "opacity 1s")
                    .with_child(
                        Element::new("span")
                            .with_id(ROTATING_PILL_ID)
                            .with_style("transform", "scale(0.95)")
                            .with_child(
                                Element::new("span")
                                    .with_class(PILL_TEXT_CLASS)
                                    .with_style("opacity", "0")
                                    .with_text("GDPR"),
                            ),
                    )
                    .with_child(Element::new("p").with_class("gradient-text").with_text("brand")),
            )
    }

    fn make_capture_deck() -> Deck {
        make_deck(vec![Element::new("div").with_class("slide").with_class("active"), capture_slide()])
    }

    #[test]
    fn enter_applies_capture_state() {
        let mut deck = make_capture_deck();
        let scope = CaptureScope::enter(&mut deck, 2, Some("ISO 27001")).expect("no slide");
        let deck = scope.deck();
        let root = &deck.slide(2).unwrap().root;
        assert!(root.has_class(OPTIMIZED_CLASS));
        assert!(root.has_class(ACTIVE_CLASS));
        assert_eq!(root.style().get("transform"), Some("translateX(0)"));
        assert_eq!(root.style().get("opacity"), Some("1"));
        assert!(deck.body.has_class(EXPORT_MODE_CLASS));

        let floating = root.select(Selector::Class("floating-elements")).unwrap();
        assert_eq!(floating.style().get("display"), Some("none"));

        let content = root.select(Selector::Class(SLIDE_CONTENT_CLASS)).unwrap();
        assert_eq!(content.style().get("backdrop-filter"), Some("none"));
        assert_eq!(content.style().get("background"), Some(CONTENT_BACKGROUND));
        assert_eq!(content.style().get("transition"), Some("none"));
        assert_eq!(content.style().get("animation-play-state"), Some("paused"));

        let pill = root.select(Selector::Id(ROTATING_PILL_ID)).unwrap();
        assert_eq!(pill.style().get("transform"), Some("scale(1)"));
        let text = root.select(Selector::Class(PILL_TEXT_CLASS)).unwrap();
        assert_eq!(text.text_content(), "ISO 27001");
        assert_eq!(text.style().get("opacity"), Some("1"));
    }

    #[test]
    fn drop_restores_exactly() {
        let mut deck = make_capture_deck();
        let original_slide = deck.slide(2).unwrap().root.clone();
        let original_body = deck.body.clone();
        {
            let _scope = CaptureScope::enter(&mut deck, 2, Some("ISO 27001")).expect("no slide");
        }
        assert_eq!(deck.slide(2).unwrap().root, original_slide);
        assert_eq!(deck.body, original_body);
        assert_eq!(to_html(&deck.slide(2).unwrap().root), to_html(&original_slide));
    }

    #[test]
    fn restore_keeps_existing_classes() {
        let mut deck = make_capture_deck();
        {
            let _scope = CaptureScope::enter(&mut deck, 1, None).expect("no slide");
        }
        // slide 1 was already active before the capture
        assert!(deck.slide(1).unwrap().is_active());
        assert!(!deck.slide(1).unwrap().root.has_class(OPTIMIZED_CLASS));
    }

    #[test]
    fn restore_on_error_path() {
        fn failing_capture(deck: &mut Deck) -> Result<(), &'static str> {
            let _scope = CaptureScope::enter(deck, 2, Some("ISO 27001")).ok_or("no slide")?;
            Err("rasterizer exploded")
        }

        let mut deck = make_capture_deck();
        let original = deck.slide(2).unwrap().root.clone();
        assert!(failing_capture(&mut deck).is_err());
        assert_eq!(deck.slide(2).unwrap().root, original);
    }

    #[test]
    fn suspended_capture() {
        let mut deck = make_capture_deck();
        let original = deck.slide(2).unwrap().root.clone();
        let pending = CaptureScope::enter(&mut deck, 2, None).expect("no slide").suspend();
        assert_eq!(pending.slide(), 2);
        assert!(deck.slide(2).unwrap().root.has_class(OPTIMIZED_CLASS));
        assert!(deck.body.has_class(EXPORT_MODE_CLASS));

        let scope = pending.resume(&mut deck);
        assert!(scope.slide_element().unwrap().has_class(OPTIMIZED_CLASS));
        drop(scope);
        assert_eq!(deck.slide(2).unwrap().root, original);
        assert!(!deck.body.has_class(EXPORT_MODE_CLASS));
    }

    #[test]
    fn pending_restore() {
        let mut deck = make_capture_deck();
        let original = deck.slide(2).unwrap().root.clone();
        let pending = CaptureScope::enter(&mut deck, 2, None).expect("no slide").suspend();
        pending.restore(&mut deck);
        assert_eq!(deck.slide(2).unwrap().root, original);
    }

    #[test]
    fn title_slide_keeps_its_background() {
        let slide = Element::new("div")
            .with_class("slide")
            .with_class(TITLE_SLIDE_CLASS)
            .with_child(Element::new("div").with_class(SLIDE_CONTENT_CLASS));
        let mut deck = make_deck(vec![slide]);
        let scope = CaptureScope::enter(&mut deck, 1, None).expect("no slide");
        let content = scope.slide_element().unwrap().select(Selector::Class(SLIDE_CONTENT_CLASS)).unwrap();
        assert_eq!(content.style().get("background"), None);
    }

    #[test]
    fn missing_slide() {
        let mut deck = make_capture_deck();
        assert!(CaptureScope::enter(&mut deck, 3, None).is_none());
    }

    #[test]
    fn optimize_works_on_copy() {
        let slide = capture_slide()
            .with_child(Element::new("svg").with_style("width", "32px"))
            .with_child(Element::new("svg"));
        let optimized = optimize_for_capture(&slide);
        assert_eq!(slide.style().get("opacity"), Some("0.5"));

        assert_eq!(optimized.style().get("opacity"), Some("1"));
        assert!(optimized.has_class(ACTIVE_CLASS));
        let gradient = optimized.select(Selector::Class("gradient-text")).unwrap();
        assert_eq!(gradient.style().get("color"), Some(SOLID_TEXT_COLOR));
        assert_eq!(gradient.style().get("background"), Some("none"));

        let svgs = optimized.select_paths(Selector::Tag("svg"));
        let sizes: Vec<_> = svgs
            .iter()
            .map(|path| {
                let svg = optimized.at_path(path).unwrap();
                assert_eq!(svg.style().get("display"), Some("block"));
                (svg.attribute("width").unwrap().to_string(), svg.attribute("height").unwrap().to_string())
            })
            .collect();
        assert_eq!(sizes, &[("32px".to_string(), "24".to_string()), ("24".to_string(), "24".to_string())]);
    }
}
