use self::{chrome::Chrome, effects::Effects};
use crate::{
    config::EffectsConfig,
    deck::{ACTIVE_CLASS, Deck, Slide},
    location::{Location, parse_slide_fragment},
    timers::{Scheduler, TimerTask},
};
use std::time::Duration;

pub(crate) mod chrome;
pub(crate) mod effects;

/// The class added to a slide while it transitions out backwards.
const LEAVING_CLASS: &str = "prev";
const LEAVING_DURATION: Duration = Duration::from_millis(600);

/// A presentation.
///
/// This owns the deck and is the only thing that decides which slide is active.
#[derive(Debug)]
pub(crate) struct Presentation {
    deck: Deck,
    current: usize,
    chrome: Chrome,
    location: Location,
    effects: Effects,
}

impl Presentation {
    /// Construct a new presentation, starting at the first slide.
    pub(crate) fn new(
        mut deck: Deck,
        location: Location,
        config: &EffectsConfig,
        timers: &mut Scheduler,
        now: Duration,
    ) -> Self {
        // Whatever the markup says, exactly one slide is active.
        for position in 1..=deck.len() {
            if let Some(slide) = deck.slide_mut(position) {
                slide.root.toggle_class(ACTIVE_CLASS, position == 1);
            }
        }
        let chrome = Chrome::new(deck.len(), Duration::from_millis(config.notification_duration_ms));
        let mut effects = Effects::new(config);
        effects.activate(&mut deck, timers, now, 1);
        Self { deck, current: 1, chrome, location, effects }
    }

    pub(crate) fn deck(&self) -> &Deck {
        &self.deck
    }

    pub(crate) fn deck_mut(&mut self) -> &mut Deck {
        &mut self.deck
    }

    pub(crate) fn chrome(&self) -> &Chrome {
        &self.chrome
    }

    pub(crate) fn chrome_mut(&mut self) -> &mut Chrome {
        &mut self.chrome
    }

    pub(crate) fn location(&self) -> &Location {
        &self.location
    }

    /// The 1-based index of the current slide.
    pub(crate) fn current_slide_index(&self) -> usize {
        self.current
    }

    pub(crate) fn current_slide(&self) -> Option<&Slide> {
        self.deck.slide(self.current)
    }

    pub(crate) fn total_slides(&self) -> usize {
        self.deck.len()
    }

    /// The text the rotating label shows in captures.
    pub(crate) fn pinned_label(&self) -> Option<String> {
        self.effects.pinned_label().map(ToString::to_string)
    }

    pub(crate) fn jump_next(&mut self, timers: &mut Scheduler, now: Duration) -> bool {
        if self.current < self.deck.len() { self.go_to_slide(self.current + 1, timers, now) } else { false }
    }

    pub(crate) fn jump_previous(&mut self, timers: &mut Scheduler, now: Duration) -> bool {
        if self.current > 1 { self.go_to_slide(self.current - 1, timers, now) } else { false }
    }

    pub(crate) fn jump_first_slide(&mut self, timers: &mut Scheduler, now: Duration) -> bool {
        self.go_to_slide(1, timers, now)
    }

    pub(crate) fn jump_last_slide(&mut self, timers: &mut Scheduler, now: Duration) -> bool {
        self.go_to_slide(self.deck.len(), timers, now)
    }

    /// Go to a slide, given its 1-based index.
    ///
    /// Returns `false` and changes nothing if there's no such slide.
    pub(crate) fn go_to_slide(&mut self, slide: usize, timers: &mut Scheduler, now: Duration) -> bool {
        if slide < 1 || slide > self.deck.len() {
            return false;
        }
        self.effects.stop(&mut self.deck, timers);

        let previous = self.current;
        if let Some(old) = self.deck.slide_mut(previous) {
            old.root.remove_class(ACTIVE_CLASS);
            if slide < previous {
                old.root.add_class(LEAVING_CLASS);
                timers.once(now, LEAVING_DURATION, TimerTask::ClearLeaving { slide: previous });
            }
        }
        self.current = slide;
        if let Some(new) = self.deck.slide_mut(slide) {
            new.root.add_class(ACTIVE_CLASS);
        }
        self.chrome.update(slide);
        Effects::reveal(&mut self.deck, timers, now, slide);
        self.effects.activate(&mut self.deck, timers, now, slide);
        self.location.set_slide(slide);
        tracing::debug!("moved from slide {previous} to slide {slide}");
        true
    }

    /// Go to the slide a `#slide-N` fragment points to.
    ///
    /// Malformed fragments and ones pointing to slides that don't exist are ignored.
    pub(crate) fn handle_fragment(&mut self, fragment: &str, timers: &mut Scheduler, now: Duration) -> bool {
        match parse_slide_fragment(fragment) {
            Some(slide) => self.go_to_slide(slide, timers, now),
            None => {
                tracing::debug!("ignoring fragment '{fragment}'");
                false
            }
        }
    }

    /// Stop the running effects, like the rotating label.
    pub(crate) fn stop_effects(&mut self, timers: &mut Scheduler) {
        self.effects.stop(&mut self.deck, timers);
    }

    pub(crate) fn toggle_fullscreen(&mut self) {
        self.chrome.toggle_fullscreen();
    }

    /// Handles a timer task that belongs to the presentation. Returns whether it did.
    pub(crate) fn on_timer(&mut self, timers: &mut Scheduler, now: Duration, task: &TimerTask) -> bool {
        match task {
            TimerTask::ClearLeaving { slide } => {
                if let Some(slide) = self.deck.slide_mut(*slide) {
                    slide.root.remove_class(LEAVING_CLASS);
                }
            }
            TimerTask::RearmRotation { slide } => {
                if *slide == self.current {
                    self.effects.start_rotation(&mut self.deck, timers, now, *slide);
                }
            }
            TimerTask::ShowNotification { id } => self.chrome.show_notification(*id),
            TimerTask::HideNotification { id } => self.chrome.hide_notification(timers, now, *id),
            TimerTask::RemoveNotification { id } => self.chrome.remove_notification(*id),
            other => return self.effects.on_timer(&mut self.deck, timers, now, other),
        };
        true
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::deck::{element::Element, test::make_deck};
    use rstest::rstest;
    use std::path::PathBuf;

    pub(crate) fn make_presentation(slides: usize, timers: &mut Scheduler) -> Presentation {
        let slides = (1..=slides)
            .map(|n| {
                Element::new("div")
                    .with_class("slide")
                    .with_attribute("data-slide", Some(n.to_string()))
                    .with_child(Element::new("h2").with_text(format!("slide {n}")))
            })
            .collect();
        let deck = make_deck(slides);
        let location = Location::from(PathBuf::from("deck.html"));
        Presentation::new(deck, location, &EffectsConfig::default(), timers, Duration::ZERO)
    }

    fn active_slides(presentation: &Presentation) -> Vec<usize> {
        presentation.deck().iter_slides().filter(|s| s.is_active()).map(Slide::number).collect()
    }

    #[test]
    fn initial_state() {
        let mut timers = Scheduler::default();
        let presentation = make_presentation(7, &mut timers);
        assert_eq!(presentation.current_slide_index(), 1);
        assert_eq!(active_slides(&presentation), &[1]);
        assert!(presentation.chrome().previous_disabled());
        assert!(!presentation.chrome().next_disabled());
        assert_eq!(presentation.location().fragment(), None);
        assert!((presentation.chrome().progress() - 100.0 / 7.0).abs() < 1e-9);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::past_end(8)]
    #[case::way_past_end(1000)]
    fn out_of_range_is_noop(#[case] slide: usize) {
        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(7, &mut timers);
        let scheduled = timers.len();
        assert!(!presentation.go_to_slide(slide, &mut timers, Duration::ZERO));
        assert_eq!(presentation.current_slide_index(), 1);
        assert_eq!(active_slides(&presentation), &[1]);
        assert_eq!(presentation.location().fragment(), None);
        assert_eq!(timers.len(), scheduled);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(7)]
    fn go_to_valid_slide(#[case] slide: usize) {
        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(7, &mut timers);
        assert!(presentation.go_to_slide(slide, &mut timers, Duration::ZERO));
        assert_eq!(active_slides(&presentation), &[slide]);
        assert_eq!(presentation.location().fragment(), Some(format!("slide-{slide}").as_str()));
        assert_eq!(presentation.chrome().current(), slide);
    }

    #[test]
    fn next_until_the_end() {
        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(7, &mut timers);
        for _ in 0..6 {
            assert!(presentation.jump_next(&mut timers, Duration::ZERO));
        }
        assert_eq!(presentation.current_slide_index(), 7);
        assert!(presentation.chrome().next_disabled());
        assert!(!presentation.jump_next(&mut timers, Duration::ZERO));
        assert_eq!(presentation.current_slide_index(), 7);
    }

    #[test]
    fn previous_at_start_is_noop() {
        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(3, &mut timers);
        assert!(!presentation.jump_previous(&mut timers, Duration::ZERO));
        assert_eq!(presentation.current_slide_index(), 1);
    }

    #[test]
    fn going_back_marks_leaving_slide() {
        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(3, &mut timers);
        presentation.jump_last_slide(&mut timers, Duration::ZERO);
        presentation.jump_previous(&mut timers, Duration::from_secs(1));
        assert!(presentation.deck().slide(3).unwrap().root.has_class(LEAVING_CLASS));

        let now = Duration::from_millis(1600);
        while let Some((_, task)) = timers.pop_due(now) {
            presentation.on_timer(&mut timers, now, &task);
        }
        assert!(!presentation.deck().slide(3).unwrap().root.has_class(LEAVING_CLASS));
    }

    #[rstest]
    #[case::hash("#slide-5", 5)]
    #[case::bare("slide-3", 3)]
    #[case::out_of_range("#slide-9", 1)]
    #[case::zero("#slide-0", 1)]
    #[case::malformed("#slide-x", 1)]
    #[case::unrelated("#intro", 1)]
    fn fragments(#[case] fragment: &str, #[case] expected: usize) {
        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(7, &mut timers);
        presentation.handle_fragment(fragment, &mut timers, Duration::ZERO);
        assert_eq!(presentation.current_slide_index(), expected);
    }

    #[test]
    fn markup_active_class_is_normalized() {
        let slides = vec![
            Element::new("div").with_class("slide"),
            Element::new("div").with_class("slide").with_class("active"),
        ];
        let mut timers = Scheduler::default();
        let presentation = Presentation::new(
            make_deck(slides),
            Location::from(PathBuf::from("deck.html")),
            &EffectsConfig::default(),
            &mut timers,
            Duration::ZERO,
        );
        assert_eq!(active_slides(&presentation), &[1]);
    }
}
