use crate::{
    config::{EffectsConfig, LabelStyle},
    deck::{
        Deck,
        element::{Element, ElementPath, Selector},
        html::{decode_entities, escape_text},
    },
    timers::{Reveal, Scheduler, TimerId, TimerTask},
};
use std::{collections::HashMap, time::Duration};

pub(crate) const ROTATING_PILL_ID: &str = "rotating-pill";
pub(crate) const PILL_TEXT_CLASS: &str = "pill-text";
pub(crate) const TYPEWRITER_ID: &str = "typewriter-text";

const CARD_CLASSES: &[&str] = &["problem-item", "flow-step", "feature-card", "metric-card", "benefit-item"];
const FLOW_STEP_CLASS: &str = "flow-step";
const FLOW_ARROW_CLASS: &str = "flow-arrow";

const LABEL_SWAP_DELAY: Duration = Duration::from_millis(300);
const CURSOR_HIDE_DELAY: Duration = Duration::from_millis(800);

/// The cosmetic effects that run while slides are shown.
///
/// Every cycle is tied to the slide that started it and keeps the handles to its timers, so
/// stopping it never leaves anything behind.
#[derive(Debug)]
pub(crate) struct Effects {
    labels: Vec<LabelStyle>,
    timings: EffectTimings,
    rotation: Option<Rotation>,
    typewriter: Option<Typewriter>,
    typed: HashMap<usize, String>,
}

#[derive(Clone, Debug)]
struct EffectTimings {
    rotation_delay: Duration,
    rotation_interval: Duration,
    typewriter_delay: Duration,
    typewriter_speed: Duration,
}

#[derive(Debug)]
struct Rotation {
    slide: usize,
    timers: Vec<TimerId>,
    next: usize,
}

#[derive(Debug)]
struct Typewriter {
    slide: usize,
    timers: Vec<TimerId>,
    text: Vec<char>,
    typed: usize,
}

impl Effects {
    pub(crate) fn new(config: &EffectsConfig) -> Self {
        let timings = EffectTimings {
            rotation_delay: Duration::from_millis(config.rotation_delay_ms),
            rotation_interval: Duration::from_millis(config.rotation_interval_ms),
            typewriter_delay: Duration::from_millis(config.typewriter_delay_ms),
            typewriter_speed: Duration::from_millis(config.typewriter_speed_ms),
        };
        Self { labels: config.label_cycle.clone(), timings, rotation: None, typewriter: None, typed: HashMap::new() }
    }

    /// The label the rotating label is pinned to when the slide is captured.
    pub(crate) fn pinned_label(&self) -> Option<&str> {
        self.labels.first().map(|label| label.text.as_str())
    }

    /// Kick off the effects for a slide that was just shown.
    pub(crate) fn activate(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration, slide: usize) {
        let Some(root) = deck.slide(slide).map(|s| &s.root) else {
            return;
        };
        if root.contains(Selector::Id(ROTATING_PILL_ID)) {
            self.stop_rotation(timers);
            let id = timers.once(now, self.timings.rotation_delay, TimerTask::StartRotation);
            self.rotation = Some(Rotation { slide, timers: vec![id], next: 0 });
        }
        if root.contains(Selector::Id(TYPEWRITER_ID)) {
            self.activate_typewriter(deck, timers, now, slide);
        }
    }

    /// Stop every running cycle.
    ///
    /// A typewriter that is still typing is completed right away.
    pub(crate) fn stop(&mut self, deck: &mut Deck, timers: &mut Scheduler) {
        self.stop_rotation(timers);
        self.stop_typewriter(deck, timers);
    }

    fn stop_rotation(&mut self, timers: &mut Scheduler) {
        if let Some(rotation) = self.rotation.take() {
            rotation.timers.into_iter().for_each(|id| {
                timers.cancel(id);
            });
        }
    }

    fn stop_typewriter(&mut self, deck: &mut Deck, timers: &mut Scheduler) {
        let Some(typewriter) = self.typewriter.take() else {
            return;
        };
        typewriter.timers.into_iter().for_each(|id| {
            timers.cancel(id);
        });
        if let Some(element) = Self::typewriter_element(deck, typewriter.slide) {
            let text: String = typewriter.text.into_iter().collect();
            Self::show_typed(element, &text);
        }
    }

    fn show_typed(element: &mut Element, text: &str) {
        element.replace_text(escape_text(text));
        element.style_mut().set("opacity", "1");
        element.style_mut().set("border-right", "none");
    }

    /// Handles one of the effect timers. Returns whether the task belonged to the effects.
    pub(crate) fn on_timer(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration, task: &TimerTask) -> bool {
        match task {
            TimerTask::StartRotation => {
                if let Some(slide) = self.rotation.as_ref().map(|r| r.slide) {
                    self.start_rotation(deck, timers, now, slide);
                }
            }
            TimerTask::RotateLabel => self.rotate_label(deck, timers, now),
            TimerTask::SwapLabel { index } => self.swap_label(deck, *index),
            TimerTask::StartTypewriter => self.start_typing(deck, timers, now),
            TimerTask::TypeNext => self.type_next(deck, timers, now),
            TimerTask::HideTypewriterCursor => self.hide_cursor(deck),
            TimerTask::Reveal { slide, element, reveal } => Self::reveal_element(deck, *slide, element, *reveal),
            _ => return false,
        };
        true
    }

    /// Start cycling the rotating label in a slide right away.
    pub(crate) fn start_rotation(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration, slide: usize) {
        self.stop_rotation(timers);
        let Some(first) = self.labels.first() else {
            return;
        };
        let Some(pill) = Self::pill(deck, slide) else {
            return;
        };
        if let Some(text) = pill.select_mut(Selector::Class(PILL_TEXT_CLASS)) {
            text.replace_text(escape_text(&first.text));
            Self::apply_label_colors(pill, first);
        }
        pill.style_mut().set("animation", "pillGlow 4s ease-in-out infinite");
        let id = timers.every(now, self.timings.rotation_interval, TimerTask::RotateLabel);
        self.rotation = Some(Rotation { slide, timers: vec![id], next: 0 });
        tracing::debug!("started label rotation in slide {slide}");
    }

    fn rotate_label(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration) {
        let Some(rotation) = &mut self.rotation else {
            return;
        };
        let Some(pill) = Self::pill(deck, rotation.slide) else {
            self.stop_rotation(timers);
            return;
        };
        pill.style_mut().set("transition", "transform 0.3s ease, box-shadow 0.3s ease");
        pill.style_mut().set("transform", "scale(0.95)");
        let Some(text) = pill.select_mut(Selector::Class(PILL_TEXT_CLASS)) else {
            return;
        };
        text.style_mut().set("transition", "opacity 0.3s ease");
        text.style_mut().set("opacity", "0");

        let index = rotation.next;
        rotation.next = (rotation.next + 1) % self.labels.len();
        // only the latest swap matters, drop the handles of the ones that already fired
        rotation.timers.retain(|id| timers.is_scheduled(*id));
        rotation.timers.push(timers.once(now, LABEL_SWAP_DELAY, TimerTask::SwapLabel { index }));
    }

    fn swap_label(&mut self, deck: &mut Deck, index: usize) {
        let Some(rotation) = &self.rotation else {
            return;
        };
        let (Some(label), Some(pill)) = (self.labels.get(index), Self::pill(deck, rotation.slide)) else {
            return;
        };
        Self::apply_label_colors(pill, label);
        pill.style_mut().set("transform", "scale(1)");
        if let Some(text) = pill.select_mut(Selector::Class(PILL_TEXT_CLASS)) {
            text.replace_text(escape_text(&label.text));
            text.style_mut().set("opacity", "1");
        }
    }

    fn apply_label_colors(pill: &mut Element, label: &LabelStyle) {
        pill.style_mut().set("background", &label.background);
        pill.style_mut().set("box-shadow", &format!("0 4px 15px {}", label.shadow));
    }

    fn pill(deck: &mut Deck, slide: usize) -> Option<&mut Element> {
        deck.slide_mut(slide)?.root.select_mut(Selector::Id(ROTATING_PILL_ID))
    }

    fn typewriter_element(deck: &mut Deck, slide: usize) -> Option<&mut Element> {
        deck.slide_mut(slide)?.root.select_mut(Selector::Id(TYPEWRITER_ID))
    }

    fn activate_typewriter(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration, slide: usize) {
        self.stop_typewriter(deck, timers);
        let Some(element) = Self::typewriter_element(deck, slide) else {
            return;
        };
        // The text is only typed the first time the slide is shown.
        if let Some(text) = self.typed.get(&slide) {
            Self::show_typed(element, text);
            return;
        }
        let text = match element.attribute("data-text") {
            Some(text) => decode_entities(text),
            None => decode_entities(element.text_content().trim()),
        };
        self.typed.insert(slide, text.clone());
        let id = timers.once(now, self.timings.typewriter_delay, TimerTask::StartTypewriter);
        self.typewriter = Some(Typewriter { slide, timers: vec![id], text: text.chars().collect(), typed: 0 });
    }

    fn start_typing(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration) {
        let Some(typewriter) = &mut self.typewriter else {
            return;
        };
        let Some(element) = Self::typewriter_element(deck, typewriter.slide) else {
            return;
        };
        element.replace_text("");
        element.style_mut().set("opacity", "1");
        typewriter.timers.clear();
        typewriter.timers.push(timers.every(now, self.timings.typewriter_speed, TimerTask::TypeNext));
    }

    fn type_next(&mut self, deck: &mut Deck, timers: &mut Scheduler, now: Duration) {
        let Some(typewriter) = &mut self.typewriter else {
            return;
        };
        let Some(element) = Self::typewriter_element(deck, typewriter.slide) else {
            return;
        };
        match typewriter.text.get(typewriter.typed) {
            Some(c) => {
                element.push_text(&escape_text(c.encode_utf8(&mut [0; 4])));
                typewriter.typed += 1;
            }
            None => {
                for id in typewriter.timers.drain(..) {
                    timers.cancel(id);
                }
                typewriter.timers.push(timers.once(now, CURSOR_HIDE_DELAY, TimerTask::HideTypewriterCursor));
            }
        }
    }

    fn hide_cursor(&mut self, deck: &mut Deck) {
        let Some(typewriter) = self.typewriter.take() else {
            return;
        };
        if let Some(element) = Self::typewriter_element(deck, typewriter.slide) {
            element.style_mut().set("border-right", "none");
        }
    }

    /// Hide the slide's cards and schedule them to be revealed one after the other.
    ///
    /// Slides that contain flow arrows reveal their flow steps and arrows instead.
    pub(crate) fn reveal(deck: &mut Deck, timers: &mut Scheduler, now: Duration, slide: usize) {
        let Some(root) = deck.slide_mut(slide).map(|s| &mut s.root) else {
            return;
        };
        if root.contains(Selector::Class(FLOW_ARROW_CLASS)) {
            let steps = root.select_paths(Selector::Class(FLOW_STEP_CLASS));
            for (index, path) in steps.into_iter().enumerate() {
                Self::hide_element(root, &path, "translateY(30px)");
                let delay = Duration::from_millis(index as u64 * 300 + 200);
                timers.once(now, delay, TimerTask::Reveal { slide, element: path, reveal: Reveal::FlowStep });
            }
            let arrows = root.select_paths(Selector::Class(FLOW_ARROW_CLASS));
            for (index, path) in arrows.into_iter().enumerate() {
                Self::hide_element(root, &path, "scale(0.5)");
                let delay = Duration::from_millis(index as u64 * 300 + 500);
                timers.once(now, delay, TimerTask::Reveal { slide, element: path, reveal: Reveal::FlowArrow });
            }
        } else {
            let cards: Vec<_> = root
                .descendant_paths()
                .into_iter()
                .filter(|path| {
                    root.at_path(path).is_some_and(|e| CARD_CLASSES.iter().any(|class| e.has_class(class)))
                })
                .collect();
            for (index, path) in cards.into_iter().enumerate() {
                Self::hide_element(root, &path, "translateY(20px)");
                let delay = Duration::from_millis(index as u64 * 100 + 200);
                timers.once(now, delay, TimerTask::Reveal { slide, element: path, reveal: Reveal::Card });
            }
        }
    }

    fn hide_element(root: &mut Element, path: &ElementPath, transform: &str) {
        if let Some(element) = root.at_path_mut(path) {
            element.style_mut().set("opacity", "0");
            element.style_mut().set("transform", transform);
        }
    }

    fn reveal_element(deck: &mut Deck, slide: usize, path: &ElementPath, reveal: Reveal) {
        let Some(element) = deck.slide_mut(slide).and_then(|s| s.root.at_path_mut(path)) else {
            return;
        };
        let (transition, opacity, transform) = match reveal {
            Reveal::Card => ("all 0.6s ease", "1", "translateY(0)"),
            Reveal::FlowStep => ("all 0.8s ease", "1", "translateY(0)"),
            Reveal::FlowArrow => ("all 0.6s ease", "0.7", "scale(1)"),
        };
        let style = element.style_mut();
        style.set("transition", transition);
        style.set("opacity", opacity);
        style.set("transform", transform);
    }
}
