use crate::{
    commands::{
        gestures::{CellSize, Direction, SwipeTracker, WheelDebouncer},
        listener::{Command, PointerEvent},
    },
    config::Config,
    deck::Deck,
    export::{
        ExportError, ExportOptions, ExportScope, ExportSequencer,
        services::{ExternalServices, ServiceProvider},
    },
    location::Location,
    presentation::Presentation,
    render::{HitMap, HitTarget},
    timers::{Scheduler, TimerTask},
};
use std::{path::PathBuf, time::Duration};

/// What the presenter needs to do after the controller handled something.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandSideEffect {
    Exit,
    Redraw,
    None,
}

impl From<bool> for CommandSideEffect {
    fn from(changed: bool) -> Self {
        if changed { Self::Redraw } else { Self::None }
    }
}

/// Owns everything a running deck needs and routes inputs and timers to it.
pub(crate) struct Controller {
    presentation: Presentation,
    exporter: ExportSequencer,
    timers: Scheduler,
    swipe: SwipeTracker,
    wheel: WheelDebouncer,
    cell_size: CellSize,
    output: Option<PathBuf>,
}

impl Controller {
    pub(crate) fn new(
        deck: Deck,
        location: Location,
        config: &Config,
        provider: Box<dyn ServiceProvider>,
        output: Option<PathBuf>,
        now: Duration,
    ) -> Self {
        let mut timers = Scheduler::default();
        let fragment = location.fragment().map(ToString::to_string);
        let presentation = Presentation::new(deck, location, &config.effects, &mut timers, now);
        let options = ExportOptions::new(&config.export, &config.defaults);
        let mut controller = Self {
            presentation,
            exporter: ExportSequencer::new(ExternalServices::new(provider), options),
            timers,
            swipe: SwipeTracker::new(config.effects.swipe_threshold),
            wheel: WheelDebouncer::new(Duration::from_millis(config.effects.wheel_debounce_ms)),
            cell_size: CellSize::default(),
            output,
        };
        if let Some(fragment) = fragment {
            controller.apply_command(Command::HashChange(fragment), now);
        }
        controller
    }

    /// Use this cell size when turning terminal coordinates into pixels.
    pub(crate) fn set_cell_size(&mut self, cell_size: CellSize) {
        self.cell_size = cell_size;
    }

    pub(crate) fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub(crate) fn is_exporting(&self) -> bool {
        self.exporter.is_exporting()
    }

    pub(crate) fn take_export_outcome(&mut self) -> Option<Result<PathBuf, ExportError>> {
        self.exporter.take_outcome()
    }

    /// The moment the next timer fires, if any is scheduled.
    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub(crate) fn apply_command(&mut self, command: Command, now: Duration) -> CommandSideEffect {
        let timers = &mut self.timers;
        let presentation = &mut self.presentation;
        let changed = match command {
            Command::Exit => return CommandSideEffect::Exit,
            Command::Redraw => return CommandSideEffect::Redraw,
            Command::Next => presentation.jump_next(timers, now),
            Command::Previous => presentation.jump_previous(timers, now),
            Command::FirstSlide => presentation.jump_first_slide(timers, now),
            Command::LastSlide => presentation.jump_last_slide(timers, now),
            Command::GoToSlide(number) => presentation.go_to_slide(number as usize, timers, now),
            Command::HashChange(fragment) => presentation.handle_fragment(&fragment, timers, now),
            Command::ExportPdf => return self.export(ExportScope::All, now).into(),
            Command::ExportSlide => {
                let slide = self.presentation.current_slide_index();
                return self.export(ExportScope::Slide(slide), now).into();
            }
            Command::ToggleFullscreen => {
                presentation.toggle_fullscreen();
                true
            }
        };
        changed.into()
    }

    pub(crate) fn apply_pointer(&mut self, event: PointerEvent, hits: &HitMap, now: Duration) -> CommandSideEffect {
        match event {
            PointerEvent::Press { column, row } => {
                let (x, y) = self.cell_size.to_pixels(column, row);
                self.swipe.press(x, y);
                match hits.target_at(column, row) {
                    Some(target) => self.click(target, now),
                    None => CommandSideEffect::None,
                }
            }
            PointerEvent::Release { column, row } => {
                let (x, y) = self.cell_size.to_pixels(column, row);
                match self.swipe.release(x, y) {
                    Some(direction) => self.move_towards(direction, now).into(),
                    None => CommandSideEffect::None,
                }
            }
            PointerEvent::Scroll { forward } => {
                self.wheel.scroll(&mut self.timers, now, forward);
                CommandSideEffect::None
            }
        }
    }

    fn click(&mut self, target: HitTarget, now: Duration) -> CommandSideEffect {
        let command = match target {
            HitTarget::Previous => Command::Previous,
            HitTarget::Next => Command::Next,
            HitTarget::Dot(slide) => Command::GoToSlide(slide as u32),
            HitTarget::Export => Command::ExportPdf,
        };
        self.apply_command(command, now)
    }

    fn move_towards(&mut self, direction: Direction, now: Duration) -> bool {
        match direction {
            Direction::Forward => self.presentation.jump_next(&mut self.timers, now),
            Direction::Backward => self.presentation.jump_previous(&mut self.timers, now),
        }
    }

    /// Starts an export, returning `false` if one is already running.
    pub(crate) fn export(&mut self, scope: ExportScope, now: Duration) -> bool {
        let output = match &self.output {
            Some(output) => output.clone(),
            None => scope.default_output_path(self.presentation.location().path()),
        };
        self.exporter.start(scope, output, &mut self.presentation, &mut self.timers, now)
    }

    /// Fires every timer that's due by `now`. Returns whether anything visible changed.
    pub(crate) fn advance(&mut self, now: Duration) -> bool {
        let mut changed = false;
        while let Some((_, task)) = self.timers.pop_due(now) {
            changed = true;
            match task {
                TimerTask::CaptureSettled => {
                    self.exporter.on_settled(&mut self.presentation, &mut self.timers, now);
                }
                TimerTask::WheelSettled { forward } => {
                    let direction = self.wheel.settled(forward);
                    self.move_towards(direction, now);
                }
                task => {
                    if !self.presentation.on_timer(&mut self.timers, now, &task) {
                        tracing::warn!("unhandled timer task: {task:?}");
                    }
                }
            }
        }
        changed
    }

    /// Stops everything, restoring any slide an unfinished export left in its capture state.
    pub(crate) fn shutdown(mut self) -> Location {
        self.exporter.abandon(&mut self.presentation, &mut self.timers);
        self.presentation.location().clone()
    }
}
