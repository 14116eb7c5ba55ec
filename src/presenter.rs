use crate::{
    commands::{
        gestures::CellSize,
        keyboard::KeyBindingsValidationError,
        listener::{CommandListener, UserInput},
    },
    config::Config,
    controller::{CommandSideEffect, Controller},
    deck::Deck,
    export::{ExportError, ExportScope, services::ToolServiceProvider},
    location::Location,
    render::{HitMap, TerminalDrawer, layout},
};
use crossterm::terminal;
use std::{
    io::{self, Stdout},
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

/// The longest we wait for input when no timer is pending.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// A deck presenter.
///
/// This type puts everything else together: it owns the controller, feeds it input and the time
/// that went by since the presentation started, and draws it whenever something changed.
pub struct Presenter {
    controller: Controller,
    listener: CommandListener,
    started: Instant,
}

impl Presenter {
    /// Construct a new presenter.
    pub fn new(
        deck: Deck,
        location: Location,
        config: &Config,
        output: Option<PathBuf>,
    ) -> Result<Self, PresentationError> {
        let listener = CommandListener::new(config.bindings.clone())?;
        let provider = Box::new(ToolServiceProvider::new(&config.export));
        let controller = Controller::new(deck, location, config, provider, output, Duration::ZERO);
        Ok(Self { controller, listener, started: Instant::now() })
    }

    /// Run the presentation until the user exits, returning the location it ended at.
    pub fn present(mut self) -> Result<Location, PresentationError> {
        let mut drawer = TerminalDrawer::new(io::stdout())?;
        let mut hits = self.render(&mut drawer)?;
        loop {
            let timeout = self.poll_timeout();
            let input = self.listener.poll_next_input(timeout)?;
            let now = self.now();
            let effect = match input {
                Some(UserInput::Command(command)) => self.controller.apply_command(command, now),
                Some(UserInput::Pointer(event)) => self.controller.apply_pointer(event, &hits, now),
                None => CommandSideEffect::None,
            };
            let mut needs_redraw = match effect {
                CommandSideEffect::Exit => break,
                CommandSideEffect::Redraw => true,
                CommandSideEffect::None => false,
            };
            needs_redraw |= self.controller.advance(self.now());
            if let Some(outcome) = self.controller.take_export_outcome() {
                Self::log_outcome(outcome);
            }
            if needs_redraw {
                hits = self.render(&mut drawer)?;
            }
        }
        drop(drawer);
        Ok(self.controller.shutdown())
    }

    fn render(&mut self, drawer: &mut TerminalDrawer<Stdout>) -> Result<HitMap, PresentationError> {
        // the terminal may have been resized since the last frame
        self.controller.set_cell_size(CellSize::detect());
        let (columns, rows) = terminal::size()?;
        let frame = layout(self.controller.presentation(), columns, rows);
        drawer.draw(&frame)?;
        Ok(frame.hits)
    }

    fn poll_timeout(&self) -> Duration {
        match self.controller.next_deadline() {
            Some(deadline) => deadline.saturating_sub(self.now()).min(IDLE_POLL),
            None => IDLE_POLL,
        }
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn log_outcome(outcome: Result<PathBuf, ExportError>) {
        match outcome {
            Ok(path) => tracing::info!("exported presentation to {}", path.display()),
            Err(e) => tracing::error!("export failed: {e}"),
        }
    }
}

/// Exports a deck without presenting it.
///
/// This drives the same controller the presenter uses with the real clock, sleeping until the next
/// timer is due, until the export job finishes.
pub fn export_headless(
    deck: Deck,
    location: Location,
    config: &Config,
    scope: ExportScope,
    output: Option<PathBuf>,
) -> Result<PathBuf, PresentationError> {
    let provider = Box::new(ToolServiceProvider::new(&config.export));
    let started = Instant::now();
    let mut controller = Controller::new(deck, location, config, provider, output, Duration::ZERO);
    if !controller.export(scope, started.elapsed()) {
        return Err(PresentationError::ExportBusy);
    }
    loop {
        controller.advance(started.elapsed());
        if let Some(outcome) = controller.take_export_outcome() {
            controller.shutdown();
            return Ok(outcome?);
        }
        let Some(deadline) = controller.next_deadline() else {
            return Err(PresentationError::ExportStalled);
        };
        thread::sleep(deadline.saturating_sub(started.elapsed()));
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PresentationError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid key bindings: {0}")]
    Bindings(#[from] KeyBindingsValidationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("an export is already running")]
    ExportBusy,

    #[error("export stopped making progress")]
    ExportStalled,
}
