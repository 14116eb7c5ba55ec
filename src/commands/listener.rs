use super::keyboard::{CommandKeyBindings, KeyBindingsValidationError, KeyboardListener};
use crate::config::KeyBindingsConfig;
use crossterm::event::{Event, MouseButton, MouseEvent, MouseEventKind, poll, read};
use std::{io, time::Duration};
use strum::EnumDiscriminants;

/// A command listener that turns terminal events into user input.
pub(crate) struct CommandListener {
    keyboard: KeyboardListener,
}

impl CommandListener {
    pub(crate) fn new(config: KeyBindingsConfig) -> Result<Self, KeyBindingsValidationError> {
        let bindings = CommandKeyBindings::try_from(config)?;
        Ok(Self { keyboard: KeyboardListener::new(bindings) })
    }

    /// Try to get the next input, waiting at most `timeout` for one.
    ///
    /// This returns `Ok(None)` on timeout or if the event received doesn't map into anything.
    pub(crate) fn poll_next_input(&mut self, timeout: Duration) -> io::Result<Option<UserInput>> {
        if !poll(timeout)? {
            return Ok(None);
        }
        let input = match read()? {
            Event::Key(event) => self.keyboard.on_key(event).map(UserInput::Command),
            Event::Mouse(event) => Self::translate_mouse(event).map(UserInput::Pointer),
            Event::Resize(..) => Some(UserInput::Command(Command::Redraw)),
            _ => None,
        };
        Ok(input)
    }

    fn translate_mouse(event: MouseEvent) -> Option<PointerEvent> {
        let MouseEvent { kind, column, row, .. } = event;
        match kind {
            MouseEventKind::Down(MouseButton::Left) => Some(PointerEvent::Press { column, row }),
            MouseEventKind::Up(MouseButton::Left) => Some(PointerEvent::Release { column, row }),
            MouseEventKind::ScrollDown => Some(PointerEvent::Scroll { forward: true }),
            MouseEventKind::ScrollUp => Some(PointerEvent::Scroll { forward: false }),
            _ => None,
        }
    }
}

/// Something the user did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum UserInput {
    Command(Command),
    Pointer(PointerEvent),
}

/// A mouse event, in terminal cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PointerEvent {
    Press { column: u16, row: u16 },
    Release { column: u16, row: u16 },
    Scroll { forward: bool },
}

/// A command.
#[derive(Clone, Debug, PartialEq, Eq, EnumDiscriminants)]
pub(crate) enum Command {
    /// Redraw the presentation.
    ///
    /// This can happen on terminal resize.
    Redraw,

    /// Move forward in the presentation.
    Next,

    /// Move backwards in the presentation.
    Previous,

    /// Go to the first slide.
    FirstSlide,

    /// Go to the last slide.
    LastSlide,

    /// Go to one particular slide.
    GoToSlide(u32),

    /// The location fragment changed.
    HashChange(String),

    /// Export every slide into a PDF.
    ExportPdf,

    /// Export the current slide into a PDF.
    ExportSlide,

    /// Toggle fullscreen mode.
    ToggleFullscreen,

    /// Exit the presentation.
    Exit,
}

#[cfg(test)]
mod test {
    use super::*;
    use crossterm::event::KeyModifiers;
    use rstest::rstest;

    fn mouse(kind: MouseEventKind) -> MouseEvent {
        MouseEvent { kind, column: 3, row: 7, modifiers: KeyModifiers::empty() }
    }

    #[rstest]
    #[case::press(MouseEventKind::Down(MouseButton::Left), Some(PointerEvent::Press { column: 3, row: 7 }))]
    #[case::release(MouseEventKind::Up(MouseButton::Left), Some(PointerEvent::Release { column: 3, row: 7 }))]
    #[case::scroll_down(MouseEventKind::ScrollDown, Some(PointerEvent::Scroll { forward: true }))]
    #[case::scroll_up(MouseEventKind::ScrollUp, Some(PointerEvent::Scroll { forward: false }))]
    #[case::right_button(MouseEventKind::Down(MouseButton::Right), None)]
    #[case::moved(MouseEventKind::Moved, None)]
    fn mouse_translation(#[case] kind: MouseEventKind, #[case] expected: Option<PointerEvent>) {
        assert_eq!(CommandListener::translate_mouse(mouse(kind)), expected);
    }
}
