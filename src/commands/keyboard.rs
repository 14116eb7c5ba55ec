use super::listener::{Command, CommandDiscriminants};
use crate::config::KeyBindingsConfig;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// The keys that can be named in a binding, along with the names they can be written as.
///
/// The first name is the one bindings are displayed with.
const NAMED_KEYS: &[(KeyCode, &[&str])] = &[
    (KeyCode::PageUp, &["<PageUp>", "<page_up>"]),
    (KeyCode::PageDown, &["<PageDown>", "<page_down>"]),
    (KeyCode::Home, &["<Home>", "<home>"]),
    (KeyCode::End, &["<End>", "<end>"]),
    (KeyCode::Left, &["<Left>", "<left>"]),
    (KeyCode::Right, &["<Right>", "<right>"]),
    (KeyCode::Char(' '), &["<Space>", "<space>"]),
];

/// Turns key presses into deck commands.
///
/// Presses are held back while they could still complete a binding, so `gg` and `12G` work.
pub(crate) struct KeyboardListener {
    bindings: CommandKeyBindings,
    pending: Vec<KeyEvent>,
}

impl KeyboardListener {
    pub(crate) fn new(bindings: CommandKeyBindings) -> Self {
        Self { bindings, pending: Vec::new() }
    }

    /// Feed a key press, getting back the command it completes, if any.
    pub(crate) fn on_key(&mut self, event: KeyEvent) -> Option<Command> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        self.pending.push(event);
        match self.bindings.resolve(&self.pending) {
            Resolution::Pending => None,
            Resolution::Unbound => {
                self.pending.clear();
                None
            }
            Resolution::Command(command) => {
                self.pending.clear();
                Some(command)
            }
        }
    }
}

enum Resolution {
    Pending,
    Unbound,
    Command(Command),
}

/// Every configured binding, along with the command it triggers.
pub(crate) struct CommandKeyBindings {
    bindings: Vec<(KeyBinding, CommandDiscriminants)>,
}

impl CommandKeyBindings {
    fn resolve(&self, events: &[KeyEvent]) -> Resolution {
        let mut pending = false;
        for (binding, command) in &self.bindings {
            match binding.progress(events) {
                Progress::Complete(number) => match Self::build_command(*command, number) {
                    Some(command) => return Resolution::Command(command),
                    None => return Resolution::Unbound,
                },
                Progress::Prefix => pending = true,
                Progress::Mismatch => (),
            }
        }
        if pending { Resolution::Pending } else { Resolution::Unbound }
    }

    fn build_command(command: CommandDiscriminants, number: Option<u32>) -> Option<Command> {
        use CommandDiscriminants as C;
        let command = match command {
            C::Next => Command::Next,
            C::Previous => Command::Previous,
            C::FirstSlide => Command::FirstSlide,
            C::LastSlide => Command::LastSlide,
            C::GoToSlide => Command::GoToSlide(number?),
            C::ExportPdf => Command::ExportPdf,
            C::ExportSlide => Command::ExportSlide,
            C::ToggleFullscreen => Command::ToggleFullscreen,
            C::Exit => Command::Exit,
            // not bindable
            C::Redraw | C::HashChange => return None,
        };
        Some(command)
    }

    /// Rejects binding sets where one binding can never fire because another one is a prefix of it.
    fn check_prefixes(bindings: &[&KeyBinding]) -> Result<(), KeyBindingsValidationError> {
        for (index, first) in bindings.iter().enumerate() {
            for second in &bindings[index + 1..] {
                if first.is_prefix_of(second) || second.is_prefix_of(first) {
                    return Err(KeyBindingsValidationError::Conflict((*first).clone(), (*second).clone()));
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<KeyBindingsConfig> for CommandKeyBindings {
    type Error = KeyBindingsValidationError;

    fn try_from(config: KeyBindingsConfig) -> Result<Self, Self::Error> {
        if config.go_to_slide.iter().any(|binding| !binding.has_number()) {
            return Err(KeyBindingsValidationError::Invalid("go_to_slide", "<number> matcher required"));
        }
        let groups = [
            (CommandDiscriminants::Next, config.next),
            (CommandDiscriminants::Previous, config.previous),
            (CommandDiscriminants::FirstSlide, config.first_slide),
            (CommandDiscriminants::LastSlide, config.last_slide),
            (CommandDiscriminants::GoToSlide, config.go_to_slide),
            (CommandDiscriminants::ExportPdf, config.export_pdf),
            (CommandDiscriminants::ExportSlide, config.export_slide),
            (CommandDiscriminants::ToggleFullscreen, config.toggle_fullscreen),
            (CommandDiscriminants::Exit, config.exit),
        ];
        let bindings: Vec<_> = groups
            .into_iter()
            .flat_map(|(command, bindings)| bindings.into_iter().map(move |binding| (binding, command)))
            .collect();
        let all: Vec<_> = bindings.iter().map(|(binding, _)| binding).collect();
        Self::check_prefixes(&all)?;
        Ok(Self { bindings })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyBindingsValidationError {
    #[error("invalid binding for {0}: {1}")]
    Invalid(&'static str, &'static str),

    #[error("conflicting keybindings: {0} and {1}")]
    Conflict(KeyBinding, KeyBinding),
}

/// How far a sequence of presses got into a binding.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Progress {
    /// Every token matched. Carries the number typed, if the binding takes one.
    Complete(Option<u32>),
    Prefix,
    Mismatch,
}

/// A sequence of keys that triggers a command, like `<c-p>`, `gg` or `<number>G`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(try_from = "String")]
pub struct KeyBinding(#[cfg_attr(feature = "json-schema", schemars(with = "String"))] Vec<KeyToken>);

impl KeyBinding {
    fn progress(&self, mut events: &[KeyEvent]) -> Progress {
        let mut number = None;
        for (index, token) in self.0.iter().enumerate() {
            events = match token {
                KeyToken::Key(stroke) => match events.split_first() {
                    Some((event, rest)) if stroke.matches(event) => rest,
                    _ => return Progress::Mismatch,
                },
                KeyToken::Number => {
                    let digits: Vec<u32> = events
                        .iter()
                        .map_while(|event| match event.code {
                            KeyCode::Char(c) => c.to_digit(10),
                            _ => None,
                        })
                        .collect();
                    let value = digits.iter().try_fold(0u32, |value, digit| value.checked_mul(10)?.checked_add(*digit));
                    match value {
                        Some(value) if !digits.is_empty() => number = Some(value),
                        _ => return Progress::Mismatch,
                    }
                    &events[digits.len()..]
                }
            };
            if events.is_empty() && index + 1 < self.0.len() {
                return Progress::Prefix;
            }
        }
        Progress::Complete(number)
    }

    fn has_number(&self) -> bool {
        self.0.contains(&KeyToken::Number)
    }

    fn is_prefix_of(&self, other: &KeyBinding) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl FromStr for KeyBinding {
    type Err = KeyBindingParseError;

    fn from_str(mut input: &str) -> Result<Self, Self::Err> {
        let mut tokens = Vec::new();
        while !input.is_empty() {
            let (token, rest) = KeyToken::parse(input)?;
            if token == KeyToken::Number && tokens.contains(&KeyToken::Number) {
                return Err(KeyBindingParseError::TooManyNumbers);
            }
            tokens.push(token);
            input = rest;
        }
        if tokens.is_empty() {
            return Err(KeyBindingParseError::NoInput);
        }
        Ok(Self(tokens))
    }
}

impl TryFrom<String> for KeyBinding {
    type Error = KeyBindingParseError;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        input.parse()
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|token| write!(f, "{token}"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyBindingParseError {
    #[error("no input")]
    NoInput,

    #[error("not a valid key: {0}")]
    InvalidKey(char),

    #[error("too many number placeholders")]
    TooManyNumbers,

    #[error("invalid control sequence")]
    InvalidControlSequence,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum KeyToken {
    Key(KeyStroke),
    Number,
}

impl KeyToken {
    fn parse(input: &str) -> Result<(Self, &str), KeyBindingParseError> {
        if let Some(rest) = input.strip_prefix("<number>") {
            return Ok((Self::Number, rest));
        }
        let Some(rest) = input.strip_prefix("<c-").or_else(|| input.strip_prefix("<C-")) else {
            let (key, rest) = parse_key(input)?;
            return Ok((Self::Key(KeyStroke { key, control: false }), rest));
        };
        let (key, rest) = parse_key(rest)?;
        let rest = rest.strip_prefix('>').ok_or(KeyBindingParseError::InvalidControlSequence)?;
        Ok((Self::Key(KeyStroke { key, control: true }), rest))
    }
}

fn parse_key(input: &str) -> Result<(KeyCode, &str), KeyBindingParseError> {
    for (key, names) in NAMED_KEYS {
        if let Some(rest) = names.iter().find_map(|name| input.strip_prefix(name)) {
            return Ok((*key, rest));
        }
    }
    let next = input.chars().next().ok_or(KeyBindingParseError::NoInput)?;
    // angle brackets only show up in named keys
    let valid = next != '<' && next != '>' && (next.is_alphanumeric() || next.is_ascii_punctuation() || next == ' ');
    if valid { Ok((KeyCode::Char(next), &input[next.len_utf8()..])) } else { Err(KeyBindingParseError::InvalidKey(next)) }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stroke = match self {
            Self::Number => return write!(f, "<number>"),
            Self::Key(stroke) => stroke,
        };
        if stroke.control {
            write!(f, "<c-")?;
        }
        match NAMED_KEYS.iter().find(|(key, _)| *key == stroke.key) {
            Some((_, names)) => write!(f, "{}", names[0])?,
            None => match stroke.key {
                KeyCode::Char(c) => write!(f, "{c}")?,
                other => write!(f, "<{other:?}>")?,
            },
        };
        if stroke.control {
            write!(f, ">")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct KeyStroke {
    key: KeyCode,
    control: bool,
}

impl KeyStroke {
    fn matches(&self, event: &KeyEvent) -> bool {
        // Cmd on macOS counts as control
        let control = event.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);
        if self.control != control {
            return false;
        }
        match (self.key, event.code) {
            // caps lock turns <c-p> into <c-P>
            (KeyCode::Char(expected), KeyCode::Char(actual)) if control => expected.eq_ignore_ascii_case(&actual),
            (expected, actual) => expected == actual,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crossterm::event::KeyEventState;
    use rstest::rstest;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::empty(), kind: KeyEventKind::Press, state: KeyEventState::NONE }
    }

    fn key(c: char) -> KeyEvent {
        press(KeyCode::Char(c))
    }

    fn with(modifiers: KeyModifiers, c: char) -> KeyEvent {
        KeyEvent { modifiers, ..key(c) }
    }

    fn ctrl(c: char) -> KeyEvent {
        with(KeyModifiers::CONTROL, c)
    }

    fn stroke(key: KeyCode, control: bool) -> KeyToken {
        KeyToken::Key(KeyStroke { key, control })
    }

    fn binding(input: &str) -> KeyBinding {
        input.parse().expect("invalid binding")
    }

    fn default_listener() -> KeyboardListener {
        let bindings = CommandKeyBindings::try_from(KeyBindingsConfig::default()).expect("invalid bindings");
        KeyboardListener::new(bindings)
    }

    #[rstest]
    #[case::number("<number>", vec![KeyToken::Number])]
    #[case::char("w", vec![stroke(KeyCode::Char('w'), false)])]
    #[case::ctrl_lower("<c-w>", vec![stroke(KeyCode::Char('w'), true)])]
    #[case::ctrl_upper("<C-w>", vec![stroke(KeyCode::Char('w'), true)])]
    #[case::space(" ", vec![stroke(KeyCode::Char(' '), false)])]
    #[case::named_space("<space>", vec![stroke(KeyCode::Char(' '), false)])]
    #[case::sequence("gg", vec![stroke(KeyCode::Char('g'), false), stroke(KeyCode::Char('g'), false)])]
    #[case::page_up("<page_up>", vec![stroke(KeyCode::PageUp, false)])]
    #[case::page_down("<PageDown>", vec![stroke(KeyCode::PageDown, false)])]
    #[case::home("<home>", vec![stroke(KeyCode::Home, false)])]
    #[case::end("<End>", vec![stroke(KeyCode::End, false)])]
    #[case::right("<Right>", vec![stroke(KeyCode::Right, false)])]
    fn parse_binding(#[case] input: &str, #[case] tokens: Vec<KeyToken>) {
        assert_eq!(binding(input), KeyBinding(tokens));
    }

    #[rstest]
    #[case::empty("")]
    #[case::unknown_name("<hi>")]
    #[case::two_numbers("<number><number>")]
    #[case::unterminated("<C-w")]
    #[case::function_key("<f1>")]
    fn invalid_bindings(#[case] input: &str) {
        assert!(input.parse::<KeyBinding>().is_err(), "{input} parsed");
    }

    #[rstest]
    #[case::single("G", vec![key('G')], Progress::Complete(None))]
    #[case::sequence("gg", vec![key('g'), key('g')], Progress::Complete(None))]
    #[case::control("<c-p>", vec![ctrl('p')], Progress::Complete(None))]
    #[case::command("<c-p>", vec![with(KeyModifiers::SUPER, 'p')], Progress::Complete(None))]
    #[case::caps_lock("<c-p>", vec![with(KeyModifiers::CONTROL | KeyModifiers::SHIFT, 'P')], Progress::Complete(None))]
    #[case::named("<Home>", vec![press(KeyCode::Home)], Progress::Complete(None))]
    #[case::number("<number>G", vec![key('4'), key('2'), key('G')], Progress::Complete(Some(42)))]
    #[case::unfinished("gg", vec![key('g')], Progress::Prefix)]
    #[case::digits_only("<number>G", vec![key('4'), key('2')], Progress::Prefix)]
    #[case::missing_control("<c-p>", vec![key('p')], Progress::Mismatch)]
    #[case::extra_control("p", vec![ctrl('p')], Progress::Mismatch)]
    #[case::wrong_suffix("<number>G", vec![key('4'), key('K')], Progress::Mismatch)]
    #[case::no_digits("<number>G", vec![key('G')], Progress::Mismatch)]
    #[case::overflow("<number>G", "99999999999".chars().map(key).collect(), Progress::Mismatch)]
    fn progress(#[case] input: &str, #[case] events: Vec<KeyEvent>, #[case] expected: Progress) {
        assert_eq!(binding(input).progress(&events), expected);
    }

    #[rstest]
    #[case::shared_prefix(&["<number>G", "other", "<number>Go"], true)]
    #[case::control_prefix(&["<c-w>", "<c-w>a"], true)]
    #[case::duplicate(&["q", "q"], true)]
    #[case::diverging(&["<number>Ga", "<number>Go"], false)]
    #[case::number_and_key(&["G", "<number>G", "gg"], false)]
    fn prefix_conflicts(#[case] inputs: &[&str], #[case] conflict: bool) {
        let bindings: Vec<_> = inputs.iter().map(|input| binding(input)).collect();
        let result = CommandKeyBindings::check_prefixes(&bindings.iter().collect::<Vec<_>>());
        assert_eq!(result.is_err(), conflict, "{result:?}");
    }

    #[test]
    fn go_to_slide_requires_number() {
        let config = KeyBindingsConfig { go_to_slide: vec![binding("G")], ..Default::default() };
        let result = CommandKeyBindings::try_from(config);
        assert!(matches!(result, Err(KeyBindingsValidationError::Invalid(..))));
    }

    #[rstest]
    #[case::right(vec![press(KeyCode::Right)], Command::Next)]
    #[case::space(vec![key(' ')], Command::Next)]
    #[case::page_down(vec![press(KeyCode::PageDown)], Command::Next)]
    #[case::left(vec![press(KeyCode::Left)], Command::Previous)]
    #[case::home(vec![press(KeyCode::Home)], Command::FirstSlide)]
    #[case::gg(vec![key('g'), key('g')], Command::FirstSlide)]
    #[case::end(vec![press(KeyCode::End)], Command::LastSlide)]
    #[case::go_to(vec![key('1'), key('2'), key('G')], Command::GoToSlide(12))]
    #[case::export(vec![ctrl('p')], Command::ExportPdf)]
    #[case::export_slide(vec![with(KeyModifiers::SUPER, 's')], Command::ExportSlide)]
    #[case::fullscreen(vec![ctrl('f')], Command::ToggleFullscreen)]
    #[case::exit(vec![key('q')], Command::Exit)]
    fn default_commands(#[case] events: Vec<KeyEvent>, #[case] expected: Command) {
        let mut listener = default_listener();
        let (last, prefix) = events.split_last().unwrap();
        for event in prefix {
            assert_eq!(listener.on_key(*event), None);
        }
        assert_eq!(listener.on_key(*last), Some(expected));
    }

    #[test]
    fn unbound_keys_clear_pending_presses() {
        let mut listener = default_listener();
        assert_eq!(listener.on_key(key('g')), None);
        assert_eq!(listener.on_key(key('x')), None);
        assert_eq!(listener.on_key(key('g')), None);
        assert_eq!(listener.on_key(key('g')), Some(Command::FirstSlide));
    }

    #[test]
    fn releases_ignored() {
        let mut listener = default_listener();
        let event = KeyEvent { kind: KeyEventKind::Release, ..key('q') };
        assert_eq!(listener.on_key(event), None);
    }

    #[rstest]
    #[case("<number>G")]
    #[case("<PageUp>potato")]
    #[case("<c-p>")]
    #[case("<Space>")]
    fn display(#[case] input: &str) {
        assert_eq!(binding(input).to_string(), input);
    }
}
