use std::{
    fmt,
    path::{Path, PathBuf},
};

const SLIDE_FRAGMENT_PREFIX: &str = "slide-";

/// The location of the presentation: the deck path plus its URL fragment.
///
/// The fragment is the only piece of state that outlives a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    path: PathBuf,
    fragment: Option<String>,
}

impl Location {
    /// Splits a `deck.html#slide-3` style argument into path and fragment.
    pub fn parse(input: &str) -> Self {
        match input.rsplit_once('#') {
            Some((path, fragment)) if !path.is_empty() => {
                Self { path: PathBuf::from(path), fragment: Some(fragment.to_string()) }
            }
            _ => Self { path: PathBuf::from(input), fragment: None },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub(crate) fn set_slide(&mut self, slide: usize) {
        self.fragment = Some(format_slide_fragment(slide));
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Self { path, fragment: None }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

pub(crate) fn format_slide_fragment(slide: usize) -> String {
    format!("{SLIDE_FRAGMENT_PREFIX}{slide}")
}

/// Parses a `slide-N` fragment, with or without the leading `#`.
///
/// Anything that isn't exactly that shape yields `None`.
pub(crate) fn parse_slide_fragment(fragment: &str) -> Option<usize> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let number = fragment.strip_prefix(SLIDE_FRAGMENT_PREFIX)?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse().ok()
}
