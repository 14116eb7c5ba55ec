//! htmldeck: present HTML slide decks in your terminal and export them as PDF.
//!
//! This is not meant to be used as a crate!

pub(crate) mod commands;
pub(crate) mod config;
pub(crate) mod controller;
pub(crate) mod deck;
pub(crate) mod export;
pub(crate) mod location;
pub(crate) mod logging;
pub(crate) mod presentation;
pub(crate) mod presenter;
pub(crate) mod render;
pub(crate) mod timers;
pub(crate) mod tools;

pub use crate::{
    config::{Config, ConfigLoadError},
    deck::{Deck, DeckLoadError, DeckMetadata},
    export::{ExportError, ExportScope},
    location::Location,
    logging::{LogTarget, LoggingError, init_logging},
    presenter::{PresentationError, Presenter, export_headless},
};
